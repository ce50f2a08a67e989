//! Model Dispatcher and Agent Units (components E and G).
//!
//! [`provider`]/[`providers`] define the pluggable LLM transport;
//! [`dispatcher`] layers tier routing, a per-mission semaphore, and
//! retry/backoff over it; [`traits`] defines the narrow
//! [`ControllerView`] every agent unit sees. The six concrete units
//! (Messenger, Planner, Researcher, Reflection, Writer, Note-Assigner)
//! each live in their own module and implement [`traits::Agent`].

pub mod config;
pub mod dispatcher;
pub mod message;
pub mod messenger;
pub mod note_assigner;
pub mod planner;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod reflection;
pub mod researcher;
pub mod traits;
pub mod writer;

pub use config::{DispatcherConfig, DispatcherConfigBuilder, TierBinding};
pub use dispatcher::{DispatcherRegistry, ModelDispatcher, ModelTier};
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage, ToolCall};
pub use messenger::{Messenger, MessengerInput, MessengerOutput};
pub use note_assigner::{NoteAssigner, NoteAssignerInput, NoteAssignerOutput};
pub use planner::{Planner, PlannerInput, PlannerOutput};
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use reflection::{Reflection, ReflectionInput, ReflectionOutput};
pub use researcher::{Researcher, ResearcherInput, ResearcherOutput};
pub use traits::{Agent, AgentContext, ControllerView, parse_json_response, run_tool_loop};
pub use writer::{Writer, WriterInput, WriterOutput};

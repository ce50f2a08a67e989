//! Domain model for missions: the data shared by every other module.

pub mod chunk;
pub mod ids;
pub mod log;
pub mod mission;
pub mod note;
pub mod pads;
pub mod plan;
pub mod relevance;
pub mod usage;

pub use chunk::{ChunkMetadata, RetrievalChunk};
pub use ids::{ChunkId, DocId, LogId, MissionId, NoteId, SectionId, StepId};
pub use log::{ExecutionLogEntry, LogStatus};
pub use mission::{Mission, MissionMetadata, MissionStatus};
pub use note::{Note, SourceType};
pub use pads::Pads;
pub use plan::{Plan, PlanStep, Section, StepAction};
pub use relevance::Relevance;
pub use usage::UsageRecord;

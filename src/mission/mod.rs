//! Mission Controller, Agent Dispatch & Scheduling, Settings Resolver,
//! and Auto-Optimizer (§4.1, §4.2, §4.7): the orchestration layer that
//! drives a mission from a user request to a cited report.

pub mod controller;
pub mod dispatch;
pub mod optimizer;
pub mod settings;

pub use controller::{MissionController, UserContext};
pub use dispatch::{fan_out, CancellationToken};
pub use optimizer::AutoOptimizer;
pub use settings::{ResearchParams, ResearchParamsOverride, SettingsResolver};

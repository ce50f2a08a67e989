//! `Mission` — the top-level unit of work tracked by the orchestration engine.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::MissionId;
use super::plan::Plan;

/// Lifecycle state of a mission.
///
/// Transitions are enforced by the Mission Controller, not by this type;
/// see `mission::controller` for the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    /// Created but not yet planned.
    Pending,
    /// The Planner agent is building the report outline.
    Planning,
    /// Research/writing rounds are in progress.
    Running,
    /// Stopped by request; cannot resume without an explicit `resume`.
    Stopped,
    /// Paused between rounds; can be resumed.
    Paused,
    /// Finished successfully; `final_report` is populated.
    Completed,
    /// Terminated by an unrecoverable error; `error_info` is populated.
    Failed,
}

/// Known metadata fields captured about a mission's origin and settings,
/// plus a free-form bag for anything the Mission Controller does not yet
/// model explicitly.
///
/// The `chat_id`/`document_group_id`/`tool_selection` fields mirror the
/// shape of the originating chat-driven research tool this engine's
/// mission semantics were distilled from; they are optional because a
/// mission can originate outside any chat context (e.g. the CLI driver).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MissionMetadata {
    /// Identifier of the chat/conversation thread that spawned this
    /// mission, if any.
    pub chat_id: Option<String>,
    /// Identifier of the document corpus scoping retrieval for this
    /// mission, if any.
    pub document_group_id: Option<String>,
    /// Which tools the mission is permitted to dispatch (empty means all
    /// registered tools are available).
    pub tool_selection: Vec<String>,
    /// Final clarifying questions/answers captured before the writing
    /// phase. Canonical name per the resolved Open Question — see
    /// `SPEC_FULL.md` §9.
    pub final_questions: Option<String>,
    /// Anything else the caller attached to this mission.
    #[serde(default)]
    pub extra: HashMap<String, Value>,
}

/// A single research mission: a user request, its evolving plan, and its
/// terminal artifact (the final report).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mission {
    /// Opaque mission identifier.
    pub mission_id: MissionId,
    /// The natural-language request that initiated this mission.
    pub user_request: String,
    /// Unix-epoch seconds at creation.
    pub created_at: i64,
    /// Unix-epoch seconds of the last state change.
    pub updated_at: i64,
    /// Current lifecycle state.
    pub status: MissionStatus,
    /// Populated when `status == Failed`.
    pub error_info: Option<String>,
    /// Mission metadata (origin, settings, free-form extras).
    pub metadata: MissionMetadata,
    /// The report outline and remaining plan steps, once planned.
    pub plan: Option<Plan>,
    /// The synthesized long-form report, once completed.
    pub final_report: Option<String>,
}

impl Mission {
    /// Creates a new mission in `Pending` state.
    #[must_use]
    pub fn new(mission_id: MissionId, user_request: impl Into<String>, now: i64) -> Self {
        Self {
            mission_id,
            user_request: user_request.into(),
            created_at: now,
            updated_at: now,
            status: MissionStatus::Pending,
            error_info: None,
            metadata: MissionMetadata::default(),
            plan: None,
            final_report: None,
        }
    }

    /// Returns `true` if the mission has reached a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self.status, MissionStatus::Completed | MissionStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_mission_is_pending() {
        let m = Mission::new(MissionId::from("m1"), "survey quantum error correction", 1_700_000_000);
        assert_eq!(m.status, MissionStatus::Pending);
        assert!(!m.is_terminal());
        assert!(m.plan.is_none());
    }

    #[test]
    fn test_terminal_states() {
        let mut m = Mission::new(MissionId::from("m1"), "x", 0);
        m.status = MissionStatus::Completed;
        assert!(m.is_terminal());
        m.status = MissionStatus::Failed;
        assert!(m.is_terminal());
        m.status = MissionStatus::Running;
        assert!(!m.is_terminal());
    }

    #[test]
    fn test_metadata_extra_roundtrip() {
        let mut meta = MissionMetadata::default();
        meta.extra.insert("source".into(), Value::String("cli".into()));
        let json = serde_json::to_string(&meta).unwrap();
        let back: MissionMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back.extra.get("source").unwrap(), "cli");
    }
}

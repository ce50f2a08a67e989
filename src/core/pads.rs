//! Scratch state agents read and append to across a mission's rounds.

use serde::{Deserialize, Serialize};

/// Bound on `thought_pad`'s character length; older entries are dropped
/// from the front once exceeded so the pad stays a bounded window rather
/// than an ever-growing transcript.
pub const THOUGHT_PAD_MAX_CHARS: usize = 20_000;

/// Cross-round scratch state shared by the agents working a mission.
///
/// `goal_pad` and `agent_scratchpad` are free-form and agent-managed;
/// `thought_pad` is bounded so a long-running mission cannot grow it
/// without limit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pads {
    /// The mission's restated goal and any standing constraints, set
    /// once during planning and read by every subsequent agent call.
    pub goal_pad: String,
    /// Rolling log of inter-round reasoning (reflection summaries,
    /// outstanding questions). Bounded by [`THOUGHT_PAD_MAX_CHARS`].
    pub thought_pad: String,
    /// Free-form working memory for the currently dispatched agent.
    pub agent_scratchpad: String,
}

impl Pads {
    /// Appends `entry` to `thought_pad`, trimming the oldest content from
    /// the front if the result would exceed [`THOUGHT_PAD_MAX_CHARS`].
    pub fn push_thought(&mut self, entry: &str) {
        if !self.thought_pad.is_empty() {
            self.thought_pad.push('\n');
        }
        self.thought_pad.push_str(entry);
        if self.thought_pad.len() > THOUGHT_PAD_MAX_CHARS {
            let excess = self.thought_pad.len() - THOUGHT_PAD_MAX_CHARS;
            let cut = self.thought_pad
                .char_indices()
                .map(|(i, _)| i)
                .find(|&i| i >= excess)
                .unwrap_or(self.thought_pad.len());
            self.thought_pad.drain(..cut);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_thought_appends() {
        let mut pads = Pads::default();
        pads.push_thought("first");
        pads.push_thought("second");
        assert_eq!(pads.thought_pad, "first\nsecond");
    }

    #[test]
    fn test_push_thought_bounds_length() {
        let mut pads = Pads::default();
        pads.push_thought(&"a".repeat(THOUGHT_PAD_MAX_CHARS + 500));
        assert!(pads.thought_pad.len() <= THOUGHT_PAD_MAX_CHARS);
    }
}

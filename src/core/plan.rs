//! `Plan` — the report outline and remaining work items for a mission.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::ids::{SectionId, StepId};

/// One node of the report outline. Sections nest to form the final
/// report's table of contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    /// Identifier, unique within the owning `Plan`.
    pub section_id: SectionId,
    /// Section heading.
    pub title: String,
    /// One- or two-sentence description of what this section should
    /// cover, used to prompt the Researcher agent.
    pub description: String,
    /// Free-text guidance on how to research this section (query
    /// strategies, sources to favor).
    pub research_strategy: String,
    /// Nested subsections.
    #[serde(default)]
    pub subsections: Vec<Section>,
}

impl Section {
    /// Returns an iterator over this section and all of its descendants,
    /// depth-first.
    pub fn iter_all(&self) -> Box<dyn Iterator<Item = &Section> + '_> {
        Box::new(
            std::iter::once(self).chain(self.subsections.iter().flat_map(Section::iter_all)),
        )
    }
}

/// The action a `PlanStep` asks the Mission Controller to dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    /// Dispatch a Researcher agent against a target section.
    Research,
    /// Run a Reflection pass over accumulated notes.
    Reflect,
    /// Revise the report outline.
    Replan,
    /// Run the Writer agent to produce the final report.
    Write,
}

/// A unit of work in a mission's plan, consumed by the Mission Controller
/// phase loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    /// Identifier, unique within the owning `Plan`.
    pub step_id: StepId,
    /// Human-readable description shown in progress output.
    pub description: String,
    /// What kind of work this step performs.
    pub action_type: StepAction,
    /// The section this step researches or writes, if any (`Reflect` and
    /// `Replan` steps may target no single section).
    pub target_section_id: Option<SectionId>,
}

/// The mission's overall goal plus its report outline and step queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// The research goal as restated by the Planner agent.
    pub mission_goal: String,
    /// The report's table of contents.
    pub report_outline: Vec<Section>,
    /// Ordered queue of steps still to execute.
    pub steps: Vec<PlanStep>,
}

impl Plan {
    /// Checks the two structural invariants (P5): every `section_id` in
    /// `report_outline` is unique, and every `target_section_id` in
    /// `steps` resolves to a section in the outline.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for section in self.report_outline.iter().flat_map(Section::iter_all) {
            if !seen.insert(&section.section_id) {
                return Err(format!("duplicate section id: {}", section.section_id));
            }
        }
        for step in &self.steps {
            if let Some(target) = &step.target_section_id {
                if !seen.contains(target) {
                    return Err(format!(
                        "step {} targets unknown section {}",
                        step.step_id, target
                    ));
                }
            }
        }
        Ok(())
    }

    /// Returns all sections, flattened depth-first.
    pub fn all_sections(&self) -> impl Iterator<Item = &Section> + '_ {
        self.report_outline.iter().flat_map(Section::iter_all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(id: &str) -> Section {
        Section {
            section_id: SectionId::from(id),
            title: id.to_string(),
            description: String::new(),
            research_strategy: String::new(),
            subsections: Vec::new(),
        }
    }

    #[test]
    fn test_validate_accepts_well_formed_plan() {
        let plan = Plan {
            mission_goal: "g".into(),
            report_outline: vec![section("s1"), section("s2")],
            steps: vec![PlanStep {
                step_id: StepId(1),
                description: "research s1".into(),
                action_type: StepAction::Research,
                target_section_id: Some(SectionId::from("s1")),
            }],
        };
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicate_section_ids() {
        let plan = Plan {
            mission_goal: "g".into(),
            report_outline: vec![section("s1"), section("s1")],
            steps: vec![],
        };
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_dangling_step_target() {
        let plan = Plan {
            mission_goal: "g".into(),
            report_outline: vec![section("s1")],
            steps: vec![PlanStep {
                step_id: StepId(1),
                description: "research ghost".into(),
                action_type: StepAction::Research,
                target_section_id: Some(SectionId::from("ghost")),
            }],
        };
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_nested_sections_are_counted() {
        let mut parent = section("parent");
        parent.subsections.push(section("child"));
        let plan = Plan {
            mission_goal: "g".into(),
            report_outline: vec![parent],
            steps: vec![],
        };
        assert_eq!(plan.all_sections().count(), 2);
    }
}

//! Query Strategist — chooses which query-expansion techniques to apply.

use serde::{Deserialize, Serialize};

/// A query-expansion technique the Query Preparer can materialize into a
/// prepared query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Technique {
    /// The original query, verbatim. Always included.
    Identity,
    /// Decompose the query into narrower sub-queries.
    SubQuery,
    /// Generalize the query to a broader "step back" question.
    StepBack,
    /// Hypothetical Document Embeddings: draft a plausible answer and
    /// search for passages resembling it.
    Hyde,
}

/// Context hints used to pick techniques beyond `identity`.
#[derive(Debug, Clone, Default)]
pub struct StrategyContext<'a> {
    /// Free-text description of what the current research round is
    /// trying to establish (e.g. a section's `research_strategy`).
    pub research_context: Option<&'a str>,
    /// Free-text description of the calling agent's immediate goal
    /// (e.g. "resolve a conflicting claim between two sources").
    pub agent_context: Option<&'a str>,
}

/// Selects query-expansion techniques for a retrieval call.
///
/// Complete failure to select techniques degrades to `identity` only
/// (§4.3 Failure), which the caller achieves simply by using
/// [`default_techniques`] rather than treating this as an error path.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryStrategist;

impl QueryStrategist {
    /// Creates a new strategist.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Returns the techniques to apply for a given context.
    ///
    /// `identity` is always included. `sub_query` is added when research
    /// context is present (a section is being actively researched and
    /// benefits from decomposition); `step_back` is added when the agent
    /// context suggests the query is narrow or conflict-resolution
    /// focused; `hyde` is added when no research context is available at
    /// all, since a bare query benefits most from a hypothetical-answer
    /// expansion.
    #[must_use]
    pub fn select(&self, ctx: &StrategyContext<'_>) -> Vec<Technique> {
        let mut techniques = vec![Technique::Identity];

        if ctx.research_context.is_some() {
            techniques.push(Technique::SubQuery);
        }
        if ctx
            .agent_context
            .is_some_and(|s| s.to_lowercase().contains("conflict") || s.len() < 40)
        {
            techniques.push(Technique::StepBack);
        }
        if ctx.research_context.is_none() && ctx.agent_context.is_none() {
            techniques.push(Technique::Hyde);
        }

        techniques
    }
}

/// The technique set used when strategy selection is unavailable or
/// fails entirely (§4.3 Failure: "complete strategist/preparer failure
/// degrades to identity with no enhancement").
#[must_use]
pub fn default_techniques() -> Vec<Technique> {
    vec![Technique::Identity]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_always_present() {
        let strategist = QueryStrategist::new();
        let techniques = strategist.select(&StrategyContext::default());
        assert!(techniques.contains(&Technique::Identity));
    }

    #[test]
    fn test_research_context_adds_sub_query() {
        let strategist = QueryStrategist::new();
        let ctx = StrategyContext {
            research_context: Some("survey recent benchmarks"),
            agent_context: None,
        };
        assert!(strategist.select(&ctx).contains(&Technique::SubQuery));
    }

    #[test]
    fn test_bare_query_adds_hyde() {
        let strategist = QueryStrategist::new();
        let techniques = strategist.select(&StrategyContext::default());
        assert!(techniques.contains(&Technique::Hyde));
    }

    #[test]
    fn test_default_techniques_is_identity_only() {
        assert_eq!(default_techniques(), vec![Technique::Identity]);
    }
}

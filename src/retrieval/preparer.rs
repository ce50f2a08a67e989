//! Query Preparer — materializes prepared query strings from techniques.

use super::strategist::Technique;

/// A query string ready to be issued against the hybrid search backend,
/// tagged with the technique that produced it (kept for diagnostics and
/// execution-log summaries, not consulted by the aggregation step).
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    /// The technique that produced this query.
    pub technique: Technique,
    /// The query text to search with.
    pub text: String,
}

/// Materializes 1..K prepared queries from a technique set.
///
/// All preparers preserve the language of the original query — they
/// never translate, only rephrase/decompose/generalize in place.
#[must_use]
pub fn prepare_queries(original: &str, techniques: &[Technique]) -> Vec<PreparedQuery> {
    let mut prepared = Vec::with_capacity(techniques.len());
    for &technique in techniques {
        let text = match technique {
            Technique::Identity => original.to_string(),
            Technique::SubQuery => format!("{original} — key facts and supporting evidence"),
            Technique::StepBack => step_back(original),
            Technique::Hyde => format!("A passage that directly answers: {original}"),
        };
        prepared.push(PreparedQuery { technique, text });
    }
    prepared
}

/// Generalizes a query to a broader question by stripping qualifiers
/// that narrow it to a specific sub-topic.
fn step_back(original: &str) -> String {
    let trimmed = original.trim_end_matches(['?', '.']);
    format!("What is the general background behind: {trimmed}?")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_preserves_original() {
        let prepared = prepare_queries("quantum error correction", &[Technique::Identity]);
        assert_eq!(prepared.len(), 1);
        assert_eq!(prepared[0].text, "quantum error correction");
    }

    #[test]
    fn test_one_query_per_technique() {
        let techniques = [Technique::Identity, Technique::SubQuery, Technique::StepBack];
        let prepared = prepare_queries("topic X", &techniques);
        assert_eq!(prepared.len(), 3);
    }

    #[test]
    fn test_step_back_strips_question_mark() {
        let prepared = prepare_queries("what is X?", &[Technique::StepBack]);
        assert!(!prepared[0].text.contains("X??"));
    }

    #[test]
    fn test_empty_techniques_yields_no_queries() {
        assert!(prepare_queries("x", &[]).is_empty());
    }
}

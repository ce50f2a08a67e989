//! Settings Resolver (§4.7, component J): resolves any research
//! parameter by the chain mission-specific → user → global default, so a
//! mid-flight change to user settings never retroactively changes a
//! mission already running with its own captured snapshot.
//!
//! Grounded in the same builder + environment-variable resolution
//! pattern `agent::config::DispatcherConfigBuilder` uses for dispatcher
//! settings, generalized from a single env-seeded tier to the spec's
//! three-level mission→user→default chain.

use serde::{Deserialize, Serialize};

/// Effective research parameters for one mission, after resolution.
/// Every field here is required — [`ResearchParamsOverride`] is the
/// partial counterpart used at the mission/user layers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResearchParams {
    /// Per-mission LLM concurrency permits (§4.2).
    pub max_concurrent_requests: usize,
    /// Document searches per question during initial exploration.
    pub initial_exploration_doc_results: usize,
    /// Web searches per question during initial exploration.
    pub initial_exploration_web_results: usize,
    /// Number of structured research rounds across the whole outline.
    pub structured_research_rounds: u32,
    /// Maximum research cycles run per leaf section, per round.
    pub max_research_cycles_per_section: u32,
    /// Minimum notes a section must receive during note assignment.
    pub min_notes_per_section_assignment: usize,
    /// Maximum notes a section may receive during note assignment.
    pub max_notes_per_section_assignment: usize,
    /// Number of writing passes over the outline.
    pub writing_passes: u32,
    /// Character budget for the prior pass's content shown to the
    /// Writer agent on subsequent passes.
    pub writing_previous_content_preview_chars: usize,
    /// Whether the inter-round Reflection/replan call runs before the
    /// final writing pass (Open Question, §9: decided as an explicit
    /// boolean).
    pub skip_final_replanning: bool,
    /// Whether retrieval results are reranked.
    pub use_reranker: bool,
    /// Dense-score weight in hybrid retrieval fusion.
    pub dense_weight: f64,
    /// Sparse-score weight in hybrid retrieval fusion.
    pub sparse_weight: f64,
    /// Chunks requested per retrieval call.
    pub retrieval_n_results: usize,
    /// Whether the Auto-Optimizer runs once at mission start.
    pub auto_optimize: bool,
}

impl Default for ResearchParams {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 10,
            initial_exploration_doc_results: 5,
            initial_exploration_web_results: 3,
            structured_research_rounds: 2,
            max_research_cycles_per_section: 3,
            min_notes_per_section_assignment: 1,
            max_notes_per_section_assignment: 20,
            writing_passes: 1,
            writing_previous_content_preview_chars: 2_000,
            skip_final_replanning: false,
            use_reranker: false,
            dense_weight: 1.0,
            sparse_weight: 1.0,
            retrieval_n_results: 8,
            auto_optimize: false,
        }
    }
}

/// A partial set of research-parameter overrides: every field is
/// optional, representing "unset at this layer". Used for a mission's
/// own settings, a user's settings, and the Auto-Optimizer's output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchParamsOverride {
    /// See [`ResearchParams::max_concurrent_requests`].
    pub max_concurrent_requests: Option<usize>,
    /// See [`ResearchParams::initial_exploration_doc_results`].
    pub initial_exploration_doc_results: Option<usize>,
    /// See [`ResearchParams::initial_exploration_web_results`].
    pub initial_exploration_web_results: Option<usize>,
    /// See [`ResearchParams::structured_research_rounds`].
    pub structured_research_rounds: Option<u32>,
    /// See [`ResearchParams::max_research_cycles_per_section`].
    pub max_research_cycles_per_section: Option<u32>,
    /// See [`ResearchParams::min_notes_per_section_assignment`].
    pub min_notes_per_section_assignment: Option<usize>,
    /// See [`ResearchParams::max_notes_per_section_assignment`].
    pub max_notes_per_section_assignment: Option<usize>,
    /// See [`ResearchParams::writing_passes`].
    pub writing_passes: Option<u32>,
    /// See [`ResearchParams::writing_previous_content_preview_chars`].
    pub writing_previous_content_preview_chars: Option<usize>,
    /// See [`ResearchParams::skip_final_replanning`].
    pub skip_final_replanning: Option<bool>,
    /// See [`ResearchParams::use_reranker`].
    pub use_reranker: Option<bool>,
    /// See [`ResearchParams::dense_weight`].
    pub dense_weight: Option<f64>,
    /// See [`ResearchParams::sparse_weight`].
    pub sparse_weight: Option<f64>,
    /// See [`ResearchParams::retrieval_n_results`].
    pub retrieval_n_results: Option<usize>,
    /// See [`ResearchParams::auto_optimize`].
    pub auto_optimize: Option<bool>,
}

impl ResearchParamsOverride {
    /// Returns `true` if every field is unset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let Self {
            max_concurrent_requests,
            initial_exploration_doc_results,
            initial_exploration_web_results,
            structured_research_rounds,
            max_research_cycles_per_section,
            min_notes_per_section_assignment,
            max_notes_per_section_assignment,
            writing_passes,
            writing_previous_content_preview_chars,
            skip_final_replanning,
            use_reranker,
            dense_weight,
            sparse_weight,
            retrieval_n_results,
            auto_optimize,
        } = self;
        max_concurrent_requests.is_none()
            && initial_exploration_doc_results.is_none()
            && initial_exploration_web_results.is_none()
            && structured_research_rounds.is_none()
            && max_research_cycles_per_section.is_none()
            && min_notes_per_section_assignment.is_none()
            && max_notes_per_section_assignment.is_none()
            && writing_passes.is_none()
            && writing_previous_content_preview_chars.is_none()
            && skip_final_replanning.is_none()
            && use_reranker.is_none()
            && dense_weight.is_none()
            && sparse_weight.is_none()
            && retrieval_n_results.is_none()
            && auto_optimize.is_none()
    }
}

/// Resolves effective [`ResearchParams`] from the mission → user →
/// default chain (§4.7). Stateless: every call is given the three
/// layers explicitly, so a mid-flight change to user settings is only
/// ever read at the next resolution a caller performs, never forced
/// onto an in-flight mission that captured its own snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct SettingsResolver;

impl SettingsResolver {
    /// Resolves one effective parameter set from three layers, taking
    /// the first non-null value per field in `mission → user → default`
    /// order.
    #[must_use]
    pub fn resolve(
        mission: &ResearchParamsOverride,
        user: &ResearchParamsOverride,
        default: &ResearchParams,
    ) -> ResearchParams {
        ResearchParams {
            max_concurrent_requests: mission
                .max_concurrent_requests
                .or(user.max_concurrent_requests)
                .unwrap_or(default.max_concurrent_requests),
            initial_exploration_doc_results: mission
                .initial_exploration_doc_results
                .or(user.initial_exploration_doc_results)
                .unwrap_or(default.initial_exploration_doc_results),
            initial_exploration_web_results: mission
                .initial_exploration_web_results
                .or(user.initial_exploration_web_results)
                .unwrap_or(default.initial_exploration_web_results),
            structured_research_rounds: mission
                .structured_research_rounds
                .or(user.structured_research_rounds)
                .unwrap_or(default.structured_research_rounds),
            max_research_cycles_per_section: mission
                .max_research_cycles_per_section
                .or(user.max_research_cycles_per_section)
                .unwrap_or(default.max_research_cycles_per_section),
            min_notes_per_section_assignment: mission
                .min_notes_per_section_assignment
                .or(user.min_notes_per_section_assignment)
                .unwrap_or(default.min_notes_per_section_assignment),
            max_notes_per_section_assignment: mission
                .max_notes_per_section_assignment
                .or(user.max_notes_per_section_assignment)
                .unwrap_or(default.max_notes_per_section_assignment),
            writing_passes: mission
                .writing_passes
                .or(user.writing_passes)
                .unwrap_or(default.writing_passes),
            writing_previous_content_preview_chars: mission
                .writing_previous_content_preview_chars
                .or(user.writing_previous_content_preview_chars)
                .unwrap_or(default.writing_previous_content_preview_chars),
            skip_final_replanning: mission
                .skip_final_replanning
                .or(user.skip_final_replanning)
                .unwrap_or(default.skip_final_replanning),
            use_reranker: mission
                .use_reranker
                .or(user.use_reranker)
                .unwrap_or(default.use_reranker),
            dense_weight: mission.dense_weight.or(user.dense_weight).unwrap_or(default.dense_weight),
            sparse_weight: mission
                .sparse_weight
                .or(user.sparse_weight)
                .unwrap_or(default.sparse_weight),
            retrieval_n_results: mission
                .retrieval_n_results
                .or(user.retrieval_n_results)
                .unwrap_or(default.retrieval_n_results),
            auto_optimize: mission
                .auto_optimize
                .or(user.auto_optimize)
                .unwrap_or(default.auto_optimize),
        }
    }
}

//! Mission Controller (§4.1): drives a mission from a user request to a
//! cited report, mediating between the Context Store, Agent Units, the
//! Tool Suite, the Model Dispatcher, and the Progress Bus.
//!
//! Grounded in `agent::orchestrator::Orchestrator::query`'s phase
//! pipeline (question confirmation → exploration → planning → research
//! → writing → finalization) and its per-batch `Semaphore`-bounded
//! `tokio::spawn` fan-out, generalized from a single-pass RAG query to
//! the mission's multi-round structured research loop. `run_mission` is
//! written to be safely re-entered: rather than persisting an explicit
//! "current phase" pointer, each phase is skipped once its output
//! already exists on the mission (a plan, a set of rounds' worth of
//! notes), which is what makes `resume` a plain re-call into the same
//! function.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::agent::note_assigner::NoteAssignment;
use crate::agent::{
    Agent, AgentContext, ControllerView, DispatcherConfig, DispatcherRegistry, LlmProvider,
    Messenger, MessengerInput, MessengerOutput, ModelDispatcher, NoteAssigner, NoteAssignerInput,
    Planner, PlannerInput, PromptSet, Reflection, ReflectionInput, Researcher, ResearcherInput,
    Writer, WriterInput,
};
use crate::core::{
    ExecutionLogEntry, LogId, LogStatus, Mission, MissionId, MissionMetadata, MissionStatus, Note,
    NoteId, Plan, Section, SectionId, UsageRecord,
};
use crate::error::{AgentError, Error, MissionError, Result, StorageError};
use crate::progress::{Event, ProgressBus, ProgressHandle};
use crate::storage::{SharedStorage, Storage, UsageTotals};
use crate::tools::ToolRegistry;

use super::dispatch::CancellationToken;
use super::optimizer::AutoOptimizer;
use super::settings::{ResearchParams, ResearchParamsOverride, SettingsResolver};

/// How many notes a single Note-Assigner dispatch judges at once.
const NOTE_ASSIGNMENT_BATCH_SIZE: usize = 25;
/// Grace period the Progress Bus stays open after a mission reaches a
/// terminal status, so a subscriber mid-`recv` sees the closing events.
const CLOSE_GRACE_SECS: u64 = 2;

/// Per-call context threaded through every Controller operation in place
/// of the thread-local "current user" the distilled spec calls out as
/// global mutable state (§9 Design Notes).
#[derive(Debug, Clone)]
pub struct UserContext {
    /// Opaque key isolating this user's model-dispatch semaphore from
    /// other users' (§5).
    pub user_id: String,
    /// This user's own settings layer, read at `start` (§4.7).
    pub settings: ResearchParamsOverride,
}

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.chars().take(max_chars).collect()
}

fn mission_not_found(mission_id: &str) -> Error {
    StorageError::MissionNotFound {
        mission_id: mission_id.to_string(),
    }
    .into()
}

fn invalid_transition(mission_id: &str, status: MissionStatus, operation: &str) -> Error {
    MissionError::InvalidTransition {
        mission_id: mission_id.to_string(),
        status: format!("{status:?}").to_lowercase(),
        operation: operation.to_string(),
    }
    .into()
}

/// Runs `agent.run` once, retrying a single time on failure before
/// surfacing the error (§7: "agent errors... retried at most once").
async fn run_agent_with_retry<A>(
    agent: &A,
    view: &ControllerView,
    input: A::Input,
) -> std::result::Result<(A::Output, UsageRecord), AgentError>
where
    A: Agent,
    A::Input: Clone,
{
    match agent.run(view, input.clone()).await {
        Ok(out) => Ok(out),
        Err(_first) => agent.run(view, input).await,
    }
}

fn flatten_leaf_sections(plan: &Plan) -> Vec<Section> {
    plan.all_sections()
        .filter(|s| s.subsections.is_empty())
        .cloned()
        .collect()
}

fn default_plan(user_request: &str) -> Plan {
    let sections = vec![
        Section {
            section_id: SectionId::from("overview"),
            title: "Overview".to_string(),
            description: format!("General background on: {user_request}"),
            research_strategy: "Broad background search across available sources.".to_string(),
            subsections: Vec::new(),
        },
        Section {
            section_id: SectionId::from("key-findings"),
            title: "Key Findings".to_string(),
            description: "The most important findings relevant to the request.".to_string(),
            research_strategy: "Targeted search on the request's specific claims.".to_string(),
            subsections: Vec::new(),
        },
        Section {
            section_id: SectionId::from("conclusion"),
            title: "Conclusion".to_string(),
            description: "Synthesis and implications of the findings above.".to_string(),
            research_strategy: "Draw on notes already gathered; no new searches needed."
                .to_string(),
            subsections: Vec::new(),
        },
    ];
    Plan {
        mission_goal: user_request.to_string(),
        report_outline: sections,
        steps: Vec::new(),
    }
}

fn render_section(section: &Section, depth: usize, content: &HashMap<String, String>) -> String {
    let heading = "#".repeat((depth + 1).min(6));
    let mut out = format!("{heading} {}\n\n", section.title);
    if section.subsections.is_empty() {
        if let Some(body) = content.get(section.section_id.as_str()) {
            out.push_str(body);
            out.push('\n');
        }
    } else {
        for child in &section.subsections {
            out.push_str(&render_section(child, depth + 1, content));
        }
    }
    out
}

fn render_report(plan: &Plan, content: &HashMap<String, String>) -> String {
    let mut out = format!("# {}\n\n", plan.mission_goal);
    for section in &plan.report_outline {
        out.push_str(&render_section(section, 1, content));
        out.push('\n');
    }
    out
}

/// The Mission Controller: the single coordination point between the
/// Context Store, Agent Units, the Tool Suite, the Model Dispatcher, and
/// the Progress Bus.
///
/// Cheap to clone (every field is `Arc`-backed or itself cloneable),
/// which is what lets `start` hand a clone into a spawned background
/// task while keeping the original handle usable for `stop`/`resume`.
#[derive(Clone)]
pub struct MissionController {
    storage: SharedStorage,
    progress: ProgressBus,
    provider: Arc<dyn LlmProvider>,
    dispatcher_template: DispatcherConfig,
    dispatchers: Arc<Mutex<DispatcherRegistry>>,
    tools: Arc<ToolRegistry>,
    prompts: Arc<PromptSet>,
    cancellations: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl MissionController {
    /// Creates a controller over `storage`, publishing to `progress`,
    /// dispatching LLM calls through `provider` using `dispatcher_template`
    /// as the per-tier/timeout/retry baseline for every user's dispatcher,
    /// and offering `tools` to every agent unit's `ControllerView`.
    #[must_use]
    pub fn new(
        storage: SharedStorage,
        progress: ProgressBus,
        provider: Arc<dyn LlmProvider>,
        dispatcher_template: DispatcherConfig,
        tools: Arc<ToolRegistry>,
        prompts: PromptSet,
    ) -> Self {
        Self {
            storage,
            progress,
            provider,
            dispatcher_template,
            dispatchers: Arc::new(Mutex::new(DispatcherRegistry::new())),
            tools,
            prompts: Arc::new(prompts),
            cancellations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn storage_mut(&self) -> SharedStorage {
        self.storage.clone()
    }

    fn dispatcher_for_user(&self, user_id: &str) -> Arc<ModelDispatcher> {
        self.dispatchers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get_or_insert_with(user_id, self.provider.clone(), self.dispatcher_template.clone())
    }

    fn progress_handle(&self, mission_id: &MissionId) -> ProgressHandle {
        ProgressHandle::new(self.progress.clone(), mission_id.to_string())
    }

    fn next_log_id(&self, mission_id: &str) -> Result<LogId> {
        let existing = self.storage.list_log_entries(mission_id, 0, usize::MAX)?;
        let max = existing.iter().map(|e| e.log_id.get()).max().unwrap_or(0);
        Ok(LogId(max + 1))
    }

    fn next_note_id(&self, mission_id: &str) -> Result<NoteId> {
        let existing = self.storage.list_notes(mission_id)?;
        let max = existing.iter().map(|n| n.note_id.get()).max().unwrap_or(0);
        Ok(NoteId(max + 1))
    }

    async fn log(
        &self,
        mission_id: &MissionId,
        round: Option<u32>,
        entry: ExecutionLogEntry,
    ) -> Result<()> {
        self.storage_mut()
            .append_log_entry(mission_id.as_str(), &entry, round)?;
        let _ = self
            .progress
            .publish(mission_id.as_str(), Event::Update { entry: Some(entry) })
            .await;
        Ok(())
    }

    async fn log_success(
        &self,
        mission_id: &MissionId,
        round: Option<u32>,
        agent_name: &str,
        action: &str,
        input_summary: &str,
        output_summary: &str,
    ) -> Result<()> {
        let log_id = self.next_log_id(mission_id.as_str())?;
        let entry = ExecutionLogEntry::success(
            log_id,
            now(),
            agent_name,
            action,
            truncate_chars(input_summary, 500),
            truncate_chars(output_summary, 500),
        );
        self.log(mission_id, round, entry).await
    }

    async fn log_warning(
        &self,
        mission_id: &MissionId,
        round: Option<u32>,
        agent_name: &str,
        action: &str,
        message: &str,
    ) -> Result<()> {
        let log_id = self.next_log_id(mission_id.as_str())?;
        let mut entry = ExecutionLogEntry::success(log_id, now(), agent_name, action, "", message);
        entry.status = LogStatus::Warning;
        entry.error_message = Some(message.to_string());
        self.log(mission_id, round, entry).await
    }

    async fn log_failure(
        &self,
        mission_id: &MissionId,
        round: Option<u32>,
        agent_name: &str,
        action: &str,
        message: &str,
    ) -> Result<()> {
        let log_id = self.next_log_id(mission_id.as_str())?;
        let entry = ExecutionLogEntry::failure(log_id, now(), agent_name, action, message);
        self.log(mission_id, round, entry).await
    }

    async fn persist_usage(&self, mission_id: &MissionId, usage: &UsageRecord) -> Result<UsageTotals> {
        let totals = self.storage_mut().accumulate_usage(mission_id.as_str(), usage, false)?;
        let _ = self
            .progress
            .publish(
                mission_id.as_str(),
                Event::StatsUpdate {
                    totals: totals.clone(),
                    incremental: true,
                },
            )
            .await;
        Ok(totals)
    }

    fn view(
        &self,
        mission_id: &MissionId,
        dispatcher: Arc<ModelDispatcher>,
        tool_selection: &[String],
        context: AgentContext,
    ) -> ControllerView {
        ControllerView::new(
            mission_id.clone(),
            dispatcher,
            self.tools.clone(),
            tool_selection.to_vec(),
            self.progress_handle(mission_id),
            context,
        )
    }

    /// Subscribes a caller to `mission_id`'s Progress Bus stream.
    pub async fn subscribe(&self, mission_id: &MissionId) -> crate::progress::Subscription {
        self.progress.subscribe(mission_id.as_str()).await
    }

    /// Returns the current mission record.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::MissionNotFound`] if no such mission exists.
    pub fn get_mission(&self, mission_id: &MissionId) -> Result<Mission> {
        self.storage
            .get_mission(mission_id.as_str())?
            .ok_or_else(|| mission_not_found(mission_id.as_str()))
    }

    /// Returns a page of the mission's execution log.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub fn get_logs(&self, mission_id: &MissionId, offset: usize, limit: usize) -> Result<Vec<ExecutionLogEntry>> {
        self.storage.list_log_entries(mission_id.as_str(), offset, limit)
    }

    /// Returns every note gathered so far.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub fn get_notes(&self, mission_id: &MissionId) -> Result<Vec<Note>> {
        self.storage.list_notes(mission_id.as_str())
    }

    /// Returns accumulated usage totals.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub fn get_usage(&self, mission_id: &MissionId) -> Result<UsageTotals> {
        self.storage.get_usage_totals(mission_id.as_str())
    }

    /// Returns the mission's goal/thought/scratch pads.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub fn get_pads(&self, mission_id: &MissionId) -> Result<crate::core::Pads> {
        Ok(self.storage.get_pads(mission_id.as_str())?.unwrap_or_default())
    }

    /// Overwrites the mission's final report directly (the `update
    /// report` external interface, §6). Does not re-run any phase.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::MissionNotFound`] if no such mission
    /// exists.
    pub fn update_report(&self, mission_id: &MissionId, content: impl Into<String>) -> Result<()> {
        let mut mission = self.get_mission(mission_id)?;
        mission.final_report = Some(content.into());
        mission.updated_at = now();
        self.storage_mut().save_mission(&mission)
    }

    /// Creates a new mission in `pending` state, capturing a settings
    /// snapshot into its metadata (§4.1, operation 1).
    ///
    /// # Errors
    ///
    /// Returns [`MissionError::NoToolsEnabled`] if neither `use_web` nor
    /// `document_group` is set (boundary behavior B1).
    pub fn create_mission(
        &self,
        mission_id: MissionId,
        user_request: impl Into<String>,
        chat_id: Option<String>,
        use_web: bool,
        document_group: Option<String>,
        mission_settings: ResearchParamsOverride,
    ) -> Result<MissionId> {
        if !use_web && document_group.is_none() {
            return Err(MissionError::NoToolsEnabled.into());
        }

        let mut tool_selection = Vec::new();
        if use_web {
            tool_selection.push("web_search".to_string());
            tool_selection.push("web_fetch".to_string());
        }
        if document_group.is_some() {
            tool_selection.push("document_search".to_string());
        }
        tool_selection.push("file_reader".to_string());
        tool_selection.push("calculator".to_string());

        let mut mission = Mission::new(mission_id.clone(), user_request, now());
        mission.metadata = MissionMetadata {
            chat_id,
            document_group_id: document_group,
            tool_selection,
            final_questions: None,
            extra: HashMap::new(),
        };
        if !mission_settings.is_empty() {
            mission.metadata.extra.insert(
                "mission_settings_override".to_string(),
                serde_json::to_value(&mission_settings).unwrap_or(Value::Null),
            );
        }

        self.storage_mut().create_mission(&mission)?;
        Ok(mission_id)
    }

    /// Starts (or resumes-in-place, if already `pending`) a mission in a
    /// spawned background task, returning immediately with a join handle
    /// the caller may await or drop (§4.1, operation 2).
    ///
    /// # Errors
    ///
    /// Returns [`MissionError::InvalidTransition`] if the mission is
    /// already terminal.
    pub async fn start(
        &self,
        mission_id: &MissionId,
        user_context: UserContext,
    ) -> Result<tokio::task::JoinHandle<Result<()>>> {
        let mut mission = self.get_mission(mission_id)?;

        if mission.status == MissionStatus::Running {
            return Ok(tokio::spawn(async { Ok(()) }));
        }
        if mission.is_terminal() {
            return Err(invalid_transition(mission_id.as_str(), mission.status, "start"));
        }

        let mission_override: ResearchParamsOverride = mission
            .metadata
            .extra
            .get("mission_settings_override")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        let mut resolved = SettingsResolver::resolve(
            &mission_override,
            &user_context.settings,
            &ResearchParams::default(),
        );

        let dispatcher = self.dispatcher_for_user(&user_context.user_id);

        if resolved.auto_optimize {
            if let Ok((overrides, usage)) =
                AutoOptimizer::propose(&dispatcher, &mission.user_request).await
            {
                resolved = SettingsResolver::resolve(&overrides, &ResearchParamsOverride::default(), &resolved);
                let _ = self.persist_usage(mission_id, &usage).await;
            }
        }

        mission
            .metadata
            .extra
            .insert("research_params".to_string(), serde_json::to_value(resolved).unwrap_or(Value::Null));
        mission.updated_at = now();
        self.storage_mut().save_mission(&mission)?;

        let cancel = CancellationToken::new();
        self.cancellations
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(mission_id.to_string(), cancel.clone());

        let controller = self.clone();
        let tool_selection = mission.metadata.tool_selection.clone();
        let mission_id = mission_id.clone();

        let handle = tokio::spawn(async move {
            let result = controller
                .run_mission(&mission_id, dispatcher, tool_selection, resolved, cancel)
                .await;
            controller
                .cancellations
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .remove(mission_id.as_str());
            result
        });

        Ok(handle)
    }

    /// Cooperatively cancels a running mission. Idempotent: calling
    /// `stop` on a mission with no live cancellation token (never
    /// started, or already terminal) is a no-op that returns success
    /// (boundary behavior B2).
    pub fn stop(&self, mission_id: &MissionId) {
        if let Some(token) = self
            .cancellations
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(mission_id.as_str())
        {
            token.cancel();
        }
    }

    /// Resumes a mission from `{stopped, paused, failed}`, re-entering
    /// `run_mission` which picks up wherever the persisted plan/notes
    /// left off (§4.1, operation 5).
    ///
    /// # Errors
    ///
    /// Returns [`MissionError::InvalidTransition`] if the mission is not
    /// in a resumable state.
    pub async fn resume(
        &self,
        mission_id: &MissionId,
        user_context: UserContext,
    ) -> Result<tokio::task::JoinHandle<Result<()>>> {
        let mission = self.get_mission(mission_id)?;
        if !matches!(
            mission.status,
            MissionStatus::Stopped | MissionStatus::Paused | MissionStatus::Failed
        ) {
            return Err(invalid_transition(mission_id.as_str(), mission.status, "resume"));
        }
        self.start(mission_id, user_context).await
    }

    /// Resumes a mission after discarding every note/log strictly after
    /// round `round_num - 1` (§4.1, operation 6; invariant P6).
    ///
    /// # Errors
    ///
    /// Returns [`MissionError::InvalidResumeRound`] if `round_num == 0`
    /// (boundary behavior B3).
    pub async fn resume_from_round(
        &self,
        mission_id: &MissionId,
        round_num: u32,
        user_context: UserContext,
    ) -> Result<tokio::task::JoinHandle<Result<()>>> {
        if round_num == 0 {
            return Err(MissionError::InvalidResumeRound.into());
        }

        let _ = self
            .progress
            .publish(
                mission_id.as_str(),
                Event::TruncateData {
                    after_round: round_num - 1,
                },
            )
            .await;
        self.storage_mut()
            .truncate_after_round(mission_id.as_str(), round_num - 1)?;

        self.resume(mission_id, user_context).await
    }

    /// Revises the outline from `feedback` (or applies `outline_override`
    /// directly), persists it, then behaves like `resume_from_round`
    /// (§4.1, operation 7).
    ///
    /// # Errors
    ///
    /// Propagates [`AgentError`] if the Planner call fails, or whatever
    /// [`resume_from_round`](Self::resume_from_round) returns.
    pub async fn revise_outline_and_resume(
        &self,
        mission_id: &MissionId,
        round_num: u32,
        feedback: String,
        outline_override: Option<Vec<Section>>,
        user_context: UserContext,
    ) -> Result<tokio::task::JoinHandle<Result<()>>> {
        let mut mission = self.get_mission(mission_id)?;
        let mut plan = mission.plan.clone().unwrap_or_else(|| default_plan(&mission.user_request));

        let new_outline = if let Some(outline) = outline_override {
            outline
        } else {
            let dispatcher = self.dispatcher_for_user(&user_context.user_id);
            let view = self.view(
                mission_id,
                dispatcher,
                &mission.metadata.tool_selection,
                AgentContext {
                    plan: Some(plan.clone()),
                    pads: self.storage.get_pads(mission_id.as_str())?.unwrap_or_default(),
                    notes: self.storage.list_notes(mission_id.as_str())?,
                },
            );
            let planner = Planner::new(self.prompts.planner.clone());
            let (output, usage) = run_agent_with_retry(
                &planner,
                &view,
                PlannerInput {
                    user_request: mission.user_request.clone(),
                    final_questions: mission.metadata.final_questions.clone(),
                    feedback: Some(feedback),
                    prior_outline: Some(plan.report_outline.clone()),
                },
            )
            .await?;
            let _ = self.persist_usage(mission_id, &usage).await;
            output.plan.report_outline
        };

        plan.report_outline = new_outline;
        mission.plan = Some(plan);
        mission.updated_at = now();
        self.storage_mut().save_mission(&mission)?;

        self.resume_from_round(mission_id, round_num, user_context).await
    }

    /// The phase loop (§4.1): question confirmation, initial exploration,
    /// outline generation, structured research rounds, note assignment,
    /// writing passes, finalization. Safe to re-enter: each phase is
    /// skipped once its persisted output already exists.
    async fn run_mission(
        &self,
        mission_id: &MissionId,
        dispatcher: Arc<ModelDispatcher>,
        tool_selection: Vec<String>,
        params: ResearchParams,
        cancel: CancellationToken,
    ) -> Result<()> {
        match self
            .run_mission_inner(mission_id, &dispatcher, &tool_selection, &params, &cancel)
            .await
        {
            Ok(()) => Ok(()),
            Err(Error::Mission(MissionError::Cancelled { .. })) => {
                let mut mission = self.get_mission(mission_id)?;
                mission.status = MissionStatus::Stopped;
                mission.updated_at = now();
                self.storage_mut().save_mission(&mission)?;
                let _ = self
                    .progress
                    .publish(mission_id.as_str(), Event::Status { status: mission.status })
                    .await;
                Ok(())
            }
            Err(err) => {
                let mut mission = self.get_mission(mission_id)?;
                mission.status = MissionStatus::Failed;
                mission.error_info = Some(err.to_string());
                mission.updated_at = now();
                self.storage_mut().save_mission(&mission)?;
                let _ = self
                    .progress
                    .publish(mission_id.as_str(), Event::Status { status: mission.status })
                    .await;
                self.log_failure(mission_id, None, "controller", "run_mission", &err.to_string())
                    .await?;
                Err(err)
            }
        }
    }

    async fn run_mission_inner(
        &self,
        mission_id: &MissionId,
        dispatcher: &Arc<ModelDispatcher>,
        tool_selection: &[String],
        params: &ResearchParams,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut mission = self.get_mission(mission_id)?;
        mission.status = MissionStatus::Running;
        mission.updated_at = now();
        self.storage_mut().save_mission(&mission)?;
        let _ = self
            .progress
            .publish(mission_id.as_str(), Event::Status { status: mission.status })
            .await;

        cancel.check(mission_id)?;

        // Phase 1: question confirmation.
        if mission.metadata.final_questions.is_none() {
            let pads = self.storage.get_pads(mission_id.as_str())?.unwrap_or_default();
            let view = self.view(
                mission_id,
                dispatcher.clone(),
                tool_selection,
                AgentContext {
                    plan: None,
                    pads,
                    notes: Vec::new(),
                },
            );
            let messenger = Messenger::new(self.prompts.messenger.clone());
            let result = run_agent_with_retry(
                &messenger,
                &view,
                MessengerInput::GenerateQuestions {
                    user_request: mission.user_request.clone(),
                },
            )
            .await;

            match result {
                Ok((MessengerOutput { final_questions, .. }, usage)) => {
                    mission.metadata.final_questions = final_questions;
                    mission.updated_at = now();
                    self.storage_mut().save_mission(&mission)?;
                    let _ = self.persist_usage(mission_id, &usage).await;
                    self.log_success(
                        mission_id,
                        None,
                        "messenger",
                        "generate_questions",
                        &mission.user_request,
                        mission.metadata.final_questions.as_deref().unwrap_or(""),
                    )
                    .await?;
                }
                Err(err) => {
                    self.log_warning(mission_id, None, "messenger", "generate_questions", &err.to_string())
                        .await?;
                }
            }
        }

        cancel.check(mission_id)?;

        // Phases 2-3: initial exploration + outline generation, skipped
        // once a plan already exists (a resumed mission).
        if mission.plan.is_none() {
            self.run_initial_exploration(mission_id, dispatcher, tool_selection, params, &mission, cancel)
                .await?;

            mission.status = MissionStatus::Planning;
            mission.updated_at = now();
            self.storage_mut().save_mission(&mission)?;
            let _ = self
                .progress
                .publish(mission_id.as_str(), Event::Status { status: mission.status })
                .await;

            let plan = self.generate_outline(mission_id, dispatcher, tool_selection, &mission).await?;
            mission.plan = Some(plan);
            mission.status = MissionStatus::Running;
            mission.updated_at = now();
            self.storage_mut().save_mission(&mission)?;
            let _ = self
                .progress
                .publish(mission_id.as_str(), Event::Status { status: mission.status })
                .await;
        }

        cancel.check(mission_id)?;

        // Phase 4: structured research rounds.
        for round in 1..=params.structured_research_rounds {
            cancel.check(mission_id)?;
            self.run_research_round(mission_id, dispatcher, tool_selection, params, round)
                .await?;

            // Every inter-round reflection runs unconditionally; only the
            // last one (immediately before writing begins) is gated by
            // `skip_final_replanning`.
            let is_final_round = round == params.structured_research_rounds;
            if !is_final_round || !params.skip_final_replanning {
                self.run_reflection(mission_id, dispatcher, tool_selection).await?;
            }
        }

        cancel.check(mission_id)?;

        // Phase 5: note assignment.
        self.assign_notes(mission_id, dispatcher, tool_selection).await?;

        cancel.check(mission_id)?;

        // Phase 6: writing passes.
        let mut content: HashMap<String, String> = HashMap::new();
        for pass in 1..=params.writing_passes {
            cancel.check(mission_id)?;
            self.run_writing_pass(mission_id, dispatcher, tool_selection, params, pass, &mut content)
                .await?;
        }

        cancel.check(mission_id)?;

        // Phase 7: finalization.
        let mission = self.get_mission(mission_id)?;
        let Some(plan) = mission.plan.clone() else {
            return Err(MissionError::PhaseFailed {
                phase: "finalization".to_string(),
                reason: "no plan was ever produced".to_string(),
            }
            .into());
        };
        let report = render_report(&plan, &content);

        let mut mission = mission;
        mission.final_report = Some(report);
        mission.status = MissionStatus::Completed;
        mission.updated_at = now();
        self.storage_mut().save_mission(&mission)?;
        let _ = self
            .progress
            .publish(mission_id.as_str(), Event::Status { status: mission.status })
            .await;
        self.log_success(
            mission_id,
            None,
            "controller",
            "finalize",
            &mission.user_request,
            "report generated",
        )
        .await?;

        let bus = self.progress.clone();
        let close_id = mission_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(CLOSE_GRACE_SECS)).await;
            bus.close_mission(&close_id).await;
        });

        Ok(())
    }

    async fn run_initial_exploration(
        &self,
        mission_id: &MissionId,
        dispatcher: &Arc<ModelDispatcher>,
        tool_selection: &[String],
        params: &ResearchParams,
        mission: &Mission,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let questions: Vec<String> = mission
            .metadata
            .final_questions
            .as_deref()
            .map(|text| {
                text.lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|lines| !lines.is_empty())
            .unwrap_or_else(|| vec![mission.user_request.clone()]);

        let researcher = Researcher::new(self.prompts.researcher.clone());

        for question in questions {
            cancel.check(mission_id)?;

            let section = Section {
                section_id: SectionId::from("preliminary"),
                title: "Initial Exploration".to_string(),
                description: question.clone(),
                research_strategy: format!(
                    "Use up to {} document searches and {} web searches to establish background.",
                    params.initial_exploration_doc_results, params.initial_exploration_web_results,
                ),
                subsections: Vec::new(),
            };

            let view = self.view(
                mission_id,
                dispatcher.clone(),
                tool_selection,
                AgentContext {
                    plan: None,
                    pads: self.storage.get_pads(mission_id.as_str())?.unwrap_or_default(),
                    notes: Vec::new(),
                },
            );

            let result = run_agent_with_retry(
                &researcher,
                &view,
                ResearcherInput {
                    section,
                    mission_goal: mission.user_request.clone(),
                    prior_notes_summary: Vec::new(),
                },
            )
            .await;

            match result {
                Ok((output, usage)) => {
                    let _ = self.persist_usage(mission_id, &usage).await;
                    for draft in output.notes {
                        self.persist_note(mission_id, draft, Some(0)).await?;
                    }
                    self.log_success(
                        mission_id,
                        Some(0),
                        "researcher",
                        "initial_exploration",
                        &question,
                        &output.summary,
                    )
                    .await?;
                }
                Err(err) => {
                    self.log_warning(mission_id, Some(0), "researcher", "initial_exploration", &err.to_string())
                        .await?;
                }
            }
        }

        Ok(())
    }

    async fn generate_outline(
        &self,
        mission_id: &MissionId,
        dispatcher: &Arc<ModelDispatcher>,
        tool_selection: &[String],
        mission: &Mission,
    ) -> Result<Plan> {
        let view = self.view(
            mission_id,
            dispatcher.clone(),
            tool_selection,
            AgentContext {
                plan: None,
                pads: self.storage.get_pads(mission_id.as_str())?.unwrap_or_default(),
                notes: self.storage.list_notes(mission_id.as_str())?,
            },
        );
        let planner = Planner::new(self.prompts.planner.clone());
        let result = run_agent_with_retry(
            &planner,
            &view,
            PlannerInput {
                user_request: mission.user_request.clone(),
                final_questions: mission.metadata.final_questions.clone(),
                feedback: None,
                prior_outline: None,
            },
        )
        .await;

        match result {
            Ok((output, usage)) => {
                let _ = self.persist_usage(mission_id, &usage).await;
                let plan = if output.plan.report_outline.is_empty() {
                    default_plan(&mission.user_request)
                } else {
                    output.plan
                };
                self.log_success(
                    mission_id,
                    None,
                    "planner",
                    "generate_outline",
                    &mission.user_request,
                    &format!("{} sections", plan.report_outline.len()),
                )
                .await?;
                Ok(plan)
            }
            Err(err) => {
                self.log_failure(mission_id, None, "planner", "generate_outline", &err.to_string())
                    .await?;
                Err(MissionError::PhaseFailed {
                    phase: "outline_generation".to_string(),
                    reason: err.to_string(),
                }
                .into())
            }
        }
    }

    async fn run_research_round(
        &self,
        mission_id: &MissionId,
        dispatcher: &Arc<ModelDispatcher>,
        tool_selection: &[String],
        params: &ResearchParams,
        round: u32,
    ) -> Result<()> {
        let mission = self.get_mission(mission_id)?;
        let Some(plan) = mission.plan.clone() else {
            return Ok(());
        };
        let leaf_sections = flatten_leaf_sections(&plan);
        let mission_goal = mission.user_request.clone();

        let tasks: Vec<_> = leaf_sections
            .into_iter()
            .map(|section| {
                let controller = self.clone();
                let mission_id = mission_id.clone();
                let dispatcher = dispatcher.clone();
                let tool_selection = tool_selection.to_vec();
                let mission_goal = mission_goal.clone();
                let max_cycles = params.max_research_cycles_per_section;
                async move {
                    controller
                        .run_section_research(&mission_id, &dispatcher, &tool_selection, section, &mission_goal, round, max_cycles)
                        .await
                }
            })
            .collect();

        let results = super::dispatch::fan_out(tasks).await;
        for result in results {
            result?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_section_research(
        &self,
        mission_id: &MissionId,
        dispatcher: &Arc<ModelDispatcher>,
        tool_selection: &[String],
        section: Section,
        mission_goal: &str,
        round: u32,
        max_cycles: u32,
    ) -> Result<()> {
        let researcher = Researcher::new(self.prompts.researcher.clone());

        for _cycle in 0..max_cycles {
            let notes = self.storage.list_notes(mission_id.as_str())?;
            let prior_notes_summary: Vec<String> = notes
                .iter()
                .filter(|n| n.potential_sections.iter().any(|s| s == &section.section_id) || n.potential_sections.is_empty())
                .map(|n| format!("[{}] {}", n.note_id, truncate_chars(&n.content, 160)))
                .collect();

            let view = self.view(
                mission_id,
                dispatcher.clone(),
                tool_selection,
                AgentContext {
                    plan: None,
                    pads: self.storage.get_pads(mission_id.as_str())?.unwrap_or_default(),
                    notes,
                },
            );

            let result = run_agent_with_retry(
                &researcher,
                &view,
                ResearcherInput {
                    section: section.clone(),
                    mission_goal: mission_goal.to_string(),
                    prior_notes_summary,
                },
            )
            .await;

            match result {
                Ok((output, usage)) => {
                    let _ = self.persist_usage(mission_id, &usage).await;
                    let new_note_count = output.notes.len();
                    for mut draft in output.notes {
                        if draft.source_metadata.is_null() {
                            draft.source_metadata = serde_json::json!({});
                        }
                        let mut note = self.draft_to_note(mission_id, draft)?;
                        note.potential_sections.push(section.section_id.clone());
                        self.storage_mut().add_note(mission_id.as_str(), &note, Some(round))?;
                        let _ = self
                            .progress
                            .publish(
                                mission_id.as_str(),
                                Event::AgentFeedback {
                                    kind: crate::progress::FeedbackKind::NoteGenerated,
                                    payload: Value::Null,
                                },
                            )
                            .await;
                    }
                    self.log_success(
                        mission_id,
                        Some(round),
                        "researcher",
                        &format!("research:{}", section.section_id),
                        &section.title,
                        &output.summary,
                    )
                    .await?;

                    if new_note_count == 0 {
                        break;
                    }
                }
                Err(err) => {
                    self.log_warning(
                        mission_id,
                        Some(round),
                        "researcher",
                        &format!("research:{}", section.section_id),
                        &err.to_string(),
                    )
                    .await?;
                    break;
                }
            }
        }

        Ok(())
    }

    fn draft_to_note(&self, mission_id: &MissionId, draft: crate::agent::researcher::DraftNote) -> Result<Note> {
        let note_id = self.next_note_id(mission_id.as_str())?;
        let mut note = Note::new(note_id, draft.content, draft.source_type, now());
        note.source_id = draft.source_id;
        note.source_metadata = draft.source_metadata;
        Ok(note)
    }

    async fn persist_note(
        &self,
        mission_id: &MissionId,
        draft: crate::agent::researcher::DraftNote,
        round: Option<u32>,
    ) -> Result<()> {
        let note = self.draft_to_note(mission_id, draft)?;
        self.storage_mut().add_note(mission_id.as_str(), &note, round)?;
        Ok(())
    }

    async fn run_reflection(
        &self,
        mission_id: &MissionId,
        dispatcher: &Arc<ModelDispatcher>,
        tool_selection: &[String],
    ) -> Result<()> {
        let mission = self.get_mission(mission_id)?;
        let Some(mut plan) = mission.plan.clone() else {
            return Ok(());
        };
        let notes = self.storage.list_notes(mission_id.as_str())?;
        let notes_summary: Vec<String> = notes
            .iter()
            .map(|n| format!("[{}] {}", n.note_id, truncate_chars(&n.content, 160)))
            .collect();

        let view = self.view(
            mission_id,
            dispatcher.clone(),
            tool_selection,
            AgentContext {
                plan: Some(plan.clone()),
                pads: self.storage.get_pads(mission_id.as_str())?.unwrap_or_default(),
                notes,
            },
        );
        let reflection = Reflection::new(self.prompts.reflection.clone());
        let result = run_agent_with_retry(
            &reflection,
            &view,
            ReflectionInput {
                mission_goal: mission.user_request.clone(),
                outline: plan.report_outline.clone(),
                notes_summary,
            },
        )
        .await;

        match result {
            Ok((output, usage)) => {
                let _ = self.persist_usage(mission_id, &usage).await;

                let mut pads = self.storage.get_pads(mission_id.as_str())?.unwrap_or_default();
                pads.push_thought(&output.thought);
                self.storage_mut().save_pads(mission_id.as_str(), &pads)?;

                if let Some(revised) = output.outline_revision {
                    let candidate = Plan {
                        mission_goal: plan.mission_goal.clone(),
                        report_outline: revised,
                        steps: plan.steps.clone(),
                    };
                    if candidate.validate().is_ok() {
                        plan = candidate;
                        let mut mission = mission;
                        mission.plan = Some(plan);
                        mission.updated_at = now();
                        self.storage_mut().save_mission(&mission)?;
                    }
                }

                self.log_success(mission_id, None, "reflection", "reflect", "", &output.thought)
                    .await?;
            }
            Err(err) => {
                self.log_warning(mission_id, None, "reflection", "reflect", &err.to_string())
                    .await?;
            }
        }

        Ok(())
    }

    async fn assign_notes(
        &self,
        mission_id: &MissionId,
        dispatcher: &Arc<ModelDispatcher>,
        tool_selection: &[String],
    ) -> Result<()> {
        let mission = self.get_mission(mission_id)?;
        let Some(plan) = mission.plan.clone() else {
            return Ok(());
        };
        let section_ids: Vec<SectionId> = flatten_leaf_sections(&plan).into_iter().map(|s| s.section_id).collect();
        if section_ids.is_empty() {
            return Ok(());
        }

        let all_notes = self.storage.list_notes(mission_id.as_str())?;
        let unassigned: Vec<Note> = all_notes.into_iter().filter(|n| !n.is_assigned()).collect();
        let note_assigner = NoteAssigner::new(self.prompts.note_assigner.clone());

        for batch in unassigned.chunks(NOTE_ASSIGNMENT_BATCH_SIZE) {
            let view = self.view(
                mission_id,
                dispatcher.clone(),
                tool_selection,
                AgentContext {
                    plan: Some(plan.clone()),
                    pads: self.storage.get_pads(mission_id.as_str())?.unwrap_or_default(),
                    notes: batch.to_vec(),
                },
            );
            let result = run_agent_with_retry(
                &note_assigner,
                &view,
                NoteAssignerInput {
                    notes: batch.to_vec(),
                    section_ids: section_ids.clone(),
                },
            )
            .await;

            match result {
                Ok((output, usage)) => {
                    let _ = self.persist_usage(mission_id, &usage).await;
                    for assignment in output.assignments {
                        self.apply_note_assignment(mission_id, &batch.to_vec(), assignment)?;
                    }
                    self.log_success(
                        mission_id,
                        None,
                        "note_assigner",
                        "assign_notes",
                        &format!("{} notes", batch.len()),
                        "assigned",
                    )
                    .await?;
                }
                Err(err) => {
                    self.log_warning(mission_id, None, "note_assigner", "assign_notes", &err.to_string())
                        .await?;
                }
            }
        }

        Ok(())
    }

    fn apply_note_assignment(&self, mission_id: &MissionId, batch: &[Note], assignment: NoteAssignment) -> Result<()> {
        let Some(original) = batch.iter().find(|n| n.note_id == assignment.note_id) else {
            return Ok(());
        };
        let mut note = original.clone();
        note.potential_sections = assignment.potential_sections;
        note.is_relevant = Some(assignment.is_relevant);
        self.storage_mut().update_note_assignment(mission_id.as_str(), &note)
    }

    async fn run_writing_pass(
        &self,
        mission_id: &MissionId,
        dispatcher: &Arc<ModelDispatcher>,
        tool_selection: &[String],
        params: &ResearchParams,
        pass: u32,
        content: &mut HashMap<String, String>,
    ) -> Result<()> {
        let mission = self.get_mission(mission_id)?;
        let Some(plan) = mission.plan.clone() else {
            return Ok(());
        };
        let all_notes = self.storage.list_notes(mission_id.as_str())?;
        let leaf_sections = flatten_leaf_sections(&plan);
        let writer = Writer::new(self.prompts.writer.clone());

        for section in leaf_sections {
            let section_notes: Vec<Note> = all_notes
                .iter()
                .filter(|n| n.is_relevant != Some(false) && n.potential_sections.contains(&section.section_id))
                .cloned()
                .collect();
            let previous_content = content
                .get(section.section_id.as_str())
                .map(|s| truncate_chars(s, params.writing_previous_content_preview_chars));

            let view = self.view(
                mission_id,
                dispatcher.clone(),
                tool_selection,
                AgentContext {
                    plan: Some(plan.clone()),
                    pads: self.storage.get_pads(mission_id.as_str())?.unwrap_or_default(),
                    notes: section_notes.clone(),
                },
            );
            let result = run_agent_with_retry(
                &writer,
                &view,
                WriterInput {
                    section: section.clone(),
                    notes: section_notes,
                    previous_content,
                },
            )
            .await;

            match result {
                Ok((output, usage)) => {
                    let _ = self.persist_usage(mission_id, &usage).await;
                    content.insert(section.section_id.as_str().to_string(), output.content);
                    self.log_success(
                        mission_id,
                        None,
                        "writer",
                        &format!("write_pass_{pass}:{}", section.section_id),
                        &section.title,
                        "section drafted",
                    )
                    .await?;
                }
                Err(err) => {
                    self.log_warning(
                        mission_id,
                        None,
                        "writer",
                        &format!("write_pass_{pass}:{}", section.section_id),
                        &err.to_string(),
                    )
                    .await?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::{ChatRequest, ChatResponse, TokenUsage};
    use crate::storage::SqliteStorage;
    use std::pin::Pin;

    struct ScriptedProvider {
        responses: Mutex<std::collections::VecDeque<String>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<&str>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().map(str::to_string).collect()),
            }
        }
    }

    #[async_trait::async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn chat(&self, _request: &ChatRequest) -> std::result::Result<ChatResponse, AgentError> {
            let mut queue = self.responses.lock().unwrap();
            let content = queue.pop_front().unwrap_or_else(|| "{}".to_string());
            Ok(ChatResponse {
                content,
                usage: TokenUsage {
                    prompt_tokens: 5,
                    completion_tokens: 5,
                    total_tokens: 10,
                },
                tool_calls: Vec::new(),
                finish_reason: Some("stop".to_string()),
            })
        }

        async fn chat_stream(
            &self,
            _request: &ChatRequest,
        ) -> std::result::Result<Pin<Box<dyn futures_util::Stream<Item = std::result::Result<String, AgentError>> + Send>>, AgentError>
        {
            Err(AgentError::Stream {
                message: "not implemented".to_string(),
            })
        }
    }

    fn test_controller(responses: Vec<&str>) -> MissionController {
        let mut backing = SqliteStorage::in_memory().unwrap();
        backing.init().unwrap();
        let storage = SharedStorage::new(Box::new(backing));
        let progress = ProgressBus::new(64);
        let provider = Arc::new(ScriptedProvider::new(responses));
        let config = DispatcherConfig::builder()
            .api_key("test")
            .build()
            .unwrap();
        let tools = Arc::new(ToolRegistry::new());
        MissionController::new(storage, progress, provider, config, tools, PromptSet::defaults())
    }

    #[test]
    fn test_create_mission_rejects_no_tools() {
        let controller = test_controller(vec![]);
        let result = controller.create_mission(
            MissionId::from("m1"),
            "survey coffee prices",
            None,
            false,
            None,
            ResearchParamsOverride::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_create_mission_succeeds_with_web_enabled() {
        let controller = test_controller(vec![]);
        let result = controller.create_mission(
            MissionId::from("m1"),
            "survey coffee prices",
            None,
            true,
            None,
            ResearchParamsOverride::default(),
        );
        assert!(result.is_ok());
        let mission = controller.get_mission(&MissionId::from("m1")).unwrap();
        assert_eq!(mission.status, MissionStatus::Pending);
        assert!(mission.metadata.tool_selection.contains(&"web_search".to_string()));
    }

    #[test]
    fn test_stop_on_never_started_mission_is_noop() {
        let controller = test_controller(vec![]);
        controller
            .create_mission(MissionId::from("m1"), "x", None, true, None, ResearchParamsOverride::default())
            .unwrap();
        controller.stop(&MissionId::from("m1"));
    }

    #[tokio::test]
    async fn test_resume_rejects_pending_mission() {
        let controller = test_controller(vec![]);
        controller
            .create_mission(MissionId::from("m1"), "x", None, true, None, ResearchParamsOverride::default())
            .unwrap();
        let result = controller
            .resume(
                &MissionId::from("m1"),
                UserContext {
                    user_id: "u1".to_string(),
                    settings: ResearchParamsOverride::default(),
                },
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_resume_from_round_rejects_zero() {
        let controller = test_controller(vec![]);
        controller
            .create_mission(MissionId::from("m1"), "x", None, true, None, ResearchParamsOverride::default())
            .unwrap();
        let result = controller
            .resume_from_round(
                &MissionId::from("m1"),
                0,
                UserContext {
                    user_id: "u1".to_string(),
                    settings: ResearchParamsOverride::default(),
                },
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_full_mission_run_completes() {
        let questions = serde_json::json!({"final_questions": "What drove the price change?", "status_summary": null}).to_string();
        let plan = serde_json::json!({
            "mission_goal": "survey coffee prices",
            "report_outline": [
                {"section_id": "s1", "title": "Overview", "description": "background", "research_strategy": "broad search", "subsections": []}
            ],
            "steps": []
        })
        .to_string();
        let researcher_empty = serde_json::json!({"notes": [], "summary": "nothing new"}).to_string();
        let reflection = serde_json::json!({
            "thought": "coverage looks sufficient",
            "outline_revision": null,
            "sections_needing_more_research": [],
            "sections_sufficiently_covered": ["s1"]
        })
        .to_string();
        let assignment = serde_json::json!({"assignments": []}).to_string();

        let responses = vec![
            questions.as_str(),
            researcher_empty.as_str(),
            plan.as_str(),
            researcher_empty.as_str(),
            reflection.as_str(),
            researcher_empty.as_str(),
            reflection.as_str(),
            assignment.as_str(),
            "Section content for the overview.",
        ];
        let controller = test_controller(responses);
        let mission_id = MissionId::from("m1");
        controller
            .create_mission(mission_id.clone(), "survey coffee prices", None, true, None, ResearchParamsOverride::default())
            .unwrap();

        let handle = controller
            .start(
                &mission_id,
                UserContext {
                    user_id: "u1".to_string(),
                    settings: ResearchParamsOverride {
                        structured_research_rounds: Some(2),
                        max_research_cycles_per_section: Some(1),
                        writing_passes: Some(1),
                        ..Default::default()
                    },
                },
            )
            .await
            .unwrap();

        handle.await.unwrap().unwrap();

        let mission = controller.get_mission(&mission_id).unwrap();
        assert_eq!(mission.status, MissionStatus::Completed);
        assert!(mission.final_report.is_some());
    }
}

//! Command dispatch: translates a parsed [`Cli`] into a [`MissionController`]
//! call, bridging the synchronous CLI entry point to the engine's async API
//! via a local single-threaded Tokio runtime built per invocation.

use std::path::Path;
use std::sync::Arc;

use crate::agent::providers::OpenAiProvider;
use crate::agent::{DispatcherConfig, PromptSet};
use crate::cli::output::{
    format_logs, format_message, format_mission, format_notes, format_pads, format_plan,
    format_report, format_status, format_usage,
};
use crate::cli::parser::{Cli, Commands};
use crate::cli::output::OutputFormat;
use crate::core::MissionId;
use crate::error::{Error, Result};
use crate::mission::{MissionController, ResearchParamsOverride, UserContext};
use crate::progress::ProgressBus;
use crate::storage::{SharedStorage, SqliteStorage, Storage};
use crate::tools::{
    BraveSearchProvider, CalculatorTool, DocumentSearchTool, FileReaderTool, ToolRegistry,
    WebPageFetcherTool, WebSearchTool,
};

/// Executes one parsed CLI invocation, returning the text to print to
/// stdout (or an error formatted by the caller).
///
/// # Errors
///
/// Propagates whatever storage, mission, or I/O error the underlying
/// command raises.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let db_path = cli.get_db_path();

    match &cli.command {
        Commands::Init { force } => cmd_init(&db_path, *force, format),
        Commands::Status => cmd_status(&db_path, format),
        Commands::Reset { yes } => cmd_reset(&db_path, *yes, format),
        Commands::Create {
            request,
            use_web,
            document_group,
            research_rounds,
            writing_passes,
            auto_optimize,
        } => cmd_create(
            &db_path,
            request,
            CreateOptions {
                use_web: *use_web,
                document_group: document_group.clone(),
                research_rounds: *research_rounds,
                writing_passes: *writing_passes,
                auto_optimize: *auto_optimize,
            },
            format,
        ),
        Commands::Start { mission_id, user_id } => cmd_start(&db_path, mission_id, user_id, format),
        Commands::Stop { mission_id } => cmd_stop(&db_path, mission_id, format),
        Commands::Resume { mission_id, user_id } => cmd_resume(&db_path, mission_id, user_id, format),
        Commands::ResumeFromRound { mission_id, round, user_id } => {
            cmd_resume_from_round(&db_path, mission_id, *round, user_id, format)
        }
        Commands::ReviseOutline { mission_id, feedback, user_id } => {
            cmd_revise_outline(&db_path, mission_id, feedback.clone(), user_id, format)
        }
        Commands::GetStatus { mission_id } => cmd_get_status(&db_path, mission_id, format),
        Commands::GetStats { mission_id } => cmd_get_stats(&db_path, mission_id, format),
        Commands::GetPlan { mission_id } => cmd_get_plan(&db_path, mission_id, format),
        Commands::GetNotes { mission_id } => cmd_get_notes(&db_path, mission_id, format),
        Commands::GetLogs { mission_id, offset, limit } => cmd_get_logs(&db_path, mission_id, *offset, *limit, format),
        Commands::GetReport { mission_id } => cmd_get_report(&db_path, mission_id, format),
        Commands::GetContext { mission_id } => cmd_get_context(&db_path, mission_id, format),
        Commands::GetSettings { mission_id } => cmd_get_settings(&db_path, mission_id, format),
        Commands::UpdateReport { mission_id, content } => cmd_update_report(&db_path, mission_id, content, format),
    }
}

fn open_storage(db_path: &Path) -> Result<SqliteStorage> {
    let storage = SqliteStorage::open(db_path)?;
    if !storage.is_initialized()? {
        return Err(Error::Storage(crate::error::StorageError::NotInitialized));
    }
    Ok(storage)
}

fn cmd_init(db_path: &Path, force: bool, _format: OutputFormat) -> Result<String> {
    if db_path.exists() && !force {
        return Err(Error::Config {
            message: "database already exists; use --force to reinitialize".to_string(),
        });
    }

    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)?;
    }

    if force && db_path.exists() {
        std::fs::remove_file(db_path)?;
    }

    let mut storage = SqliteStorage::open(db_path)?;
    storage.init()?;

    Ok(format!("Initialized mission database at: {}\n", db_path.display()))
}

fn cmd_status(db_path: &Path, format: OutputFormat) -> Result<String> {
    let storage = open_storage(db_path)?;
    let stats = storage.stats()?;
    Ok(format_status(&stats, format))
}

fn cmd_reset(db_path: &Path, yes: bool, _format: OutputFormat) -> Result<String> {
    if !yes {
        return Err(Error::Config {
            message: "use --yes to confirm reset; this deletes all missions".to_string(),
        });
    }

    let mut storage = open_storage(db_path)?;
    storage.reset()?;

    Ok("Mission database reset.\n".to_string())
}

/// Builds a [`MissionController`] wired up with the same tool suite and
/// LLM provider every invocation resolves from the environment
/// (`OPENAI_API_KEY`, `BRAVE_API_KEY`, `MISSION_CACHE_DIR`).
fn build_controller(db_path: &Path) -> Result<MissionController> {
    let storage = open_storage(db_path)?;
    let shared = SharedStorage::new(Box::new(storage));

    let dispatcher_config =
        DispatcherConfig::from_env().map_err(|e| Error::Config { message: e.to_string() })?;
    let provider = Arc::new(OpenAiProvider::new(
        &dispatcher_config.api_key,
        dispatcher_config.base_url.as_deref(),
    ));

    let mut tools = ToolRegistry::new();
    tools.register(Box::new(CalculatorTool));
    tools.register(Box::new(FileReaderTool::new(std::env::current_dir()?)));

    let embedder: Arc<dyn crate::embedding::Embedder> = crate::embedding::create_embedder()?.into();
    tools.register(Box::new(DocumentSearchTool::new(
        Arc::new(shared.clone()) as Arc<dyn Storage>,
        embedder,
    )));

    if let Ok(brave_key) = std::env::var("BRAVE_API_KEY") {
        let search_provider = BraveSearchProvider::new(brave_key)?;
        tools.register(Box::new(WebSearchTool::new(Arc::new(search_provider))));
    }

    let cache_dir = std::env::var("MISSION_CACHE_DIR").unwrap_or_else(|_| ".mission/web-cache".to_string());
    tools.register(Box::new(WebPageFetcherTool::new(cache_dir)?));

    Ok(MissionController::new(
        shared,
        ProgressBus::new(256),
        provider,
        dispatcher_config,
        Arc::new(tools),
        PromptSet::defaults(),
    ))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Config { message: format!("failed to start async runtime: {e}") })
}

fn user_context(user_id: &str) -> UserContext {
    UserContext {
        user_id: user_id.to_string(),
        settings: ResearchParamsOverride::default(),
    }
}

/// Parameters for [`Commands::Create`], bundled so `cmd_create` doesn't
/// carry seven positional arguments.
struct CreateOptions {
    use_web: bool,
    document_group: Option<String>,
    research_rounds: Option<u32>,
    writing_passes: Option<u32>,
    auto_optimize: bool,
}

fn cmd_create(db_path: &Path, request: &str, opts: CreateOptions, format: OutputFormat) -> Result<String> {
    let controller = build_controller(db_path)?;
    let mission_id = MissionId::from(uuid::Uuid::new_v4().to_string());

    let overrides = ResearchParamsOverride {
        structured_research_rounds: opts.research_rounds,
        writing_passes: opts.writing_passes,
        auto_optimize: opts.auto_optimize.then_some(true),
        ..ResearchParamsOverride::default()
    };

    let created = controller.create_mission(
        mission_id,
        request,
        None,
        opts.use_web,
        opts.document_group,
        overrides,
    )?;
    Ok(format_message(&format!("Created mission {created}"), format))
}

/// Starts a mission and blocks until it reaches a terminal (or stopped)
/// state: the CLI is a one-shot process with no background daemon, so
/// unlike the `start` operation's async-server contract (§6), driving
/// the spawned phase loop to completion here is what keeps it alive at
/// all — a bare `spawn`-and-return would be killed with the process on
/// exit.
fn cmd_start(db_path: &Path, mission_id: &str, user_id: &str, format: OutputFormat) -> Result<String> {
    let controller = build_controller(db_path)?;
    let id = MissionId::from(mission_id.to_string());
    let rt = runtime()?;
    let handle = rt.block_on(controller.start(&id, user_context(user_id)))?;
    await_mission_handle(&rt, handle)?;
    let mission = controller.get_mission(&id)?;
    Ok(format_mission(&mission, format))
}

fn cmd_stop(db_path: &Path, mission_id: &str, format: OutputFormat) -> Result<String> {
    let controller = build_controller(db_path)?;
    let id = MissionId::from(mission_id.to_string());
    controller.stop(&id);
    Ok(format_message(&format!("Mission {mission_id} stop requested"), format))
}

fn await_mission_handle(
    rt: &tokio::runtime::Runtime,
    handle: tokio::task::JoinHandle<Result<()>>,
) -> Result<()> {
    rt.block_on(handle).map_err(|e| Error::Config { message: format!("mission task panicked: {e}") })?
}

fn cmd_resume(db_path: &Path, mission_id: &str, user_id: &str, format: OutputFormat) -> Result<String> {
    let controller = build_controller(db_path)?;
    let id = MissionId::from(mission_id.to_string());
    let rt = runtime()?;
    let handle = rt.block_on(controller.resume(&id, user_context(user_id)))?;
    await_mission_handle(&rt, handle)?;
    let mission = controller.get_mission(&id)?;
    Ok(format_mission(&mission, format))
}

fn cmd_resume_from_round(
    db_path: &Path,
    mission_id: &str,
    round: u32,
    user_id: &str,
    format: OutputFormat,
) -> Result<String> {
    let controller = build_controller(db_path)?;
    let id = MissionId::from(mission_id.to_string());
    let rt = runtime()?;
    let handle = rt.block_on(controller.resume_from_round(&id, round, user_context(user_id)))?;
    await_mission_handle(&rt, handle)?;
    let mission = controller.get_mission(&id)?;
    Ok(format_mission(&mission, format))
}

fn cmd_revise_outline(
    db_path: &Path,
    mission_id: &str,
    feedback: Option<String>,
    user_id: &str,
    format: OutputFormat,
) -> Result<String> {
    let controller = build_controller(db_path)?;
    let id = MissionId::from(mission_id.to_string());
    let rt = runtime()?;
    let handle = rt.block_on(controller.revise_outline_and_resume(
        &id,
        1,
        feedback.unwrap_or_default(),
        None,
        user_context(user_id),
    ))?;
    await_mission_handle(&rt, handle)?;
    let mission = controller.get_mission(&id)?;
    Ok(format_mission(&mission, format))
}

fn cmd_get_status(db_path: &Path, mission_id: &str, format: OutputFormat) -> Result<String> {
    let controller = build_controller(db_path)?;
    let id = MissionId::from(mission_id.to_string());
    let mission = controller.get_mission(&id)?;
    Ok(format_mission(&mission, format))
}

fn cmd_get_stats(db_path: &Path, mission_id: &str, format: OutputFormat) -> Result<String> {
    let controller = build_controller(db_path)?;
    let id = MissionId::from(mission_id.to_string());
    let totals = controller.get_usage(&id)?;
    Ok(format_usage(&totals, format))
}

fn cmd_get_plan(db_path: &Path, mission_id: &str, format: OutputFormat) -> Result<String> {
    let controller = build_controller(db_path)?;
    let id = MissionId::from(mission_id.to_string());
    let mission = controller.get_mission(&id)?;
    let sections = mission.plan.map(|p| p.report_outline).unwrap_or_default();
    Ok(format_plan(&sections, format))
}

fn cmd_get_notes(db_path: &Path, mission_id: &str, format: OutputFormat) -> Result<String> {
    let controller = build_controller(db_path)?;
    let id = MissionId::from(mission_id.to_string());
    let notes = controller.get_notes(&id)?;
    Ok(format_notes(&notes, format))
}

fn cmd_get_logs(db_path: &Path, mission_id: &str, offset: usize, limit: usize, format: OutputFormat) -> Result<String> {
    let controller = build_controller(db_path)?;
    let id = MissionId::from(mission_id.to_string());
    let entries = controller.get_logs(&id, offset, limit)?;
    Ok(format_logs(&entries, format))
}

fn cmd_get_report(db_path: &Path, mission_id: &str, format: OutputFormat) -> Result<String> {
    let controller = build_controller(db_path)?;
    let id = MissionId::from(mission_id.to_string());
    let mission = controller.get_mission(&id)?;
    Ok(format_report(mission.final_report.as_deref(), format))
}

fn cmd_get_context(db_path: &Path, mission_id: &str, format: OutputFormat) -> Result<String> {
    let controller = build_controller(db_path)?;
    let id = MissionId::from(mission_id.to_string());
    let pads = controller.get_pads(&id)?;
    Ok(format_pads(&pads, format))
}

fn cmd_get_settings(db_path: &Path, mission_id: &str, format: OutputFormat) -> Result<String> {
    let controller = build_controller(db_path)?;
    let id = MissionId::from(mission_id.to_string());
    let mission = controller.get_mission(&id)?;
    let resolved = mission
        .metadata
        .extra
        .get("research_params")
        .cloned()
        .unwrap_or_else(|| serde_json::json!({ "note": "not yet started; defaults will apply" }));
    match format {
        OutputFormat::Text => Ok(format!("{}\n", serde_json::to_string_pretty(&resolved).unwrap_or_default())),
        OutputFormat::Json | OutputFormat::Ndjson => Ok(serde_json::to_string_pretty(&resolved).unwrap_or_default()),
    }
}

fn cmd_update_report(db_path: &Path, mission_id: &str, content: &str, format: OutputFormat) -> Result<String> {
    let controller = build_controller(db_path)?;
    let id = MissionId::from(mission_id.to_string());
    controller.update_report(&id, content.to_string())?;
    Ok(format_message(&format!("Mission {mission_id} report updated"), format))
}

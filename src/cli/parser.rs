//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Mission-RS: an autonomous multi-agent research orchestrator.
///
/// Creates, drives, and inspects missions that turn a natural-language
/// research request into a structured, cited report.
#[derive(Parser, Debug)]
#[command(name = "mission-rs")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the mission database file.
    ///
    /// Defaults to `.mission/mission-state.db` in the current directory.
    #[arg(short, long, env = "MISSION_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json, ndjson).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the mission database.
    Init {
        /// Overwrite an existing database file.
        #[arg(short, long)]
        force: bool,
    },

    /// Show database status.
    Status,

    /// Reset the database, deleting all missions.
    Reset {
        /// Confirm the reset without an interactive prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Create a new mission.
    Create {
        /// The natural-language research request.
        request: String,

        /// Enable the web search tool for this mission.
        #[arg(long)]
        use_web: bool,

        /// Restrict document search to this document group.
        #[arg(long)]
        document_group: Option<String>,

        /// Override `structured_research_rounds` for this mission.
        #[arg(long)]
        research_rounds: Option<u32>,

        /// Override `writing_passes` for this mission.
        #[arg(long)]
        writing_passes: Option<u32>,

        /// Run the Auto-Optimizer pass at start to tune unset parameters.
        #[arg(long)]
        auto_optimize: bool,
    },

    /// Start (or idempotently continue) a mission.
    Start {
        /// The mission to start.
        mission_id: String,

        /// User identifier driving the settings resolver.
        #[arg(long, default_value = "default")]
        user_id: String,
    },

    /// Request cooperative cancellation of a running mission.
    Stop {
        /// The mission to stop.
        mission_id: String,
    },

    /// Resume a stopped, paused, or failed mission.
    Resume {
        /// The mission to resume.
        mission_id: String,

        /// User identifier driving the settings resolver.
        #[arg(long, default_value = "default")]
        user_id: String,
    },

    /// Truncate a mission's notes/log entries back to before `round`
    /// and resume from there.
    ResumeFromRound {
        /// The mission to resume.
        mission_id: String,

        /// The structured research round to resume from (1-based).
        round: u32,

        /// User identifier driving the settings resolver.
        #[arg(long, default_value = "default")]
        user_id: String,
    },

    /// Revise the report outline with feedback and resume research
    /// from round 1.
    ReviseOutline {
        /// The mission to revise.
        mission_id: String,

        /// Free-text feedback steering the revised outline.
        #[arg(long)]
        feedback: Option<String>,

        /// User identifier driving the settings resolver.
        #[arg(long, default_value = "default")]
        user_id: String,
    },

    /// Show a mission's current status.
    GetStatus {
        /// The mission to inspect.
        mission_id: String,
    },

    /// Show a mission's accumulated token/cost usage.
    GetStats {
        /// The mission to inspect.
        mission_id: String,
    },

    /// Show a mission's report outline.
    GetPlan {
        /// The mission to inspect.
        mission_id: String,
    },

    /// List a mission's notes.
    GetNotes {
        /// The mission to inspect.
        mission_id: String,
    },

    /// List a mission's execution log entries.
    GetLogs {
        /// The mission to inspect.
        mission_id: String,

        /// Number of entries to skip.
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Maximum number of entries to return.
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },

    /// Show a mission's final report.
    GetReport {
        /// The mission to inspect.
        mission_id: String,
    },

    /// Show a mission's goal/thought/scratch pads.
    GetContext {
        /// The mission to inspect.
        mission_id: String,
    },

    /// Show the resolved research-parameter settings in effect for a
    /// mission.
    GetSettings {
        /// The mission to inspect.
        mission_id: String,
    },

    /// Overwrite a mission's final report text directly.
    UpdateReport {
        /// The mission to update.
        mission_id: String,

        /// The new report content.
        content: String,
    },
}

impl Cli {
    /// Returns the database path, using the default if not specified.
    #[must_use]
    pub fn get_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(crate::storage::DEFAULT_DB_PATH))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_db_path() {
        let cli = Cli {
            db_path: None,
            verbose: false,
            format: "text".to_string(),
            command: Commands::Status,
        };
        assert_eq!(
            cli.get_db_path(),
            PathBuf::from(crate::storage::DEFAULT_DB_PATH)
        );
    }

    #[test]
    fn test_custom_db_path() {
        let cli = Cli {
            db_path: Some(PathBuf::from("/custom/path.db")),
            verbose: false,
            format: "text".to_string(),
            command: Commands::Status,
        };
        assert_eq!(cli.get_db_path(), PathBuf::from("/custom/path.db"));
    }
}

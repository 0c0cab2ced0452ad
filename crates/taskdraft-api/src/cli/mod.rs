//! CLI command definitions and dispatch for the `tdraft` binary.
//!
//! Uses clap derive macros for argument parsing. Commands operate on the
//! local draft store the authoring forms write into.

pub mod draft;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use taskdraft_types::form::FormType;

use crate::state::AppState;

/// Inspect and manage locally persisted task-authoring drafts.
#[derive(Parser)]
#[command(name = "tdraft", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit log lines as JSON on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export tracing spans through OpenTelemetry to stdout.
    #[arg(long, global = true, hide = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Identifies one draft slot.
#[derive(Args, Debug, Clone)]
pub struct DraftTarget {
    /// Form type (multipleChoice, trueFalse, fillInBlanks).
    #[arg(long = "type", value_name = "FORM_TYPE")]
    pub form_type: FormType,

    /// Course id.
    #[arg(long)]
    pub course: String,

    /// Lesson id.
    #[arg(long)]
    pub lesson: String,

    /// User id (defaults to the anonymous user).
    #[arg(long)]
    pub user: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Save a draft from a JSON file, or stdin when no file is given.
    Save {
        #[command(flatten)]
        target: DraftTarget,

        /// Path to the JSON form payload.
        #[arg(long, short)]
        file: Option<PathBuf>,
    },

    /// Print a stored draft.
    Load {
        #[command(flatten)]
        target: DraftTarget,
    },

    /// Delete a stored draft.
    #[command(alias = "rm")]
    Remove {
        #[command(flatten)]
        target: DraftTarget,
    },

    /// List stored drafts, most recent first.
    #[command(alias = "ls")]
    List {
        /// Only drafts for this course.
        #[arg(long)]
        course: Option<String>,

        /// Only drafts for this lesson.
        #[arg(long)]
        lesson: Option<String>,

        /// Only drafts for this user.
        #[arg(long)]
        user: Option<String>,
    },

    /// Evict malformed, outdated and expired drafts.
    Cleanup,

    /// Delete every draft of a course/lesson scope, as after publishing.
    Purge {
        /// Course id.
        #[arg(long)]
        course: String,

        /// Lesson id.
        #[arg(long)]
        lesson: String,

        /// User id (defaults to the anonymous user).
        #[arg(long)]
        user: Option<String>,
    },

    /// Show storage usage against the quota ceiling.
    #[command(alias = "status")]
    Info,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Run a command that needs application state.
pub async fn dispatch(command: Commands, state: &AppState, json: bool) -> anyhow::Result<()> {
    match command {
        Commands::Save { target, file } => draft::save(state, &target, file.as_deref(), json).await,
        Commands::Load { target } => draft::load(state, &target, json).await,
        Commands::Remove { target } => draft::remove(state, &target, json).await,
        Commands::List {
            course,
            lesson,
            user,
        } => {
            let filter = draft::ListFilter {
                course,
                lesson,
                user,
            };
            draft::list(state, &filter, json)
        }
        Commands::Cleanup => draft::cleanup(state, json).await,
        Commands::Purge {
            course,
            lesson,
            user,
        } => draft::purge(state, &course, &lesson, user.as_deref(), json).await,
        Commands::Info => draft::info(state, json).await,
        Commands::Completions { .. } => unreachable!("handled before state init"),
    }
}

//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - course: fetch course detail (with not-ready retries)
//! - flags: resolve waffle flags globally or for a course
//! - apps: list course apps
//! - app-toggle: enable or disable one course app

use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

/// Authoring - course-authoring resource fetcher
#[derive(Parser, Debug)]
#[command(name = "authoring")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch course detail, retrying while the course is not ready
    Course {
        /// Course id (e.g. course-v1:edX+DemoX+Demo_Course)
        id: String,

        /// Disable not-ready retries for this fetch
        #[arg(long)]
        no_retry: bool,
    },

    /// Resolve waffle flags
    Flags {
        /// Course id; omit for the global flags
        #[arg(long)]
        course: Option<String>,

        /// Print the resolved set as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the apps configured for a course
    Apps {
        /// Course id
        id: String,
    },

    /// Enable or disable a course app
    #[command(group(ArgGroup::new("state").required(true).args(["enable", "disable"])))]
    AppToggle {
        /// Course id
        course: String,

        /// App id (e.g. discussion, wiki)
        app: String,

        #[arg(long)]
        enable: bool,

        #[arg(long)]
        disable: bool,
    },
}

impl Commands {
    /// Requested state for app-toggle; `None` for every other command
    pub fn toggle_state(&self) -> Option<bool> {
        match self {
            Commands::AppToggle { enable, .. } => Some(*enable),
            _ => None,
        }
    }
}

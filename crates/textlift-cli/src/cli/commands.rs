//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use textlift::Pid;

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Accessibility permission commands.
#[derive(Debug, Subcommand)]
pub enum PermissionCommand {
    /// Report whether the process is trusted
    Check,

    /// Show the system prompt and optionally wait for the grant
    Request {
        /// Seconds to wait for the permission to be granted
        #[arg(short, long, value_name = "SECS")]
        wait: Option<u64>,
    },
}

/// Capture command arguments.
#[derive(Debug, Args)]
pub struct CaptureCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Replace command arguments.
#[derive(Debug, Args)]
pub struct ReplaceCommand {
    /// Text written in place of the captured text
    pub text: String,
}

/// Enhance command arguments.
#[derive(Debug, Args)]
pub struct EnhanceCommand {
    /// Shell command that reads the captured text on stdin and prints the
    /// replacement on stdout
    #[arg(short = 'e', long = "exec", value_name = "SHELL CMD")]
    pub exec: String,

    /// Mode passed to the command as TEXTLIFT_MODE
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Files passed to the command as TEXTLIFT_ATTACHMENTS
    #[arg(short, long = "attach", value_name = "FILE")]
    pub attachments: Vec<PathBuf>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Classify command arguments.
#[derive(Debug, Args)]
pub struct ClassifyCommand {
    /// Process id of the application
    pub pid: Pid,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show configuration file path
    Path,

    /// Validate configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

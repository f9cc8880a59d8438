//! Command-line interface for textlift.
//!
//! This module provides the CLI structure for the `textlift` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use textlift::logging::Verbosity;

pub use commands::{
    CaptureCommand, ClassifyCommand, ConfigCommand, EnhanceCommand, PermissionCommand,
    ReplaceCommand, StatusCommand,
};

/// textlift - Capture and replace the focused text of any application
///
/// Reads the selection (or whole value) of the control holding keyboard
/// focus, and writes new text back into it without disturbing the clipboard.
#[derive(Debug, Parser)]
#[command(name = "textlift")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show platform, permission and configuration status
    Status(StatusCommand),

    /// Check or request accessibility permission
    #[command(subcommand)]
    Permission(PermissionCommand),

    /// Capture the focused text once and print it
    Capture(CaptureCommand),

    /// Capture the focused text, then replace it
    Replace(ReplaceCommand),

    /// Capture, transform through a shell command, and replace
    Enhance(EnhanceCommand),

    /// Print the app category of a process
    Classify(ClassifyCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_name() {
        assert_eq!(Cli::command().get_name(), "textlift");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_flags() {
        assert_eq!(parse(&["textlift", "-q", "status"]).verbosity(), Verbosity::Quiet);
        assert_eq!(parse(&["textlift", "status"]).verbosity(), Verbosity::Normal);
        assert_eq!(parse(&["textlift", "-v", "status"]).verbosity(), Verbosity::Verbose);
        assert_eq!(parse(&["textlift", "-vv", "status"]).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_parse_status_json() {
        let cli = parse(&["textlift", "status", "--json"]);
        assert!(matches!(cli.command, Command::Status(StatusCommand { json: true })));
    }

    #[test]
    fn test_parse_permission_request_wait() {
        let cli = parse(&["textlift", "permission", "request", "--wait", "30"]);
        assert!(matches!(
            cli.command,
            Command::Permission(PermissionCommand::Request { wait: Some(30) })
        ));
    }

    #[test]
    fn test_parse_permission_check() {
        let cli = parse(&["textlift", "permission", "check"]);
        assert!(matches!(cli.command, Command::Permission(PermissionCommand::Check)));
    }

    #[test]
    fn test_parse_capture() {
        let cli = parse(&["textlift", "capture", "-j"]);
        assert!(matches!(cli.command, Command::Capture(CaptureCommand { json: true })));
    }

    #[test]
    fn test_parse_replace() {
        let cli = parse(&["textlift", "replace", "Hello Cathy"]);
        match cli.command {
            Command::Replace(cmd) => assert_eq!(cmd.text, "Hello Cathy"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_replace_requires_text() {
        assert!(Cli::try_parse_from(["textlift", "replace"]).is_err());
    }

    #[test]
    fn test_parse_enhance() {
        let cli = parse(&[
            "textlift", "enhance", "--exec", "tr a-z A-Z", "--mode", "shout", "--attach", "a.png",
        ]);
        match cli.command {
            Command::Enhance(cmd) => {
                assert_eq!(cmd.exec, "tr a-z A-Z");
                assert_eq!(cmd.mode.as_deref(), Some("shout"));
                assert_eq!(cmd.attachments, vec![PathBuf::from("a.png")]);
                assert!(!cmd.json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_enhance_requires_exec() {
        assert!(Cli::try_parse_from(["textlift", "enhance"]).is_err());
    }

    #[test]
    fn test_parse_classify() {
        let cli = parse(&["textlift", "classify", "4242"]);
        assert!(matches!(cli.command, Command::Classify(ClassifyCommand { pid: 4242 })));
    }

    #[test]
    fn test_classify_rejects_non_numeric_pid() {
        assert!(Cli::try_parse_from(["textlift", "classify", "slack"]).is_err());
    }

    #[test]
    fn test_parse_config_validate_file() {
        let cli = parse(&["textlift", "config", "validate", "--file", "/tmp/t.toml"]);
        match cli.command {
            Command::Config(ConfigCommand::Validate { file }) => {
                assert_eq!(file, Some(PathBuf::from("/tmp/t.toml")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_with_config() {
        let cli = parse(&["textlift", "-c", "/custom/config.toml", "status"]);
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }
}

//! `textlift` - CLI for textlift
//!
//! This binary captures, replaces and transforms the focused text of the
//! frontmost application from the command line.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]
#![cfg_attr(not(target_os = "macos"), allow(dead_code))]

mod cli;
mod transform;

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use textlift::{
    init_logging, AccessibilityApi, CaptureSummary, Config, EnhanceOptions, ReplacementResult,
    TextBridge, TrustProvider,
};

use crate::cli::{Cli, Command, ConfigCommand, PermissionCommand};
use crate::transform::CommandTransform;

#[cfg(target_os = "macos")]
mod platform {
    use std::sync::Arc;

    use textlift::{Config, TextBridge, TrustProvider};
    use textlift_mac::{MacAccessibility, MacTrust};

    pub fn name() -> &'static str {
        textlift_mac::platform_name()
    }

    pub fn trust() -> Option<Arc<dyn TrustProvider>> {
        Some(Arc::new(MacTrust::new()))
    }

    pub fn bridge(config: Config) -> anyhow::Result<TextBridge<MacAccessibility>> {
        Ok(TextBridge::new(
            textlift_mac::desktop(),
            config,
            Arc::new(MacTrust::new()),
        ))
    }
}

#[cfg(not(target_os = "macos"))]
mod platform {
    use std::sync::Arc;

    use textlift::TrustProvider;

    pub fn name() -> &'static str {
        std::env::consts::OS
    }

    pub fn trust() -> Option<Arc<dyn TrustProvider>> {
        None
    }

    pub fn unsupported() -> anyhow::Error {
        anyhow::anyhow!("unsupported platform: {}", name())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Status(cmd) => handle_status(&config, cmd.json),
        Command::Config(cmd) => handle_config(&config, cmd),
        command => run_desktop(config, command).await,
    }
}

#[cfg(target_os = "macos")]
async fn run_desktop(config: Config, command: Command) -> Result<()> {
    let bridge = platform::bridge(config)?;
    dispatch(&bridge, command).await
}

#[cfg(not(target_os = "macos"))]
async fn run_desktop(_config: Config, _command: Command) -> Result<()> {
    Err(platform::unsupported())
}

async fn dispatch<A: AccessibilityApi>(bridge: &TextBridge<A>, command: Command) -> Result<()> {
    match command {
        Command::Permission(cmd) => handle_permission(bridge, cmd).await,
        Command::Capture(cmd) => handle_capture(bridge, cmd.json).await,
        Command::Replace(cmd) => handle_replace(bridge, &cmd.text).await,
        Command::Enhance(cmd) => {
            let transform = CommandTransform::new(cmd.exec);
            let options = EnhanceOptions {
                mode: cmd.mode,
                attachments: cmd.attachments,
            };
            handle_enhance(bridge, &transform, options, cmd.json).await
        }
        Command::Classify(cmd) => {
            println!("{}", bridge.classify(cmd.pid));
            Ok(())
        }
        Command::Status(_) | Command::Config(_) => bail!("command does not use the desktop"),
    }
}

fn handle_status(config: &Config, json: bool) -> Result<()> {
    let trust = platform::trust();
    let granted = trust.as_deref().map(TrustProvider::is_trusted);
    let config_path = Config::default_config_path();

    if json {
        let status = serde_json::json!({
            "platform": platform::name(),
            "supported": trust.is_some(),
            "permission_granted": granted,
            "config_path": config_path,
            "config_valid": config.validate().is_ok(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("textlift status");
        println!("---------------");
        println!("Platform:      {}", platform::name());
        match granted {
            Some(true) => println!("Permission:    granted"),
            Some(false) => println!("Permission:    not granted"),
            None => println!("Permission:    unsupported platform"),
        }
        println!("Config:        {}", config_path.display());
    }
    Ok(())
}

async fn handle_permission<A: AccessibilityApi>(
    bridge: &TextBridge<A>,
    cmd: PermissionCommand,
) -> Result<()> {
    let gate = bridge.gate();
    match cmd {
        PermissionCommand::Check => {
            if gate.is_granted() {
                println!("Accessibility permission is granted.");
            } else {
                println!("Accessibility permission is not granted.");
                println!();
                println!("{}", textlift::permission_instructions());
            }
        }
        PermissionCommand::Request { wait } => {
            if gate.request_permission() {
                println!("Accessibility permission is granted.");
                return Ok(());
            }
            println!("{}", textlift::permission_instructions());
            if let Some(secs) = wait {
                println!();
                println!("Waiting up to {secs}s for the permission...");
                if gate.wait_until_granted(Duration::from_secs(secs)).await {
                    println!("Accessibility permission is granted.");
                } else {
                    gate.cancel();
                    bail!("accessibility permission was not granted within {secs}s");
                }
            }
        }
    }
    Ok(())
}

fn print_summary(summary: &CaptureSummary) {
    println!("Method:      {}", summary.method);
    println!("Category:    {}", summary.category);
    println!("Process:     {}", summary.source_pid);
    println!("Selection:   {}", summary.had_selection);
    if let Some(range) = summary.selected_range {
        println!("Range:       {range}");
    }
    println!("Length:      {}", summary.length);
    println!();
    println!("{}", summary.content);
}

async fn handle_capture<A: AccessibilityApi>(bridge: &TextBridge<A>, json: bool) -> Result<()> {
    let Some(captured) = bridge.capture().await? else {
        if json {
            println!("null");
        } else {
            println!("No text captured.");
        }
        return Ok(());
    };
    let summary = captured.summary();
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn replacement_json(result: &ReplacementResult) -> serde_json::Value {
    serde_json::json!({
        "success": result.success,
        "strategy": result.strategy,
        "verification": result.verification,
        "error": result.error(),
    })
}

fn print_replacement(result: &ReplacementResult) {
    match result.strategy {
        Some(strategy) => println!(
            "Replaced via {strategy} (verification: {}).",
            result.verification
        ),
        None => println!("Replacement failed."),
    }
}

async fn handle_replace<A: AccessibilityApi>(bridge: &TextBridge<A>, text: &str) -> Result<()> {
    let Some(captured) = bridge.capture().await? else {
        bail!("no text captured; nothing to replace");
    };
    let result = bridge.replace(captured, text).await;
    print_replacement(&result);
    if let Some(error) = result.error() {
        bail!(error);
    }
    Ok(())
}

async fn handle_enhance<A: AccessibilityApi>(
    bridge: &TextBridge<A>,
    transform: &CommandTransform,
    options: EnhanceOptions,
    json: bool,
) -> Result<()> {
    let Some(outcome) = bridge.enhance_focused(transform, options).await? else {
        bail!("no text captured; nothing to enhance");
    };

    if json {
        let report = serde_json::json!({
            "capture": outcome.capture,
            "enhancement": outcome.enhancement,
            "replacement": replacement_json(&outcome.replacement),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Captured {} characters via {}; transform took {}ms.",
            outcome.capture.length,
            outcome.capture.method,
            outcome.enhancement.processing_time.as_millis()
        );
        print_replacement(&outcome.replacement);
    }

    if let Some(error) = outcome.replacement.error() {
        bail!(error);
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Timing]");
                println!("  Focus retries:      {}", config.timing.focus_retry_attempts);
                println!("  Bootstrap delay:    {}ms", config.timing.bootstrap_delay_ms);
                println!(
                    "  Slow bootstrap:     {}ms",
                    config.timing.slow_bootstrap_delay_ms
                );
                println!("  Copy wait:          {}ms", config.timing.copy_wait_ms);
                println!("  Paste settle:       {}ms", config.timing.paste_settle_ms);
                println!();
                println!("[Traversal]");
                println!("  Parent depth:       {}", config.traversal.max_parent_depth);
                println!("  Child depth:        {}", config.traversal.max_child_depth);
                println!("  Webview depth:      {}", config.traversal.max_webview_depth);
                println!();
                println!("[Classifier]");
                println!(
                    "  Extra browsers:     {}",
                    config.classifier.extra_browser_ids.len()
                );
                println!(
                    "  Extra electron:     {}",
                    config.classifier.extra_electron_ids.len()
                );
                println!(
                    "  Slow bootstrap ids: {}",
                    config.classifier.slow_bootstrap_ids.join(", ")
                );
                println!();
                println!("[Bootstrap]");
                println!(
                    "  Attributes:         {}",
                    config.bootstrap.enablement_attributes.join(", ")
                );
                println!("  Max attempts:       {}", config.bootstrap.max_attempts);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use textlift::{ReplaceFailure, ReplacementStrategy, Verification};

    use super::*;

    #[test]
    fn test_replacement_json_success() {
        let result = ReplacementResult {
            success: true,
            strategy: Some(ReplacementStrategy::SelectionReplace),
            verification: Verification::Matched,
            failure: None,
        };
        let json = replacement_json(&result);
        assert_eq!(json["success"], true);
        assert_eq!(json["strategy"], "selectionReplace");
        assert_eq!(json["verification"], "matched");
        assert!(json["error"].is_null());
    }

    #[test]
    fn test_replacement_json_failure() {
        let result = ReplacementResult {
            success: false,
            strategy: None,
            verification: Verification::Skipped,
            failure: Some(ReplaceFailure::FocusChanged {
                expected: 10,
                actual: Some(11),
            }),
        };
        let json = replacement_json(&result);
        assert_eq!(json["success"], false);
        assert!(json["strategy"].is_null());
        assert!(json["error"].as_str().is_some());
    }

    #[test]
    fn test_status_runs_with_defaults() {
        assert!(handle_status(&Config::default(), true).is_ok());
    }

    #[test]
    fn test_config_validate_rejects_bad_types() {
        let path = std::env::temp_dir().join(format!("textlift-cli-{}.toml", std::process::id()));
        std::fs::write(&path, "[traversal]\nmax_parent_depth = \"deep\"\n").unwrap();
        let result = handle_config(
            &Config::default(),
            ConfigCommand::Validate {
                file: Some(path.clone()),
            },
        );
        std::fs::remove_file(&path).unwrap();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_show_json() {
        assert!(handle_config(&Config::default(), ConfigCommand::Show { json: true }).is_ok());
    }
}

//! Text transform that pipes captured text through a shell command.

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use textlift::{EnhanceRequest, Enhancement, Error, Result, TextTransform};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Runs `sh -c <command>` with the text on stdin and takes stdout as the
/// replacement.
///
/// The mode is exported as `TEXTLIFT_MODE` and attachments as a
/// colon-separated `TEXTLIFT_ATTACHMENTS`. One trailing newline is stripped
/// from the output.
#[derive(Debug, Clone)]
pub struct CommandTransform {
    command: String,
}

impl CommandTransform {
    /// Create a transform for a shell command line.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

fn strip_newline(mut text: String) -> String {
    if text.ends_with('\n') {
        text.pop();
        if text.ends_with('\r') {
            text.pop();
        }
    }
    text
}

#[async_trait]
impl TextTransform for CommandTransform {
    async fn enhance(&self, request: EnhanceRequest) -> Result<Enhancement> {
        let started = Instant::now();
        let attachments = request
            .attachments
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(":");

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .env("TEXTLIFT_MODE", request.mode.as_deref().unwrap_or_default())
            .env("TEXTLIFT_ATTACHMENTS", attachments)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::transform(format!("failed to start `{}`: {e}", self.command)))?;

        // stdin is fed while stdout drains; a filter that echoes its input
        // would otherwise fill the pipe and block both sides.
        let stdin = child.stdin.take();
        let text = request.text;
        let feed = async move {
            match stdin {
                Some(mut stdin) => stdin.write_all(text.as_bytes()).await,
                None => Ok(()),
            }
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());

        let output = output
            .map_err(|e| Error::transform(format!("failed to wait for `{}`: {e}", self.command)))?;
        if let Err(e) = fed {
            if e.kind() != ErrorKind::BrokenPipe {
                return Err(Error::transform(format!("failed to write stdin: {e}")));
            }
            debug!(command = %self.command, "command exited before reading all input");
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::transform(format!(
                "`{}` exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        let enhanced_text = strip_newline(
            String::from_utf8(output.stdout)
                .map_err(|_| Error::transform("command output is not UTF-8"))?,
        );
        let processing_time = started.elapsed();
        debug!(
            command = %self.command,
            elapsed_ms = processing_time.as_millis(),
            "shell transform finished"
        );

        Ok(Enhancement {
            enhanced_text,
            provider: "exec".to_string(),
            tokens_used: None,
            processing_time,
        })
    }
}

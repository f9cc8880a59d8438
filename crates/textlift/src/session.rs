//! The capture → transform → replace round trip.
//!
//! [`TextBridge`] owns the desktop and the long-lived engine state
//! (classification cache, bootstrap set, permission gate). Each
//! [`TextBridge::enhance_focused`] call owns exactly one in-flight
//! [`CapturedText`] from capture until it is consumed by the replacement.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::bootstrap::ChromiumBootstrapper;
use crate::capture::{CaptureEngine, CaptureSummary, CapturedText};
use crate::category::{AppCategory, AppClassifier};
use crate::config::Config;
use crate::error::Result;
use crate::logging::content_digest;
use crate::permission::PermissionGate;
use crate::platform::{AccessibilityApi, Desktop, Pid, TrustProvider};
use crate::replace::{ReplacementEngine, ReplacementResult};

/// Input to a text transform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhanceRequest {
    /// The captured text.
    pub text: String,
    /// Files passed along with the text.
    pub attachments: Vec<PathBuf>,
    /// Transform mode, interpreted by the transform.
    pub mode: Option<String>,
}

/// Output of a text transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enhancement {
    /// Text to write back.
    pub enhanced_text: String,
    /// Name of whatever produced the text.
    pub provider: String,
    /// Tokens consumed, if the provider reports them.
    pub tokens_used: Option<u64>,
    /// Wall time spent in the transform.
    pub processing_time: Duration,
}

/// Turns captured text into replacement text.
#[async_trait]
pub trait TextTransform: Send + Sync {
    /// Transform one request.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transform` if the transform could not produce text.
    async fn enhance(&self, request: EnhanceRequest) -> Result<Enhancement>;
}

/// Options for [`TextBridge::enhance_focused`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnhanceOptions {
    /// Transform mode.
    pub mode: Option<String>,
    /// Files passed to the transform.
    pub attachments: Vec<PathBuf>,
}

/// Everything one round trip produced.
#[derive(Debug, Clone)]
pub struct EnhanceOutcome {
    /// What was captured.
    pub capture: CaptureSummary,
    /// What the transform returned.
    pub enhancement: Enhancement,
    /// How the write-back went.
    pub replacement: ReplacementResult,
}

/// Long-lived owner of the engines and their state.
pub struct TextBridge<A: AccessibilityApi> {
    desktop: Desktop<A>,
    config: Config,
    classifier: AppClassifier,
    bootstrapper: ChromiumBootstrapper,
    gate: PermissionGate,
}

impl<A: AccessibilityApi> TextBridge<A> {
    /// Assemble a bridge over a desktop.
    pub fn new(desktop: Desktop<A>, config: Config, trust: Arc<dyn TrustProvider>) -> Self {
        let classifier = AppClassifier::new(&config.classifier);
        let bootstrapper = ChromiumBootstrapper::new(&config);
        let gate = PermissionGate::new(trust, config.timing.permission_poll_interval());
        Self {
            desktop,
            config,
            classifier,
            bootstrapper,
            gate,
        }
    }

    /// The permission gate.
    #[must_use]
    pub fn gate(&self) -> &PermissionGate {
        &self.gate
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The platform collaborators.
    #[must_use]
    pub fn desktop(&self) -> &Desktop<A> {
        &self.desktop
    }

    /// Classify a process.
    pub fn classify(&self, pid: Pid) -> AppCategory {
        self.classifier.classify(pid, self.desktop.processes.as_ref())
    }

    /// Drop cached state about a process that exited.
    pub fn forget_process(&self, pid: Pid) {
        self.classifier.invalidate(pid);
        self.bootstrapper.forget(pid);
    }

    /// Capture the focused text.
    ///
    /// # Errors
    ///
    /// See [`CaptureEngine::capture`].
    pub async fn capture(&self) -> Result<Option<CapturedText<A::Element>>> {
        CaptureEngine::new(
            &self.desktop,
            &self.config,
            &self.classifier,
            &self.bootstrapper,
            &self.gate,
        )
        .capture()
        .await
    }

    /// Write `new_text` over a capture.
    pub async fn replace(&self, captured: CapturedText<A::Element>, new_text: &str) -> ReplacementResult {
        ReplacementEngine::new(&self.desktop, &self.config)
            .replace(captured, new_text)
            .await
    }

    /// Capture, transform and replace the focused text.
    ///
    /// Returns `Ok(None)` if nothing was captured; the transform is not
    /// called in that case.
    ///
    /// # Errors
    ///
    /// Returns capture errors and transform errors. A failed write-back is
    /// not an error; it is reported in the outcome's replacement result.
    #[instrument(skip_all, fields(mode = options.mode.as_deref().unwrap_or("default")))]
    pub async fn enhance_focused(
        &self,
        transform: &dyn TextTransform,
        options: EnhanceOptions,
    ) -> Result<Option<EnhanceOutcome>> {
        self.gate.require()?;

        let Some(captured) = self.capture().await? else {
            info!("Nothing captured; transform not called");
            return Ok(None);
        };
        let summary = captured.summary();

        let enhancement = transform
            .enhance(EnhanceRequest {
                text: captured.content.clone(),
                attachments: options.attachments,
                mode: options.mode,
            })
            .await?;
        info!(
            provider = %enhancement.provider,
            tokens = enhancement.tokens_used,
            elapsed_ms = enhancement.processing_time.as_millis(),
            hash = %content_digest(&enhancement.enhanced_text),
            "Transform finished"
        );

        let replacement = self.replace(captured, &enhancement.enhanced_text).await;

        Ok(Some(EnhanceOutcome {
            capture: summary,
            enhancement,
            replacement,
        }))
    }
}

impl<A: AccessibilityApi> std::fmt::Debug for TextBridge<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextBridge")
            .field("config", &self.config)
            .field("classifier", &self.classifier)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

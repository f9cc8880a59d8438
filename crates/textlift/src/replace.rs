//! Writing text back into the captured control.
//!
//! [`ReplacementEngine::replace`] consumes a [`CapturedText`] and tries four
//! write strategies in order. The first one that reports success ends the
//! attempt: running another after a successful write would insert the text
//! twice. Nothing is written at all if focus has moved to another process.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::capture::CapturedText;
use crate::clipboard::ClipboardGuard;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::logging::content_digest;
use crate::platform::{attr, AccessibilityApi, Desktop, KeyChord, Pid};

/// Write strategies, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReplacementStrategy {
    /// Set the value attribute, splicing into the captured value.
    DirectValueSet,
    /// Set the selected-text attribute.
    SelectionReplace,
    /// Re-read the value and splice into the fresh copy.
    RangeBasedUpdate,
    /// Paste through the clipboard.
    ClipboardPaste,
}

const STRATEGIES: [ReplacementStrategy; 4] = [
    ReplacementStrategy::DirectValueSet,
    ReplacementStrategy::SelectionReplace,
    ReplacementStrategy::RangeBasedUpdate,
    ReplacementStrategy::ClipboardPaste,
];

impl fmt::Display for ReplacementStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DirectValueSet => "directValueSet",
            Self::SelectionReplace => "selectionReplace",
            Self::RangeBasedUpdate => "rangeBasedUpdate",
            Self::ClipboardPaste => "clipboardPaste",
        };
        f.write_str(name)
    }
}

/// Result of reading the element back after a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verification {
    /// The element now shows the new text.
    Matched,
    /// An attribute write was accepted but the element does not show it.
    Mismatched,
    /// A paste was sent; the element does not expose enough to confirm it.
    Unconfirmed,
    /// Nothing could be read back, or nothing was written.
    Skipped,
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Matched => "matched",
            Self::Mismatched => "mismatched",
            Self::Unconfirmed => "unconfirmed",
            Self::Skipped => "skipped",
        };
        f.write_str(name)
    }
}

/// Why a replacement did not happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaceFailure {
    /// Focus moved to another process after capture.
    FocusChanged {
        /// Process the text was captured from.
        expected: Pid,
        /// Process holding focus now.
        actual: Option<Pid>,
    },
    /// Every strategy was rejected.
    AllStrategiesFailed {
        /// One entry per strategy.
        attempts: Vec<String>,
    },
}

impl ReplaceFailure {
    /// The equivalent crate error.
    #[must_use]
    pub fn to_error(&self) -> Error {
        match self {
            Self::FocusChanged { expected, actual } => Error::FocusChanged {
                expected: *expected,
                actual: *actual,
            },
            Self::AllStrategiesFailed { attempts } => Error::AllStrategiesFailed {
                attempts: attempts.clone(),
            },
        }
    }
}

impl fmt::Display for ReplaceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_error())
    }
}

/// Outcome of one replacement call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementResult {
    /// Whether some strategy wrote the text.
    pub success: bool,
    /// The strategy that wrote it.
    pub strategy: Option<ReplacementStrategy>,
    /// What reading back showed.
    pub verification: Verification,
    /// Why nothing was written.
    pub failure: Option<ReplaceFailure>,
}

impl ReplacementResult {
    fn applied(strategy: ReplacementStrategy, verification: Verification) -> Self {
        Self {
            success: true,
            strategy: Some(strategy),
            verification,
            failure: None,
        }
    }

    fn failed(failure: ReplaceFailure) -> Self {
        Self {
            success: false,
            strategy: None,
            verification: Verification::Skipped,
            failure: Some(failure),
        }
    }

    /// Whether the element was read back showing the new text.
    #[must_use]
    pub fn verified(&self) -> bool {
        self.verification == Verification::Matched
    }

    /// Failure message, if the replacement failed.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.failure.as_ref().map(ToString::to_string)
    }

    /// Convert into a `Result`, keeping the winning strategy.
    ///
    /// # Errors
    ///
    /// Returns `FocusChanged` or `AllStrategiesFailed` for failed calls.
    pub fn into_result(self) -> Result<ReplacementStrategy> {
        match (self.strategy, self.failure) {
            (Some(strategy), _) => Ok(strategy),
            (None, Some(failure)) => Err(failure.to_error()),
            (None, None) => Err(Error::AllStrategiesFailed { attempts: Vec::new() }),
        }
    }
}

/// What one strategy did.
enum Attempt {
    /// The text was written. `expected` is the full value it should produce.
    Applied { expected: Option<String> },
    /// The strategy does not apply to this element.
    Skipped(&'static str),
}

/// Runs the replacement algorithm against a desktop.
pub struct ReplacementEngine<'a, A: AccessibilityApi> {
    desktop: &'a Desktop<A>,
    config: &'a Config,
}

impl<'a, A: AccessibilityApi> ReplacementEngine<'a, A> {
    /// Borrow the collaborators.
    pub fn new(desktop: &'a Desktop<A>, config: &'a Config) -> Self {
        Self { desktop, config }
    }

    /// Replace the captured text with `new_text`.
    pub async fn replace(&self, captured: CapturedText<A::Element>, new_text: &str) -> ReplacementResult {
        let element = match self.resolve_target(&captured) {
            Ok(element) => element,
            Err(failure) => {
                warn!(pid = captured.source_pid, %failure, "Replacement aborted");
                return ReplacementResult::failed(failure);
            }
        };

        let mut attempts = Vec::new();
        for strategy in STRATEGIES {
            match self.attempt(strategy, &element, &captured, new_text).await {
                Ok(Attempt::Applied { expected }) => {
                    let verification = self
                        .verify(strategy, &element, new_text, expected.as_deref())
                        .await;
                    info!(
                        pid = captured.source_pid,
                        %strategy,
                        ?verification,
                        len = new_text.chars().count(),
                        hash = %content_digest(new_text),
                        "Replaced text"
                    );
                    return ReplacementResult::applied(strategy, verification);
                }
                Ok(Attempt::Skipped(reason)) => {
                    debug!(%strategy, reason, "Replacement strategy skipped");
                    attempts.push(format!("{strategy}: {reason}"));
                }
                Err(e) => {
                    debug!(%strategy, error = %e, "Replacement strategy failed");
                    attempts.push(format!("{strategy}: {e}"));
                }
            }
        }

        let failure = ReplaceFailure::AllStrategiesFailed { attempts };
        warn!(pid = captured.source_pid, %failure, "Replacement failed");
        ReplacementResult::failed(failure)
    }

    /// Check that focus is still in the captured process and pick the
    /// element to write to.
    fn resolve_target(&self, captured: &CapturedText<A::Element>) -> std::result::Result<A::Element, ReplaceFailure> {
        let ax = &self.desktop.ax;
        let current = ax.system_focused_element();

        if current.as_ref() == Some(&captured.source_element) && ax.is_valid(&captured.source_element) {
            return Ok(captured.source_element.clone());
        }

        let current_pid = current
            .as_ref()
            .and_then(|el| ax.pid(el))
            .or_else(|| self.desktop.processes.frontmost_pid());
        if current_pid != Some(captured.source_pid) {
            return Err(ReplaceFailure::FocusChanged {
                expected: captured.source_pid,
                actual: current_pid,
            });
        }

        if ax.is_valid(&captured.source_element) {
            return Ok(captured.source_element.clone());
        }
        match current {
            Some(element) => {
                debug!(pid = captured.source_pid, "Captured element is gone; writing to the focused element");
                Ok(element)
            }
            None => Ok(captured.source_element.clone()),
        }
    }

    async fn attempt(
        &self,
        strategy: ReplacementStrategy,
        element: &A::Element,
        captured: &CapturedText<A::Element>,
        new_text: &str,
    ) -> Result<Attempt> {
        match strategy {
            ReplacementStrategy::DirectValueSet => self.direct_value_set(element, captured, new_text),
            ReplacementStrategy::SelectionReplace => self.selection_replace(element, captured, new_text),
            ReplacementStrategy::RangeBasedUpdate => self.range_based_update(element, captured, new_text),
            ReplacementStrategy::ClipboardPaste => self.clipboard_paste(captured, new_text).await,
        }
    }

    fn direct_value_set(
        &self,
        element: &A::Element,
        captured: &CapturedText<A::Element>,
        new_text: &str,
    ) -> Result<Attempt> {
        let ax = &self.desktop.ax;
        if !ax.is_settable(element, attr::VALUE) {
            return Ok(Attempt::Skipped("value not settable"));
        }

        let value = if captured.had_selection {
            match (captured.selected_range, captured.surrounding_value.as_deref()) {
                (Some(range), Some(surrounding)) => range.splice(surrounding, new_text),
                _ => return Ok(Attempt::Skipped("selection without a captured value and range")),
            }
        } else {
            new_text.to_string()
        };

        ax.set_string_attribute(element, attr::VALUE, &value)?;
        Ok(Attempt::Applied {
            expected: Some(value),
        })
    }

    fn selection_replace(
        &self,
        element: &A::Element,
        captured: &CapturedText<A::Element>,
        new_text: &str,
    ) -> Result<Attempt> {
        if !captured.had_selection {
            return Ok(Attempt::Skipped("no selection recorded"));
        }
        let ax = &self.desktop.ax;
        if !ax.is_settable(element, attr::SELECTED_TEXT) {
            return Ok(Attempt::Skipped("selected text not settable"));
        }

        ax.set_string_attribute(element, attr::SELECTED_TEXT, new_text)?;
        Ok(Attempt::Applied { expected: None })
    }

    fn range_based_update(
        &self,
        element: &A::Element,
        captured: &CapturedText<A::Element>,
        new_text: &str,
    ) -> Result<Attempt> {
        let ax = &self.desktop.ax;

        let value = if captured.had_selection {
            let Some(range) = captured.selected_range else {
                return Ok(Attempt::Skipped("selection without a range"));
            };
            let Some(current) = ax.string_attribute(element, attr::VALUE) else {
                return Ok(Attempt::Skipped("value not readable"));
            };
            range.splice(&current, new_text)
        } else {
            new_text.to_string()
        };

        ax.set_string_attribute(element, attr::VALUE, &value)?;
        Ok(Attempt::Applied {
            expected: Some(value),
        })
    }

    async fn clipboard_paste(&self, captured: &CapturedText<A::Element>, new_text: &str) -> Result<Attempt> {
        let timing = &self.config.timing;
        let keys = &self.desktop.keys;

        let mut guard = ClipboardGuard::acquire(self.desktop.clipboard.as_ref())?;
        guard.set_text(new_text)?;

        if !self.desktop.processes.activate(captured.source_pid) {
            warn!(pid = captured.source_pid, "Could not activate target process");
        }

        if !captured.had_selection {
            keys.send(KeyChord::SelectAll)?;
            tokio::time::sleep(timing.select_all_delay()).await;
        }
        keys.send(KeyChord::Paste)?;
        tokio::time::sleep(timing.paste_settle()).await;

        if let Err(e) = guard.restore() {
            warn!(error = %e, "Failed to restore clipboard after paste");
        }

        let expected = if captured.had_selection {
            captured
                .selected_range
                .zip(captured.surrounding_value.as_deref())
                .map(|(range, value)| range.splice(value, new_text))
        } else {
            Some(new_text.to_string())
        };
        Ok(Attempt::Applied { expected })
    }

    /// Read the element back and compare with what was written.
    async fn verify(
        &self,
        strategy: ReplacementStrategy,
        element: &A::Element,
        new_text: &str,
        expected: Option<&str>,
    ) -> Verification {
        tokio::time::sleep(self.config.timing.verify_delay()).await;
        let ax = &self.desktop.ax;

        let selected = ax.string_attribute(element, attr::SELECTED_TEXT);
        let value = ax.string_attribute(element, attr::VALUE);
        if selected.is_none() && value.is_none() {
            return Verification::Skipped;
        }

        let matched = selected.as_deref() == Some(new_text)
            || expected.is_some_and(|e| value.as_deref() == Some(e));

        if matched {
            Verification::Matched
        } else if strategy == ReplacementStrategy::ClipboardPaste {
            Verification::Unconfirmed
        } else {
            Verification::Mismatched
        }
    }
}

impl<A: AccessibilityApi> fmt::Debug for ReplacementEngine<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplacementEngine")
            .field("timing", &self.config.timing)
            .finish_non_exhaustive()
    }
}

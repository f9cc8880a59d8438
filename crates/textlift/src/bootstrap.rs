//! Chromium accessibility bootstrap.
//!
//! Chromium keeps its accessibility tree dormant until a client asks for it.
//! Setting the enablement attributes on the application element makes it
//! build the tree, which takes a moment, so the first call per process waits
//! before returning.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::platform::{attr, AccessibilityApi, Desktop, Pid};

/// What [`ChromiumBootstrapper::ensure`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// Attributes were set for the first time; `accepted` of them took.
    Enabled {
        /// Number of enablement attributes the process accepted.
        accepted: usize,
    },
    /// The process was bootstrapped earlier; only liveness was probed.
    AlreadyEnabled {
        /// Whether the focused element was readable.
        live: bool,
    },
    /// The process exposes no application element.
    Unavailable,
}

/// Switches on Chromium accessibility once per process.
#[derive(Debug)]
pub struct ChromiumBootstrapper {
    attributes: Vec<String>,
    slow_ids: Vec<String>,
    delay: Duration,
    slow_delay: Duration,
    backoff: Duration,
    visited: Mutex<HashSet<Pid>>,
}

impl ChromiumBootstrapper {
    /// Create a bootstrapper from configuration.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            attributes: config.bootstrap.enablement_attributes.clone(),
            slow_ids: config.classifier.slow_bootstrap_ids.clone(),
            delay: config.timing.bootstrap_delay(false),
            slow_delay: config.timing.bootstrap_delay(true),
            backoff: config.timing.bootstrap_backoff(),
            visited: Mutex::new(HashSet::new()),
        }
    }

    /// Enable accessibility for `pid` if that has not happened yet.
    ///
    /// Each attribute is set independently: Chromium builds differ in which
    /// ones they honor, so a rejected attribute does not stop the others.
    pub async fn ensure<A: AccessibilityApi>(&self, desktop: &Desktop<A>, pid: Pid) -> BootstrapOutcome {
        if self.is_bootstrapped(pid) {
            let live = self.validate(&desktop.ax, pid);
            debug!(pid, live, "Chromium accessibility already enabled");
            return BootstrapOutcome::AlreadyEnabled { live };
        }

        let Some(app) = desktop.ax.application(pid) else {
            warn!(pid, "No application element to bootstrap");
            return BootstrapOutcome::Unavailable;
        };
        self.visited_set().insert(pid);

        let mut accepted = 0;
        for attribute in &self.attributes {
            match desktop.ax.set_bool_attribute(&app, attribute, true) {
                Ok(()) => accepted += 1,
                Err(e) => debug!(pid, attribute = %attribute, error = %e, "Enablement attribute rejected"),
            }
        }

        let slow = self.is_slow(desktop, pid);
        let delay = if slow { self.slow_delay } else { self.delay };
        info!(pid, accepted, slow, delay_ms = delay.as_millis(), "Enabled Chromium accessibility");
        tokio::time::sleep(delay).await;

        BootstrapOutcome::Enabled { accepted }
    }

    /// Liveness probe: can the process's focused element be read?
    pub fn validate<A: AccessibilityApi>(&self, ax: &A, pid: Pid) -> bool {
        ax.application(pid)
            .and_then(|app| ax.element_attribute(&app, attr::FOCUSED_UI_ELEMENT))
            .is_some()
    }

    /// Run `operation` up to `max_attempts` times, bootstrapping before each
    /// try, and return its first `Some`.
    pub async fn with_retry<A, T, F>(
        &self,
        desktop: &Desktop<A>,
        pid: Pid,
        max_attempts: u32,
        mut operation: F,
    ) -> Option<T>
    where
        A: AccessibilityApi,
        F: FnMut() -> Option<T>,
    {
        for attempt in 1..=max_attempts {
            self.ensure(desktop, pid).await;
            if let Some(value) = operation() {
                return Some(value);
            }
            debug!(pid, attempt, max_attempts, "Bootstrap retry came up empty");
            if attempt < max_attempts {
                tokio::time::sleep(self.backoff).await;
            }
        }
        None
    }

    /// Whether `pid` was bootstrapped.
    #[must_use]
    pub fn is_bootstrapped(&self, pid: Pid) -> bool {
        self.visited_set().contains(&pid)
    }

    /// Forget a process, e.g. after it exited.
    pub fn forget(&self, pid: Pid) {
        self.visited_set().remove(&pid);
    }

    /// Forget every process.
    pub fn reset(&self) {
        self.visited_set().clear();
    }

    fn is_slow<A: AccessibilityApi>(&self, desktop: &Desktop<A>, pid: Pid) -> bool {
        desktop
            .processes
            .bundle_identifier(pid)
            .is_some_and(|id| self.slow_ids.iter().any(|s| id == *s || id.contains(s.as_str())))
    }

    fn visited_set(&self) -> MutexGuard<'_, HashSet<Pid>> {
        self.visited.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

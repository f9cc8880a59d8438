//! Automation permission tracking.
//!
//! Reading other processes' accessibility trees needs the user's consent.
//! [`PermissionGate`] answers "is it granted right now" against the live
//! platform state and, after a consent prompt, polls in the background until
//! the user flips the switch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::platform::TrustProvider;

/// Instructions shown when the permission is missing.
#[must_use]
pub fn permission_instructions() -> &'static str {
    r"To let textlift read and replace text in other applications:

1. Open System Settings
2. Go to Privacy & Security > Accessibility
3. Enable the terminal or application that runs textlift
4. If it is not listed, click '+' and add it

Run 'textlift permission check' to confirm."
}

/// Cached permission state plus the single outstanding poll task.
pub struct PermissionGate {
    trust: Arc<dyn TrustProvider>,
    granted: Arc<AtomicBool>,
    poll: Mutex<Option<JoinHandle<()>>>,
    interval: Duration,
}

impl PermissionGate {
    /// Create a gate that polls `trust` every `interval` after a request.
    pub fn new(trust: Arc<dyn TrustProvider>, interval: Duration) -> Self {
        let granted = Arc::new(AtomicBool::new(trust.is_trusted()));
        Self {
            trust,
            granted,
            poll: Mutex::new(None),
            interval,
        }
    }

    /// Live check against the platform; refreshes the cached flag.
    #[must_use]
    pub fn is_granted(&self) -> bool {
        let live = self.trust.is_trusted();
        self.granted.store(live, Ordering::SeqCst);
        live
    }

    /// The flag as last observed by a check or by the poll.
    #[must_use]
    pub fn cached(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    /// Fail with [`Error::PermissionDenied`] unless permission is granted.
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` carrying user instructions.
    pub fn require(&self) -> Result<()> {
        if self.is_granted() {
            Ok(())
        } else {
            Err(Error::permission_denied(permission_instructions()))
        }
    }

    /// Show the consent prompt and, unless already trusted, start polling.
    ///
    /// Any poll still running from an earlier request is cancelled first.
    /// Returns the trust state at the time of the prompt.
    pub fn request_permission(&self) -> bool {
        if self.trust.prompt() {
            self.granted.store(true, Ordering::SeqCst);
            self.cancel();
            return true;
        }
        self.start_poll();
        false
    }

    /// Stop the background poll, if any.
    pub fn cancel(&self) {
        if let Some(handle) = self.poll_slot().take() {
            handle.abort();
            debug!("Permission poll cancelled");
        }
    }

    /// Whether a poll task is still running.
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.poll_slot().as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Wait until permission is granted, checking at the poll interval.
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub async fn wait_until_granted(&self, timeout: Duration) -> bool {
        let wait = async {
            loop {
                if self.is_granted() {
                    return;
                }
                tokio::time::sleep(self.interval).await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }

    fn start_poll(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime; permission poll not started");
            return;
        };

        let trust = Arc::clone(&self.trust);
        let granted = Arc::clone(&self.granted);
        let period = self.interval;

        let mut slot = self.poll_slot();
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        *slot = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if trust.is_trusted() {
                    granted.store(true, Ordering::SeqCst);
                    info!("Accessibility permission granted");
                    break;
                }
            }
        }));
        debug!(interval_ms = period.as_millis(), "Permission poll started");
    }

    fn poll_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.poll.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for PermissionGate {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionGate")
            .field("granted", &self.cached())
            .field("polling", &self.is_polling())
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

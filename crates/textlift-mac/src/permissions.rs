//! Accessibility trust checks for the running process.
//!
//! Reading or writing another application's controls requires the process
//! (or the terminal hosting it) to be listed under Privacy & Security >
//! Accessibility.

use macos_accessibility_client::accessibility;
use textlift::TrustProvider;

/// Snapshot of the accessibility permission state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionStatus {
    /// Whether the process is currently trusted.
    pub is_granted: bool,

    /// Human-readable description of the status.
    pub description: String,
}

impl PermissionStatus {
    /// Status for a trusted process.
    #[must_use]
    pub fn granted() -> Self {
        Self {
            is_granted: true,
            description: "Accessibility permission is granted".to_string(),
        }
    }

    /// Status for an untrusted process.
    #[must_use]
    pub fn not_granted() -> Self {
        Self {
            is_granted: false,
            description: "Accessibility permission is not granted".to_string(),
        }
    }
}

/// Current permission status.
#[must_use]
pub fn check_permission() -> PermissionStatus {
    if accessibility::application_is_trusted() {
        PermissionStatus::granted()
    } else {
        PermissionStatus::not_granted()
    }
}

/// [`TrustProvider`] backed by the system trust database.
#[derive(Debug, Default, Clone, Copy)]
pub struct MacTrust;

impl MacTrust {
    /// Create a trust provider.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TrustProvider for MacTrust {
    fn is_trusted(&self) -> bool {
        accessibility::application_is_trusted()
    }

    /// Shows the system prompt that links to the Accessibility pane. The
    /// user still has to enable the entry by hand.
    fn prompt(&self) -> bool {
        accessibility::application_is_trusted_with_prompt()
    }
}

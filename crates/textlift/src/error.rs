//! Error types for textlift.
//!
//! This module defines the error taxonomy shared by the capture engine, the
//! replacement engine and the platform backends.

use thiserror::Error;

use crate::platform::Pid;

/// The main error type for textlift operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Capture / Replace Errors ===
    /// The automation (accessibility) permission is not granted.
    #[error("accessibility permission not granted. {instructions}")]
    PermissionDenied {
        /// Instructions for granting the permission.
        instructions: String,
    },

    /// No focused element could be resolved through any fallback path.
    #[error("no focus target")]
    NoFocusTarget,

    /// The focus moved to another process between capture and replacement.
    #[error("focus changed: captured in pid {expected}, now {}", display_pid(.actual))]
    FocusChanged {
        /// Process that owned the captured element.
        expected: Pid,
        /// Process holding focus at replacement time, if resolvable.
        actual: Option<Pid>,
    },

    /// Every replacement strategy rejected the element.
    #[error("all replacement strategies failed: {}", .attempts.join("; "))]
    AllStrategiesFailed {
        /// One line per attempted strategy describing why it failed.
        attempts: Vec<String>,
    },

    // === Platform Errors ===
    /// Clipboard access failed.
    #[error("clipboard error: {0}")]
    Clipboard(String),

    /// Posting a synthesized key chord failed.
    #[error("key synthesis failed: {0}")]
    KeySynthesis(String),

    /// Writing an accessibility attribute failed.
    #[error("failed to set {attribute}: {message}")]
    AttributeWrite {
        /// The attribute that was being written.
        attribute: String,
        /// Description of what went wrong.
        message: String,
    },

    /// Platform-specific operation failed.
    #[error("platform error: {0}")]
    Platform(String),

    // === Orchestration Errors ===
    /// The external text transform failed.
    #[error("transform failed: {0}")]
    Transform(String),

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },
}

/// A specialized Result type for textlift operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

#[allow(clippy::ref_option)]
fn display_pid(pid: &Option<Pid>) -> String {
    pid.map_or_else(|| "unknown".to_string(), |p| format!("pid {p}"))
}

impl Error {
    /// Create a new platform error.
    #[must_use]
    pub fn platform(message: impl Into<String>) -> Self {
        Self::Platform(message.into())
    }

    /// Create a new clipboard error.
    #[must_use]
    pub fn clipboard(message: impl Into<String>) -> Self {
        Self::Clipboard(message.into())
    }

    /// Create a new key synthesis error.
    #[must_use]
    pub fn key_synthesis(message: impl Into<String>) -> Self {
        Self::KeySynthesis(message.into())
    }

    /// Create a new transform error.
    #[must_use]
    pub fn transform(message: impl Into<String>) -> Self {
        Self::Transform(message.into())
    }

    /// Create an attribute write error.
    #[must_use]
    pub fn attribute_write(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AttributeWrite {
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    /// Create a permission denied error with instructions.
    #[must_use]
    pub fn permission_denied(instructions: impl Into<String>) -> Self {
        Self::PermissionDenied {
            instructions: instructions.into(),
        }
    }

    /// Check if this error is a permission issue.
    #[must_use]
    pub fn is_permission_error(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }

    /// Check if this error means nothing was focused.
    #[must_use]
    pub fn is_no_focus_target(&self) -> bool {
        matches!(self, Self::NoFocusTarget)
    }

    /// Check if this error aborted a write because focus moved.
    #[must_use]
    pub fn is_focus_changed(&self) -> bool {
        matches!(self, Self::FocusChanged { .. })
    }
}

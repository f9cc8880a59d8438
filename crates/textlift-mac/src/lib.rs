//! macOS backend for `textlift`.
//!
//! Implements the platform seams of [`textlift::platform`] with the AX API,
//! the general pasteboard, Core Graphics key events and the usual command
//! line tools for process lookup.

#![cfg(target_os = "macos")]
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod accessibility;
pub mod clipboard;
pub mod keys;
pub mod permissions;
pub mod process;

use textlift::Desktop;

pub use accessibility::{MacAccessibility, MacElement};
pub use clipboard::MacClipboard;
pub use keys::MacKeyboard;
pub use permissions::{check_permission, MacTrust, PermissionStatus};
pub use process::MacProcesses;

/// Assemble the live desktop.
#[must_use]
pub fn desktop() -> Desktop<MacAccessibility> {
    tracing::debug!("assembling macOS desktop backend");
    Desktop::new(
        MacAccessibility::new(),
        Box::new(MacClipboard::new()),
        Box::new(MacKeyboard::new()),
        Box::new(MacProcesses::new()),
    )
}

/// Get the platform name.
#[must_use]
pub fn platform_name() -> &'static str {
    "macOS"
}

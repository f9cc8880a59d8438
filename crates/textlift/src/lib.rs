//! `textlift` - capture and replace the focused text of any application
//!
//! This library locates the control holding keyboard focus in another
//! process, reads its selected text (or whole value), and later writes new
//! text back into it. It works through the platform accessibility tree,
//! falls back to the clipboard where that tree is incomplete, and never
//! leaves the user's clipboard changed.
//!
//! The platform itself is reached only through the traits in [`platform`];
//! `textlift-mac` provides the macOS implementation.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod bootstrap;
pub mod capture;
pub mod category;
pub mod clipboard;
pub mod config;
pub mod error;
pub mod logging;
pub mod permission;
pub mod platform;
pub mod replace;
pub mod roles;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use bootstrap::{BootstrapOutcome, ChromiumBootstrapper};
pub use capture::{CaptureEngine, CaptureMethod, CaptureSummary, CapturedText};
pub use category::{detect_webview, AppCategory, AppClassifier};
pub use clipboard::ClipboardGuard;
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use permission::{permission_instructions, PermissionGate};
pub use platform::{
    AccessibilityApi, ClipboardAccess, Desktop, KeyChord, KeySynthesizer, Pid, ProcessInspector,
    TextRange, TrustProvider,
};
pub use replace::{
    ReplaceFailure, ReplacementEngine, ReplacementResult, ReplacementStrategy, Verification,
};
pub use session::{EnhanceOptions, EnhanceOutcome, EnhanceRequest, Enhancement, TextBridge, TextTransform};

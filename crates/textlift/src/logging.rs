//! Logging setup shared by the textlift crates.
//!
//! Captured text is user content: log statements across the crate record its
//! length and [`content_digest`], never the text itself.

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Crates whose events pass the verbosity filter.
const TARGETS: [&str; 3] = ["textlift", "textlift_mac", "textlift_cli"];

/// Environment variables consulted for a filter override, first match wins.
const FILTER_VARS: [&str; 2] = ["TEXTLIFT_LOG", "RUST_LOG"];

/// How much the CLI reports on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Info and above.
    #[default]
    Normal,
    /// Per-layer capture and per-strategy replacement decisions.
    Verbose,
    /// Every accessibility read and write.
    Trace,
}

impl Verbosity {
    /// Map a `-v` count and `--quiet` flag onto a verbosity.
    #[must_use]
    pub fn from_flags(verbose: u8, quiet: bool) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Trace,
        }
    }

    /// Most detailed level our crates emit.
    #[must_use]
    pub fn level(self) -> LevelFilter {
        match self {
            Self::Quiet => LevelFilter::ERROR,
            Self::Normal => LevelFilter::INFO,
            Self::Verbose => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }

    /// Filter directive enabling our crates at this level and silencing
    /// dependencies below warn.
    #[must_use]
    pub fn directive(self) -> String {
        let level = self.level();
        let mut directive = String::from("warn");
        for target in TARGETS {
            directive.push_str(&format!(",{target}={level}"));
        }
        directive
    }
}

/// Build the event filter.
///
/// A non-empty `over` is parsed as a full `EnvFilter` directive; when it is
/// absent or fails to parse, `verbosity` decides.
fn build_filter(verbosity: Verbosity, over: Option<&str>) -> EnvFilter {
    over.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| EnvFilter::try_new(s).ok())
        .unwrap_or_else(|| EnvFilter::new(verbosity.directive()))
}

fn filter_override() -> Option<String> {
    FILTER_VARS.iter().find_map(|var| std::env::var(var).ok())
}

/// Install the global subscriber.
///
/// `TEXTLIFT_LOG`, then `RUST_LOG`, override `verbosity` when set. Events go
/// to stderr so that stdout stays machine-readable for `--json`. Calling this
/// more than once keeps the first subscriber.
///
/// # Examples
///
/// ```no_run
/// use textlift::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let filter = build_filter(verbosity, filter_override().as_deref());
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbosity >= Verbosity::Verbose)
        .compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init();
}

/// Short, stable digest of user text for log lines.
#[must_use]
pub fn content_digest(text: &str) -> String {
    let hash = blake3::hash(text.as_bytes()).to_hex();
    hash[..12].to_string()
}

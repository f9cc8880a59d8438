//! Application category classification.
//!
//! Accessibility support differs wildly between toolkits, so the engines
//! pick their fallbacks by the kind of app that owns the focused element.
//! Classification uses static signatures only (bundle identifier, executable
//! path, bundled frameworks) and never fails: anything unresolvable is
//! [`AppCategory::Unknown`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ClassifierConfig;
use crate::platform::{AccessibilityApi, Pid, ProcessInspector};
use crate::roles;

/// Kind of UI toolkit behind a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppCategory {
    /// Native toolkit controls.
    Native,
    /// A web browser.
    Browser,
    /// An app embedding Chromium (Electron, CEF).
    Electron,
    /// Web content hosted inside a native app.
    Webview,
    /// A Java runtime (Swing, JavaFX, JetBrains IDEs).
    Java,
    /// A Qt application.
    Qt,
    /// Nothing could be determined.
    Unknown,
}

impl AppCategory {
    /// Whether Chromium accessibility must be switched on before reading.
    #[must_use]
    pub fn needs_bootstrap(self) -> bool {
        self == Self::Electron
    }

    /// Whether selections are better read by slicing the value with the
    /// reported range.
    #[must_use]
    pub fn uses_web_ranges(self) -> bool {
        matches!(self, Self::Browser | Self::Webview | Self::Electron)
    }

    /// Whether focus may be recovered by searching the app's own tree.
    #[must_use]
    pub fn searches_app_tree(self) -> bool {
        matches!(self, Self::Browser | Self::Native)
    }

    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Browser => "browser",
            Self::Electron => "electron",
            Self::Webview => "webview",
            Self::Java => "java",
            Self::Qt => "qt",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for AppCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Browser identifiers, matched as prefixes.
const BROWSER_IDS: &[&str] = &[
    "com.apple.Safari",
    "com.apple.SafariTechnologyPreview",
    "com.google.Chrome",
    "org.mozilla.firefox",
    "com.microsoft.edgemac",
    "com.brave.Browser",
    "company.thebrowser.Browser",
    "com.operasoftware.Opera",
    "com.vivaldi.Vivaldi",
    "org.chromium.Chromium",
];

/// Chromium-embedded app identifiers, matched exactly or as substrings.
const ELECTRON_IDS: &[&str] = &[
    "com.tinyspeck.slackmacgap",
    "com.microsoft.teams",
    "com.hnc.Discord",
    "com.skype.skype",
    "com.microsoft.VSCode",
    "com.visualstudio.code.oss",
    "com.todesktop",
    "notion.id",
    "md.obsidian",
    "com.linear",
    "com.figma.Desktop",
    "com.spotify.client",
    "com.1password.1password",
    "com.bitwarden.desktop",
    "com.postmanlabs.mac",
    "com.whatsapp.WhatsApp",
    "com.signal.Signal",
    "com.typora.typora",
    "com.github.GitHubClient",
];

/// Bundled frameworks that give away an embedded Chromium.
const CHROMIUM_FRAMEWORKS: &[&str] = &[
    "Electron Framework.framework",
    "Chromium Embedded Framework.framework",
];

/// Identifier fragments of Java applications.
const JAVA_ID_MARKERS: &[&str] = &["jetbrains", "java", "eclipse", "netbeans"];

/// Bundled entries of an embedded Java runtime.
const JAVA_BUNDLE_MARKERS: &[&str] = &["Java.runtime", ".jdk", "jre", "jbr"];

/// Caching classifier keyed by process id.
///
/// Entries live until [`AppClassifier::invalidate`] or
/// [`AppClassifier::clear`]; a pid is assumed to name the same program for
/// its whole lifetime.
#[derive(Debug)]
pub struct AppClassifier {
    browser_ids: Vec<String>,
    electron_ids: Vec<String>,
    java_paths: Vec<Regex>,
    cache: Mutex<HashMap<Pid, AppCategory>>,
}

impl AppClassifier {
    /// Build a classifier from the built-in tables plus configured extras.
    #[must_use]
    pub fn new(config: &ClassifierConfig) -> Self {
        let browser_ids = BROWSER_IDS
            .iter()
            .map(|s| (*s).to_string())
            .chain(config.extra_browser_ids.iter().cloned())
            .collect();
        let electron_ids = ELECTRON_IDS
            .iter()
            .map(|s| (*s).to_string())
            .chain(config.extra_electron_ids.iter().cloned())
            .collect();
        let java_paths = config
            .java_path_patterns
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(pattern = %p, error = %e, "Skipping invalid Java path pattern");
                    None
                }
            })
            .collect();

        Self {
            browser_ids,
            electron_ids,
            java_paths,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Classify a process, consulting the cache first.
    pub fn classify(&self, pid: Pid, processes: &dyn ProcessInspector) -> AppCategory {
        if let Some(&cached) = self.lock().get(&pid) {
            return cached;
        }

        let category = self.classify_uncached(pid, processes);
        debug!(pid, %category, "Classified process");
        self.lock().insert(pid, category);
        category
    }

    /// The cached category of a process, if it was classified before.
    #[must_use]
    pub fn cached(&self, pid: Pid) -> Option<AppCategory> {
        self.lock().get(&pid).copied()
    }

    /// Forget one process.
    pub fn invalidate(&self, pid: Pid) {
        self.lock().remove(&pid);
    }

    /// Forget every process.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Pid, AppCategory>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn classify_uncached(&self, pid: Pid, processes: &dyn ProcessInspector) -> AppCategory {
        let bundle_id = processes.bundle_identifier(pid).unwrap_or_default();
        let frameworks = processes.framework_entries(pid);
        let executable = processes.executable_path(pid);

        if !bundle_id.is_empty() && self.is_browser(&bundle_id) {
            return AppCategory::Browser;
        }

        if (!bundle_id.is_empty() && self.is_electron(&bundle_id))
            || frameworks
                .iter()
                .any(|f| CHROMIUM_FRAMEWORKS.contains(&f.as_str()))
        {
            return AppCategory::Electron;
        }

        let exe = executable
            .as_deref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        let lower_id = bundle_id.to_lowercase();
        if (!exe.is_empty() && self.java_paths.iter().any(|re| re.is_match(&exe)))
            || JAVA_ID_MARKERS.iter().any(|m| lower_id.contains(m))
            || frameworks
                .iter()
                .any(|f| JAVA_BUNDLE_MARKERS.iter().any(|m| f.contains(m)))
        {
            return AppCategory::Java;
        }

        if frameworks
            .iter()
            .any(|f| f.starts_with("Qt") && f.ends_with(".framework"))
        {
            return AppCategory::Qt;
        }

        if executable.is_some() {
            AppCategory::Native
        } else {
            AppCategory::Unknown
        }
    }

    fn is_browser(&self, bundle_id: &str) -> bool {
        self.browser_ids.iter().any(|b| bundle_id.starts_with(b.as_str()))
    }

    fn is_electron(&self, bundle_id: &str) -> bool {
        self.electron_ids
            .iter()
            .any(|e| bundle_id == e || bundle_id.contains(e.as_str()))
    }
}

/// Whether `element` sits inside rendered web content.
///
/// Checks the element and up to `max_depth` ancestors for a web-content
/// root role.
pub fn detect_webview<A: AccessibilityApi>(ax: &A, element: &A::Element, max_depth: usize) -> bool {
    let mut current = Some(element.clone());
    for _ in 0..=max_depth {
        let Some(el) = current else {
            return false;
        };
        if ax.role(&el).is_some_and(|r| roles::is_web_root_role(&r)) {
            return true;
        }
        current = ax.parent(&el);
    }
    false
}

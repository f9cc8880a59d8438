//! Focused-text capture.
//!
//! [`CaptureEngine::capture`] finds whatever control has keyboard focus in
//! the frontmost application and reads its selected text, or its whole
//! value when nothing is selected. Accessibility support is uneven across
//! toolkits, so reading is attempted through five layers in order, from a
//! direct attribute read down to a synthesized copy through the clipboard.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bootstrap::ChromiumBootstrapper;
use crate::category::{detect_webview, AppCategory, AppClassifier};
use crate::clipboard::ClipboardGuard;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::logging::content_digest;
use crate::permission::PermissionGate;
use crate::platform::{attr, AccessibilityApi, Desktop, KeyChord, Pid, TextRange};
use crate::roles;

/// How the captured text was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CaptureMethod {
    /// The focused element's selected-text attribute.
    DirectSelectedText,
    /// The focused element's value attribute.
    DirectValue,
    /// An ancestor of the focused element.
    ParentTraversal,
    /// A descendant of a focused container.
    ChildDescent,
    /// A value sliced by the reported selection range.
    WebRangeExtraction,
    /// A synthesized copy read back from the clipboard.
    ClipboardFallback,
}

impl fmt::Display for CaptureMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DirectSelectedText => "directSelectedText",
            Self::DirectValue => "directValue",
            Self::ParentTraversal => "parentTraversal",
            Self::ChildDescent => "childDescent",
            Self::WebRangeExtraction => "webRangeExtraction",
            Self::ClipboardFallback => "clipboardFallback",
        };
        f.write_str(name)
    }
}

/// Text read from a foreign process, plus what is needed to write it back.
///
/// `source_element` is a non-owning handle: the owning process may destroy
/// it at any time, and replacement re-validates it before use. A value is
/// consumed by exactly one replacement, hence no `Clone`.
#[derive(Debug)]
pub struct CapturedText<E> {
    /// The captured text.
    pub content: String,
    /// Element the text was read from.
    pub source_element: E,
    /// Process owning `source_element`.
    pub source_pid: Pid,
    /// Whether the text was a selection rather than a whole value.
    pub had_selection: bool,
    /// Selection range within the value, in UTF-16 units.
    pub selected_range: Option<TextRange>,
    /// The full value read alongside a selection.
    pub surrounding_value: Option<String>,
    /// Which layer produced the text.
    pub method: CaptureMethod,
    /// Category of the owning app.
    pub category: AppCategory,
    /// Clipboard text from before a clipboard fallback. Already restored.
    pub previous_clipboard_text: Option<String>,
    /// When the capture finished.
    pub captured_at: DateTime<Utc>,
    /// BLAKE3 hex digest of `content`.
    pub content_hash: String,
}

impl<E> CapturedText<E> {
    /// A serializable view without the element handle.
    #[must_use]
    pub fn summary(&self) -> CaptureSummary {
        CaptureSummary {
            content: self.content.clone(),
            length: self.content.chars().count(),
            source_pid: self.source_pid,
            had_selection: self.had_selection,
            selected_range: self.selected_range,
            method: self.method,
            category: self.category,
            captured_at: self.captured_at,
            content_hash: self.content_hash.clone(),
        }
    }
}

/// Serializable description of a capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSummary {
    /// The captured text.
    pub content: String,
    /// Length of the text in characters.
    pub length: usize,
    /// Owning process.
    pub source_pid: Pid,
    /// Whether the text was a selection.
    pub had_selection: bool,
    /// Selection range, if known.
    pub selected_range: Option<TextRange>,
    /// Which layer produced the text.
    pub method: CaptureMethod,
    /// Category of the owning app.
    pub category: AppCategory,
    /// When the capture finished.
    pub captured_at: DateTime<Utc>,
    /// BLAKE3 hex digest of the text.
    pub content_hash: String,
}

/// Extraction layers, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layer {
    Direct,
    ParentTraversal,
    ChildDescent,
    WebRange,
    Clipboard,
}

const LAYERS: [Layer; 5] = [
    Layer::Direct,
    Layer::ParentTraversal,
    Layer::ChildDescent,
    Layer::WebRange,
    Layer::Clipboard,
];

/// The resolved focus target every layer works from.
struct Target<E> {
    element: E,
    pid: Pid,
    category: AppCategory,
}

/// What a layer found.
struct Hit<E> {
    content: String,
    element: E,
    had_selection: bool,
    range: Option<TextRange>,
    surrounding: Option<String>,
    method: CaptureMethod,
    previous_clipboard: Option<String>,
}

/// Runs the capture algorithm against a desktop.
pub struct CaptureEngine<'a, A: AccessibilityApi> {
    desktop: &'a Desktop<A>,
    config: &'a Config,
    classifier: &'a AppClassifier,
    bootstrapper: &'a ChromiumBootstrapper,
    gate: &'a PermissionGate,
}

impl<'a, A: AccessibilityApi> CaptureEngine<'a, A> {
    /// Borrow the collaborators for one or more captures.
    pub fn new(
        desktop: &'a Desktop<A>,
        config: &'a Config,
        classifier: &'a AppClassifier,
        bootstrapper: &'a ChromiumBootstrapper,
        gate: &'a PermissionGate,
    ) -> Self {
        Self {
            desktop,
            config,
            classifier,
            bootstrapper,
            gate,
        }
    }

    /// Capture the focused text.
    ///
    /// Returns `Ok(None)` when the focused element is a secure field or when
    /// no layer produced any text.
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` if automation is not permitted and
    /// `NoFocusTarget` if no focused element could be resolved.
    pub async fn capture(&self) -> Result<Option<CapturedText<A::Element>>> {
        self.gate.require()?;
        let ax = &self.desktop.ax;

        let focused = self.resolve_focus().await;
        let pid = focused
            .as_ref()
            .and_then(|el| ax.pid(el))
            .or_else(|| self.desktop.processes.frontmost_pid())
            .ok_or(Error::NoFocusTarget)?;

        let process_category = self.classifier.classify(pid, self.desktop.processes.as_ref());

        let mut element = focused;
        if process_category.needs_bootstrap() {
            self.bootstrapper.ensure(self.desktop, pid).await;
            match self.focused_in(pid) {
                Some(refreshed) => element = Some(refreshed),
                None if element.is_none() => {
                    element = self
                        .bootstrapper
                        .with_retry(
                            self.desktop,
                            pid,
                            self.config.bootstrap.max_attempts,
                            || self.focused_in(pid),
                        )
                        .await;
                }
                None => {}
            }
        }

        let element = element.ok_or(Error::NoFocusTarget)?;
        let pid = ax.pid(&element).unwrap_or(pid);

        let category = if detect_webview(ax, &element, self.config.traversal.max_webview_depth) {
            AppCategory::Webview
        } else {
            process_category
        };

        if self.is_secure(&element) {
            debug!(pid, %category, "Focused element is a secure field; nothing captured");
            return Ok(None);
        }

        let target = Target {
            element,
            pid,
            category,
        };

        for layer in LAYERS {
            if let Some(hit) = self.run_layer(layer, &target).await {
                return Ok(Some(self.finish(hit, &target)));
            }
            debug!(pid, ?layer, "Capture layer found nothing");
        }

        info!(pid, %category, "No capture layer produced text");
        Ok(None)
    }

    fn finish(&self, hit: Hit<A::Element>, target: &Target<A::Element>) -> CapturedText<A::Element> {
        let content_hash = blake3::hash(hit.content.as_bytes()).to_hex().to_string();
        let source_pid = self.desktop.ax.pid(&hit.element).unwrap_or(target.pid);
        info!(
            pid = source_pid,
            category = %target.category,
            method = %hit.method,
            had_selection = hit.had_selection,
            len = hit.content.chars().count(),
            hash = %content_digest(&hit.content),
            "Captured text"
        );

        CapturedText {
            content: hit.content,
            source_element: hit.element,
            source_pid,
            had_selection: hit.had_selection,
            selected_range: hit.range,
            surrounding_value: hit.surrounding,
            method: hit.method,
            category: target.category,
            previous_clipboard_text: hit.previous_clipboard,
            captured_at: Utc::now(),
            content_hash,
        }
    }

    async fn run_layer(&self, layer: Layer, target: &Target<A::Element>) -> Option<Hit<A::Element>> {
        match layer {
            Layer::Direct => self.read_direct(&target.element),
            Layer::ParentTraversal => self.read_parents(&target.element),
            Layer::ChildDescent => self.read_children(&target.element),
            Layer::WebRange => self.read_web_range(target),
            Layer::Clipboard => self.read_via_clipboard(target).await,
        }
    }

    /// Selected text, else whole value, of one element.
    fn read_direct(&self, element: &A::Element) -> Option<Hit<A::Element>> {
        if self.is_secure(element) {
            return None;
        }
        let ax = &self.desktop.ax;

        if let Some(selected) = non_empty(ax.string_attribute(element, attr::SELECTED_TEXT)) {
            return Some(Hit {
                content: selected,
                element: element.clone(),
                had_selection: true,
                range: ax.selected_range(element),
                surrounding: ax.string_attribute(element, attr::VALUE),
                method: CaptureMethod::DirectSelectedText,
                previous_clipboard: None,
            });
        }

        non_empty(ax.string_attribute(element, attr::VALUE)).map(|value| Hit {
            content: value,
            element: element.clone(),
            had_selection: false,
            range: None,
            surrounding: None,
            method: CaptureMethod::DirectValue,
            previous_clipboard: None,
        })
    }

    fn read_parents(&self, element: &A::Element) -> Option<Hit<A::Element>> {
        let ax = &self.desktop.ax;
        let mut current = ax.parent(element);
        for _ in 0..self.config.traversal.max_parent_depth {
            let parent = current?;
            if let Some(hit) = self.read_direct(&parent) {
                return Some(Hit {
                    method: CaptureMethod::ParentTraversal,
                    ..hit
                });
            }
            current = ax.parent(&parent);
        }
        None
    }

    fn read_children(&self, element: &A::Element) -> Option<Hit<A::Element>> {
        let role = self.desktop.ax.role(element)?;
        if !roles::is_container_role(&role) {
            return None;
        }
        self.descend(element, self.config.traversal.max_child_depth, &mut |el: &A::Element| {
            if self.is_text_capable(el) {
                self.read_direct(el)
            } else {
                None
            }
        })
        .map(|hit| Hit {
            method: CaptureMethod::ChildDescent,
            ..hit
        })
    }

    /// Slice the value of a text element by its selection range.
    fn read_web_range(&self, target: &Target<A::Element>) -> Option<Hit<A::Element>> {
        if !target.category.uses_web_ranges() {
            return None;
        }
        let ax = &self.desktop.ax;

        let source = if self.is_text_capable(&target.element) {
            Some(target.element.clone())
        } else {
            self.descend(&target.element, self.config.traversal.max_child_depth, &mut |el: &A::Element| {
                (self.is_text_capable(el)
                    && non_empty(ax.string_attribute(el, attr::VALUE)).is_some())
                .then(|| el.clone())
            })
        }?;

        let value = non_empty(ax.string_attribute(&source, attr::VALUE))?;
        let range = ax.selected_range(&source).filter(|r| !r.is_empty());

        match range {
            Some(range) => {
                let selected = range.slice(&value).to_string();
                if selected.is_empty() {
                    return None;
                }
                Some(Hit {
                    content: selected,
                    element: source,
                    had_selection: true,
                    range: Some(range),
                    surrounding: Some(value),
                    method: CaptureMethod::WebRangeExtraction,
                    previous_clipboard: None,
                })
            }
            None => Some(Hit {
                content: value,
                element: source,
                had_selection: false,
                range: None,
                surrounding: None,
                method: CaptureMethod::WebRangeExtraction,
                previous_clipboard: None,
            }),
        }
    }

    /// Copy the selection through the clipboard, restoring it afterwards.
    async fn read_via_clipboard(&self, target: &Target<A::Element>) -> Option<Hit<A::Element>> {
        let mut guard = match ClipboardGuard::acquire(self.desktop.clipboard.as_ref()) {
            Ok(guard) => guard,
            Err(e) => {
                warn!(error = %e, "Clipboard unavailable for copy fallback");
                return None;
            }
        };

        if let Err(e) = guard.clear() {
            warn!(error = %e, "Failed to clear clipboard");
            return None;
        }
        if let Err(e) = self.desktop.keys.send(KeyChord::Copy) {
            warn!(error = %e, "Failed to synthesize copy");
            return None;
        }
        tokio::time::sleep(self.config.timing.copy_wait()).await;

        let copied = guard.read();
        let previous = match guard.restore() {
            Ok(previous) => previous,
            Err(e) => {
                warn!(error = %e, "Failed to restore clipboard after copy");
                None
            }
        };

        let content = match copied {
            Ok(text) => non_empty(text)?,
            Err(e) => {
                warn!(error = %e, "Failed to read copied text");
                return None;
            }
        };

        Some(Hit {
            content,
            element: target.element.clone(),
            had_selection: true,
            range: None,
            surrounding: None,
            method: CaptureMethod::ClipboardFallback,
            previous_clipboard: previous,
        })
    }

    /// Depth-first search below `root`, returning the first `Some` from
    /// `visit`. Secure elements are never visited.
    fn descend<T>(
        &self,
        root: &A::Element,
        max_depth: usize,
        visit: &mut dyn FnMut(&A::Element) -> Option<T>,
    ) -> Option<T> {
        if max_depth == 0 {
            return None;
        }
        for child in self.desktop.ax.children(root) {
            if !self.is_secure(&child) {
                if let Some(found) = visit(&child) {
                    return Some(found);
                }
            }
            if let Some(found) = self.descend(&child, max_depth - 1, visit) {
                return Some(found);
            }
        }
        None
    }

    /// Resolve the focused element through the fallback chain.
    async fn resolve_focus(&self) -> Option<A::Element> {
        let ax = &self.desktop.ax;
        let timing = &self.config.timing;

        for attempt in 1..=timing.focus_retry_attempts {
            if let Some(el) = ax.system_focused_element() {
                return Some(el);
            }
            debug!(attempt, "System focused element not reported");
            if attempt < timing.focus_retry_attempts {
                tokio::time::sleep(timing.focus_retry_delay()).await;
            }
        }

        if let Some(el) = ax
            .focused_application()
            .and_then(|app| ax.element_attribute(&app, attr::FOCUSED_UI_ELEMENT))
        {
            debug!("Focus resolved through focused application");
            return Some(el);
        }

        let pid = self.desktop.processes.frontmost_pid()?;
        let app = ax.application(pid)?;
        if let Some(el) = ax.element_attribute(&app, attr::FOCUSED_UI_ELEMENT) {
            debug!(pid, "Focus resolved through frontmost application");
            return Some(el);
        }

        let category = self.classifier.classify(pid, self.desktop.processes.as_ref());
        if !category.searches_app_tree() {
            return None;
        }

        let depth = self.config.traversal.max_focus_search_depth;
        if let Some(el) = self.find_flagged_focus(&app, depth) {
            debug!(pid, "Focus resolved by searching the application tree");
            return Some(el);
        }

        let window = ax.element_attribute(&app, attr::FOCUSED_WINDOW)?;
        let el = ax
            .element_attribute(&window, attr::FOCUSED_UI_ELEMENT)
            .or_else(|| self.find_flagged_focus(&window, depth));
        if el.is_some() {
            debug!(pid, "Focus resolved through focused window");
        }
        el
    }

    /// The focused element of one process, read fresh.
    fn focused_in(&self, pid: Pid) -> Option<A::Element> {
        let ax = &self.desktop.ax;
        ax.application(pid)
            .and_then(|app| ax.element_attribute(&app, attr::FOCUSED_UI_ELEMENT))
            .or_else(|| {
                ax.system_focused_element()
                    .filter(|el| ax.pid(el) == Some(pid))
            })
    }

    fn find_flagged_focus(&self, root: &A::Element, depth: usize) -> Option<A::Element> {
        let ax = &self.desktop.ax;
        self.descend(root, depth, &mut |el: &A::Element| {
            (ax.bool_attribute(el, attr::FOCUSED) == Some(true)).then(|| el.clone())
        })
    }

    fn is_secure(&self, element: &A::Element) -> bool {
        let ax = &self.desktop.ax;
        roles::is_secure(ax.role(element).as_deref(), ax.subrole(element).as_deref())
    }

    fn is_text_capable(&self, element: &A::Element) -> bool {
        if self.is_secure(element) {
            return false;
        }
        let ax = &self.desktop.ax;
        ax.role(element).is_some_and(|r| roles::is_text_role(&r))
            || ax.string_attribute(element, attr::VALUE).is_some()
            || ax.string_attribute(element, attr::SELECTED_TEXT).is_some()
    }
}

impl<A: AccessibilityApi> fmt::Debug for CaptureEngine<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureEngine")
            .field("classifier", self.classifier)
            .field("gate", self.gate)
            .finish_non_exhaustive()
    }
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.is_empty())
}

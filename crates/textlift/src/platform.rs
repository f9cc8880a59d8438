//! Platform seams.
//!
//! The engines never talk to the operating system directly. Everything they
//! need from the desktop (the accessibility tree of foreign processes, the
//! clipboard, synthesized key presses and process introspection) goes through
//! the traits in this module. The macOS backend lives in `textlift-mac`.

use std::fmt;
use std::path::PathBuf;

use crate::error::Result;

/// A process identifier.
pub type Pid = i32;

/// Accessibility attribute names used by the engines.
pub mod attr {
    /// Role of an element.
    pub const ROLE: &str = "AXRole";
    /// Subrole of an element.
    pub const SUBROLE: &str = "AXSubrole";
    /// Full text value.
    pub const VALUE: &str = "AXValue";
    /// Currently selected text.
    pub const SELECTED_TEXT: &str = "AXSelectedText";
    /// Selected range within the value.
    pub const SELECTED_TEXT_RANGE: &str = "AXSelectedTextRange";
    /// Parent element.
    pub const PARENT: &str = "AXParent";
    /// Focused element of an application or window.
    pub const FOCUSED_UI_ELEMENT: &str = "AXFocusedUIElement";
    /// Focused application of the system-wide element.
    pub const FOCUSED_APPLICATION: &str = "AXFocusedApplication";
    /// Focused window of an application.
    pub const FOCUSED_WINDOW: &str = "AXFocusedWindow";
    /// Whether an element has keyboard focus.
    pub const FOCUSED: &str = "AXFocused";
}

/// A range of text in UTF-16 code units, as reported by accessibility APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct TextRange {
    /// Offset of the first selected unit.
    pub location: usize,
    /// Number of selected units.
    pub length: usize,
}

impl TextRange {
    /// Create a new range.
    #[must_use]
    pub const fn new(location: usize, length: usize) -> Self {
        Self { location, length }
    }

    /// Whether the range selects nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Byte offsets of this range within `text`, clamped to its bounds.
    ///
    /// A start offset inside a surrogate pair snaps forward to the next char
    /// boundary; an end offset inside one keeps the whole pair.
    #[must_use]
    pub fn byte_bounds(&self, text: &str) -> (usize, usize) {
        let end_unit = self.location.saturating_add(self.length);
        let mut start = text.len();
        let mut end = text.len();
        let mut units = 0usize;
        let mut start_found = false;

        for (idx, ch) in text.char_indices() {
            if !start_found && units >= self.location {
                start = idx;
                start_found = true;
            }
            if units >= end_unit {
                end = idx;
                break;
            }
            units += ch.len_utf16();
        }

        (start, end.max(start))
    }

    /// The text covered by this range, clamped to the bounds of `text`.
    #[must_use]
    pub fn slice<'t>(&self, text: &'t str) -> &'t str {
        let (start, end) = self.byte_bounds(text);
        &text[start..end]
    }

    /// Replace the covered text with `replacement`, clamping to the bounds.
    #[must_use]
    pub fn splice(&self, text: &str, replacement: &str) -> String {
        let (start, end) = self.byte_bounds(text);
        let mut out = String::with_capacity(text.len() - (end - start) + replacement.len());
        out.push_str(&text[..start]);
        out.push_str(replacement);
        out.push_str(&text[end..]);
        out
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.location, self.length)
    }
}

/// Read and write access to the accessibility trees of running processes.
///
/// `Element` is a non-owning handle into a foreign process: that process can
/// destroy or replace the element at any time, so handles are re-validated
/// with [`AccessibilityApi::is_valid`] before they are trusted again.
pub trait AccessibilityApi {
    /// Handle to an element in some process's accessibility tree.
    type Element: Clone + PartialEq + fmt::Debug;

    /// The element the system reports as focused.
    fn system_focused_element(&self) -> Option<Self::Element>;

    /// The application element the system reports as focused.
    fn focused_application(&self) -> Option<Self::Element>;

    /// The root application element of a process.
    fn application(&self, pid: Pid) -> Option<Self::Element>;

    /// An attribute whose value is another element.
    fn element_attribute(&self, element: &Self::Element, attribute: &str) -> Option<Self::Element>;

    /// An attribute whose value is a string.
    fn string_attribute(&self, element: &Self::Element, attribute: &str) -> Option<String>;

    /// An attribute whose value is a boolean.
    fn bool_attribute(&self, element: &Self::Element, attribute: &str) -> Option<bool>;

    /// The selected text range of an element, if it exposes one.
    fn selected_range(&self, element: &Self::Element) -> Option<TextRange>;

    /// Children of an element, in tree order.
    fn children(&self, element: &Self::Element) -> Vec<Self::Element>;

    /// The process that owns an element.
    fn pid(&self, element: &Self::Element) -> Option<Pid>;

    /// Whether the element reports the attribute as writable.
    fn is_settable(&self, element: &Self::Element, attribute: &str) -> bool;

    /// Write a string attribute.
    ///
    /// # Errors
    ///
    /// Returns an error if the foreign process rejects the write.
    fn set_string_attribute(&self, element: &Self::Element, attribute: &str, value: &str) -> Result<()>;

    /// Write a boolean attribute.
    ///
    /// # Errors
    ///
    /// Returns an error if the foreign process rejects the write.
    fn set_bool_attribute(&self, element: &Self::Element, attribute: &str, value: bool) -> Result<()>;

    /// Role of an element.
    fn role(&self, element: &Self::Element) -> Option<String> {
        self.string_attribute(element, attr::ROLE)
    }

    /// Subrole of an element.
    fn subrole(&self, element: &Self::Element) -> Option<String> {
        self.string_attribute(element, attr::SUBROLE)
    }

    /// Parent of an element.
    fn parent(&self, element: &Self::Element) -> Option<Self::Element> {
        self.element_attribute(element, attr::PARENT)
    }

    /// Whether the element still exists in its process.
    fn is_valid(&self, element: &Self::Element) -> bool {
        self.role(element).is_some()
    }
}

/// The system clipboard, text only.
pub trait ClipboardAccess {
    /// Current clipboard text, `None` when the clipboard holds no text.
    ///
    /// # Errors
    ///
    /// Returns an error if the clipboard cannot be read.
    fn get_text(&self) -> Result<Option<String>>;

    /// Replace the clipboard contents with `text`.
    ///
    /// # Errors
    ///
    /// Returns an error if the clipboard cannot be written.
    fn set_text(&self, text: &str) -> Result<()>;

    /// Empty the clipboard.
    ///
    /// # Errors
    ///
    /// Returns an error if the clipboard cannot be cleared.
    fn clear(&self) -> Result<()>;
}

/// Modified key presses the fallback paths synthesize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyChord {
    /// Copy the selection (⌘C).
    Copy,
    /// Paste the clipboard (⌘V).
    Paste,
    /// Select everything in the focused control (⌘A).
    SelectAll,
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Copy => write!(f, "copy"),
            Self::Paste => write!(f, "paste"),
            Self::SelectAll => write!(f, "select-all"),
        }
    }
}

/// Posts a key press/release pair to the focused application.
pub trait KeySynthesizer {
    /// Send one chord.
    ///
    /// # Errors
    ///
    /// Returns an error if the event could not be posted.
    fn send(&self, chord: KeyChord) -> Result<()>;
}

/// Introspection of running processes.
pub trait ProcessInspector {
    /// Declared bundle identifier of the process.
    fn bundle_identifier(&self, pid: Pid) -> Option<String>;

    /// Path of the application bundle the process runs from.
    fn bundle_path(&self, pid: Pid) -> Option<PathBuf>;

    /// Path of the process executable.
    fn executable_path(&self, pid: Pid) -> Option<PathBuf>;

    /// File names under the bundle's framework and plugin directories.
    fn framework_entries(&self, pid: Pid) -> Vec<String>;

    /// The application the window server considers frontmost.
    fn frontmost_pid(&self) -> Option<Pid>;

    /// Bring a process to the front. Returns `false` if that failed.
    fn activate(&self, pid: Pid) -> bool;
}

/// The platform's automation trust state.
pub trait TrustProvider: Send + Sync {
    /// Live check of whether this process is trusted.
    fn is_trusted(&self) -> bool;

    /// Show the system consent prompt. Returns the trust state at that moment.
    fn prompt(&self) -> bool;
}

/// Everything the engines need from the desktop session.
pub struct Desktop<A: AccessibilityApi> {
    /// Accessibility tree access.
    pub ax: A,
    /// System clipboard.
    pub clipboard: Box<dyn ClipboardAccess>,
    /// Key synthesis.
    pub keys: Box<dyn KeySynthesizer>,
    /// Process introspection.
    pub processes: Box<dyn ProcessInspector>,
}

impl<A: AccessibilityApi> Desktop<A> {
    /// Bundle the platform collaborators.
    pub fn new(
        ax: A,
        clipboard: Box<dyn ClipboardAccess>,
        keys: Box<dyn KeySynthesizer>,
        processes: Box<dyn ProcessInspector>,
    ) -> Self {
        Self {
            ax,
            clipboard,
            keys,
            processes,
        }
    }
}

impl<A: AccessibilityApi + fmt::Debug> fmt::Debug for Desktop<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Desktop").field("ax", &self.ax).finish_non_exhaustive()
    }
}

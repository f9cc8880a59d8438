//! General pasteboard access through `clipboard-rs`.

use clipboard_rs::{Clipboard, ClipboardContext, ContentFormat};
use textlift::{ClipboardAccess, Error, Result};

/// [`ClipboardAccess`] over the macOS general pasteboard.
///
/// A fresh context is opened per call; the pasteboard is shared with every
/// other process, so nothing is cached here.
#[derive(Debug, Default, Clone, Copy)]
pub struct MacClipboard;

impl MacClipboard {
    /// Create a pasteboard accessor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn context() -> Result<ClipboardContext> {
        ClipboardContext::new().map_err(|e| Error::clipboard(e.to_string()))
    }
}

impl ClipboardAccess for MacClipboard {
    fn get_text(&self) -> Result<Option<String>> {
        let ctx = Self::context()?;
        if !ctx.has(ContentFormat::Text) {
            return Ok(None);
        }
        match ctx.get_text() {
            Ok(text) => Ok(Some(text)),
            Err(e) => Err(Error::clipboard(e.to_string())),
        }
    }

    fn set_text(&self, text: &str) -> Result<()> {
        Self::context()?
            .set_text(text.to_string())
            .map_err(|e| Error::clipboard(e.to_string()))
    }

    fn clear(&self) -> Result<()> {
        Self::context()?
            .clear()
            .map_err(|e| Error::clipboard(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "mutates the system pasteboard"]
    fn test_set_then_get() {
        let clipboard = MacClipboard::new();
        let original = clipboard.get_text().unwrap();

        clipboard.set_text("textlift pasteboard check").unwrap();
        assert_eq!(
            clipboard.get_text().unwrap().as_deref(),
            Some("textlift pasteboard check")
        );

        clipboard.clear().unwrap();
        assert_eq!(clipboard.get_text().unwrap(), None);

        if let Some(text) = original {
            clipboard.set_text(&text).unwrap();
        }
    }
}

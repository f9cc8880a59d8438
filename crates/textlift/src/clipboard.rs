//! Scoped clipboard mutation.
//!
//! The system clipboard belongs to the user. Fallback paths that borrow it go
//! through [`ClipboardGuard`], which snapshots the text on entry and puts it
//! back when dropped, on every exit path.

use tracing::{debug, warn};

use crate::error::Result;
use crate::platform::ClipboardAccess;

/// Snapshot of the clipboard, restored on drop if it was changed.
pub struct ClipboardGuard<'a> {
    clipboard: &'a dyn ClipboardAccess,
    snapshot: Option<String>,
    mutated: bool,
    restored: bool,
}

impl<'a> ClipboardGuard<'a> {
    /// Snapshot the current clipboard text.
    ///
    /// # Errors
    ///
    /// Returns an error if the clipboard cannot be read. Nothing has been
    /// changed at that point.
    pub fn acquire(clipboard: &'a dyn ClipboardAccess) -> Result<Self> {
        let snapshot = clipboard.get_text()?;
        debug!(had_text = snapshot.is_some(), "Clipboard snapshot taken");
        Ok(Self {
            clipboard,
            snapshot,
            mutated: false,
            restored: false,
        })
    }

    /// The text held before the guard was acquired.
    #[must_use]
    pub fn snapshot(&self) -> Option<&str> {
        self.snapshot.as_deref()
    }

    /// Empty the clipboard.
    ///
    /// # Errors
    ///
    /// Returns an error if the clipboard cannot be cleared.
    pub fn clear(&mut self) -> Result<()> {
        self.mutated = true;
        self.clipboard.clear()
    }

    /// Put `text` on the clipboard.
    ///
    /// # Errors
    ///
    /// Returns an error if the clipboard cannot be written.
    pub fn set_text(&mut self, text: &str) -> Result<()> {
        self.mutated = true;
        self.clipboard.set_text(text)
    }

    /// Read the clipboard text.
    ///
    /// # Errors
    ///
    /// Returns an error if the clipboard cannot be read.
    pub fn read(&self) -> Result<Option<String>> {
        self.clipboard.get_text()
    }

    /// Restore the snapshot now and return it.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot could not be written back.
    pub fn restore(mut self) -> Result<Option<String>> {
        self.restore_inner()?;
        Ok(self.snapshot.take())
    }

    fn restore_inner(&mut self) -> Result<()> {
        if self.restored || !self.mutated {
            return Ok(());
        }
        self.restored = true;
        let result = match &self.snapshot {
            Some(text) => self.clipboard.set_text(text),
            None => self.clipboard.clear(),
        };
        result?;
        debug!("Clipboard restored");
        Ok(())
    }
}

impl Drop for ClipboardGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.restore_inner() {
            warn!(error = %e, "Failed to restore clipboard");
        }
    }
}

impl std::fmt::Debug for ClipboardGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipboardGuard")
            .field("had_snapshot", &self.snapshot.is_some())
            .field("mutated", &self.mutated)
            .field("restored", &self.restored)
            .finish()
    }
}

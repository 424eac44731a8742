use std::cell::RefCell;
use std::fmt;

use arboard::Clipboard;

use crate::ClipboardError;

/// Lazily opened `arboard` clipboard.
///
/// On X11 the owning handle must stay alive for the copied text to remain
/// pasteable, so the handle is kept for the backend's lifetime.
#[derive(Default)]
pub struct Backend {
    clipboard: RefCell<Option<Clipboard>>,
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("open", &self.clipboard.borrow().is_some())
            .finish()
    }
}

impl Backend {
    /// Whether a clipboard backend exists on this platform.
    pub const AVAILABLE: bool = true;

    /// Create a backend; the clipboard is opened on first write.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set text to the clipboard.
    pub fn set_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut slot = self.clipboard.borrow_mut();
        if slot.is_none() {
            *slot = Some(Clipboard::new().map_err(|e| ClipboardError::Platform(e.to_string()))?);
        }
        let Some(clipboard) = slot.as_mut() else {
            return Err(ClipboardError::NotSupported);
        };
        if let Err(e) = clipboard.set_text(text) {
            // A broken handle is reopened on the next write.
            *slot = None;
            return Err(ClipboardError::Platform(e.to_string()));
        }
        Ok(())
    }
}

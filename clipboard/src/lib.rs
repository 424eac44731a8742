//! Text clipboard writes.
//!
//! [`SystemClipboard`] talks to the platform clipboard through `arboard`.
//! [`HelperClipboard`] pipes the text into a short-lived helper process
//! (`wl-copy`, `xclip`, `pbcopy`, `clip`) and is used as the fallback when
//! the platform clipboard cannot be opened.

#![warn(missing_docs)]

use std::rc::Rc;

mod helper;
mod sys;

pub use helper::HelperClipboard;

/// Errors that can occur when writing to the clipboard.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClipboardError {
    /// No clipboard is reachable on this platform.
    #[error("clipboard not supported")]
    NotSupported,
    /// The platform clipboard rejected the write.
    #[error("platform error: {0}")]
    Platform(String),
    /// The helper process could not be run or exited unsuccessfully.
    #[error("helper `{program}` failed: {reason}")]
    Helper {
        /// Program that was attempted.
        program: String,
        /// What went wrong.
        reason: String,
    },
}

/// A sink for copied text.
pub trait ClipboardService {
    /// Whether this clipboard can be written at all on the current host.
    fn is_available(&self) -> bool;

    /// Replace the clipboard contents with `text`.
    ///
    /// # Errors
    /// Returns a [`ClipboardError`] if the write fails.
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

impl<T: ClipboardService + ?Sized> ClipboardService for Rc<T> {
    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        (**self).write_text(text)
    }
}

/// The platform clipboard.
#[derive(Debug, Default)]
pub struct SystemClipboard {
    backend: sys::Backend,
}

impl SystemClipboard {
    /// Create a handle; the platform clipboard is opened on first write.
    #[must_use]
    pub fn new() -> Self {
        Self {
            backend: sys::Backend::new(),
        }
    }
}

impl ClipboardService for SystemClipboard {
    fn is_available(&self) -> bool {
        sys::Backend::AVAILABLE
    }

    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        self.backend.set_text(text)
    }
}

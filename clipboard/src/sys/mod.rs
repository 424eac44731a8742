//! Platform-specific clipboard backend implementations.

#[cfg(any(target_os = "windows", target_os = "linux", target_os = "macos"))]
/// Desktop platform backend.
pub mod desktop;
#[cfg(any(target_os = "windows", target_os = "linux", target_os = "macos"))]
pub use desktop::*;

#[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
mod fallback {
    use crate::ClipboardError;

    /// Clipboard handle for platforms without a clipboard backend.
    #[derive(Debug, Default)]
    pub struct Backend;

    impl Backend {
        pub const AVAILABLE: bool = false;

        pub const fn new() -> Self {
            Self
        }

        pub fn set_text(&self, _text: &str) -> Result<(), ClipboardError> {
            Err(ClipboardError::NotSupported)
        }
    }
}

#[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
pub use fallback::*;

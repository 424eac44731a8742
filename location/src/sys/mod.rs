//! Platform-specific location implementations.

#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "linux")]
mod linux;

// Re-export platform implementations
#[cfg(target_os = "windows")]
pub(crate) use windows::{get_position, watch};

#[cfg(target_os = "linux")]
pub(crate) use linux::{get_position, watch};

/// Whether this platform has a location backend.
pub const AVAILABLE: bool = cfg!(any(target_os = "windows", target_os = "linux"));

// Fallback for unsupported platforms
#[cfg(not(any(target_os = "windows", target_os = "linux")))]
pub(crate) async fn get_position(
    _options: crate::PositionOptions,
) -> Result<crate::Position, crate::LocationError> {
    Err(crate::LocationError::ApiUnavailable)
}

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
pub(crate) fn watch(
    _options: crate::PositionOptions,
    _interval: std::time::Duration,
) -> crate::PositionStream {
    use futures::StreamExt;

    futures::stream::once(get_position(crate::PositionOptions::default())).boxed_local()
}

//! Platform-specific permission implementations.

#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "windows")]
pub(crate) use windows::{changes, query};

#[cfg(target_os = "linux")]
pub(crate) use linux::{changes, query};

/// Whether this platform can answer permission queries.
pub const AVAILABLE: bool = cfg!(any(target_os = "windows", target_os = "linux"));

// Fallback for unsupported platforms
#[cfg(not(any(target_os = "windows", target_os = "linux")))]
pub(crate) async fn query(
    _capability: crate::Capability,
) -> Result<crate::PermissionState, crate::PermissionError> {
    Err(crate::PermissionError::NotSupported)
}

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
pub(crate) const fn changes(_capability: crate::Capability) -> Option<crate::PermissionStream> {
    None
}

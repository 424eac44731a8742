//! Linux permission implementation.
//!
//! Unsandboxed applications reach GeoClue2 directly and are never prompted.
//! Inside a Flatpak sandbox, location goes through the desktop portal, which
//! asks the user on first access. Neither path announces later changes.

use std::path::Path;

use crate::{Capability, PermissionError, PermissionState, PermissionStream};

const FLATPAK_INFO: &str = "/.flatpak-info";

pub(crate) async fn query(capability: Capability) -> Result<PermissionState, PermissionError> {
    match capability {
        Capability::Geolocation if Path::new(FLATPAK_INFO).exists() => Ok(PermissionState::Prompt),
        Capability::Geolocation => Ok(PermissionState::Granted),
    }
}

pub(crate) const fn changes(_capability: Capability) -> Option<PermissionStream> {
    None
}

//! Windows permission implementation using WinRT.

use futures::StreamExt;
use log::debug;
use windows::Devices::Geolocation::{GeolocationAccessStatus, Geolocator};
use windows::Foundation::TypedEventHandler;

use crate::{Capability, PermissionError, PermissionState, PermissionStream};

pub(crate) async fn query(capability: Capability) -> Result<PermissionState, PermissionError> {
    match capability {
        Capability::Geolocation => query_location(),
    }
}

fn query_location() -> Result<PermissionState, PermissionError> {
    // RequestAccessAsync only prompts once; afterwards it reports the stored decision.
    let status = Geolocator::RequestAccessAsync()
        .and_then(|op| op.get())
        .map_err(|e| PermissionError::Unknown(e.message().to_string()))?;

    Ok(match status {
        GeolocationAccessStatus::Allowed => PermissionState::Granted,
        GeolocationAccessStatus::Denied => PermissionState::Denied,
        GeolocationAccessStatus::Unspecified => PermissionState::Prompt,
        _ => PermissionState::Unknown,
    })
}

pub(crate) fn changes(capability: Capability) -> Option<PermissionStream> {
    match capability {
        Capability::Geolocation => match status_changes() {
            Ok(stream) => Some(stream),
            Err(e) => {
                debug!("cannot observe location status: {e}");
                None
            }
        },
    }
}

/// Removes the `StatusChanged` handler when the subscription is dropped.
struct Registration {
    geolocator: Geolocator,
    token: i64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Err(e) = self.geolocator.RemoveStatusChanged(self.token) {
            debug!("failed to remove location status handler: {e}");
        }
    }
}

/// Re-query the access status whenever the system's location status changes.
fn status_changes() -> windows::core::Result<PermissionStream> {
    let geolocator = Geolocator::new()?;
    let (sender, receiver) = async_channel::unbounded();
    // The handler runs on a WinRT worker thread.
    let token = geolocator.StatusChanged(&TypedEventHandler::new(move |_, _| {
        let state = query_location().unwrap_or(PermissionState::Unknown);
        if sender.try_send(state).is_err() {
            debug!("location status changed after unsubscribe");
        }
        Ok(())
    }))?;
    let registration = Registration { geolocator, token };

    Ok(receiver
        .map(move |state| {
            let _registration = &registration;
            state
        })
        .boxed_local())
}

//! Windows location implementation using WinRT Geolocator.

use std::time::Duration;

use futures::StreamExt;
use futures::stream;
use futures_timer::Delay;
use windows::Devices::Geolocation::{
    GeolocationAccessStatus, Geolocator, Geocoordinate, PositionAccuracy,
};
use windows::Foundation::TimeSpan;

use crate::{LocationError, Position, PositionOptions, PositionStream, with_timeout};

#[allow(clippy::cast_possible_wrap)]
const E_ACCESSDENIED: i32 = 0x8007_0005_u32 as i32;

// 100ns ticks between 1601-01-01 and 1970-01-01.
const UNIX_EPOCH_TICKS: i64 = 116_444_736_000_000_000;

fn map_winrt_error(error: &windows::core::Error) -> LocationError {
    if error.code().0 == E_ACCESSDENIED {
        LocationError::PermissionDenied
    } else {
        LocationError::Unknown(error.message().to_string())
    }
}

#[allow(clippy::cast_possible_truncation)]
fn to_timespan(duration: Duration) -> TimeSpan {
    TimeSpan {
        Duration: (duration.as_nanos() / 100).min(i64::MAX as u128) as i64,
    }
}

pub(crate) async fn get_position(options: PositionOptions) -> Result<Position, LocationError> {
    // RequestAccessAsync doubles as the permission check on Windows.
    let access = Geolocator::RequestAccessAsync()
        .and_then(|op| op.get())
        .map_err(|e| map_winrt_error(&e))?;

    match access {
        GeolocationAccessStatus::Allowed => {}
        GeolocationAccessStatus::Denied => return Err(LocationError::PermissionDenied),
        _ => return Err(LocationError::PositionUnavailable),
    }

    let geolocator = Geolocator::new().map_err(|e| map_winrt_error(&e))?;
    let accuracy = if options.high_accuracy {
        PositionAccuracy::High
    } else {
        PositionAccuracy::Default
    };
    geolocator
        .SetDesiredAccuracy(accuracy)
        .map_err(|e| map_winrt_error(&e))?;

    let position = geolocator
        .GetGeopositionAsyncWithAgeAndTimeout(
            to_timespan(options.maximum_age),
            to_timespan(options.timeout),
        )
        .and_then(|op| op.get())
        .map_err(|e| map_winrt_error(&e))?;

    let coord = position.Coordinate().map_err(|e| map_winrt_error(&e))?;
    to_position(&coord).map_err(|e| map_winrt_error(&e))
}

/// Polls the `Geolocator` every `interval`, starting immediately.
pub(crate) fn watch(options: PositionOptions, interval: Duration) -> PositionStream {
    stream::unfold(true, move |first| async move {
        if !first {
            Delay::new(interval).await;
        }
        Some((with_timeout(get_position(options), options.timeout).await, false))
    })
    .boxed_local()
}

fn to_position(coord: &Geocoordinate) -> windows::core::Result<Position> {
    let point = coord.Point()?.Position()?;
    let ticks = coord.Timestamp()?.UniversalTime;
    let timestamp = u64::try_from((ticks - UNIX_EPOCH_TICKS) / 10_000).unwrap_or(0);

    Ok(Position {
        latitude: point.Latitude,
        longitude: point.Longitude,
        accuracy: coord.Accuracy()?,
        altitude: Some(point.Altitude),
        altitude_accuracy: coord.AltitudeAccuracy().and_then(|r| r.Value()).ok(),
        heading: coord.Heading().and_then(|r| r.Value()).ok().filter(|h| !h.is_nan()),
        speed: coord.Speed().and_then(|r| r.Value()).ok(),
        timestamp,
    })
}

//! Device position readings.
//!
//! This crate defines the [`LocationService`] seam consumed by the location
//! widget, along with a [`SystemLocationService`] that talks to GeoClue2 on
//! Linux and the WinRT `Geolocator` on Windows. Other platforms report the
//! service as unavailable.

#![warn(missing_docs)]

/// Platform-specific implementations.
pub mod sys;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::future::{Either, LocalBoxFuture, select};
use futures::stream::{self, LocalBoxStream};
use futures::{FutureExt, StreamExt};
use futures_timer::Delay;
use log::debug;
use serde::{Deserialize, Serialize};

pub use geokit_permission::{Capability, PermissionState};

/// Message shown when no location service exists on the host.
pub const UNSUPPORTED_MESSAGE: &str = "Geolocation is not supported by your browser.";

/// Default time a one-shot request may take before it fails.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Minimum spacing of readings from [`SystemLocationService::watch`].
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(1);

/// A single location reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,
    /// Horizontal accuracy radius in meters.
    pub accuracy: f64,
    /// Altitude in meters above sea level, if available.
    pub altitude: Option<f64>,
    /// Vertical accuracy in meters, if available.
    pub altitude_accuracy: Option<f64>,
    /// Direction of travel in degrees clockwise from true north, if available.
    pub heading: Option<f64>,
    /// Ground speed in meters per second, if available.
    pub speed: Option<f64>,
    /// Timestamp as Unix epoch milliseconds.
    pub timestamp: u64,
}

impl Position {
    /// A reading with only the horizontal fix populated, stamped with the current time.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, accuracy: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
            altitude: None,
            altitude_accuracy: None,
            heading: None,
            speed: None,
            timestamp: now_millis(),
        }
    }

    /// Age of the reading relative to `now_ms`, saturating at zero.
    #[must_use]
    pub const fn age(&self, now_ms: u64) -> Duration {
        Duration::from_millis(now_ms.saturating_sub(self.timestamp))
    }
}

/// Options for a position request or watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionOptions {
    /// Prefer the most accurate source (GPS) over faster coarse ones.
    pub high_accuracy: bool,
    /// How long a request may take before failing with [`LocationError::Timeout`].
    #[serde(rename = "timeout_ms", with = "millis")]
    pub timeout: Duration,
    /// Maximum age of a cached reading that may be returned instead of a fresh one.
    #[serde(rename = "maximum_age_ms", with = "millis")]
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: DEFAULT_TIMEOUT,
            maximum_age: Duration::ZERO,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Errors that can occur when reading the position.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    /// No location service exists on this host.
    #[error("Geolocation is not supported by your browser.")]
    ApiUnavailable,
    /// The user or system refused location access.
    #[error("User denied Geolocation")]
    PermissionDenied,
    /// No reading arrived within the requested timeout.
    #[error("Timeout expired")]
    Timeout,
    /// The service is present but could not determine a position.
    #[error("Position unavailable")]
    PositionUnavailable,
    /// Any other failure, carrying the service's message.
    #[error("{0}")]
    Unknown(String),
}

impl LocationError {
    /// Map a W3C geolocation error code to the matching variant.
    ///
    /// Codes are 1 (permission denied), 2 (position unavailable) and
    /// 3 (timeout). Anything else keeps `message`.
    #[must_use]
    pub fn from_code(code: u16, message: impl Into<String>) -> Self {
        match code {
            1 => Self::PermissionDenied,
            2 => Self::PositionUnavailable,
            3 => Self::Timeout,
            _ => Self::Unknown(message.into()),
        }
    }

    /// Text shown to the user for this failure.
    ///
    /// Falls back to the debug form when the failure carries no message.
    #[must_use]
    pub fn user_message(&self) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            format!("{self:?}")
        } else {
            message
        }
    }
}

/// Result type for location operations.
pub type LocationResult<T> = Result<T, LocationError>;

/// A pending one-shot position request.
pub type PositionFuture = LocalBoxFuture<'static, LocationResult<Position>>;

/// A continuous stream of readings. Dropping it cancels the watch.
pub type PositionStream = LocalBoxStream<'static, LocationResult<Position>>;

/// A provider of device positions.
pub trait LocationService {
    /// Whether a location service exists on this host.
    fn is_available(&self) -> bool;

    /// Request a single reading.
    fn request_once(&self, options: PositionOptions) -> PositionFuture;

    /// Begin continuous readings.
    ///
    /// # Errors
    /// Returns a [`LocationError`] if the watch cannot be started.
    fn watch(&self, options: PositionOptions) -> LocationResult<PositionStream>;
}

impl<T: LocationService + ?Sized> LocationService for Rc<T> {
    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn request_once(&self, options: PositionOptions) -> PositionFuture {
        (**self).request_once(options)
    }

    fn watch(&self, options: PositionOptions) -> LocationResult<PositionStream> {
        (**self).watch(options)
    }
}

/// Location service backed by the host platform.
#[derive(Debug, Clone)]
pub struct SystemLocationService {
    watch_interval: Duration,
    last_reading: Rc<RefCell<Option<Position>>>,
}

impl Default for SystemLocationService {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemLocationService {
    /// Create the platform service with the default watch interval.
    #[must_use]
    pub fn new() -> Self {
        Self::with_watch_interval(DEFAULT_WATCH_INTERVAL)
    }

    /// Create the platform service spacing watch readings at least `interval` apart.
    #[must_use]
    pub fn with_watch_interval(interval: Duration) -> Self {
        Self {
            watch_interval: interval,
            last_reading: Rc::new(RefCell::new(None)),
        }
    }

    fn read(&self, options: PositionOptions) -> PositionFuture {
        let last_reading = self.last_reading.clone();
        async move {
            if let Some(cached) = fresh_enough(&last_reading.borrow(), options.maximum_age) {
                debug!("serving cached position from {}", cached.timestamp);
                return Ok(cached);
            }
            let position = with_timeout(sys::get_position(options), options.timeout).await?;
            *last_reading.borrow_mut() = Some(position.clone());
            Ok(position)
        }
        .boxed_local()
    }
}

impl LocationService for SystemLocationService {
    fn is_available(&self) -> bool {
        sys::AVAILABLE
    }

    fn request_once(&self, options: PositionOptions) -> PositionFuture {
        if !sys::AVAILABLE {
            return futures::future::ready(Err(LocationError::ApiUnavailable)).boxed_local();
        }
        self.read(options)
    }

    fn watch(&self, options: PositionOptions) -> LocationResult<PositionStream> {
        if !sys::AVAILABLE {
            return Err(LocationError::ApiUnavailable);
        }
        let cached = fresh_enough(&self.last_reading.borrow(), options.maximum_age);
        let last_reading = self.last_reading.clone();
        let readings = sys::watch(options, self.watch_interval).inspect(move |reading| {
            if let Ok(position) = reading {
                *last_reading.borrow_mut() = Some(position.clone());
            }
        });
        Ok(stream::iter(cached.map(Ok)).chain(readings).boxed_local())
    }
}

fn fresh_enough(cached: &Option<Position>, maximum_age: Duration) -> Option<Position> {
    if maximum_age.is_zero() {
        return None;
    }
    cached
        .as_ref()
        .filter(|position| position.age(now_millis()) <= maximum_age)
        .cloned()
}

/// Run `request`, failing with [`LocationError::Timeout`] if it outlives `timeout`.
///
/// # Errors
/// Returns the request's own error, or [`LocationError::Timeout`].
pub async fn with_timeout<T, F>(request: F, timeout: Duration) -> LocationResult<T>
where
    F: Future<Output = LocationResult<T>>,
{
    let request = std::pin::pin!(request);
    match select(request, Delay::new(timeout)).await {
        Either::Left((result, _)) => result,
        Either::Right(((), _)) => Err(LocationError::Timeout),
    }
}

/// Current time as Unix epoch milliseconds.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn default_options_prefer_fresh_accurate_readings() {
        let options = PositionOptions::default();
        assert!(options.high_accuracy);
        assert_eq!(options.timeout, Duration::from_millis(10_000));
        assert_eq!(options.maximum_age, Duration::ZERO);
    }

    #[test]
    fn options_deserialize_from_milliseconds() {
        let options: PositionOptions =
            serde_json::from_str(r#"{"high_accuracy": false, "timeout_ms": 2500}"#).unwrap();
        assert!(!options.high_accuracy);
        assert_eq!(options.timeout, Duration::from_millis(2500));
        assert_eq!(options.maximum_age, Duration::ZERO);
    }

    #[test]
    fn oversized_durations_serialize_saturated() {
        let options = PositionOptions {
            timeout: Duration::MAX,
            ..PositionOptions::default()
        };
        let json = serde_json::to_value(options).unwrap();
        assert_eq!(json["timeout_ms"], u64::MAX);
        assert_eq!(json["maximum_age_ms"], 0);
    }

    #[test]
    fn error_codes_map_to_taxonomy() {
        assert_eq!(LocationError::from_code(1, ""), LocationError::PermissionDenied);
        assert_eq!(LocationError::from_code(2, ""), LocationError::PositionUnavailable);
        assert_eq!(LocationError::from_code(3, ""), LocationError::Timeout);
        assert_eq!(
            LocationError::from_code(9, "kernel panic"),
            LocationError::Unknown("kernel panic".into())
        );
    }

    #[test]
    fn user_message_falls_back_to_debug_form() {
        assert_eq!(LocationError::ApiUnavailable.user_message(), UNSUPPORTED_MESSAGE);
        assert_eq!(LocationError::Unknown("boom".into()).user_message(), "boom");
        assert_eq!(
            LocationError::Unknown(String::new()).user_message(),
            r#"Unknown("")"#
        );
    }

    #[test]
    fn slow_request_times_out() {
        let never = futures::future::pending::<LocationResult<Position>>();
        let result = block_on(with_timeout(never, Duration::from_millis(10)));
        assert_eq!(result, Err(LocationError::Timeout));
    }

    #[test]
    fn fast_request_beats_timeout() {
        let reading = Position::new(1.0, 2.0, 3.0);
        let ready = futures::future::ready(Ok(reading.clone()));
        let result = block_on(with_timeout(ready, Duration::from_secs(5)));
        assert_eq!(result, Ok(reading));
    }

    #[test]
    fn cache_respects_maximum_age() {
        let reading = Position::new(1.0, 2.0, 3.0);
        let cached = Some(reading.clone());
        assert_eq!(fresh_enough(&cached, Duration::ZERO), None);
        assert_eq!(fresh_enough(&cached, Duration::from_secs(60)), Some(reading));

        let stale = Some(Position {
            timestamp: 0,
            ..Position::new(1.0, 2.0, 3.0)
        });
        assert_eq!(fresh_enough(&stale, Duration::from_secs(60)), None);
    }
}

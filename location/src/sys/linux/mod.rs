//! Linux location implementation using GeoClue2 D-Bus service.
//!
//! A freshly started client has no location until GeoClue2 emits
//! `LocationUpdated`, so readings are taken from that signal rather than by
//! polling the client's `Location` property.

use std::time::Duration;

use futures::StreamExt;
use futures::stream;
use log::debug;
use zbus::message::Type as MessageType;
use zbus::zvariant::{OwnedObjectPath, OwnedValue, Value};
use zbus::{Connection, MatchRule, MessageStream};

use crate::{LocationError, Position, PositionOptions, PositionStream, now_millis, with_timeout};

const GEOCLUE_BUS: &str = "org.freedesktop.GeoClue2";
const MANAGER_PATH: &str = "/org/freedesktop/GeoClue2/Manager";
const MANAGER_IFACE: &str = "org.freedesktop.GeoClue2.Manager";
const CLIENT_IFACE: &str = "org.freedesktop.GeoClue2.Client";
const LOCATION_IFACE: &str = "org.freedesktop.GeoClue2.Location";
const PROPERTIES_IFACE: &str = "org.freedesktop.DBus.Properties";
const ACCESS_DENIED: &str = "org.freedesktop.DBus.Error.AccessDenied";
const SERVICE_UNKNOWN: &str = "org.freedesktop.DBus.Error.ServiceUnknown";

// GClueAccuracyLevel values.
const ACCURACY_EXACT: u32 = 8;
const ACCURACY_STREET: u32 = 6;

fn map_dbus_error(context: &str, error: &zbus::Error) -> LocationError {
    if let zbus::Error::MethodError(name, _, _) = error {
        match name.as_str() {
            ACCESS_DENIED => return LocationError::PermissionDenied,
            SERVICE_UNKNOWN => return LocationError::PositionUnavailable,
            _ => {}
        }
    }
    LocationError::Unknown(format!("{context}: {error}"))
}

/// A started GeoClue2 client and its `LocationUpdated` subscription.
///
/// The client lives on its own bus connection. GeoClue2 releases a client
/// when the connection that created it closes, so dropping this stops it
/// even when [`Client::stop`] never runs.
struct Client {
    connection: Connection,
    path: OwnedObjectPath,
    updates: MessageStream,
}

impl Client {
    async fn start(options: PositionOptions, time_threshold: Duration) -> Result<Self, LocationError> {
        let connection = Connection::system()
            .await
            .map_err(|e| map_dbus_error("D-Bus connection failed", &e))?;

        let (path,): (OwnedObjectPath,) = connection
            .call_method(Some(GEOCLUE_BUS), MANAGER_PATH, Some(MANAGER_IFACE), "GetClient", &())
            .await
            .map_err(|e| map_dbus_error("GeoClue2 not available", &e))?
            .body()
            .deserialize()
            .map_err(|e| LocationError::Unknown(format!("Failed to parse client path: {e}")))?;

        // GeoClue2 refuses to start clients without a desktop ID.
        set_client_property(&connection, &path, "DesktopId", Value::from("geokit")).await?;
        let accuracy = if options.high_accuracy {
            ACCURACY_EXACT
        } else {
            ACCURACY_STREET
        };
        set_client_property(&connection, &path, "RequestedAccuracyLevel", Value::from(accuracy))
            .await?;
        let seconds = u32::try_from(time_threshold.as_secs()).unwrap_or(u32::MAX);
        set_client_property(&connection, &path, "TimeThreshold", Value::from(seconds)).await?;

        // Subscribe before Start so the first fix cannot be missed.
        let rule = MatchRule::builder()
            .msg_type(MessageType::Signal)
            .path(path.as_str())
            .and_then(|b| b.interface(CLIENT_IFACE))
            .and_then(|b| b.member("LocationUpdated"))
            .map_err(|e| map_dbus_error("Invalid match rule", &e))?
            .build();
        let updates = MessageStream::for_match_rule(rule, &connection, None)
            .await
            .map_err(|e| map_dbus_error("Failed to subscribe to location updates", &e))?;

        connection
            .call_method(Some(GEOCLUE_BUS), path.as_str(), Some(CLIENT_IFACE), "Start", &())
            .await
            .map_err(|e| map_dbus_error("Failed to start GeoClue client", &e))?;
        debug!("started GeoClue client {}", path.as_str());

        Ok(Self {
            connection,
            path,
            updates,
        })
    }

    async fn stop(self) {
        if let Err(e) = self
            .connection
            .call_method(Some(GEOCLUE_BUS), self.path.as_str(), Some(CLIENT_IFACE), "Stop", &())
            .await
        {
            debug!("failed to stop GeoClue client: {e}");
        }
    }
}

/// A source of fixes that stays subscribed between readings.
trait Updates {
    /// Wait for the next fix. `Ok(None)` means the source closed.
    async fn next_position(&mut self) -> Result<Option<Position>, LocationError>;
}

impl Updates for Client {
    async fn next_position(&mut self) -> Result<Option<Position>, LocationError> {
        let Some(message) = self.updates.next().await else {
            return Ok(None);
        };
        let message = message.map_err(|e| map_dbus_error("Location update failed", &e))?;
        let (_old, new): (OwnedObjectPath, OwnedObjectPath) = message
            .body()
            .deserialize()
            .map_err(|e| LocationError::Unknown(format!("Failed to parse location update: {e}")))?;
        read_location(&self.connection, &new).await.map(Some)
    }
}

async fn set_client_property(
    connection: &Connection,
    path: &OwnedObjectPath,
    name: &'static str,
    value: Value<'static>,
) -> Result<(), LocationError> {
    connection
        .call_method(
            Some(GEOCLUE_BUS),
            path.as_str(),
            Some(PROPERTIES_IFACE),
            "Set",
            &(CLIENT_IFACE, name, value),
        )
        .await
        .map(drop)
        .map_err(|e| map_dbus_error(name, &e))
}

pub(crate) async fn get_position(options: PositionOptions) -> Result<Position, LocationError> {
    let mut client = Client::start(options, Duration::ZERO).await?;
    let position = client.next_position().await;
    client.stop().await;
    position?.ok_or(LocationError::PositionUnavailable)
}

/// Readings from one GeoClue2 client, kept alive until the stream is dropped.
pub(crate) fn watch(options: PositionOptions, interval: Duration) -> PositionStream {
    readings(Client::start(options, interval), options.timeout)
}

/// Start a source once, then yield each of its fixes.
///
/// A wait that outlives `timeout` yields [`LocationError::Timeout`] and the
/// same source keeps being polled. A failed start yields its error and ends.
fn readings<U, F>(start: F, timeout: Duration) -> PositionStream
where
    U: Updates + 'static,
    F: Future<Output = Result<U, LocationError>> + 'static,
{
    stream::once(start)
        .flat_map(move |started| match started {
            Ok(source) => stream::unfold(source, move |mut source| async move {
                let reading = with_timeout(source.next_position(), timeout).await;
                match reading {
                    Ok(Some(position)) => Some((Ok(position), source)),
                    Ok(None) => {
                        debug!("location source stopped emitting");
                        None
                    }
                    Err(e) => Some((Err(e), source)),
                }
            })
            .left_stream(),
            Err(e) => stream::iter([Err(e)]).right_stream(),
        })
        .boxed_local()
}

async fn read_location(
    connection: &Connection,
    location_path: &OwnedObjectPath,
) -> Result<Position, LocationError> {
    // "/" means the client has no fix.
    if location_path.as_str() == "/" {
        return Err(LocationError::PositionUnavailable);
    }

    let get_property = |prop: &'static str| async move {
        let reply: OwnedValue = connection
            .call_method(
                Some(GEOCLUE_BUS),
                location_path.as_str(),
                Some(PROPERTIES_IFACE),
                "Get",
                &(LOCATION_IFACE, prop),
            )
            .await?
            .body()
            .deserialize()?;
        Ok::<f64, zbus::Error>(reply.downcast_ref::<f64>().unwrap_or(f64::NAN))
    };

    let latitude = get_property("Latitude")
        .await
        .map_err(|e| map_dbus_error("Failed to get latitude", &e))?;
    let longitude = get_property("Longitude")
        .await
        .map_err(|e| map_dbus_error("Failed to get longitude", &e))?;
    let accuracy = get_property("Accuracy")
        .await
        .map_err(|e| map_dbus_error("Failed to get accuracy", &e))?;
    if !usable_fix(latitude, longitude, accuracy) {
        return Err(LocationError::PositionUnavailable);
    }

    // GeoClue2 reports unknown altitude as -f64::MAX and unknown speed or heading as -1.
    let altitude = get_property("Altitude")
        .await
        .ok()
        .filter(|a| a.is_finite() && *a > -f64::MAX);
    let speed = get_property("Speed").await.ok().filter(|s| *s >= 0.0);
    let heading = get_property("Heading").await.ok().filter(|h| *h >= 0.0);

    Ok(Position {
        latitude,
        longitude,
        accuracy,
        altitude,
        altitude_accuracy: None,
        heading,
        speed,
        timestamp: now_millis(),
    })
}

fn usable_fix(latitude: f64, longitude: f64, accuracy: f64) -> bool {
    latitude.is_finite() && longitude.is_finite() && accuracy.is_finite() && accuracy >= 0.0
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use futures::executor::block_on;

    use super::*;

    /// Scripted fixes; `None` entries never resolve.
    struct Script {
        steps: VecDeque<Option<Result<Option<Position>, LocationError>>>,
        polls: Rc<Cell<usize>>,
    }

    impl Updates for Script {
        async fn next_position(&mut self) -> Result<Option<Position>, LocationError> {
            self.polls.set(self.polls.get() + 1);
            match self.steps.pop_front() {
                Some(Some(step)) => step,
                Some(None) => futures::future::pending().await,
                None => Ok(None),
            }
        }
    }

    fn fix(latitude: f64) -> Position {
        Position {
            timestamp: 1_700_000_000_000,
            ..Position::new(latitude, 4.9, 30.0)
        }
    }

    fn scripted(
        steps: Vec<Option<Result<Option<Position>, LocationError>>>,
    ) -> (Rc<Cell<usize>>, Rc<Cell<usize>>, PositionStream) {
        let starts = Rc::new(Cell::new(0));
        let polls = Rc::new(Cell::new(0));
        let script = Script {
            steps: steps.into(),
            polls: polls.clone(),
        };
        let counter = starts.clone();
        let start = async move {
            counter.set(counter.get() + 1);
            Ok(script)
        };
        (starts, polls, readings(start, Duration::from_millis(20)))
    }

    #[test]
    fn first_fix_waits_for_an_update() {
        let (_, _, stream) = scripted(vec![None, Some(Ok(Some(fix(52.3))))]);
        let collected: Vec<_> = block_on(stream.collect());
        assert_eq!(
            collected,
            vec![Err(LocationError::Timeout), Ok(fix(52.3))]
        );
    }

    #[test]
    fn one_source_serves_every_reading() {
        let (starts, polls, stream) = scripted(vec![
            Some(Ok(Some(fix(52.3)))),
            Some(Err(LocationError::PositionUnavailable)),
            Some(Ok(Some(fix(52.4)))),
        ]);
        let collected: Vec<_> = block_on(stream.collect());
        assert_eq!(
            collected,
            vec![
                Ok(fix(52.3)),
                Err(LocationError::PositionUnavailable),
                Ok(fix(52.4)),
            ]
        );
        assert_eq!(starts.get(), 1);
        assert_eq!(polls.get(), 4);
    }

    #[test]
    fn failed_start_ends_after_its_error() {
        let start = async { Err::<Script, _>(LocationError::PermissionDenied) };
        let stream = readings(start, Duration::from_millis(20));
        let collected: Vec<_> = block_on(stream.collect());
        assert_eq!(collected, vec![Err(LocationError::PermissionDenied)]);
    }

    #[test]
    fn fix_without_accuracy_is_rejected() {
        assert!(usable_fix(51.5, -0.12, 25.0));
        assert!(usable_fix(0.0, 0.0, 0.0));
        assert!(!usable_fix(51.5, -0.12, f64::NAN));
        assert!(!usable_fix(51.5, -0.12, -1.0));
        assert!(!usable_fix(f64::NAN, -0.12, 25.0));
    }
}

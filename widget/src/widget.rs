use std::fmt;
use std::rc::Rc;

use futures::future::{AbortHandle, Abortable};
use futures::task::{LocalSpawn, LocalSpawnExt};
use futures::{FutureExt, StreamExt};
use geokit_launcher::{Features, LaunchError, Target};
use geokit_location::{LocationError, LocationResult, Position, PositionOptions};
use geokit_permission::{Capability, PermissionService, PermissionState};
use log::{debug, warn};

use crate::WidgetConfig;
use crate::actions::{CopyOutcome, coordinate_text, map_url};
use crate::services::{Availability, Services};
use crate::state::{Shared, TrackingSession};
use crate::view::WidgetView;

/// A location monitor bound to one set of services.
///
/// Created with [`mount`](Self::mount) and torn down with
/// [`teardown`](Self::teardown) or by dropping it. Once torn down, results
/// that arrive from still-pending requests are discarded.
pub struct LocationWidget<S: LocalSpawn> {
    services: Services,
    spawner: S,
    options: PositionOptions,
    availability: Availability,
    state: Shared,
    permission_subscription: Option<AbortHandle>,
    next_session: u64,
}

impl<S: LocalSpawn> fmt::Debug for LocationWidget<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationWidget")
            .field("options", &self.options)
            .field("availability", &self.availability)
            .field("state", &*self.state.read())
            .finish_non_exhaustive()
    }
}

impl<S: LocalSpawn> LocationWidget<S> {
    /// Mount a widget with the default configuration.
    pub fn mount(services: Services, spawner: S) -> Self {
        Self::mount_with(services, spawner, &WidgetConfig::default())
    }

    /// Mount a widget, probing the services and starting permission observation.
    pub fn mount_with(services: Services, spawner: S, config: &WidgetConfig) -> Self {
        let availability = Availability::detect(&services);
        debug!("mounting location widget with {availability:?}");

        let mut widget = Self {
            services,
            spawner,
            options: config.position,
            availability,
            state: Shared::new(),
            permission_subscription: None,
            next_session: 0,
        };
        if availability.permission {
            widget.observe_permission();
        }
        widget
    }

    fn observe_permission(&mut self) {
        let query = self.services.permission.query(Capability::Geolocation);
        let state = self.state.clone();
        self.spawn(async move {
            match query.await {
                Ok(permission) => {
                    state.update(|s| s.permission = permission);
                }
                // Introspection is best-effort: the badge stays unknown.
                Err(e) => debug!("permission query failed: {e}"),
            }
        });

        let Some(mut changes) = self.services.permission.subscribe(Capability::Geolocation)
        else {
            return;
        };
        let state = self.state.clone();
        let (abort, registration) = AbortHandle::new_pair();
        let listen = async move {
            while let Some(permission) = changes.next().await {
                debug!("location permission changed to {permission}");
                if !state.update(|s| s.permission = permission) {
                    break;
                }
            }
        };
        self.spawn(Abortable::new(listen, registration).map(drop));
        self.permission_subscription = Some(abort);
    }

    fn spawn(&self, task: impl Future<Output = ()> + 'static) -> bool {
        match self.spawner.spawn_local(task) {
            Ok(()) => true,
            Err(e) => {
                warn!("failed to spawn location widget task: {e}");
                false
            }
        }
    }

    /// The permission service, if one was detected at mount.
    fn permission_source(&self) -> Option<Rc<dyn PermissionService>> {
        self.availability
            .permission
            .then(|| Rc::clone(&self.services.permission))
    }

    fn set_unsupported(&self) {
        self.state
            .update(|s| s.error = Some(LocationError::ApiUnavailable.user_message()));
    }

    /// Request a single reading.
    ///
    /// Sets the loading flag until the reading or its failure arrives.
    /// Overlapping calls are not de-duplicated; the rendered view disables
    /// the action while a request is in flight.
    pub fn request_once(&mut self) {
        if !self.availability.location {
            self.set_unsupported();
            return;
        }
        if !self.state.update(|s| s.loading = true) {
            return;
        }

        let request = self.services.location.request_once(self.options);
        let state = self.state.clone();
        let permission = self.permission_source();
        let spawned = self.spawn(async move {
            apply_reading(&state, permission.as_ref(), request.await).await;
        });
        if !spawned {
            self.state.update(|s| s.loading = false);
        }
    }

    /// Begin continuous tracking, replacing any session already running.
    pub fn start_tracking(&mut self) {
        if !self.availability.location {
            self.set_unsupported();
            return;
        }
        if !self.state.read().active {
            return;
        }

        let mut readings = match self.services.location.watch(self.options) {
            Ok(readings) => readings,
            Err(e) => {
                self.state.update(|s| {
                    if let Some(previous) = s.take_session() {
                        previous.cancel();
                    }
                    s.apply_failure(&e);
                });
                if e == LocationError::PermissionDenied {
                    if let Some(permission) = self.permission_source() {
                        self.spawn(recheck_permission(self.state.clone(), permission));
                    }
                }
                return;
            }
        };

        self.next_session += 1;
        let id = self.next_session;
        let (abort, registration) = AbortHandle::new_pair();
        let state = self.state.clone();
        let permission = self.permission_source();
        let pump = async move {
            while let Some(reading) = readings.next().await {
                if !apply_reading(&state, permission.as_ref(), reading).await {
                    return;
                }
            }
            debug!("tracking session {id} ended by the location service");
            state.update(|s| {
                if s.session.as_ref().is_some_and(|session| session.id == id) {
                    s.take_session();
                }
            });
        };

        if !self.spawn(Abortable::new(pump, registration).map(drop)) {
            return;
        }
        self.state.update(|s| {
            s.error = None;
            if let Some(previous) = s.replace_session(TrackingSession::new(id, abort)) {
                previous.cancel();
            }
        });
    }

    /// Stop tracking. Safe to call when not tracking.
    pub fn stop_tracking(&mut self) {
        let session = {
            let mut session = None;
            self.state.update(|s| session = s.take_session());
            session
        };
        if let Some(session) = session {
            session.cancel();
        }
    }

    /// Copy `"<lat>, <lon>"` of the current position to the clipboard.
    ///
    /// Falls back to the secondary clipboard if the primary one fails.
    pub fn copy_coordinates(&self) -> CopyOutcome {
        let Some(position) = self.position() else {
            return CopyOutcome::NothingToCopy;
        };
        let text = coordinate_text(&position);

        match self.services.clipboard.write_text(&text) {
            Ok(()) => CopyOutcome::Copied(text),
            Err(primary) => {
                debug!("clipboard write failed, using fallback: {primary}");
                match self.services.clipboard_fallback.write_text(&text) {
                    Ok(()) => CopyOutcome::CopiedWithFallback(text),
                    Err(fallback) => {
                        debug!("fallback clipboard write failed: {fallback}");
                        CopyOutcome::Failed(fallback)
                    }
                }
            }
        }
    }

    /// Open the current position in the external map viewer.
    ///
    /// Returns the opened URL, or `None` when no position is held.
    ///
    /// # Errors
    /// Returns a [`LaunchError`] if the launcher cannot open the URL.
    pub fn open_in_map_viewer(&self) -> Result<Option<String>, LaunchError> {
        let Some(position) = self.position() else {
            return Ok(None);
        };
        let url = map_url(&position);
        self.services
            .launcher
            .open(&url, Target::Blank, Features::ISOLATED)?;
        Ok(Some(url))
    }

    /// Cancel tracking and permission observation and stop accepting results.
    ///
    /// Idempotent; also run when the widget is dropped.
    pub fn teardown(&mut self) {
        if let Some(session) = self.state.deactivate() {
            session.cancel();
        }
        if let Some(subscription) = self.permission_subscription.take() {
            subscription.abort();
        }
    }

    /// Render the current state.
    #[must_use]
    pub fn view(&self) -> WidgetView {
        WidgetView::render(&self.state.read(), &self.availability)
    }

    /// The most recent reading.
    #[must_use]
    pub fn position(&self) -> Option<Position> {
        self.state.read().position.clone()
    }

    /// The last reported location permission.
    #[must_use]
    pub fn permission(&self) -> PermissionState {
        self.state.read().permission
    }

    /// Whether a one-shot request is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.read().loading
    }

    /// Whether a tracking session is active.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.state.read().watching
    }

    /// The message of the last failure, if it has not been cleared.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.state.read().error.clone()
    }

    /// Whether the widget still accepts results.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.read().active
    }

    /// Collaborators detected at mount.
    #[must_use]
    pub const fn availability(&self) -> Availability {
        self.availability
    }

    /// Options used for every request and tracking session.
    #[must_use]
    pub const fn options(&self) -> PositionOptions {
        self.options
    }
}

/// Apply `reading`, re-checking the permission when access was refused.
///
/// Returns false once the widget has been torn down.
async fn apply_reading(
    state: &Shared,
    permission: Option<&Rc<dyn PermissionService>>,
    reading: LocationResult<Position>,
) -> bool {
    let denied = matches!(reading, Err(LocationError::PermissionDenied));
    if !state.update(|s| s.apply_reading(reading)) {
        return false;
    }
    if let (true, Some(permission)) = (denied, permission) {
        recheck_permission(state.clone(), Rc::clone(permission)).await;
    }
    true
}

async fn recheck_permission(state: Shared, permission: Rc<dyn PermissionService>) {
    match permission.refresh(Capability::Geolocation).await {
        Ok(permission) => {
            debug!("location permission is {permission} after a refused reading");
            state.update(|s| s.permission = permission);
        }
        Err(e) => debug!("permission refresh failed: {e}"),
    }
}

impl<S: LocalSpawn> Drop for LocationWidget<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}

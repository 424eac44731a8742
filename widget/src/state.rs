use std::cell::{Ref, RefCell};
use std::rc::Rc;

use futures::future::AbortHandle;
use geokit_location::{LocationError, Position};
use geokit_permission::PermissionState;
use log::{debug, warn};

/// A live tracking subscription.
#[derive(Debug)]
pub(crate) struct TrackingSession {
    pub(crate) id: u64,
    abort: AbortHandle,
}

impl TrackingSession {
    pub(crate) const fn new(id: u64, abort: AbortHandle) -> Self {
        Self { id, abort }
    }

    pub(crate) fn cancel(self) {
        debug!("cancelling tracking session {}", self.id);
        self.abort.abort();
    }
}

#[derive(Debug, Default)]
pub(crate) struct WidgetState {
    pub(crate) active: bool,
    pub(crate) position: Option<Position>,
    pub(crate) permission: PermissionState,
    pub(crate) loading: bool,
    pub(crate) error: Option<String>,
    pub(crate) watching: bool,
    pub(crate) session: Option<TrackingSession>,
}

impl WidgetState {
    pub(crate) fn apply_position(&mut self, position: Position) {
        self.position = Some(position);
        self.error = None;
        self.loading = false;
    }

    pub(crate) fn apply_failure(&mut self, error: &LocationError) {
        warn!("error getting location: {error:?}");
        self.error = Some(error.user_message());
        self.loading = false;
    }

    pub(crate) fn apply_reading(&mut self, reading: Result<Position, LocationError>) {
        match reading {
            Ok(position) => self.apply_position(position),
            Err(error) => self.apply_failure(&error),
        }
    }

    /// Install `session` as the only tracking session, returning the one it replaces.
    pub(crate) fn replace_session(&mut self, session: TrackingSession) -> Option<TrackingSession> {
        self.watching = true;
        self.session.replace(session)
    }

    /// Clear the session and the watching flag.
    pub(crate) fn take_session(&mut self) -> Option<TrackingSession> {
        self.watching = false;
        self.session.take()
    }
}

/// State shared between the widget and the tasks it spawns.
#[derive(Debug, Clone, Default)]
pub(crate) struct Shared(Rc<RefCell<WidgetState>>);

impl Shared {
    pub(crate) fn new() -> Self {
        let shared = Self::default();
        shared.0.borrow_mut().active = true;
        shared
    }

    pub(crate) fn read(&self) -> Ref<'_, WidgetState> {
        self.0.borrow()
    }

    /// Apply `f` unless the widget has been torn down.
    ///
    /// Returns whether the update was applied.
    pub(crate) fn update(&self, f: impl FnOnce(&mut WidgetState)) -> bool {
        let mut state = self.0.borrow_mut();
        if !state.active {
            debug!("ignoring update after teardown");
            return false;
        }
        f(&mut state);
        true
    }

    /// Mark the widget inactive, handing back whatever session was live.
    pub(crate) fn deactivate(&self) -> Option<TrackingSession> {
        let mut state = self.0.borrow_mut();
        state.active = false;
        state.take_session()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_clears_error_and_loading() {
        let mut state = WidgetState {
            loading: true,
            error: Some("Timeout expired".into()),
            ..WidgetState::default()
        };
        state.apply_position(Position::new(1.0, 2.0, 3.0));
        assert!(!state.loading);
        assert_eq!(state.error, None);
        assert!(state.position.is_some());
    }

    #[test]
    fn failure_keeps_last_position() {
        let mut state = WidgetState::default();
        state.apply_position(Position::new(1.0, 2.0, 3.0));
        state.apply_failure(&LocationError::PositionUnavailable);
        assert_eq!(state.error.as_deref(), Some("Position unavailable"));
        assert!(state.position.is_some());
    }

    #[test]
    fn updates_stop_after_deactivation() {
        let shared = Shared::new();
        assert!(shared.update(|s| s.loading = true));
        assert!(shared.deactivate().is_none());
        assert!(!shared.update(|s| s.loading = false));
        assert!(shared.read().loading);
    }
}

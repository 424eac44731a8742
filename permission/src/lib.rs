//! Location permission queries and change notifications.
//!
//! The [`PermissionService`] trait is the seam the widget consumes. The
//! [`SystemPermissionService`] answers it from the host platform on Windows
//! and Linux and reports itself unavailable elsewhere.

#![warn(missing_docs)]

/// Platform-specific implementations.
pub mod sys;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use async_channel::{Sender, unbounded};
use futures::future::LocalBoxFuture;
use futures::stream::{self, LocalBoxStream};
use futures::{FutureExt, StreamExt};
use log::debug;

/// Capabilities whose permission can be queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Capability {
    /// Access to the device position.
    Geolocation,
}

/// The user's decision for a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PermissionState {
    /// Access has been granted.
    Granted,
    /// Access has been denied.
    Denied,
    /// The user will be asked on first use.
    Prompt,
    /// The state could not be determined.
    #[default]
    Unknown,
}

impl PermissionState {
    /// Lowercase label, as shown in the widget's permission badge.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Denied => "denied",
            Self::Prompt => "prompt",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors that can occur when querying permissions.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PermissionError {
    /// Permission introspection is not supported on this platform.
    #[error("permission query not supported on this platform")]
    NotSupported,
    /// An unknown error occurred.
    #[error("unknown error: {0}")]
    Unknown(String),
}

/// Result of a single permission query.
pub type PermissionFuture = LocalBoxFuture<'static, Result<PermissionState, PermissionError>>;

/// Stream of permission states, yielding each change as it is reported.
pub type PermissionStream = LocalBoxStream<'static, PermissionState>;

/// A source of permission state for the widget.
pub trait PermissionService {
    /// Whether this service can be queried at all on the current host.
    fn is_available(&self) -> bool;

    /// Query the current state of `capability`.
    fn query(&self, capability: Capability) -> PermissionFuture;

    /// Subscribe to changes of `capability`.
    ///
    /// Returns `None` when the service has no change notifications. Dropping
    /// the stream unsubscribes.
    fn subscribe(&self, capability: Capability) -> Option<PermissionStream>;

    /// Query `capability` again because the caller suspects it changed.
    ///
    /// Services with subscribers deliver the result to them as well. The
    /// default only queries.
    fn refresh(&self, capability: Capability) -> PermissionFuture {
        self.query(capability)
    }
}

impl<T: PermissionService + ?Sized> PermissionService for Rc<T> {
    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn query(&self, capability: Capability) -> PermissionFuture {
        (**self).query(capability)
    }

    fn subscribe(&self, capability: Capability) -> Option<PermissionStream> {
        (**self).subscribe(capability)
    }

    fn refresh(&self, capability: Capability) -> PermissionFuture {
        (**self).refresh(capability)
    }
}

/// Fan-out of permission changes to any number of subscribers.
///
/// Subscribers that have been dropped are pruned on the next publish.
#[derive(Default)]
pub struct PermissionBroadcaster {
    subscribers: RefCell<Vec<Sender<PermissionState>>>,
}

impl fmt::Debug for PermissionBroadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionBroadcaster")
            .field("subscribers", &self.subscribers.borrow().len())
            .finish()
    }
}

impl PermissionBroadcaster {
    /// Create a broadcaster with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> PermissionStream {
        let (sender, receiver) = unbounded();
        self.subscribers.borrow_mut().push(sender);
        receiver.boxed_local()
    }

    /// Deliver `state` to every live subscriber.
    pub fn publish(&self, state: PermissionState) {
        self.subscribers
            .borrow_mut()
            .retain(|sender| sender.try_send(state).is_ok());
        debug!("published permission state {state}");
    }

    /// Number of live subscribers as of the last publish.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

/// Permission service backed by the host platform.
///
/// Subscribers hear about every [`refresh`](PermissionService::refresh), and
/// on Windows also about the system's own location status changes.
#[derive(Debug, Default)]
pub struct SystemPermissionService {
    changes: Rc<PermissionBroadcaster>,
}

impl SystemPermissionService {
    /// Create the platform service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PermissionService for SystemPermissionService {
    fn is_available(&self) -> bool {
        sys::AVAILABLE
    }

    fn query(&self, capability: Capability) -> PermissionFuture {
        sys::query(capability).boxed_local()
    }

    fn subscribe(&self, capability: Capability) -> Option<PermissionStream> {
        if !sys::AVAILABLE {
            return None;
        }
        let refreshed = self.changes.subscribe();
        Some(match sys::changes(capability) {
            Some(native) => stream::select(refreshed, native).boxed_local(),
            None => refreshed,
        })
    }

    fn refresh(&self, capability: Capability) -> PermissionFuture {
        let changes = self.changes.clone();
        async move {
            let state = sys::query(capability).await?;
            changes.publish(state);
            Ok(state)
        }
        .boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn broadcaster_delivers_to_every_subscriber() {
        let changes = PermissionBroadcaster::new();
        let mut first = changes.subscribe();
        let mut second = changes.subscribe();

        changes.publish(PermissionState::Denied);

        assert_eq!(block_on(first.next()), Some(PermissionState::Denied));
        assert_eq!(block_on(second.next()), Some(PermissionState::Denied));
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let changes = PermissionBroadcaster::new();
        let kept = changes.subscribe();
        drop(changes.subscribe());

        changes.publish(PermissionState::Granted);

        assert_eq!(changes.subscriber_count(), 1);
        drop(kept);
        changes.publish(PermissionState::Prompt);
        assert_eq!(changes.subscriber_count(), 0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn refresh_reaches_subscribers() {
        let service = SystemPermissionService::new();
        let mut changes = service.subscribe(Capability::Geolocation).unwrap();

        let state = block_on(service.refresh(Capability::Geolocation)).unwrap();

        assert_eq!(block_on(changes.next()), Some(state));
        assert_ne!(state, PermissionState::Unknown);
    }

    #[test]
    fn default_state_is_unknown() {
        assert_eq!(PermissionState::default(), PermissionState::Unknown);
        assert_eq!(PermissionState::Prompt.to_string(), "prompt");
    }
}

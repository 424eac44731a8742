//! In-memory collaborators for widget tests.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::channel::{mpsc, oneshot};
use futures::FutureExt;
use futures::StreamExt as _;
use geokit_clipboard::{ClipboardError, ClipboardService};
use geokit_launcher::{Features, LaunchError, Launcher, Target};
use geokit_location::{
    LocationError, LocationResult, LocationService, Position, PositionFuture, PositionOptions,
    PositionStream,
};
use geokit_permission::{
    Capability, PermissionBroadcaster, PermissionError, PermissionFuture, PermissionService,
    PermissionState, PermissionStream,
};

use crate::Services;

type Reply = oneshot::Sender<LocationResult<Position>>;
type Feed = mpsc::UnboundedSender<LocationResult<Position>>;

#[derive(Debug, Default)]
pub struct FakeLocation {
    pub available: bool,
    pub refuse_watch: Option<LocationError>,
    pub requests: RefCell<Vec<(PositionOptions, Reply)>>,
    pub watches: RefCell<Vec<(PositionOptions, Feed)>>,
}

impl FakeLocation {
    pub fn available() -> Rc<Self> {
        Rc::new(Self {
            available: true,
            ..Self::default()
        })
    }

    pub fn missing() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Answer the oldest pending one-shot request.
    pub fn reply(&self, reading: LocationResult<Position>) {
        let (_, reply) = self.requests.borrow_mut().remove(0);
        // The widget may have gone away; that is what some tests check.
        let _ = reply.send(reading);
    }

    /// Push a reading into the most recent watch.
    pub fn emit(&self, reading: LocationResult<Position>) {
        let watches = self.watches.borrow();
        let (_, feed) = watches.last().expect("no watch started");
        let _ = feed.unbounded_send(reading);
    }

    /// End the most recent watch from the service side.
    pub fn finish_watch(&self) {
        if let Some((_, feed)) = self.watches.borrow().last() {
            feed.close_channel();
        }
    }

    /// End the `index`th watch from the service side.
    pub fn finish_watch_at(&self, index: usize) {
        self.watches.borrow()[index].1.close_channel();
    }

    /// Watches whose receiving end is still held by the widget.
    pub fn live_watches(&self) -> usize {
        self.watches
            .borrow()
            .iter()
            .filter(|(_, feed)| !feed.is_closed())
            .count()
    }
}

impl LocationService for FakeLocation {
    fn is_available(&self) -> bool {
        self.available
    }

    fn request_once(&self, options: PositionOptions) -> PositionFuture {
        let (reply, response) = oneshot::channel();
        self.requests.borrow_mut().push((options, reply));
        response
            .map(|r| r.unwrap_or_else(|_| Err(LocationError::Unknown("request dropped".into()))))
            .boxed_local()
    }

    fn watch(&self, options: PositionOptions) -> LocationResult<PositionStream> {
        if let Some(error) = &self.refuse_watch {
            return Err(error.clone());
        }
        let (feed, readings) = mpsc::unbounded();
        self.watches.borrow_mut().push((options, feed));
        Ok(readings.boxed_local())
    }
}

#[derive(Debug, Default)]
pub struct FakePermission {
    pub available: bool,
    /// State reported by queries; `None` makes them fail.
    pub current: Cell<Option<PermissionState>>,
    pub refreshes: Cell<usize>,
    pub changes: PermissionBroadcaster,
}

impl FakePermission {
    pub fn reporting(initial: PermissionState) -> Rc<Self> {
        Rc::new(Self {
            available: true,
            current: Cell::new(Some(initial)),
            ..Self::default()
        })
    }

    pub fn failing() -> Rc<Self> {
        Rc::new(Self {
            available: true,
            ..Self::default()
        })
    }

    pub fn missing() -> Rc<Self> {
        Rc::new(Self::default())
    }
}

impl PermissionService for FakePermission {
    fn is_available(&self) -> bool {
        self.available
    }

    fn query(&self, _capability: Capability) -> PermissionFuture {
        let result = self
            .current
            .get()
            .ok_or_else(|| PermissionError::Unknown("query rejected".into()));
        futures::future::ready(result).boxed_local()
    }

    fn subscribe(&self, _capability: Capability) -> Option<PermissionStream> {
        self.available.then(|| self.changes.subscribe())
    }

    fn refresh(&self, capability: Capability) -> PermissionFuture {
        self.refreshes.set(self.refreshes.get() + 1);
        if let Some(state) = self.current.get() {
            self.changes.publish(state);
        }
        self.query(capability)
    }
}

#[derive(Debug, Default)]
pub struct FakeClipboard {
    pub fail: Cell<bool>,
    pub writes: RefCell<Vec<String>>,
}

impl FakeClipboard {
    pub fn working() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn broken() -> Rc<Self> {
        let clipboard = Self::default();
        clipboard.fail.set(true);
        Rc::new(clipboard)
    }
}

impl ClipboardService for FakeClipboard {
    fn is_available(&self) -> bool {
        true
    }

    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        if self.fail.get() {
            return Err(ClipboardError::Platform("clipboard locked".into()));
        }
        self.writes.borrow_mut().push(text.to_string());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FakeLauncher {
    pub opened: RefCell<Vec<(String, Target, Features)>>,
}

impl Launcher for FakeLauncher {
    fn is_available(&self) -> bool {
        true
    }

    fn open(&self, url: &str, target: Target, features: Features) -> Result<(), LaunchError> {
        self.opened
            .borrow_mut()
            .push((url.to_string(), target, features));
        Ok(())
    }
}

/// Handles kept by a test after the services are moved into the widget.
#[derive(Debug)]
pub struct Fakes {
    pub location: Rc<FakeLocation>,
    pub permission: Rc<FakePermission>,
    pub clipboard: Rc<FakeClipboard>,
    pub fallback: Rc<FakeClipboard>,
    pub launcher: Rc<FakeLauncher>,
}

impl Default for Fakes {
    fn default() -> Self {
        Self {
            location: FakeLocation::available(),
            permission: FakePermission::reporting(PermissionState::Prompt),
            clipboard: FakeClipboard::working(),
            fallback: FakeClipboard::working(),
            launcher: Rc::new(FakeLauncher::default()),
        }
    }
}

impl Fakes {
    pub fn services(&self) -> Services {
        Services {
            location: Box::new(self.location.clone()),
            permission: self.permission.clone(),
            clipboard: Box::new(self.clipboard.clone()),
            clipboard_fallback: Box::new(self.fallback.clone()),
            launcher: Box::new(self.launcher.clone()),
        }
    }
}

pub fn san_francisco() -> Position {
    Position {
        latitude: 37.7749,
        longitude: -122.4194,
        accuracy: 8.0,
        altitude: Some(52.0),
        altitude_accuracy: Some(3.0),
        heading: Some(270.0),
        speed: Some(1.4),
        timestamp: 1_700_000_000_000,
    }
}

pub fn london() -> Position {
    Position {
        latitude: 51.5074,
        longitude: -0.1278,
        accuracy: 20.0,
        altitude: None,
        altitude_accuracy: None,
        heading: None,
        speed: None,
        timestamp: 1_700_000_060_000,
    }
}

use std::fmt;
use std::rc::Rc;

use geokit_clipboard::{ClipboardService, HelperClipboard, SystemClipboard};
use geokit_launcher::{Launcher, SystemLauncher};
use geokit_location::{LocationService, SystemLocationService};
use geokit_permission::{PermissionService, SystemPermissionService};

use crate::WidgetConfig;

/// The external collaborators a widget drives.
pub struct Services {
    /// Source of position readings.
    pub location: Box<dyn LocationService>,
    /// Source of permission state.
    ///
    /// Shared with the widget's tasks, which refresh it after a denied reading.
    pub permission: Rc<dyn PermissionService>,
    /// Primary clipboard.
    pub clipboard: Box<dyn ClipboardService>,
    /// Clipboard used when the primary one fails.
    pub clipboard_fallback: Box<dyn ClipboardService>,
    /// Opener for map links.
    pub launcher: Box<dyn Launcher>,
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("availability", &Availability::detect(self))
            .finish_non_exhaustive()
    }
}

impl Services {
    /// The host platform's services with default settings.
    #[must_use]
    pub fn system() -> Self {
        Self::system_with(&WidgetConfig::default())
    }

    /// The host platform's services configured by `config`.
    #[must_use]
    pub fn system_with(config: &WidgetConfig) -> Self {
        Self {
            location: Box::new(SystemLocationService::with_watch_interval(
                config.watch_interval(),
            )),
            permission: Rc::new(SystemPermissionService::new()),
            clipboard: Box::new(SystemClipboard::new()),
            clipboard_fallback: Box::new(HelperClipboard::new()),
            launcher: Box::new(SystemLauncher::new()),
        }
    }
}

/// Which collaborators exist on this host, detected once at mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct Availability {
    /// Position readings can be requested.
    pub location: bool,
    /// Permission state can be queried.
    pub permission: bool,
    /// Either clipboard can be written.
    pub clipboard: bool,
    /// URLs can be opened.
    pub launcher: bool,
}

impl Availability {
    /// Probe every collaborator in `services`.
    #[must_use]
    pub fn detect(services: &Services) -> Self {
        Self {
            location: services.location.is_available(),
            permission: services.permission.is_available(),
            clipboard: services.clipboard.is_available()
                || services.clipboard_fallback.is_available(),
            launcher: services.launcher.is_available(),
        }
    }
}

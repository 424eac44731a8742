//! Location monitor widget.
//!
//! [`LocationWidget`] reads the device position once or continuously,
//! observes the location permission, and offers two convenience actions:
//! copying the coordinates and opening them in an external map viewer.
//!
//! The widget is single-threaded. It spawns its asynchronous work onto a
//! host-provided [`LocalSpawn`](futures::task::LocalSpawn) executor, and every
//! piece of state is written from tasks running on that executor.
//!
//! ```ignore
//! use futures::executor::LocalPool;
//! use geokit_widget::{LocationWidget, Services};
//!
//! let mut pool = LocalPool::new();
//! let mut widget = LocationWidget::mount(Services::system(), pool.spawner());
//!
//! widget.start_tracking();
//! pool.run_until_stalled();
//! println!("{}", widget.view());
//!
//! widget.stop_tracking();
//! ```

#![warn(missing_docs)]

mod actions;
mod config;
mod services;
mod state;
mod view;
mod widget;

#[cfg(test)]
mod testing;

pub use actions::{CopyOutcome, coordinate_text, map_url};
pub use config::WidgetConfig;
pub use services::{Availability, Services};
pub use view::{Action, ActionKind, Row, Status, WidgetView};
pub use widget::LocationWidget;

pub use geokit_location::{LocationError, Position, PositionOptions, UNSUPPORTED_MESSAGE};
pub use geokit_permission::PermissionState;

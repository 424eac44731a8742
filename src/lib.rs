//! # Geokit
//!
//! A location monitor widget together with the platform services it drives.
//!
//! The widget reads the device position once or continuously, observes the
//! location permission, and offers copy and open-in-map actions. Each
//! collaborator lives in its own crate behind a trait so hosts can swap in
//! their own implementation.
//!
//! ## Features
//!
//! - `permission`: location permission queries and change notifications.
//! - `location`: one-shot and continuous position readings.
//! - `clipboard`: text clipboard writes with a helper-process fallback.
//! - `launcher`: opening URLs in an external browsing context.
//! - `widget`: the [`widget::LocationWidget`] itself (default).
//!
//! Use the `full` feature to enable everything.
//!
//! ## Example
//!
//! ```toml
//! [dependencies]
//! geokit = { version = "0.1", features = ["full"] }
//! ```
//!
//! ```rust,ignore
//! use futures::executor::LocalPool;
//! use geokit::widget::{LocationWidget, Services};
//!
//! let mut pool = LocalPool::new();
//! let mut widget = LocationWidget::mount(Services::system(), pool.spawner());
//! widget.request_once();
//! pool.run_until_stalled();
//! println!("{}", widget.view());
//! ```

#[cfg(feature = "clipboard")]
pub use geokit_clipboard as clipboard;

#[cfg(feature = "launcher")]
pub use geokit_launcher as launcher;

#[cfg(feature = "location")]
pub use geokit_location as location;

#[cfg(feature = "permission")]
pub use geokit_permission as permission;

#[cfg(feature = "widget")]
pub use geokit_widget as widget;

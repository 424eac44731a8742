//! Opening URLs in an external browsing context.
//!
//! The widget hands map links to a [`Launcher`]. [`SystemLauncher`] forwards
//! them to the desktop's default handler (`xdg-open`, `open`, or `start`).

#![warn(missing_docs)]

use std::fmt;
use std::process::{Command, Stdio};
use std::rc::Rc;
use std::thread;

use log::debug;

/// Where a URL should be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Target {
    /// A new, separate browsing context.
    #[default]
    Blank,
    /// The browsing context that issued the request.
    Current,
}

impl Target {
    /// The conventional target name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blank => "_blank",
            Self::Current => "_self",
        }
    }
}

/// Isolation requested for the opened context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    /// The new context gets no handle back to the opener.
    pub noopener: bool,
    /// No referrer is sent with the navigation.
    pub noreferrer: bool,
}

impl Features {
    /// Fully detached: no opener handle and no referrer.
    pub const ISOLATED: Self = Self {
        noopener: true,
        noreferrer: true,
    };
}

impl Default for Features {
    fn default() -> Self {
        Self::ISOLATED
    }
}

impl fmt::Display for Features {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags: Vec<&str> = [
            (self.noopener, "noopener"),
            (self.noreferrer, "noreferrer"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect();
        f.write_str(&flags.join(","))
    }
}

/// Errors that can occur when opening a URL.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LaunchError {
    /// No URL handler exists on this platform.
    #[error("opening URLs is not supported on this platform")]
    NotSupported,
    /// The URL was empty or not absolute.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    /// The handler process could not be started.
    #[error("failed to start `{program}`: {reason}")]
    Spawn {
        /// Program that was attempted.
        program: String,
        /// What went wrong.
        reason: String,
    },
}

/// Something that can open URLs.
pub trait Launcher {
    /// Whether URLs can be opened at all on the current host.
    fn is_available(&self) -> bool;

    /// Open `url` in `target` with the requested `features`.
    ///
    /// # Errors
    /// Returns a [`LaunchError`] if the URL cannot be handed off.
    fn open(&self, url: &str, target: Target, features: Features) -> Result<(), LaunchError>;
}

impl<T: Launcher + ?Sized> Launcher for Rc<T> {
    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn open(&self, url: &str, target: Target, features: Features) -> Result<(), LaunchError> {
        (**self).open(url, target, features)
    }
}

/// Launcher using the desktop's default URL handler.
///
/// The handler runs as a separate process, so the opened context never holds
/// a reference back to this one regardless of the requested features.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl SystemLauncher {
    /// Create the platform launcher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn command(url: &str) -> Option<Command> {
        if cfg!(target_os = "windows") {
            let mut command = Command::new("cmd");
            command.args(["/C", "start", ""]).arg(url);
            Some(command)
        } else if cfg!(target_os = "macos") {
            let mut command = Command::new("open");
            command.arg(url);
            Some(command)
        } else if cfg!(unix) {
            let mut command = Command::new("xdg-open");
            command.arg(url);
            Some(command)
        } else {
            None
        }
    }
}

/// Reject anything that is not an absolute `http(s)` URL.
///
/// # Errors
/// Returns [`LaunchError::InvalidUrl`] for other inputs.
pub fn validate_url(url: &str) -> Result<(), LaunchError> {
    let valid = ["https://", "http://"]
        .iter()
        .any(|scheme| url.len() > scheme.len() && url.starts_with(scheme));
    if valid && !url.chars().any(char::is_whitespace) {
        Ok(())
    } else {
        Err(LaunchError::InvalidUrl(url.to_string()))
    }
}

impl Launcher for SystemLauncher {
    fn is_available(&self) -> bool {
        cfg!(any(unix, target_os = "windows"))
    }

    fn open(&self, url: &str, target: Target, features: Features) -> Result<(), LaunchError> {
        validate_url(url)?;
        let mut command = Self::command(url).ok_or(LaunchError::NotSupported)?;
        let program = command.get_program().to_string_lossy().into_owned();
        debug!("opening {url} in {} ({features}) via {program}", target.as_str());

        spawn_detached(command, program)
    }
}

/// Start `command` and reap it on a background thread once it exits.
///
/// URL handlers return as soon as the URL is handed to the browser.
fn spawn_detached(mut command: Command, program: String) -> Result<(), LaunchError> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| LaunchError::Spawn {
            program: program.clone(),
            reason: e.to_string(),
        })?;

    let reaper = thread::Builder::new()
        .name("geokit-launcher-reaper".into())
        .spawn(move || match child.wait() {
            Ok(status) if !status.success() => debug!("{program} exited with {status}"),
            Ok(_) => {}
            Err(e) => debug!("failed to wait for {program}: {e}"),
        });
    if let Err(e) = reaper {
        debug!("failed to start launcher reaper: {e}");
    }
    Ok(())
}

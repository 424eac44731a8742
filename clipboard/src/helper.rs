use std::io::Write;
use std::process::{Command, Stdio};

use log::debug;

use crate::{ClipboardError, ClipboardService};

/// Clipboard writer that hands the text to an external helper program.
///
/// Each write spawns the first helper that runs successfully, feeds it the
/// text on stdin and waits for it to exit.
#[derive(Debug, Clone)]
pub struct HelperClipboard {
    commands: Vec<Vec<String>>,
}

impl Default for HelperClipboard {
    fn default() -> Self {
        Self::new()
    }
}

impl HelperClipboard {
    /// Use the helpers conventional for the current platform.
    #[must_use]
    pub fn new() -> Self {
        Self::with_commands(platform_commands())
    }

    /// Use an explicit list of helper command lines, tried in order.
    #[must_use]
    pub const fn with_commands(commands: Vec<Vec<String>>) -> Self {
        Self { commands }
    }

    fn run(command: &[String], text: &str) -> Result<(), ClipboardError> {
        let Some((program, args)) = command.split_first() else {
            return Err(ClipboardError::NotSupported);
        };
        let helper_error = |reason: String| ClipboardError::Helper {
            program: program.clone(),
            reason,
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| helper_error(e.to_string()))?;

        let written = child
            .stdin
            .take()
            .map_or(Ok(()), |mut stdin| stdin.write_all(text.as_bytes()));
        if let Err(e) = written {
            // Reap the helper before reporting the failed write.
            if let Err(kill) = child.kill() {
                debug!("failed to kill clipboard helper {program}: {kill}");
            }
            if let Err(wait) = child.wait() {
                debug!("failed to reap clipboard helper {program}: {wait}");
            }
            return Err(helper_error(e.to_string()));
        }

        let status = child.wait().map_err(|e| helper_error(e.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(helper_error(format!("exited with {status}")))
        }
    }
}

impl ClipboardService for HelperClipboard {
    fn is_available(&self) -> bool {
        !self.commands.is_empty()
    }

    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut last_error = ClipboardError::NotSupported;
        for command in &self.commands {
            match Self::run(command, text) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    debug!("clipboard helper failed: {e}");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}

fn owned(command: &[&str]) -> Vec<String> {
    command.iter().map(ToString::to_string).collect()
}

fn platform_commands() -> Vec<Vec<String>> {
    let mut commands = Vec::new();
    if cfg!(target_os = "macos") {
        commands.push(owned(&["pbcopy"]));
    } else if cfg!(target_os = "windows") {
        commands.push(owned(&["clip"]));
    } else if cfg!(unix) {
        if std::env::var_os("WAYLAND_DISPLAY").is_some() {
            commands.push(owned(&["wl-copy"]));
        }
        commands.push(owned(&["xclip", "-selection", "clipboard"]));
        commands.push(owned(&["xsel", "--clipboard", "--input"]));
    }
    commands
}

//! Terminal host for the location widget.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use futures::StreamExt;
use futures::channel::mpsc;
use futures::executor::{LocalPool, LocalSpawner};
use futures_timer::Delay;
use geokit_widget::{CopyOutcome, LocationWidget, Position, Services, WidgetConfig};
use owo_colors::OwoColorize;

const SETTLE_POLL: Duration = Duration::from_millis(50);

type Widget = LocationWidget<LocalSpawner>;

#[derive(Parser, Debug)]
#[command(name = "geokit")]
#[command(about = "Read, track and share the device location", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON file holding widget settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Ask for a coarse fix instead of the most accurate one
    #[arg(long, global = true)]
    low_accuracy: bool,

    /// Give up on a reading after this many milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Accept a cached reading up to this many milliseconds old
    #[arg(long, global = true)]
    max_age_ms: Option<u64>,

    /// Minimum time between readings while tracking, in milliseconds
    #[arg(long, global = true)]
    interval_ms: Option<u64>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log more (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Read the location once and print it
    Once,
    /// Track the location and print every change
    Watch {
        /// Stop after this many readings
        #[arg(long)]
        count: Option<usize>,
    },
    /// Drive the widget with commands read from stdin
    Interactive,
}

impl Cli {
    fn widget_config(&self) -> Result<WidgetConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => WidgetConfig::default(),
        };
        if self.low_accuracy {
            config.position.high_accuracy = false;
        }
        if let Some(timeout) = self.timeout_ms {
            config.position.timeout = Duration::from_millis(timeout);
        }
        if let Some(max_age) = self.max_age_ms {
            config.position.maximum_age = Duration::from_millis(max_age);
        }
        if let Some(interval) = self.interval_ms {
            config.watch_interval_ms = interval;
        }
        Ok(config)
    }

    const fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    }
}

fn load_config(path: &Path) -> Result<WidgetConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
        .init();

    let config = cli.widget_config()?;
    log::debug!("using {config:?}");

    let mut pool = LocalPool::new();
    let mut widget =
        LocationWidget::mount_with(Services::system_with(&config), pool.spawner(), &config);
    pool.run_until_stalled();

    let paint = Paint {
        color: !cli.no_color,
    };
    match cli.command {
        Commands::Once => run_once(&mut pool, &mut widget, paint),
        Commands::Watch { count } => run_watch(&mut pool, &mut widget, paint, count),
        Commands::Interactive => run_interactive(&mut pool, &mut widget, paint),
    }
}

/// Run the widget's tasks until `pending` turns false.
fn run_while(pool: &mut LocalPool, mut pending: impl FnMut() -> bool) {
    pool.run_until(async {
        while pending() {
            Delay::new(SETTLE_POLL).await;
        }
    });
}

fn run_once(pool: &mut LocalPool, widget: &mut Widget, paint: Paint) -> Result<()> {
    widget.request_once();
    run_while(pool, || widget.is_loading());
    paint.view(widget);

    if let Some(error) = widget.error() {
        anyhow::bail!(error);
    }
    Ok(())
}

fn run_watch(
    pool: &mut LocalPool,
    widget: &mut Widget,
    paint: Paint,
    count: Option<usize>,
) -> Result<()> {
    widget.start_tracking();
    if !widget.is_watching() {
        paint.view(widget);
        anyhow::bail!(widget.error().unwrap_or_else(|| "Tracking did not start".into()));
    }

    let mut seen = snapshot(widget);
    let mut readings = 0;
    loop {
        run_while(pool, || widget.is_watching() && snapshot(widget) == seen);
        if !widget.is_watching() {
            println!("{}", paint.warn("Location service ended tracking"));
            break;
        }
        seen = snapshot(widget);
        paint.view(widget);
        println!();

        if seen.1.is_none() {
            readings += 1;
        }
        if count.is_some_and(|limit| readings >= limit) {
            break;
        }
    }

    widget.stop_tracking();
    Ok(())
}

fn snapshot(widget: &Widget) -> (Option<Position>, Option<String>) {
    (widget.position(), widget.error())
}

fn run_interactive(pool: &mut LocalPool, widget: &mut Widget, paint: Paint) -> Result<()> {
    let (lines_tx, mut lines) = mpsc::unbounded();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines().map_while(std::result::Result::ok) {
            if lines_tx.unbounded_send(line).is_err() {
                break;
            }
        }
    });

    print_help();
    paint.view(widget);
    loop {
        print!("\n> ");
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = pool.run_until(lines.next()) else {
            break;
        };
        match line.trim() {
            "get" => {
                widget.request_once();
                run_while(pool, || widget.is_loading());
            }
            "start" => widget.start_tracking(),
            "stop" => widget.stop_tracking(),
            "copy" => paint.copy_outcome(&widget.copy_coordinates()),
            "map" => match widget.open_in_map_viewer() {
                Ok(Some(url)) => println!("{} {url}", paint.ok("Opened")),
                Ok(None) => println!("{}", paint.warn("No location to show yet")),
                Err(e) => println!("{} {e}", paint.error("Could not open map:")),
            },
            "quit" | "exit" => break,
            "help" | "?" => {
                print_help();
                continue;
            }
            "show" | "" => {}
            other => {
                println!("{} {other}", paint.error("Unknown command:"));
                continue;
            }
        }
        pool.run_until_stalled();
        paint.view(widget);
    }

    widget.teardown();
    Ok(())
}

fn print_help() {
    println!("Commands: get, start, stop, copy, map, show, help, quit");
}

#[derive(Debug, Clone, Copy)]
struct Paint {
    color: bool,
}

impl Paint {
    fn ok(self, text: &str) -> String {
        if self.color {
            text.green().bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn warn(self, text: &str) -> String {
        if self.color {
            text.yellow().to_string()
        } else {
            text.to_string()
        }
    }

    fn error(self, text: &str) -> String {
        if self.color {
            text.red().bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn view(self, widget: &Widget) {
        let view = widget.view();
        if !self.color {
            println!("{view}");
            return;
        }
        for line in view.to_string().lines() {
            if line.trim_start().starts_with('!') {
                println!("{}", line.red());
            } else if line.starts_with("Location") {
                println!("{}", line.bold());
            } else {
                println!("{line}");
            }
        }
    }

    fn copy_outcome(self, outcome: &CopyOutcome) {
        match outcome {
            CopyOutcome::NothingToCopy => println!("{}", self.warn("No location to copy yet")),
            CopyOutcome::Copied(text) => println!("{} {text}", self.ok("Copied")),
            CopyOutcome::CopiedWithFallback(text) => {
                println!("{} {text} (helper clipboard)", self.ok("Copied"));
            }
            CopyOutcome::Failed(e) => println!("{} {e}", self.error("Copy failed:")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "geokit",
            "--low-accuracy",
            "--timeout-ms",
            "2500",
            "--max-age-ms",
            "60000",
            "watch",
            "--count",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.command, Commands::Watch { count: Some(3) });

        let config = cli.widget_config().unwrap();
        assert!(!config.position.high_accuracy);
        assert_eq!(config.position.timeout, Duration::from_millis(2500));
        assert_eq!(config.position.maximum_age, Duration::from_secs(60));
        assert_eq!(config.watch_interval_ms, WidgetConfig::default().watch_interval_ms);
    }

    #[test]
    fn no_flags_keep_widget_defaults() {
        let cli = Cli::try_parse_from(["geokit", "once"]).unwrap();
        assert_eq!(cli.widget_config().unwrap(), WidgetConfig::default());
        assert_eq!(cli.log_filter(), "warn");
    }

    #[test]
    fn config_file_is_overridden_by_flags() {
        let path = std::env::temp_dir().join(format!("geokit-cli-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{"position": {"timeout_ms": 4000, "high_accuracy": false}, "watch_interval_ms": 250}"#,
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "geokit",
            "--config",
            path.to_str().unwrap(),
            "--timeout-ms",
            "9000",
            "-vv",
            "interactive",
        ])
        .unwrap();
        let config = cli.widget_config().unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(!config.position.high_accuracy);
        assert_eq!(config.position.timeout, Duration::from_millis(9000));
        assert_eq!(config.watch_interval_ms, 250);
        assert_eq!(cli.log_filter(), "trace");
    }

    #[test]
    fn missing_config_file_is_reported() {
        let cli = Cli::try_parse_from(["geokit", "--config", "/nonexistent/geokit.json", "once"])
            .unwrap();
        let error = cli.widget_config().unwrap_err();
        assert!(error.to_string().starts_with("Failed to read config"));
    }
}

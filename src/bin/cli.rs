//! pagewatch CLI
//!
//! Watches one URL until interrupted, or for a few cycles with `--test`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use pagewatch::{
    config::{load_config, resolve_config_path},
    error::Result,
    models::{Config, ExtractionMode},
    notify::{LogSink, Notifier},
    pipeline::{Monitor, RunSummary},
    services::{Fetcher, HttpFetcher},
    storage::{LocalStorage, MemoryStore, SnapshotStore},
};
use tokio_util::sync::CancellationToken;

const EXIT_OK: u8 = 0;
/// Exit code for unrecoverable startup failures.
const EXIT_STARTUP: u8 = 1;
/// Exit code for configuration errors.
const EXIT_CONFIG: u8 = 2;
/// Exit code when a second interrupt aborts the run.
const EXIT_INTERRUPTED: u8 = 130;

/// pagewatch - Web Page Change Monitor
#[derive(Parser, Debug)]
#[command(
    name = "pagewatch",
    version,
    about = "Monitor a web page for content changes"
)]
struct Cli {
    /// URL to monitor
    #[arg(short, long)]
    url: Option<String>,

    /// Monitoring interval in seconds
    #[arg(short, long)]
    interval: Option<u64>,

    /// CSS selector to monitor a specific element
    #[arg(long)]
    selector: Option<String>,

    /// Extract the main content region instead of all page text
    #[arg(long, visible_alias = "use-trafilatura")]
    structured: bool,

    /// Run a few cycles against an in-memory snapshot, then exit
    #[arg(long)]
    test: bool,

    /// Number of cycles to run with --test
    #[arg(long, requires = "test")]
    cycles: Option<u64>,

    /// Show the status board
    #[cfg(feature = "display")]
    #[arg(long)]
    gui: bool,

    /// Path to a TOML config file (default: ./pagewatch.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for snapshot records
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.url {
            config.monitor.url = Some(url.clone());
        }
        if let Some(interval) = self.interval {
            config.monitor.interval_secs = interval;
        }
        if let Some(selector) = &self.selector {
            config.monitor.selector = Some(selector.clone());
        }
        if self.structured {
            config.monitor.extraction = ExtractionMode::Structured;
        }
        if self.test {
            config.monitor.test_mode = true;
        }
        if let Some(cycles) = self.cycles {
            config.monitor.test_cycles = cycles;
        }
        if let Some(dir) = &self.storage_dir {
            config.storage.dir = dir.clone();
        }
        config.monitor.gui |= self.gui_requested();
    }

    #[cfg(feature = "display")]
    fn gui_requested(&self) -> bool {
        self.gui
    }

    #[cfg(not(feature = "display"))]
    fn gui_requested(&self) -> bool {
        false
    }
}

/// Initialize logging based on the configured level.
fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[cfg(feature = "display")]
type DisplayTask = tokio::task::JoinHandle<pagewatch::notify::StatusBoard>;
#[cfg(not(feature = "display"))]
type DisplayTask = tokio::task::JoinHandle<()>;

/// Subscribe the status board when requested.
#[cfg(feature = "display")]
fn attach_display(config: &Config, notifier: Notifier) -> (Notifier, Option<DisplayTask>) {
    use pagewatch::notify::{DisplaySink, StatusBoard, display::DEFAULT_CAPACITY, run_display};

    if !config.monitor.gui {
        return (notifier, None);
    }

    let (sink, rx) = DisplaySink::channel(DEFAULT_CAPACITY);
    let board = StatusBoard::new(config.target_url());
    let handle = tokio::spawn(run_display(board, rx));
    (notifier.with_sink(sink), Some(handle))
}

#[cfg(not(feature = "display"))]
fn attach_display(config: &Config, notifier: Notifier) -> (Notifier, Option<DisplayTask>) {
    if config.monitor.gui {
        log::warn!("Built without the `display` feature; running headless");
    }
    (notifier, None)
}

/// How interrupt handling ended.
#[derive(Debug, PartialEq, Eq)]
enum Interrupt {
    /// A second interrupt arrived after cancellation was requested
    Forced,
    /// Interrupts cannot be received
    Unavailable,
}

/// Cancel `token` on the first interrupt; return on the second.
async fn watch_interrupts<S, F>(mut next_interrupt: S, token: CancellationToken) -> Interrupt
where
    S: FnMut() -> F,
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = next_interrupt().await {
        log::warn!("Cannot listen for interrupts: {}", e);
        return Interrupt::Unavailable;
    }
    log::info!("Interrupt received, stopping... (press Ctrl-C again to exit now)");
    token.cancel();

    match next_interrupt().await {
        Ok(()) => Interrupt::Forced,
        Err(e) => {
            log::warn!("Cannot listen for interrupts: {}", e);
            Interrupt::Unavailable
        }
    }
}

/// Cancel `token` on Ctrl-C, and exit immediately on a second Ctrl-C.
fn spawn_interrupt_handler(token: CancellationToken) {
    tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, token).await == Interrupt::Forced {
            log::warn!("Second interrupt received, exiting without waiting for the cycle");
            std::process::exit(i32::from(EXIT_INTERRUPTED));
        }
    });
}

/// Apply command-line overrides to the loaded configuration and validate it.
fn resolve(cli: &Cli, loaded: Result<Config>) -> Result<Config> {
    let mut config = loaded?;
    cli.apply(&mut config);
    config.validate()?;
    Ok(config)
}

/// Wire up the monitor with the HTTP fetcher and run it to completion.
async fn run(config: Config) -> Result<RunSummary> {
    let fetcher = Arc::new(HttpFetcher::new(&config.http)?);
    run_with(config, fetcher).await
}

/// Run the monitor with the given fetcher.
async fn run_with(config: Config, fetcher: Arc<dyn Fetcher>) -> Result<RunSummary> {
    let store: Arc<dyn SnapshotStore> = if config.monitor.test_mode {
        log::info!("Test mode: snapshot kept in memory only");
        Arc::new(MemoryStore::new())
    } else {
        let storage = LocalStorage::new(&config.storage.dir, config.target_url());
        log::info!("Snapshot file: {}", storage.location().display());
        Arc::new(storage)
    };

    let notifier = Notifier::new().with_sink(LogSink::new(config.detection.max_diff_lines));
    let (notifier, display) = attach_display(&config, notifier);

    let monitor = Monitor::new(&config, fetcher, store, notifier).await?;

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    // The monitor owns the notifier; once it returns, the display channel closes.
    let summary = monitor.run(cancel).await;

    if let Some(handle) = display {
        if let Err(e) = handle.await {
            log::warn!("Display task failed: {}", e);
        }
    }

    Ok(summary)
}

/// Log the end-of-run summary.
fn report(summary: &RunSummary) {
    log::info!(
        "[SUMMARY] {} cycles{}",
        summary.cycles(),
        if summary.cancelled { " (interrupted)" } else { "" }
    );
    for (label, count) in summary.counts() {
        log::info!("    {}: {}", label, count);
    }
    if summary.persistence_degraded {
        log::warn!("    persistence: degraded, last snapshot was not saved");
    }
}

/// Process exit status for the outcome of a run.
fn exit_status(outcome: &Result<RunSummary>) -> u8 {
    match outcome {
        Ok(_) => EXIT_OK,
        Err(e) if e.is_configuration() => EXIT_CONFIG,
        Err(_) => EXIT_STARTUP,
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let loaded = load_config(cli.config.as_deref());

    let level = if cli.verbose {
        "debug".to_string()
    } else {
        loaded
            .as_ref()
            .map(|c| c.logging.level.clone())
            .unwrap_or_else(|_| "info".to_string())
    };
    init_logging(&level);

    if loaded.is_ok() {
        if let Some(path) = resolve_config_path(cli.config.as_deref()) {
            log::info!("Loaded configuration from {}", path.display());
        }
    }

    let outcome = match resolve(&cli, loaded) {
        Ok(config) => {
            log::info!("pagewatch starting...");
            run(config).await
        }
        Err(e) => Err(e),
    };

    match &outcome {
        Ok(summary) => report(summary),
        Err(e) if e.is_configuration() => log::error!("{}", e),
        Err(e) => log::error!("Startup failed: {}", e),
    }
    ExitCode::from(exit_status(&outcome))
}

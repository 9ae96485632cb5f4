//! Status board display.
//!
//! The monitor publishes results into a broadcast channel without waiting;
//! a separate task owns the [`StatusBoard`] and redraws it for each event.
//! A slow display only loses old events, it never holds up a cycle.

use chrono::{DateTime, Local, Utc};
use tokio::sync::broadcast::{self, Receiver, Sender, error::RecvError};

use crate::models::{ObservationResult, ObservationStatus};

use super::NotificationSink;

/// Events buffered for a lagging display before the oldest are dropped.
pub const DEFAULT_CAPACITY: usize = 16;

const PANEL_WIDTH: usize = 60;

/// Fire-and-forget publisher of observation events.
#[derive(Debug, Clone)]
pub struct DisplaySink {
    tx: Sender<ObservationResult>,
}

impl DisplaySink {
    /// Create a sink and the receiver for the display task.
    pub fn channel(capacity: usize) -> (Self, Receiver<ObservationResult>) {
        let (tx, rx) = broadcast::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Attach another display.
    pub fn subscribe(&self) -> Receiver<ObservationResult> {
        self.tx.subscribe()
    }
}

impl NotificationSink for DisplaySink {
    fn notify(&self, result: &ObservationResult) {
        // No subscribers is fine: the display may be gone or not started yet.
        let _ = self.tx.send(result.clone());
    }
}

/// What the display shows.
#[derive(Debug, Clone)]
pub struct StatusBoard {
    url: String,
    status: String,
    latest: String,
    last_change: Option<String>,
    last_checked: Option<DateTime<Utc>>,
    cycles: u64,
    degraded: bool,
}

impl StatusBoard {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: "Starting monitoring...".to_string(),
            latest: "No results yet".to_string(),
            last_change: None,
            last_checked: None,
            cycles: 0,
            degraded: false,
        }
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn last_change(&self) -> Option<&str> {
        self.last_change.as_deref()
    }

    pub fn last_checked(&self) -> Option<DateTime<Utc>> {
        self.last_checked
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Update the board from one observation.
    pub fn apply(&mut self, result: &ObservationResult) {
        self.cycles = result.cycle;
        self.last_checked = Some(result.checked_at);
        if result.persist_error.is_some() {
            self.degraded = true;
        } else if !result.status.is_failure() {
            self.degraded = false;
        }

        let excerpt = result.excerpt.as_deref().unwrap_or_default();
        match result.status {
            ObservationStatus::FirstObservation => {
                self.status = "Initial content captured".to_string();
                self.latest = format!("Initial content: {excerpt}");
            }
            ObservationStatus::Unchanged => {
                self.status = "Monitoring...".to_string();
                self.latest = "No changes detected".to_string();
            }
            ObservationStatus::Changed => {
                self.status = "Change detected!".to_string();
                self.latest = format!("Content changed: {excerpt}");
                self.last_change = Some(format!(
                    "{} at {}",
                    result
                        .diff_summary
                        .as_ref()
                        .map(|d| d.describe())
                        .unwrap_or_default(),
                    result.checked_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
                ));
            }
            ObservationStatus::FetchFailed | ObservationStatus::ExtractFailed => {
                self.status = result.headline();
            }
        }
    }

    /// Mark the board as no longer receiving events.
    pub fn stop(&mut self) {
        self.status = "Monitoring stopped".to_string();
    }

    /// Render the board as a text panel.
    pub fn render(&self) -> String {
        let border = "═".repeat(PANEL_WIDTH);
        let checked = self
            .last_checked
            .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());

        let mut lines = vec![
            border.clone(),
            format!("  URL:          {}", self.url),
            format!("  Status:       {}", self.status),
            format!("  Latest:       {}", self.latest),
            format!(
                "  Last change:  {}",
                self.last_change.as_deref().unwrap_or("none")
            ),
            format!("  Last checked: {} (cycle {})", checked, self.cycles),
        ];
        if self.degraded {
            lines.push("  Persistence:  DEGRADED (snapshot not saved)".to_string());
        }
        lines.push(border);
        lines.join("\n")
    }
}

/// Redraw `board` on every event until the publishing side goes away.
pub async fn run_display(
    mut board: StatusBoard,
    mut rx: Receiver<ObservationResult>,
) -> StatusBoard {
    println!("{}", board.render());

    loop {
        match rx.recv().await {
            Ok(result) => {
                board.apply(&result);
                println!("{}", board.render());
            }
            Err(RecvError::Lagged(skipped)) => {
                log::debug!("Display skipped {} stale events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }

    board.stop();
    println!("{}", board.render());
    board
}

//! Log sink: one structured line per cycle.

use crate::models::{ObservationResult, ObservationStatus};

use super::NotificationSink;

/// Writes every observation through the `log` facade.
#[derive(Debug, Clone)]
pub struct LogSink {
    max_diff_lines: usize,
}

impl LogSink {
    pub fn new(max_diff_lines: usize) -> Self {
        Self { max_diff_lines }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new(20)
    }
}

/// Format the per-cycle `key=value` line.
pub fn format_line(result: &ObservationResult) -> String {
    let mut line = format!(
        "cycle={} status={} checked_at={}",
        result.cycle,
        result.status,
        result.checked_at.format("%Y-%m-%dT%H:%M:%SZ")
    );
    if let Some(diff) = &result.diff_summary {
        line.push_str(&format!(" summary=\"{}\"", diff.describe()));
    }
    if let Some(error) = &result.error {
        line.push_str(&format!(" error=\"{}\"", error.replace('"', "'")));
    }
    if let Some(fingerprint) = &result.fingerprint {
        let short = fingerprint.trim_start_matches("sha256:");
        line.push_str(&format!(" fingerprint={}", short.get(..12).unwrap_or(short)));
    }
    if result.persist_error.is_some() {
        line.push_str(" persistence=degraded");
    }
    line
}

impl NotificationSink for LogSink {
    fn notify(&self, result: &ObservationResult) {
        let line = format_line(result);
        if result.status.is_failure() {
            log::warn!("{}", line);
        } else {
            log::info!("{}", line);
        }

        match result.status {
            ObservationStatus::FirstObservation => {
                if let Some(excerpt) = &result.excerpt {
                    log::info!("Initial content: {}", excerpt);
                }
            }
            ObservationStatus::Changed => {
                if let Some(excerpt) = &result.excerpt {
                    log::info!("New content: {}", excerpt);
                }
                if let Some(diff) = &result.diff_summary {
                    log::debug!("Changes:\n{}", diff.render(self.max_diff_lines));
                }
            }
            _ => {}
        }

        if let Some(error) = &result.persist_error {
            log::error!(
                "Snapshot was not saved ({}); a restart may report this content as changed again",
                error
            );
        }
    }
}

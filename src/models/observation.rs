//! Per-cycle observation outcome.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::{ExtractError, FetchError};
use crate::pipeline::DiffSummary;

/// Classification of one monitoring cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObservationStatus {
    FirstObservation,
    Unchanged,
    Changed,
    FetchFailed,
    ExtractFailed,
}

impl ObservationStatus {
    pub const ALL: [ObservationStatus; 5] = [
        Self::FirstObservation,
        Self::Unchanged,
        Self::Changed,
        Self::FetchFailed,
        Self::ExtractFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstObservation => "first_observation",
            Self::Unchanged => "unchanged",
            Self::Changed => "changed",
            Self::FetchFailed => "fetch_failed",
            Self::ExtractFailed => "extract_failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::FetchFailed | Self::ExtractFailed)
    }
}

impl fmt::Display for ObservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one cycle, forwarded to every sink and never persisted.
///
/// Constructed only through the status-specific constructors so that
/// `diff_summary` is present exactly for [`ObservationStatus::Changed`] and
/// `error` exactly for the failure statuses.
#[derive(Debug, Clone)]
pub struct ObservationResult {
    /// 1-based cycle number
    pub cycle: u64,

    pub status: ObservationStatus,

    /// When the cycle started
    pub checked_at: DateTime<Utc>,

    /// Fingerprint of the snapshot in effect after the cycle
    pub fingerprint: Option<String>,

    pub diff_summary: Option<DiffSummary>,

    /// Leading text of newly accepted content
    pub excerpt: Option<String>,

    pub error: Option<String>,

    /// Set when the accepted snapshot could not be saved
    pub persist_error: Option<String>,
}

impl ObservationResult {
    fn new(cycle: u64, status: ObservationStatus, checked_at: DateTime<Utc>) -> Self {
        Self {
            cycle,
            status,
            checked_at,
            fingerprint: None,
            diff_summary: None,
            excerpt: None,
            error: None,
            persist_error: None,
        }
    }

    pub fn first_observation(
        cycle: u64,
        checked_at: DateTime<Utc>,
        fingerprint: impl Into<String>,
        excerpt: impl Into<String>,
    ) -> Self {
        Self {
            fingerprint: Some(fingerprint.into()),
            excerpt: Some(excerpt.into()),
            ..Self::new(cycle, ObservationStatus::FirstObservation, checked_at)
        }
    }

    pub fn unchanged(cycle: u64, checked_at: DateTime<Utc>, fingerprint: impl Into<String>) -> Self {
        Self {
            fingerprint: Some(fingerprint.into()),
            ..Self::new(cycle, ObservationStatus::Unchanged, checked_at)
        }
    }

    pub fn changed(
        cycle: u64,
        checked_at: DateTime<Utc>,
        fingerprint: impl Into<String>,
        diff: DiffSummary,
        excerpt: impl Into<String>,
    ) -> Self {
        Self {
            fingerprint: Some(fingerprint.into()),
            diff_summary: Some(diff),
            excerpt: Some(excerpt.into()),
            ..Self::new(cycle, ObservationStatus::Changed, checked_at)
        }
    }

    pub fn fetch_failed(cycle: u64, checked_at: DateTime<Utc>, error: &FetchError) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(cycle, ObservationStatus::FetchFailed, checked_at)
        }
    }

    pub fn extract_failed(cycle: u64, checked_at: DateTime<Utc>, error: &ExtractError) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(cycle, ObservationStatus::ExtractFailed, checked_at)
        }
    }

    /// Mark the cycle as having failed to persist its snapshot.
    pub fn with_persist_error(mut self, message: impl Into<String>) -> Self {
        self.persist_error = Some(message.into());
        self
    }

    /// Short human-readable description for displays.
    pub fn headline(&self) -> String {
        match self.status {
            ObservationStatus::FirstObservation => "Initial content captured".to_string(),
            ObservationStatus::Unchanged => "No changes detected".to_string(),
            ObservationStatus::Changed => match &self.diff_summary {
                Some(diff) => format!("Change detected ({})", diff.describe()),
                None => "Change detected".to_string(),
            },
            ObservationStatus::FetchFailed | ObservationStatus::ExtractFailed => format!(
                "Error: {}",
                self.error.as_deref().unwrap_or("unknown failure")
            ),
        }
    }
}

//! Change detection against the stored snapshot.

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::error::Result;
use crate::models::{DetectionConfig, Snapshot};

use super::diff::{DiffCalculator, DiffSummary};
use super::normalize::canonicalize_with;

/// How new text relates to the previous snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOutcome {
    FirstObservation,
    Unchanged,
    Changed(DiffSummary),
}

/// Result of one detection: the outcome plus the snapshot to keep.
#[derive(Debug, Clone)]
pub struct Detection {
    pub outcome: ChangeOutcome,
    /// The previous snapshot when unchanged, otherwise a new one
    pub snapshot: Snapshot,
}

impl Detection {
    /// Whether `snapshot` differs from what was stored before.
    pub fn needs_persist(&self) -> bool {
        !matches!(self.outcome, ChangeOutcome::Unchanged)
    }
}

/// Classifies new text against the previous snapshot.
#[derive(Debug, Clone, Default)]
pub struct ChangeDetector {
    ignore_patterns: Vec<Regex>,
    diff: DiffCalculator,
}

impl ChangeDetector {
    /// Create a detector without ignore patterns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detector from configuration.
    pub fn from_config(config: &DetectionConfig) -> Result<Self> {
        Ok(Self {
            ignore_patterns: config.compile_patterns()?,
            diff: DiffCalculator::new(),
        })
    }

    /// Normalize text the same way stored snapshots are normalized.
    pub fn normalize(&self, text: &str) -> String {
        canonicalize_with(text, &self.ignore_patterns)
    }

    /// Compare `new_text` with `previous`, taking ownership of the old
    /// snapshot and handing back whichever snapshot is current afterwards.
    pub fn detect(
        &self,
        new_text: &str,
        previous: Option<Snapshot>,
        observed_at: DateTime<Utc>,
    ) -> Detection {
        let canonical = self.normalize(new_text);
        let current = Snapshot::new(canonical, observed_at);

        let Some(previous) = previous else {
            return Detection {
                outcome: ChangeOutcome::FirstObservation,
                snapshot: current,
            };
        };

        if previous.fingerprint == current.fingerprint {
            return Detection {
                outcome: ChangeOutcome::Unchanged,
                snapshot: previous,
            };
        }

        let diff = self
            .diff
            .calculate(&previous.canonical_text, &current.canonical_text);
        Detection {
            outcome: ChangeOutcome::Changed(diff),
            snapshot: current,
        }
    }
}

/// Convenience function to detect changes with default settings.
pub fn detect(new_text: &str, previous: Option<Snapshot>) -> Detection {
    ChangeDetector::new().detect(new_text, previous, Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "Opening hours\nMonday to Friday 9-17\nClosed on holidays";

    #[test]
    fn test_first_observation() {
        let detection = detect(PAGE, None);
        assert_eq!(detection.outcome, ChangeOutcome::FirstObservation);
        assert_eq!(detection.snapshot.canonical_text, PAGE);
        assert!(detection.needs_persist());
    }

    #[test]
    fn test_same_text_is_unchanged() {
        let first = detect(PAGE, None).snapshot;
        let detection = detect(PAGE, Some(first.clone()));
        assert_eq!(detection.outcome, ChangeOutcome::Unchanged);
        assert_eq!(detection.snapshot, first);
        assert!(!detection.needs_persist());
    }

    #[test]
    fn test_whitespace_edit_is_unchanged() {
        let first = detect(PAGE, None).snapshot;
        let detector = ChangeDetector::new();
        let edited = format!("{}  \n", detector.normalize(PAGE));
        let detection = detect(&edited, Some(first.clone()));
        assert_eq!(detection.outcome, ChangeOutcome::Unchanged);
        assert_eq!(detection.snapshot.observed_at, first.observed_at);

        let rewrapped = "Opening   hours Monday\tto Friday 9-17\n\nClosed on holidays";
        let detection = detect(rewrapped, Some(first));
        assert_eq!(detection.outcome, ChangeOutcome::Unchanged);
    }

    #[test]
    fn test_content_edit_is_changed() {
        let first = detect(PAGE, None).snapshot;
        let edited = PAGE.replace("9-17", "9-18");
        let detection = detect(&edited, Some(first));

        match &detection.outcome {
            ChangeOutcome::Changed(diff) => {
                assert!(diff.has_changes());
                assert_eq!(diff.added_count(), 1);
                assert_eq!(diff.removed_count(), 1);
            }
            other => panic!("expected change, got {other:?}"),
        }
        assert_eq!(detection.snapshot.canonical_text, edited);
        assert!(detection.needs_persist());
    }

    #[test]
    fn test_ignore_patterns_suppress_noise() {
        let config = DetectionConfig {
            ignore_patterns: vec![r"Visitors: \d+".to_string()],
            ..DetectionConfig::default()
        };
        let detector = ChangeDetector::from_config(&config).unwrap();

        let first = detector
            .detect("News\nVisitors: 10", None, Utc::now())
            .snapshot;
        assert_eq!(first.canonical_text, "News");

        let detection = detector.detect("News\nVisitors: 11", Some(first), Utc::now());
        assert_eq!(detection.outcome, ChangeOutcome::Unchanged);
    }
}

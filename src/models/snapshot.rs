//! Snapshot data structure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::normalize::fingerprint;

/// The last accepted observation of the monitored page.
///
/// Built only from successfully extracted text and never mutated afterwards;
/// a change produces a new snapshot that replaces this one wholesale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    /// Normalized page text
    pub canonical_text: String,

    /// Content hash of `canonical_text`
    pub fingerprint: String,

    /// When the text was captured
    pub observed_at: DateTime<Utc>,
}

impl Snapshot {
    /// Capture already-normalized text.
    pub fn new(canonical_text: impl Into<String>, observed_at: DateTime<Utc>) -> Self {
        let canonical_text = canonical_text.into();
        Self {
            fingerprint: fingerprint(&canonical_text),
            canonical_text,
            observed_at,
        }
    }

    /// Check that the stored fingerprint still matches the text.
    pub fn verify(&self) -> bool {
        fingerprint(&self.canonical_text) == self.fingerprint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_computes_fingerprint() {
        let snapshot = Snapshot::new("Hello\nWorld", Utc::now());
        assert!(snapshot.fingerprint.starts_with("sha256:"));
        assert!(snapshot.verify());
    }

    #[test]
    fn test_verify_detects_tampering() {
        let mut snapshot = Snapshot::new("Hello", Utc::now());
        snapshot.canonical_text = "Goodbye".to_string();
        assert!(!snapshot.verify());
    }
}

//! Observation pipeline.
//!
//! - `normalize`: canonical text and fingerprints
//! - `diff`: line diffs between snapshots
//! - `detect`: change classification
//! - `monitor`: the scheduled fetch → extract → detect → persist → notify loop

pub mod detect;
pub mod diff;
pub mod monitor;
pub mod normalize;

pub use detect::{ChangeDetector, ChangeOutcome, Detection, detect};
pub use diff::{DiffCalculator, DiffSummary, LineChange, diff_lines};
pub use monitor::{Monitor, RunSummary};

//! Line diff between two canonical texts.
//!
//! Computes which lines were inserted and removed between the stored
//! snapshot and the newly extracted text, for the change summary that is
//! sent to every notification sink.

use std::fmt;

use crate::utils::excerpt;

/// Largest LCS table computed before falling back to a block replacement.
const DEFAULT_MAX_CELLS: usize = 1_000_000;

/// Longest rendered line in a diff listing.
const RENDER_LINE_GRAPHEMES: usize = 160;

/// A single inserted or removed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineChange {
    Added(String),
    Removed(String),
}

/// Ordered line changes between two texts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub changes: Vec<LineChange>,
}

impl DiffSummary {
    /// Check if there are any changes.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Get the total number of changed lines.
    pub fn change_count(&self) -> usize {
        self.changes.len()
    }

    pub fn added_count(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, LineChange::Added(_)))
            .count()
    }

    pub fn removed_count(&self) -> usize {
        self.changes.len() - self.added_count()
    }

    /// One-line description, e.g. `+3 -1 lines`.
    pub fn describe(&self) -> String {
        format!("+{} -{} lines", self.added_count(), self.removed_count())
    }

    /// Multi-line listing of at most `max_lines` changes.
    pub fn render(&self, max_lines: usize) -> String {
        let mut out: Vec<String> = self
            .changes
            .iter()
            .take(max_lines)
            .map(|change| match change {
                LineChange::Added(line) => format!("+ {}", excerpt(line, RENDER_LINE_GRAPHEMES)),
                LineChange::Removed(line) => format!("- {}", excerpt(line, RENDER_LINE_GRAPHEMES)),
            })
            .collect();

        let hidden = self.changes.len().saturating_sub(max_lines);
        if hidden > 0 {
            out.push(format!("... {hidden} more changed lines"));
        }
        out.join("\n")
    }
}

impl fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Calculator for line diffs.
#[derive(Debug, Clone)]
pub struct DiffCalculator {
    /// Upper bound on the LCS table size
    max_cells: usize,
}

impl Default for DiffCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl DiffCalculator {
    /// Create a new diff calculator.
    pub fn new() -> Self {
        Self {
            max_cells: DEFAULT_MAX_CELLS,
        }
    }

    /// Create a calculator with a custom LCS table limit.
    pub fn with_max_cells(max_cells: usize) -> Self {
        Self { max_cells }
    }

    /// Calculate the line changes turning `previous` into `current`.
    pub fn calculate(&self, previous: &str, current: &str) -> DiffSummary {
        let old: Vec<&str> = previous.lines().collect();
        let new: Vec<&str> = current.lines().collect();

        let prefix = old
            .iter()
            .zip(new.iter())
            .take_while(|(a, b)| a == b)
            .count();
        let suffix = old[prefix..]
            .iter()
            .rev()
            .zip(new[prefix..].iter().rev())
            .take_while(|(a, b)| a == b)
            .count();

        let old_mid = &old[prefix..old.len() - suffix];
        let new_mid = &new[prefix..new.len() - suffix];

        let cells = (old_mid.len() + 1).saturating_mul(new_mid.len() + 1);
        let changes = if cells <= self.max_cells {
            lcs_changes(old_mid, new_mid)
        } else {
            log::debug!(
                "Diff too large for LCS ({} x {} lines), reporting block replacement",
                old_mid.len(),
                new_mid.len()
            );
            block_changes(old_mid, new_mid)
        };

        DiffSummary { changes }
    }
}

/// Convenience function to diff two texts line by line.
pub fn diff_lines(previous: &str, current: &str) -> DiffSummary {
    DiffCalculator::new().calculate(previous, current)
}

fn lcs_changes(old: &[&str], new: &[&str]) -> Vec<LineChange> {
    let (n, m) = (old.len(), new.len());
    let width = m + 1;

    // table[i * width + j] = LCS length of old[i..] and new[j..]
    let mut table = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i * width + j] = if old[i] == new[j] {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    let mut changes = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i] == new[j] {
            i += 1;
            j += 1;
        } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
            changes.push(LineChange::Removed(old[i].to_string()));
            i += 1;
        } else {
            changes.push(LineChange::Added(new[j].to_string()));
            j += 1;
        }
    }
    changes.extend(old[i..].iter().map(|l| LineChange::Removed(l.to_string())));
    changes.extend(new[j..].iter().map(|l| LineChange::Added(l.to_string())));
    changes
}

fn block_changes(old: &[&str], new: &[&str]) -> Vec<LineChange> {
    old.iter()
        .map(|l| LineChange::Removed(l.to_string()))
        .chain(new.iter().map(|l| LineChange::Added(l.to_string())))
        .collect()
}

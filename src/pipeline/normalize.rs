//! Text normalization and fingerprinting.
//!
//! Canonical text keeps one logical line per text block so diffs stay
//! readable, while the fingerprint is taken over the fully collapsed form:
//! two texts that differ only in whitespace, line breaks included, share a
//! fingerprint.

use regex::Regex;
use sha2::{Digest, Sha256};

/// Collapse whitespace runs within each line, trim lines, drop blank ones.
pub fn canonicalize(text: &str) -> String {
    text.lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove every match of `patterns`, then canonicalize.
pub fn canonicalize_with(text: &str, patterns: &[Regex]) -> String {
    if patterns.is_empty() {
        return canonicalize(text);
    }

    let mut stripped = text.to_string();
    for pattern in patterns {
        stripped = pattern.replace_all(&stripped, "").into_owned();
    }
    canonicalize(&stripped)
}

/// Collapse all whitespace, line breaks included, into single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// SHA-256 fingerprint of the collapsed text.
pub fn fingerprint(text: &str) -> String {
    let digest = Sha256::digest(collapse_whitespace(text).as_bytes());
    format!("sha256:{}", hex::encode(digest))
}

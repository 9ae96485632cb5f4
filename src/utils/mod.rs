//! Utility functions and helpers.

pub mod http;

use sha2::{Digest, Sha256};
use unicode_segmentation::UnicodeSegmentation;
use url::Url;

use crate::error::{AppError, Result};

/// Parse a monitor target, accepting only absolute http(s) URLs with a host.
pub fn parse_target_url(url_str: &str) -> Result<Url> {
    let url = Url::parse(url_str.trim())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::config(format!(
            "unsupported URL scheme '{}' in {url_str}",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(AppError::config(format!("URL has no host: {url_str}")));
    }
    Ok(url)
}

/// Extract the domain from a URL string.
pub fn get_domain(url_str: &str) -> Option<String> {
    Url::parse(url_str)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_string()))
}

/// Stable file stem for a monitored URL: `{host}-{hash prefix}`.
pub fn url_key(url_str: &str) -> String {
    let host = get_domain(url_str)
        .unwrap_or_else(|| "page".to_string())
        .replace(|c: char| !c.is_ascii_alphanumeric() && c != '.' && c != '-', "_");
    let digest = hex::encode(Sha256::digest(url_str.trim().as_bytes()));
    format!("{}-{}", host, &digest[..12])
}

/// First `max` graphemes of `text`, with an ellipsis when cut.
pub fn excerpt(text: &str, max: usize) -> String {
    let mut graphemes = text.graphemes(true);
    let head: String = graphemes.by_ref().take(max).collect();
    if graphemes.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

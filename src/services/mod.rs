//! Service layer for the monitor.
//!
//! This module contains the adapters the observation loop consumes:
//! - Page retrieval (`Fetcher`, `HttpFetcher`)
//! - Text extraction (`ContentExtractor`)

mod extractor;
mod fetcher;

pub use extractor::ContentExtractor;
pub use fetcher::{Fetcher, HttpFetcher};

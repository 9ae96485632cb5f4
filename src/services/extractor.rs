// src/services/extractor.rs

//! Content extraction.
//!
//! Turns fetched bytes into canonical text using one of two strategies:
//!
//! - **Raw**: every text node in the document, minus scripts and styles.
//! - **Structured**: the main content region (article, main, ...) with page
//!   chrome such as navigation and footers skipped, falling back to raw
//!   extraction when no content region yields text.

use scraper::{ElementRef, Html, Node, Selector};

use crate::error::{AppError, ExtractError, Result};
use crate::models::ExtractionMode;
use crate::pipeline::normalize::canonicalize;

/// Elements whose text never counts as page content.
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "svg"];

/// Page chrome skipped by the structured strategy.
const BOILERPLATE_TAGS: &[&str] = &[
    "nav", "header", "footer", "aside", "form", "button", "iframe",
];

/// Elements that start a new line of text.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption", "figure",
    "h1", "h2", "h3", "h4", "h5", "h6", "hr", "li", "main", "ol", "p", "pre", "section", "table",
    "td", "th", "title", "tr", "ul",
];

/// Candidate main-content regions, best match wins.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role=\"main\"]",
    "#content",
    ".content",
    "#main",
];

/// Extracts canonical text from fetched pages.
#[derive(Debug, Clone)]
pub struct ContentExtractor {
    selector: Option<Selector>,
    selector_source: Option<String>,
    content_selectors: Vec<Selector>,
    body: Selector,
}

impl ContentExtractor {
    /// Create an extractor, optionally restricted to one CSS selector.
    pub fn new(selector: Option<&str>) -> Result<Self> {
        let content_selectors = CONTENT_SELECTORS
            .iter()
            .map(|s| Self::parse_selector(s))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            selector: selector.map(Self::parse_selector).transpose()?,
            selector_source: selector.map(str::to_string),
            content_selectors,
            body: Self::parse_selector("body")?,
        })
    }

    /// Extract canonical text from raw page bytes.
    pub fn extract(
        &self,
        raw: &[u8],
        mode: ExtractionMode,
    ) -> std::result::Result<String, ExtractError> {
        let html = decode(raw)?;
        let document = Html::parse_document(&html);

        let root = match &self.selector {
            Some(selector) => match document.select(selector).next() {
                Some(element) => element,
                None => {
                    log::warn!(
                        "Selector '{}' matched nothing on the page",
                        self.selector_source.as_deref().unwrap_or_default()
                    );
                    return Err(ExtractError::EmptyContent);
                }
            },
            None => document.root_element(),
        };

        let text = match mode {
            ExtractionMode::Raw => raw_text(root),
            ExtractionMode::Structured => {
                let structured = self.structured_text(root);
                if structured.is_empty() {
                    log::debug!("Structured extraction found no content, using raw text");
                    raw_text(root)
                } else {
                    structured
                }
            }
        };

        if text.is_empty() {
            return Err(ExtractError::EmptyContent);
        }
        Ok(text)
    }

    /// Text of the richest content region, or of the body without chrome.
    fn structured_text(&self, root: ElementRef<'_>) -> String {
        let best = self
            .content_selectors
            .iter()
            .flat_map(|selector| root.select(selector))
            .map(|element| collect(element, BOILERPLATE_TAGS))
            .max_by_key(|text| text.len());

        match best {
            Some(text) if !text.is_empty() => text,
            _ => {
                let body = root.select(&self.body).next().unwrap_or(root);
                collect(body, BOILERPLATE_TAGS)
            }
        }
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }
}

fn raw_text(root: ElementRef<'_>) -> String {
    collect(root, &[])
}

fn collect(element: ElementRef<'_>, extra_skipped: &[&str]) -> String {
    let mut out = String::new();
    if let Some(name) = skip_or_name(element, extra_skipped) {
        push_text(element, name, extra_skipped, &mut out);
    }
    canonicalize(&out)
}

/// Element name, or `None` when the element is excluded from text.
fn skip_or_name<'a>(element: ElementRef<'a>, extra_skipped: &[&str]) -> Option<&'a str> {
    let name = element.value().name();
    if SKIPPED_TAGS.contains(&name) || extra_skipped.contains(&name) {
        None
    } else {
        Some(name)
    }
}

fn push_text(element: ElementRef<'_>, name: &str, extra_skipped: &[&str], out: &mut String) {
    let block = BLOCK_TAGS.contains(&name);
    if block {
        out.push('\n');
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    if let Some(child_name) = skip_or_name(child_element, extra_skipped) {
                        push_text(child_element, child_name, extra_skipped, out);
                    }
                }
            }
            _ => {}
        }
    }

    if block {
        out.push('\n');
    } else {
        // Keep adjacent inline elements from gluing words together.
        out.push(' ');
    }
}

/// Decode page bytes, rejecting payloads that are clearly not text.
fn decode(raw: &[u8]) -> std::result::Result<String, ExtractError> {
    const BINARY_MAGIC: &[(&[u8], &str)] = &[
        (b"%PDF", "PDF document"),
        (b"\x89PNG", "PNG image"),
        (b"GIF8", "GIF image"),
        (b"\xFF\xD8\xFF", "JPEG image"),
        (b"PK\x03\x04", "ZIP archive"),
    ];

    for (magic, kind) in BINARY_MAGIC {
        if raw.starts_with(magic) {
            return Err(ExtractError::UnsupportedFormat(kind.to_string()));
        }
    }
    if raw.contains(&0) {
        return Err(ExtractError::UnsupportedFormat("binary content".to_string()));
    }

    Ok(String::from_utf8_lossy(raw).into_owned())
}

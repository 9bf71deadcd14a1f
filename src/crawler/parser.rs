//! HTML parser for extracting page text, title and links
//!
//! This module handles parsing fetched HTML to extract:
//! - The page title
//! - A cleaned, length-bounded text body
//! - Outbound links, resolved to absolute URLs

use crate::url::resolve_link;
use scraper::{Html, Node, Selector};
use std::collections::HashSet;
use url::Url;

/// Elements whose text never ends up in the extracted body
const NOISE_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "nav", "footer", "header",
];

/// Extracted information from an HTML page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Visible body text with whitespace collapsed, at most `text_limit` chars
    pub text: String,

    /// Outbound links in document order, absolute and without duplicates
    pub links: Vec<String>,
}

/// Parses HTML content into title, cleaned text and links
///
/// # Link Extraction Rules
///
/// **Include:** every `<a href="...">` that resolves to an http(s) URL.
///
/// **Exclude:** `javascript:`, `mailto:`, `tel:` and `data:` links, and
/// fragment-only anchors. Fragments are stripped from the rest.
///
/// # Example
///
/// ```
/// use sumi_trawl::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url, 100);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links, vec!["https://example.com/page".to_string()]);
/// ```
pub fn parse_html(html: &str, base_url: &Url, text_limit: usize) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        text: extract_text(&document, text_limit),
        links: extract_links(&document, base_url),
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

/// Extracts visible text from the body, skipping structural noise
fn extract_text(document: &Html, text_limit: usize) -> String {
    let root = Selector::parse("body")
        .ok()
        .and_then(|body| document.select(&body).next())
        .unwrap_or_else(|| document.root_element());

    let mut raw = String::new();
    for node in root.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let in_noise = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|element| NOISE_ELEMENTS.contains(&element.name()))
        });
        if in_noise {
            continue;
        }

        raw.push_str(text);
        raw.push(' ');
    }

    truncate_chars(&collapse_whitespace(&raw), text_limit)
}

/// Extracts all valid links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut links = Vec::new();
    let mut seen = HashSet::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if let Some(href) = element.value().attr("href") {
                if let Some(absolute_url) = resolve_link(href, base_url) {
                    if seen.insert(absolute_url.clone()) {
                        links.push(absolute_url);
                    }
                }
            }
        }
    }

    links
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((index, _)) => text[..index].to_string(),
        None => text.to_string(),
    }
}

//! File names derived from URLs and queries

use sha2::{Digest, Sha256};
use url::Url;

/// Returns true if the URL path points at a PDF document
pub fn is_document_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_ascii_lowercase().ends_with(".pdf"),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .is_some_and(|path| path.to_ascii_lowercase().ends_with(".pdf")),
    }
}

/// File name for a saved document
///
/// The last path segment with 8 hex chars of sha256(url) before its
/// extension, so equal names from different URLs never collide. URLs
/// without a usable segment get `document_<unix_secs>_<hash>.pdf`.
pub fn document_file_name(url: &str, unix_secs: i64) -> String {
    let digest = hex::encode(Sha256::digest(url.as_bytes()));
    let tag = &digest[..8];

    let from_path = Url::parse(url).ok().and_then(|parsed| {
        parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string))
    });

    match from_path.map(|name| sanitize_file_name(&name)) {
        Some(name) if !name.is_empty() && name != ".pdf" => match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => format!("{}_{}.{}", stem, tag, ext),
            _ => format!("{}_{}.pdf", name, tag),
        },
        _ => format!("document_{}_{}.pdf", unix_secs, tag),
    }
}

/// Keeps letters, digits, `#` and `.`; whitespace becomes `_`
///
/// Used for query-derived file and folder names. Never returns an empty
/// string.
pub fn sanitize_name(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() || c == '#' || c == '.' {
                Some(c)
            } else if c.is_whitespace() {
                Some('_')
            } else {
                None
            }
        })
        .collect();

    if cleaned.trim_matches(['_', '.']).is_empty() {
        "untitled".to_string()
    } else {
        cleaned
    }
}

fn sanitize_file_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect()
}

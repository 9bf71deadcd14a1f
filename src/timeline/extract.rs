//! Extraction of posts and media from decoded timeline pages
//!
//! The timeline response is deeply nested and its shape differs between the
//! first page and later pages. Extraction tries the known shapes and
//! skips anything it does not recognize; a response without an instruction
//! list at all is reported as an unexpected shape.

use crate::TrawlError;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

const INSTRUCTIONS_POINTER: &str = "/data/search_by_raw_query/search_timeline/timeline/instructions";

/// Editable-until time is one hour after posting
const EDIT_WINDOW_MS: i64 = 3_600_000;

/// Date column format of text and media records
pub const RECORD_DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Date prefix of media file names
pub const FILE_DATE_FORMAT: &str = "%Y-%m-%d %H-%M";

/// Query suffix requesting the largest PNG rendition of an image
pub const IMAGE_RENDITION: &str = "?format=png&name=4096x4096";

/// Posts and continuation cursor of one decoded page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimelinePage {
    /// Bottom cursor; `None` when no further page exists
    pub cursor: Option<String>,

    /// Organic posts in page order
    pub posts: Vec<Post>,

    /// Promoted entries that were dropped
    pub promoted_skipped: usize,
}

/// Kind of an attached media element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "Image",
            Self::Video => "Video",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Image => "png",
            Self::Video => "mp4",
        }
    }
}

/// A media element attached to a post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub kind: MediaKind,
    /// Image URL, or the chosen video variant
    pub url: String,
}

/// Fields extracted from one post
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    /// Posting time in milliseconds since the epoch
    pub timestamp_ms: i64,
    pub display_name: String,
    /// Screen name with a leading `@`
    pub handle: String,
    pub url: String,
    pub text: String,
    pub favorite_count: u64,
    pub retweet_count: u64,
    pub reply_count: u64,
    pub media: Vec<MediaRef>,
}

/// A media download together with the record written once it succeeds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    /// URL actually downloaded
    pub source_url: String,
    pub kind: MediaKind,
    /// Where the downloaded bytes are written
    pub saved_path: PathBuf,
    /// Media-schema record
    pub record: Vec<String>,
}

impl Post {
    pub fn posted_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp_ms).unwrap_or_default()
    }

    /// Text-schema record
    pub fn text_record(&self) -> Vec<String> {
        vec![
            self.posted_at().format(RECORD_DATE_FORMAT).to_string(),
            self.display_name.clone(),
            self.handle.clone(),
            self.url.clone(),
            self.text.clone(),
            self.favorite_count.to_string(),
            self.retweet_count.to_string(),
            self.reply_count.to_string(),
        ]
    }

    /// One download per attached media element, saved under `folder`
    pub fn media_items(&self, folder: &Path) -> Vec<MediaItem> {
        self.media
            .iter()
            .map(|media| {
                let saved_path = folder.join(media_file_name(
                    self.posted_at(),
                    &self.handle,
                    &media.url,
                    media.kind,
                ));
                let source_url = match media.kind {
                    MediaKind::Image => format!("{}{}", media.url, IMAGE_RENDITION),
                    MediaKind::Video => media.url.clone(),
                };
                let record = vec![
                    self.posted_at().format(RECORD_DATE_FORMAT).to_string(),
                    self.display_name.clone(),
                    self.handle.clone(),
                    self.url.clone(),
                    media.kind.as_str().to_string(),
                    media.url.clone(),
                    saved_path.display().to_string(),
                    self.text.clone(),
                    self.favorite_count.to_string(),
                    self.retweet_count.to_string(),
                    self.reply_count.to_string(),
                ];

                MediaItem {
                    source_url,
                    kind: media.kind,
                    saved_path,
                    record,
                }
            })
            .collect()
    }
}

/// `<YYYY-mm-dd HH-MM>_<@handle>_<4 hex chars of sha256(url)>.<ext>`
pub fn media_file_name(posted_at: DateTime<Utc>, handle: &str, url: &str, kind: MediaKind) -> String {
    let digest = hex::encode(Sha256::digest(url.as_bytes()));
    format!(
        "{}_{}_{}.{}",
        posted_at.format(FILE_DATE_FORMAT),
        handle,
        &digest[..4],
        kind.extension()
    )
}

/// Parses a decoded timeline response
///
/// # Returns
///
/// * `Ok(TimelinePage)` - Possibly empty; an empty page ends pagination
/// * `Err(TrawlError::UnexpectedShape)` - No instruction list in the response
pub fn parse_timeline(body: &Value) -> Result<TimelinePage, TrawlError> {
    let instructions = body
        .pointer(INSTRUCTIONS_POINTER)
        .and_then(Value::as_array)
        .ok_or_else(|| {
            TrawlError::UnexpectedShape("response has no timeline instructions".to_string())
        })?;

    let mut page = TimelinePage::default();
    for instruction in instructions {
        if let Some(entries) = instruction.get("entries").and_then(Value::as_array) {
            for entry in entries {
                visit_entry(entry, &mut page);
            }
        }
        if let Some(items) = instruction.get("moduleItems").and_then(Value::as_array) {
            for item in items {
                visit_module_item(item, &mut page);
            }
        }
        if let Some(entry) = instruction.get("entry") {
            visit_entry(entry, &mut page);
        }
    }

    Ok(page)
}

fn visit_entry(entry: &Value, page: &mut TimelinePage) {
    let entry_id = entry.get("entryId").and_then(Value::as_str).unwrap_or("");
    let content = entry.get("content").unwrap_or(&Value::Null);

    if entry_id.starts_with("cursor-") || content.get("cursorType").is_some() {
        let is_bottom = entry_id.starts_with("cursor-bottom")
            || content.get("cursorType").and_then(Value::as_str) == Some("Bottom");
        if is_bottom {
            page.cursor = content
                .get("value")
                .and_then(Value::as_str)
                .filter(|value| !value.is_empty())
                .map(str::to_string);
        }
        return;
    }

    if let Some(items) = content.get("items").and_then(Value::as_array) {
        for item in items {
            visit_module_item(item, page);
        }
        return;
    }

    if let Some(item_content) = content.get("itemContent") {
        visit_item_content(entry_id, item_content, page);
    }
}

fn visit_module_item(item: &Value, page: &mut TimelinePage) {
    let entry_id = item.get("entryId").and_then(Value::as_str).unwrap_or("");
    if let Some(item_content) = item.pointer("/item/itemContent") {
        visit_item_content(entry_id, item_content, page);
    }
}

fn visit_item_content(entry_id: &str, item_content: &Value, page: &mut TimelinePage) {
    if is_promoted(entry_id, item_content) {
        page.promoted_skipped += 1;
        return;
    }

    if let Some(post) = item_content
        .pointer("/tweet_results/result")
        .and_then(parse_post)
    {
        page.posts.push(post);
    }
}

fn is_promoted(entry_id: &str, item_content: &Value) -> bool {
    entry_id.contains("promoted") || item_content.get("promotedMetadata").is_some()
}

/// Extracts a post; `None` when any required field is missing
fn parse_post(result: &Value) -> Option<Post> {
    // Posts with visibility restrictions wrap the real result.
    let tweet = match result.get("tweet") {
        Some(inner) if inner.get("legacy").is_some() => inner,
        _ => result,
    };

    let user = tweet.pointer("/core/user_results/result/legacy")?;
    let display_name = user.get("name")?.as_str()?.to_string();
    let screen_name = user.get("screen_name")?.as_str()?;

    let editable_until = tweet.pointer("/edit_control/editable_until_msecs")?;
    let editable_until = match editable_until {
        Value::String(s) => s.parse::<i64>().ok()?,
        other => other.as_i64()?,
    };

    let legacy = tweet.get("legacy")?;
    let status_id = legacy.get("conversation_id_str")?.as_str()?;
    let full_text = legacy.get("full_text")?.as_str()?;
    let text = full_text
        .split("https://t.co/")
        .next()
        .unwrap_or("")
        .trim_end()
        .to_string();

    let media = legacy
        .pointer("/extended_entities/media")
        .and_then(Value::as_array)
        .map(|elements| elements.iter().filter_map(parse_media).collect())
        .unwrap_or_default();

    Some(Post {
        timestamp_ms: editable_until - EDIT_WINDOW_MS,
        display_name,
        handle: format!("@{}", screen_name),
        url: format!("https://twitter.com/{}/status/{}", screen_name, status_id),
        text,
        favorite_count: legacy.get("favorite_count")?.as_u64()?,
        retweet_count: legacy.get("retweet_count")?.as_u64()?,
        reply_count: legacy.get("reply_count")?.as_u64()?,
        media,
    })
}

fn parse_media(element: &Value) -> Option<MediaRef> {
    if let Some(variants) = element.pointer("/video_info/variants").and_then(Value::as_array) {
        return highest_bitrate_variant(variants).map(|url| MediaRef {
            kind: MediaKind::Video,
            url,
        });
    }

    element
        .get("media_url_https")
        .and_then(Value::as_str)
        .map(|url| MediaRef {
            kind: MediaKind::Image,
            url: url.to_string(),
        })
}

/// URL of the variant with the highest bitrate
///
/// A single variant is taken as-is; variants without a bitrate (playlists)
/// are only used when nothing else is available.
pub fn highest_bitrate_variant(variants: &[Value]) -> Option<String> {
    let url_of = |variant: &Value| variant.get("url").and_then(Value::as_str).map(str::to_string);

    if variants.len() == 1 {
        return url_of(&variants[0]);
    }

    variants
        .iter()
        .filter_map(|variant| {
            let bitrate = variant.get("bitrate").and_then(Value::as_u64)?;
            Some((bitrate, variant))
        })
        .max_by_key(|(bitrate, _)| *bitrate)
        .and_then(|(_, variant)| url_of(variant))
        .or_else(|| variants.first().and_then(url_of))
}

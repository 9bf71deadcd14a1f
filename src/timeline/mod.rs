//! Cursor-paginated timeline harvester
//!
//! This module pages through a search timeline with an opaque continuation
//! cursor and either records the posts as text rows or downloads their
//! attached media through a bounded pool of concurrent downloads.

mod downloader;
mod extract;
mod request;
mod runner;
mod source;

pub use downloader::{DownloadReport, Downloader};
pub use extract::{
    highest_bitrate_variant, media_file_name, parse_timeline, MediaItem, MediaKind, MediaRef,
    Post, TimelinePage,
};
pub use request::{raw_query, TimelineRequest};
pub use runner::{run_timeline, CursorState, TimelineOutcome, TimelineRunner};
pub use source::{GraphqlTimelineSource, HttpMediaFetcher, MediaFetcher, TimelineSource};

//! Cursor-paginated timeline harvesting
//!
//! Pages are requested strictly one after another, each carrying the cursor
//! returned by the previous page. Text records are written as pages arrive;
//! media items are collected and handed to the [`Downloader`] at the end.

use crate::config::{validate_timeline, Config, TimelineConfig, TimelineMode};
use crate::context::RunContext;
use crate::events::{notify, ProgressSink};
use crate::output::{file_stamp, CsvSink, RecordSchema, RecordSink};
use crate::retry::RetryPolicy;
use crate::timeline::downloader::Downloader;
use crate::timeline::extract::{parse_timeline, MediaItem, TimelinePage};
use crate::timeline::request::{raw_query, TimelineRequest};
use crate::timeline::source::{GraphqlTimelineSource, HttpMediaFetcher, MediaFetcher, TimelineSource};
use crate::url::sanitize_name;
use crate::TrawlError;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Position in the pagination sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorState {
    /// No page requested yet
    Initial,
    /// The next page is identified by this token
    HasCursor(String),
    /// No further pages
    Exhausted,
}

impl CursorState {
    /// Cursor to send with the next request, or `None` when exhausted
    fn next_request_cursor(&self) -> Option<Option<String>> {
        match self {
            Self::Initial => Some(None),
            Self::HasCursor(token) => Some(Some(token.clone())),
            Self::Exhausted => None,
        }
    }
}

/// What a timeline run produced
#[derive(Debug, Clone)]
pub struct TimelineOutcome {
    /// Folder holding the CSV file and downloaded media
    pub folder: PathBuf,
    pub output_path: PathBuf,
    /// Posts (text mode) or media items (media modes) extracted
    pub items_discovered: usize,
    /// Rows written to the CSV file
    pub records_written: usize,
    /// Media items left undownloaded because the run was cancelled
    pub items_skipped: usize,
    pub pages_requested: usize,
}

/// Drives one harvesting run
pub struct TimelineRunner {
    settings: TimelineConfig,
    output_dir: PathBuf,
    source: Arc<dyn TimelineSource>,
    fetcher: Arc<dyn MediaFetcher>,
    progress: Arc<dyn ProgressSink>,
    ctx: RunContext,
}

impl TimelineRunner {
    /// Creates a runner with explicit sources; fails on invalid settings
    pub fn new(
        config: &Config,
        source: Arc<dyn TimelineSource>,
        fetcher: Arc<dyn MediaFetcher>,
        progress: Arc<dyn ProgressSink>,
        ctx: RunContext,
    ) -> Result<Self, TrawlError> {
        let settings = validate_timeline(config)?.clone();

        Ok(Self {
            settings,
            output_dir: PathBuf::from(&config.output.directory),
            source,
            fetcher,
            progress,
            ctx,
        })
    }

    /// Creates a runner against the GraphQL endpoint and plain HTTP downloads
    pub fn from_config(
        config: &Config,
        progress: Arc<dyn ProgressSink>,
        ctx: RunContext,
    ) -> Result<Self, TrawlError> {
        let timeline = validate_timeline(config)?;
        let query = raw_query(&timeline.tag, &timeline.filter);
        let source = Arc::new(GraphqlTimelineSource::new(&config.http, timeline, &query)?);
        let fetcher = Arc::new(HttpMediaFetcher::from_config(&config.http)?);

        Self::new(config, source, fetcher, progress, ctx)
    }

    /// Folder for this tag (or filter when no tag is set)
    pub fn folder(&self) -> PathBuf {
        let name = if self.settings.tag.trim().is_empty() {
            &self.settings.filter
        } else {
            &self.settings.tag
        };
        self.output_dir.join(sanitize_name(name))
    }

    /// Pages through the timeline until the target count is reached or no
    /// further page exists
    ///
    /// A page that fails to load or decode ends pagination; whatever was
    /// collected so far is kept. Cancellation is checked before every page
    /// and before every download.
    ///
    /// # Returns
    ///
    /// * `Ok(TimelineOutcome)` - Counts and the CSV path, also after cancellation
    /// * `Err(TrawlError)` - The output folder or CSV file could not be created
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use std::sync::Arc;
    /// use sumi_trawl::config::load_config;
    /// use sumi_trawl::events::LogProgressSink;
    /// use sumi_trawl::timeline::TimelineRunner;
    /// use sumi_trawl::RunContext;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = load_config(Path::new("trawl.toml"))?;
    /// let runner = TimelineRunner::from_config(&config, Arc::new(LogProgressSink), RunContext::new())?;
    /// let outcome = runner.run().await?;
    /// println!("{} records in {}", outcome.records_written, outcome.output_path.display());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run(&self) -> Result<TimelineOutcome, TrawlError> {
        let mode = self.settings.mode;
        let query = raw_query(&self.settings.tag, &self.settings.filter);

        let folder = self.folder();
        tokio::fs::create_dir_all(&folder).await?;
        let output_path = folder.join(format!("{}-{}.csv", file_stamp(Utc::now()), mode.as_str()));
        let schema = if mode.downloads_media() {
            RecordSchema::Media
        } else {
            RecordSchema::Text
        };
        let sink: Arc<dyn RecordSink> = Arc::new(CsvSink::create(&output_path, schema)?);

        tracing::info!(
            "Harvesting '{}' ({} mode, target {}) into {}",
            query,
            mode.as_str(),
            self.settings.target_count,
            folder.display()
        );

        let max_pages = self.settings.target_count / mode.page_size() + 1;
        let mut cursor = CursorState::Initial;
        let mut items_discovered = 0;
        let mut records_written = 0;
        let mut items_skipped = 0;
        let mut pages_requested = 0;
        let mut pending_media: Vec<MediaItem> = Vec::new();

        for page_number in 1..=max_pages {
            if self.ctx.is_cancelled() {
                tracing::info!("Timeline harvesting cancelled");
                break;
            }
            let Some(request_cursor) = cursor.next_request_cursor() else {
                break;
            };

            let request = TimelineRequest::new(query.as_str(), mode, request_cursor);
            pages_requested += 1;

            let page = match self.fetch_page(&request).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!("Timeline page {} unusable, stopping: {}", page_number, e);
                    cursor = CursorState::Exhausted;
                    break;
                }
            };

            if page.posts.is_empty() {
                tracing::info!("Timeline page {} has no usable entries", page_number);
                cursor = CursorState::Exhausted;
                break;
            }
            if page.promoted_skipped > 0 {
                tracing::debug!("Skipped {} promoted entries", page.promoted_skipped);
            }

            match mode {
                TimelineMode::Text => {
                    for post in &page.posts {
                        items_discovered += 1;
                        match sink.append(&post.text_record()) {
                            Ok(()) => records_written += 1,
                            Err(e) => tracing::warn!("Could not record {}: {}", post.url, e),
                        }
                    }
                }
                TimelineMode::Media | TimelineMode::MediaLatest => {
                    let items: Vec<MediaItem> = page
                        .posts
                        .iter()
                        .flat_map(|post| post.media_items(&folder))
                        .collect();
                    items_discovered += items.len();
                    pending_media.extend(items);
                }
            }

            notify(
                self.progress.as_ref(),
                format!("timeline page {}: {} posts", page_number, page.posts.len()),
                items_discovered,
            );

            cursor = match page.cursor {
                Some(token) => CursorState::HasCursor(token),
                None => CursorState::Exhausted,
            };
            if items_discovered >= self.settings.target_count {
                break;
            }
        }

        if cursor == CursorState::Exhausted {
            tracing::info!("Timeline exhausted after {} pages", pages_requested);
        }

        if mode.downloads_media() && !pending_media.is_empty() {
            let downloader = Downloader::new(
                Arc::clone(&self.fetcher),
                Arc::clone(&sink),
                Arc::clone(&self.progress),
                self.settings.max_concurrent_downloads,
                RetryPolicy::new(
                    self.settings.download_attempts,
                    Duration::from_millis(self.settings.retry_backoff_ms),
                ),
                self.ctx.clone(),
            );
            let report = downloader.download_all(pending_media).await;
            records_written = report.succeeded;
            items_skipped = report.skipped;
        }

        tracing::info!(
            "Timeline run finished: {} items found, {} records written to {}",
            items_discovered,
            records_written,
            output_path.display()
        );

        Ok(TimelineOutcome {
            folder,
            output_path,
            items_discovered,
            records_written,
            items_skipped,
            pages_requested,
        })
    }

    async fn fetch_page(&self, request: &TimelineRequest) -> Result<TimelinePage, TrawlError> {
        let body = self.source.fetch_page(request).await?;
        parse_timeline(&body)
    }
}

/// Runs a timeline harvest from a loaded configuration
pub async fn run_timeline(
    config: &Config,
    progress: Arc<dyn ProgressSink>,
    ctx: RunContext,
) -> Result<TimelineOutcome, TrawlError> {
    TimelineRunner::from_config(config, progress, ctx)?.run().await
}

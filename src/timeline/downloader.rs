//! Bounded concurrent media downloader
//!
//! Every item becomes its own task. A semaphore permit is held only while
//! the bytes are fetched, so at most `limit` requests are in flight no
//! matter how many items were submitted. An item's record is written only
//! after its file is saved; exhausted items are logged and dropped.
//! Once the run is cancelled, items that have not started fetching are
//! skipped.

use crate::context::RunContext;
use crate::events::{notify, ProgressSink};
use crate::output::RecordSink;
use crate::retry::{RetryOutcome, RetryPolicy};
use crate::timeline::extract::MediaItem;
use crate::timeline::source::MediaFetcher;
use crate::TrawlError;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Counts of one download batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Items never fetched because the run was cancelled
    pub skipped: usize,
}

/// How one item ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DownloadStatus {
    Saved,
    Failed,
    Skipped,
}

pub struct Downloader {
    fetcher: Arc<dyn MediaFetcher>,
    sink: Arc<dyn RecordSink>,
    progress: Arc<dyn ProgressSink>,
    permits: Arc<Semaphore>,
    retry: RetryPolicy,
    ctx: RunContext,
}

impl Downloader {
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        sink: Arc<dyn RecordSink>,
        progress: Arc<dyn ProgressSink>,
        limit: usize,
        retry: RetryPolicy,
        ctx: RunContext,
    ) -> Self {
        Self {
            fetcher,
            sink,
            progress,
            permits: Arc::new(Semaphore::new(limit.max(1))),
            retry,
            ctx,
        }
    }

    /// Downloads every item and waits for all of them to finish
    ///
    /// # Arguments
    ///
    /// * `items` - Media items in discovery order; rows are written in
    ///   completion order
    ///
    /// # Returns
    ///
    /// Counts of saved, failed and skipped items. Failures never abort the
    /// batch.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use std::sync::Arc;
    /// # use std::time::Duration;
    /// # use sumi_trawl::config::HttpConfig;
    /// # use sumi_trawl::events::LogProgressSink;
    /// # use sumi_trawl::output::{CsvSink, RecordSchema};
    /// # use sumi_trawl::retry::RetryPolicy;
    /// # use sumi_trawl::timeline::{Downloader, HttpMediaFetcher};
    /// # use sumi_trawl::RunContext;
    /// # async fn example() -> Result<(), sumi_trawl::TrawlError> {
    /// let downloader = Downloader::new(
    ///     Arc::new(HttpMediaFetcher::from_config(&HttpConfig::default())?),
    ///     Arc::new(CsvSink::create(std::path::Path::new("media.csv"), RecordSchema::Media)?),
    ///     Arc::new(LogProgressSink),
    ///     8,
    ///     RetryPolicy::new(3, Duration::from_millis(500)),
    ///     RunContext::new(),
    /// );
    /// let report = downloader.download_all(Vec::new()).await;
    /// assert_eq!(report.succeeded, 0);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn download_all(&self, items: Vec<MediaItem>) -> DownloadReport {
        let total = items.len();
        tracing::info!("Downloading {} media items", total);

        let mut report = DownloadReport::default();
        let mut tasks = JoinSet::new();
        for item in items {
            if self.ctx.is_cancelled() {
                report.skipped += 1;
                continue;
            }
            let fetcher = Arc::clone(&self.fetcher);
            let sink = Arc::clone(&self.sink);
            let permits = Arc::clone(&self.permits);
            let retry = self.retry;
            let ctx = self.ctx.clone();
            tasks.spawn(async move { download_one(item, fetcher, sink, permits, retry, ctx).await });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(DownloadStatus::Saved) => report.succeeded += 1,
                Ok(DownloadStatus::Failed) => report.failed += 1,
                Ok(DownloadStatus::Skipped) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!("Download task failed: {}", e);
                    report.failed += 1;
                }
            }
            notify(
                self.progress.as_ref(),
                format!(
                    "downloads {}/{}",
                    report.succeeded + report.failed + report.skipped,
                    total
                ),
                report.succeeded,
            );
        }

        if report.skipped > 0 {
            tracing::info!("Download stage cancelled; skipped {} items", report.skipped);
        }
        tracing::info!(
            "Downloads finished: {} saved, {} failed",
            report.succeeded,
            report.failed
        );
        report
    }
}

async fn download_one(
    item: MediaItem,
    fetcher: Arc<dyn MediaFetcher>,
    sink: Arc<dyn RecordSink>,
    permits: Arc<Semaphore>,
    retry: RetryPolicy,
    ctx: RunContext,
) -> DownloadStatus {
    let outcome = retry
        .run(|_| {
            let fetcher = &fetcher;
            let permits = &permits;
            let item = &item;
            let ctx = &ctx;
            async move {
                let bytes = {
                    let _permit = permits
                        .acquire()
                        .await
                        .map_err(|e| TrawlError::Task(e.to_string()))?;
                    if ctx.is_cancelled() {
                        return Ok::<_, TrawlError>(false);
                    }
                    fetcher.fetch(&item.source_url).await?
                };
                tokio::fs::write(&item.saved_path, &bytes).await?;
                Ok::<_, TrawlError>(true)
            }
        })
        .await;

    match outcome {
        RetryOutcome::Success { value: false, .. } => {
            tracing::debug!("Skipping {} after cancellation", item.source_url);
            DownloadStatus::Skipped
        }
        RetryOutcome::Success { attempts, .. } => {
            if let Err(e) = sink.append(&item.record) {
                tracing::warn!("Saved {} but could not record it: {}", item.saved_path.display(), e);
                return DownloadStatus::Failed;
            }
            tracing::debug!("Saved {} after {} attempt(s)", item.saved_path.display(), attempts);
            DownloadStatus::Saved
        }
        RetryOutcome::Exhausted {
            attempts,
            last_error,
        } => {
            tracing::warn!(
                "Giving up on {} after {} attempts: {}",
                item.source_url,
                attempts,
                last_error
            );
            DownloadStatus::Failed
        }
    }
}

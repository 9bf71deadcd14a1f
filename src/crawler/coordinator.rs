//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that coordinates all aspects of
//! the crawling process, including:
//! - Loading or resetting the persisted run state
//! - Seeding the frontier from search results
//! - Running a fixed pool of workers over the shared frontier
//! - Snapshotting the frontier and visited set when the run stops

use crate::config::{validate_search, Config, CrawlerConfig, SearchConfig};
use crate::context::RunContext;
use crate::crawler::fetcher::{HttpPageSourceFactory, PageSource, PageSourceFactory};
use crate::crawler::frontier::Frontier;
use crate::crawler::search::{search, BingSearch, SearchParams, SearchSource};
use crate::crawler::build_http_client;
use crate::events::{notify, ProgressSink};
use crate::output::{
    captured_now, file_stamp, CrawlSummary, CsvSink, RecordSchema, RecordSink, StateTally,
};
use crate::registry::VisitedRegistry;
use crate::state::{CrawlTarget, RunSnapshot, RunState, RunStatus, TargetState};
use crate::storage::{open_state_store, StateStore};
use crate::url::{document_file_name, is_document_url, sanitize_name};
use crate::TrawlError;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;

/// What a finished (or interrupted) crawl produced
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    /// CSV file holding the page records
    pub output_path: PathBuf,

    /// SQLite file holding the resumable snapshot
    pub state_path: PathBuf,

    /// Size of the visited set at the end of the run
    pub total_visited: usize,

    pub summary: CrawlSummary,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    search: SearchConfig,
    crawler: CrawlerConfig,
    output_dir: PathBuf,
    config_hash: String,
    search_source: Arc<dyn SearchSource>,
    pages: Arc<dyn PageSourceFactory>,
    progress: Arc<dyn ProgressSink>,
    ctx: RunContext,
}

impl Coordinator {
    /// Creates a coordinator with explicit search and page sources
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - The `[search]` section is present and valid
    /// * `Err(TrawlError)` - Configuration is missing or invalid
    pub fn new(
        config: &Config,
        search_source: Arc<dyn SearchSource>,
        pages: Arc<dyn PageSourceFactory>,
        progress: Arc<dyn ProgressSink>,
        ctx: RunContext,
    ) -> Result<Self, TrawlError> {
        let search = validate_search(config)?.clone();

        Ok(Self {
            search,
            crawler: config.crawler.clone(),
            output_dir: PathBuf::from(&config.output.directory),
            config_hash: String::new(),
            search_source,
            pages,
            progress,
            ctx,
        })
    }

    /// Creates a coordinator that searches Bing and fetches pages over HTTP
    pub fn from_config(
        config: &Config,
        progress: Arc<dyn ProgressSink>,
        ctx: RunContext,
    ) -> Result<Self, TrawlError> {
        let search = validate_search(config)?;
        let client = build_http_client(&config.http)?;
        let search_source = Arc::new(BingSearch::new(client, &search.endpoint)?);
        let pages = Arc::new(HttpPageSourceFactory::new(
            config.http.clone(),
            config.crawler.text_limit,
        ));

        Self::new(config, search_source, pages, progress, ctx)
    }

    /// Records the hash of the configuration file this run was started from
    pub fn with_config_hash(mut self, config_hash: impl Into<String>) -> Self {
        self.config_hash = config_hash.into();
        self
    }

    /// Path of the run-state file for this query
    pub fn state_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}.state.db", sanitize_name(&self.search.query)))
    }

    /// Runs the search phase and the crawl to completion or cancellation
    ///
    /// Per-target failures are logged and counted; only setup failures
    /// (output directory, state store, CSV file) are returned as errors.
    pub async fn run(&self) -> Result<CrawlOutcome, TrawlError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let state_path = self.state_path();
        let mut store = open_state_store(&state_path)?;

        let prior = if self.ctx.should_resume() {
            store.load()?
        } else {
            store.clear()?;
            None
        };

        let (mut state, registry, targets, sink) = match prior {
            Some(snapshot) if snapshot.state.has_remaining_work() => self.resume_from(snapshot)?,
            prior => self.start_fresh(prior.map(|s| s.visited)).await?,
        };

        let output_path = PathBuf::from(&state.output_path);
        let shared = Arc::new(CrawlShared {
            frontier: Frontier::new(targets),
            registry,
            sink,
            progress: Arc::clone(&self.progress),
            tally: StateTally::default(),
            ctx: self.ctx.clone(),
            max_depth: state.max_depth,
            documents_dir: documents_dir_for(&output_path),
        });

        state.status = RunStatus::Running;
        state.remaining_work = shared.frontier.remaining();
        store.save(&RunSnapshot {
            state: state.clone(),
            visited: shared.registry.snapshot(),
        })?;

        let worker_count = self
            .crawler
            .max_workers
            .min(shared.frontier.len())
            .max(1);
        let sources = (0..worker_count)
            .map(|_| self.pages.create())
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            "Crawling {} targets with {} workers (max depth {})",
            shared.frontier.len(),
            worker_count,
            state.max_depth
        );

        let mut workers = JoinSet::new();
        for (worker_id, source) in sources.into_iter().enumerate() {
            workers.spawn(worker_loop(Arc::clone(&shared), source, worker_id));
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Crawl worker failed: {}", e);
                // The failed worker held at most one target; release its slot.
                shared.frontier.complete(Vec::new());
            }
        }

        let cancelled = self.ctx.is_cancelled();
        state.status = if cancelled {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };
        state.remaining_work = shared.frontier.remaining();

        let visited = shared.registry.snapshot();
        let total_visited = visited.len();
        store.save(&RunSnapshot {
            state: state.clone(),
            visited,
        })?;

        if cancelled {
            tracing::info!(
                "Crawl interrupted with {} targets remaining; state saved to {}",
                state.remaining_work.len(),
                state_path.display()
            );
        } else {
            tracing::info!("Crawl completed: {} URLs visited", total_visited);
        }

        Ok(CrawlOutcome {
            output_path,
            state_path,
            total_visited,
            summary: CrawlSummary {
                by_state: shared.tally.snapshot(),
                search_results: state.total_results_seen,
                total_visited,
                remaining: state.remaining_work.len(),
                cancelled,
            },
        })
    }

    fn resume_from(&self, snapshot: RunSnapshot) -> Result<RunParts, TrawlError> {
        let RunSnapshot { mut state, visited } = snapshot;

        if !state.config_hash.is_empty() && state.config_hash != self.config_hash {
            tracing::warn!("Configuration changed since the interrupted run; resuming with its saved parameters");
        }
        tracing::info!(
            "Resuming run: {} targets remaining, {} URLs already visited",
            state.remaining_work.len(),
            visited.len()
        );

        let sink: Arc<dyn RecordSink> = Arc::new(CsvSink::open_append(
            Path::new(&state.output_path),
            RecordSchema::Page,
        )?);
        let targets = std::mem::take(&mut state.remaining_work);
        state.config_hash = self.config_hash.clone();

        Ok((state, VisitedRegistry::seeded(visited), targets, sink))
    }

    async fn start_fresh(&self, visited: Option<Vec<String>>) -> Result<RunParts, TrawlError> {
        let output_path = self.output_dir.join(format!(
            "{}_{}.csv",
            sanitize_name(&self.search.query),
            file_stamp(Utc::now())
        ));
        let sink: Arc<dyn RecordSink> =
            Arc::new(CsvSink::create(&output_path, RecordSchema::Page)?);
        tracing::info!("Writing page records to {}", output_path.display());

        let mut state = RunState::new(
            &self.search,
            &self.crawler,
            output_path.display().to_string(),
        );
        state.config_hash = self.config_hash.clone();

        let registry = match visited {
            Some(urls) => {
                tracing::info!("Keeping {} previously visited URLs", urls.len());
                VisitedRegistry::seeded(urls)
            }
            None => VisitedRegistry::new(),
        };

        let params = SearchParams::from_config(&self.search, &self.crawler);
        let urls = search(
            self.search_source.as_ref(),
            &params,
            &self.ctx,
            self.progress.as_ref(),
        )
        .await;
        state.total_results_seen = urls.len();

        let targets = urls.into_iter().map(CrawlTarget::seed).collect();
        Ok((state, registry, targets, sink))
    }
}

type RunParts = (
    RunState,
    VisitedRegistry,
    Vec<CrawlTarget>,
    Arc<dyn RecordSink>,
);

/// Runs a complete crawl from a loaded configuration
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the run-state store for the query
/// 2. Resume the saved frontier or search for new seeds
/// 3. Crawl with a pool of HTTP workers
/// 4. Snapshot the run and return its summary
///
/// # Arguments
///
/// * `config` - Loaded configuration; must contain a `[search]` section
/// * `config_hash` - Fingerprint of the config file, stored with the run state
/// * `progress` - Receives one event per search result and crawled page
/// * `ctx` - Cancellation and resume flags for this run
///
/// # Returns
///
/// * `Ok(CrawlOutcome)` - The run completed or was cancelled cleanly
/// * `Err(TrawlError)` - Configuration or setup I/O failed
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use std::sync::Arc;
/// use sumi_trawl::config::load_config_with_hash;
/// use sumi_trawl::crawler::run_crawl;
/// use sumi_trawl::events::LogProgressSink;
/// use sumi_trawl::RunContext;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("trawl.toml"))?;
/// let outcome = run_crawl(&config, &hash, Arc::new(LogProgressSink), RunContext::new()).await?;
/// println!("{} URLs visited", outcome.total_visited);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: &Config,
    config_hash: &str,
    progress: Arc<dyn ProgressSink>,
    ctx: RunContext,
) -> Result<CrawlOutcome, TrawlError> {
    Coordinator::from_config(config, progress, ctx)?
        .with_config_hash(config_hash)
        .run()
        .await
}

/// State shared by every worker of one run
struct CrawlShared {
    frontier: Frontier,
    registry: VisitedRegistry,
    sink: Arc<dyn RecordSink>,
    progress: Arc<dyn ProgressSink>,
    tally: StateTally,
    ctx: RunContext,
    max_depth: u32,
    documents_dir: PathBuf,
}

async fn worker_loop(shared: Arc<CrawlShared>, source: Arc<dyn PageSource>, worker_id: usize) {
    tracing::debug!("Worker {} started", worker_id);

    while let Some(target) = shared.frontier.next(&shared.ctx).await {
        if shared.ctx.is_cancelled() {
            shared.frontier.requeue(target);
            break;
        }

        // A panic while crawling one target must not take its slot with it.
        let task = tokio::spawn({
            let shared = Arc::clone(&shared);
            let source = Arc::clone(&source);
            let target = target.clone();
            async move { shared.process_target(source.as_ref(), &target).await }
        });

        let children = match task.await {
            Ok(children) => children,
            Err(e) => {
                tracing::error!("Crawling {} aborted: {}", target.url, e);
                shared.tally.record(TargetState::FetchFailed);
                Vec::new()
            }
        };
        shared.frontier.complete(children);
    }

    tracing::debug!("Worker {} finished", worker_id);
}

impl CrawlShared {
    /// Processes one target and returns the children to crawl next
    ///
    /// The target starts `Unclaimed`, is `Claimed` once its URL wins the
    /// registry, and ends in exactly one terminal state.
    async fn process_target(&self, source: &dyn PageSource, target: &CrawlTarget) -> Vec<CrawlTarget> {
        let state = TargetState::Unclaimed;

        if target.depth > self.max_depth {
            self.transition(target, state, TargetState::DepthExceeded);
            return Vec::new();
        }

        if !self.registry.try_claim(&target.url) {
            tracing::trace!("Skipping already visited {}", target.url);
            return Vec::new();
        }
        let state = self.transition(target, state, TargetState::Claimed);

        tracing::debug!("Crawling [depth {}]: {}", target.depth, target.url);

        let result = if is_document_url(&target.url) {
            self.save_document(source, target)
                .await
                .map(|()| (TargetState::DocumentSaved, Vec::new()))
        } else {
            self.record_page(source, target)
                .await
                .map(|children| (TargetState::Recorded, children))
        };

        match result {
            Ok((next, children)) => {
                self.transition(target, state, next);
                children
            }
            Err(e) => {
                tracing::warn!("Failed to crawl {}: {}", target.url, e);
                self.transition(target, state, TargetState::FetchFailed);
                Vec::new()
            }
        }
    }

    /// Applies one state transition, tallying terminal states
    fn transition(&self, target: &CrawlTarget, from: TargetState, to: TargetState) -> TargetState {
        match from.advance(to) {
            Ok(next) => {
                tracing::trace!("{}: {} -> {}", target.url, from, next);
                if next.is_terminal() {
                    self.tally.record(next);
                }
                next
            }
            Err(e) => {
                tracing::error!("{}: {}", target.url, e);
                from
            }
        }
    }

    async fn record_page(
        &self,
        source: &dyn PageSource,
        target: &CrawlTarget,
    ) -> Result<Vec<CrawlTarget>, TrawlError> {
        let page = source.fetch_page(&target.url).await?;

        self.sink.append(&[
            page.title.clone().unwrap_or_else(|| "Untitled".to_string()),
            target.url.clone(),
            page.text.clone(),
            captured_now(),
        ])?;
        notify(
            self.progress.as_ref(),
            format!("crawled [depth {}] {}", target.depth, target.url),
            self.registry.len(),
        );

        if target.depth >= self.max_depth {
            return Ok(Vec::new());
        }

        Ok(page
            .links
            .iter()
            .filter(|link| !self.registry.contains(link))
            .map(|link| target.child(link.as_str()))
            .collect())
    }

    async fn save_document(&self, source: &dyn PageSource, target: &CrawlTarget) -> Result<(), TrawlError> {
        let bytes = source.fetch_document(&target.url).await?;

        tokio::fs::create_dir_all(&self.documents_dir).await?;
        let path = self
            .documents_dir
            .join(document_file_name(&target.url, Utc::now().timestamp()));
        tokio::fs::write(&path, &bytes).await?;

        self.sink.append(&[
            "PDF document".to_string(),
            target.url.clone(),
            format!("saved to: {}", path.display()),
            captured_now(),
        ])?;
        notify(
            self.progress.as_ref(),
            format!("saved document {}", target.url),
            self.registry.len(),
        );

        Ok(())
    }
}

/// `<dir>/<stem>_docs` next to the CSV file
fn documents_dir_for(output_path: &Path) -> PathBuf {
    let stem = output_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "crawl".to_string());
    output_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("{}_docs", stem))
}

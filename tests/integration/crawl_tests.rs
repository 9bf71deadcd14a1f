//! Integration tests for the search-driven crawler
//!
//! Most tests crawl an in-memory link graph through fake sources so the
//! worker pool can be exercised deterministically; the last test runs the
//! full HTTP stack against a wiremock server.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use sumi_trawl::config::{Config, CrawlerConfig, HttpConfig, OutputConfig, SearchConfig};
use sumi_trawl::crawler::{
    search, Coordinator, FetchedPage, PageSource, PageSourceFactory, SearchPage, SearchParams,
    SearchRequest, SearchSource,
};
use sumi_trawl::events::LogProgressSink;
use sumi_trawl::output::read_records;
use sumi_trawl::state::RunStatus;
use sumi_trawl::storage::{SqliteStateStore, StateStore};
use sumi_trawl::{RunContext, TargetState, TrawlError};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SITE: &str = "https://site.example";

fn url(path: &str) -> String {
    format!("{}/{}", SITE, path)
}

/// Creates a test configuration writing into `dir`
fn create_test_config(dir: &Path, max_depth: u32, max_workers: usize) -> Config {
    Config {
        http: HttpConfig::default(),
        output: OutputConfig {
            directory: dir.display().to_string(),
        },
        search: Some(SearchConfig {
            query: "rust crawler".to_string(),
            locales: vec!["tw".to_string()],
            max_results: 50,
            max_pages: 3,
            since: None,
            until: None,
            endpoint: "https://search.example/search".to_string(),
        }),
        crawler: CrawlerConfig {
            max_depth,
            max_workers,
            text_limit: 1_000,
            search_backoff_ms: 0,
        },
        timeline: None,
    }
}

enum Resource {
    Page { title: &'static str, links: Vec<String> },
    Broken,
    Crash,
    Document(&'static [u8]),
}

/// An in-memory web counting every fetch
#[derive(Default)]
struct FakeWeb {
    resources: HashMap<String, Resource>,
    fetches: Mutex<HashMap<String, usize>>,
    cancel_after: Mutex<Option<(usize, RunContext)>>,
}

impl FakeWeb {
    fn page(mut self, path: &str, title: &'static str, links: &[&str]) -> Self {
        let links = links.iter().map(|l| url(l)).collect();
        self.resources.insert(url(path), Resource::Page { title, links });
        self
    }

    fn broken(mut self, path: &str) -> Self {
        self.resources.insert(url(path), Resource::Broken);
        self
    }

    /// The page source panics when asked for this page
    fn crashing(mut self, path: &str) -> Self {
        self.resources.insert(url(path), Resource::Crash);
        self
    }

    fn document(mut self, path: &str, bytes: &'static [u8]) -> Self {
        self.resources.insert(url(path), Resource::Document(bytes));
        self
    }

    /// Cancels `ctx` once `count` fetches have completed
    fn cancel_after(self, count: usize, ctx: RunContext) -> Self {
        *self.cancel_after.lock().unwrap() = Some((count, ctx));
        self
    }

    fn record_fetch(&self, url: &str) {
        let total = {
            let mut fetches = self.fetches.lock().unwrap();
            *fetches.entry(url.to_string()).or_insert(0) += 1;
            fetches.values().sum::<usize>()
        };
        if let Some((count, ctx)) = self.cancel_after.lock().unwrap().as_ref() {
            if total >= *count {
                ctx.cancel();
            }
        }
    }

    fn fetch_count(&self, url: &str) -> usize {
        self.fetches.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    fn total_fetches(&self) -> usize {
        self.fetches.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl PageSource for FakeWeb {
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage, TrawlError> {
        tokio::task::yield_now().await;
        self.record_fetch(url);
        match self.resources.get(url) {
            Some(Resource::Page { title, links }) => Ok(FetchedPage {
                final_url: url.to_string(),
                title: Some(title.to_string()),
                text: format!("text of {}", title),
                links: links.clone(),
            }),
            Some(Resource::Crash) => panic!("renderer crashed on {}", url),
            _ => Err(TrawlError::Status {
                url: url.to_string(),
                status: 500,
            }),
        }
    }

    async fn fetch_document(&self, url: &str) -> Result<Vec<u8>, TrawlError> {
        self.record_fetch(url);
        match self.resources.get(url) {
            Some(Resource::Document(bytes)) => Ok(bytes.to_vec()),
            _ => Err(TrawlError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

struct FakeFactory(Arc<FakeWeb>);

impl PageSourceFactory for FakeFactory {
    fn create(&self) -> Result<Arc<dyn PageSource>, TrawlError> {
        Ok(self.0.clone())
    }
}

/// Returns a fixed list of results on the first page of every locale
struct StaticSearch {
    urls: Vec<String>,
    calls: AtomicUsize,
}

impl StaticSearch {
    fn new(paths: &[&str]) -> Self {
        Self {
            urls: paths.iter().map(|p| url(p)).collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SearchSource for StaticSearch {
    async fn search_page(&self, _request: &SearchRequest) -> Result<SearchPage, TrawlError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(SearchPage {
            urls: self.urls.clone(),
            has_next: false,
        })
    }
}

fn coordinator(
    config: &Config,
    search: Arc<StaticSearch>,
    web: Arc<FakeWeb>,
    ctx: RunContext,
) -> Coordinator {
    Coordinator::new(
        config,
        search,
        Arc::new(FakeFactory(web)),
        Arc::new(LogProgressSink),
        ctx,
    )
    .expect("Failed to create coordinator")
}

fn recorded_urls(csv: &Path) -> Vec<String> {
    read_records(csv)
        .expect("Failed to read records")
        .into_iter()
        .map(|row| row[1].clone())
        .collect()
}

#[tokio::test]
async fn test_search_single_page_scenario() {
    let source = StaticSearch::new(&["r1", "r2", "r3", "r4", "r5"]);
    let params = SearchParams {
        query: "rust".to_string(),
        locales: vec!["tw".to_string()],
        max_results: 50,
        max_pages: 3,
        date_range: None,
        backoff: std::time::Duration::ZERO,
    };

    let results = search(&source, &params, &RunContext::new(), &LogProgressSink).await;

    assert_eq!(results.len(), 5);
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_search_cap_and_dedup_across_locales() {
    let source = StaticSearch::new(&["r1", "r2", "r3", "r4"]);
    let params = SearchParams {
        query: "rust".to_string(),
        locales: vec!["tw".to_string(), "us".to_string(), "jp".to_string()],
        max_results: 6,
        max_pages: 1,
        date_range: None,
        backoff: std::time::Duration::ZERO,
    };

    let results = search(&source, &params, &RunContext::new(), &LogProgressSink).await;

    // Every locale returns the same four URLs
    assert_eq!(results, vec![url("r1"), url("r2"), url("r3"), url("r4")]);
    assert_eq!(source.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_search_failed_page_is_skipped() {
    struct FlakySearch;

    #[async_trait]
    impl SearchSource for FlakySearch {
        async fn search_page(&self, request: &SearchRequest) -> Result<SearchPage, TrawlError> {
            if request.page == 0 {
                return Err(TrawlError::UnexpectedShape("captcha".to_string()));
            }
            Ok(SearchPage {
                urls: vec![format!("{}/p{}", SITE, request.page)],
                has_next: true,
            })
        }
    }

    let params = SearchParams {
        query: "rust".to_string(),
        locales: vec!["tw".to_string()],
        max_results: 10,
        max_pages: 3,
        date_range: None,
        backoff: std::time::Duration::ZERO,
    };

    let results = search(&FlakySearch, &params, &RunContext::new(), &LogProgressSink).await;
    assert_eq!(results, vec![url("p1"), url("p2")]);
}

#[tokio::test]
async fn test_depth_bound() {
    let dir = TempDir::new().unwrap();
    let web = Arc::new(
        FakeWeb::default()
            .page("root", "Root", &["a"])
            .page("a", "A", &["b"])
            .page("b", "B", &["c"])
            .page("c", "C", &["d"])
            .page("d", "D", &[]),
    );
    let config = create_test_config(dir.path(), 2, 4);

    let outcome = coordinator(
        &config,
        Arc::new(StaticSearch::new(&["root"])),
        web.clone(),
        RunContext::new(),
    )
    .run()
    .await
    .expect("Crawl failed");

    assert_eq!(
        recorded_urls(&outcome.output_path),
        vec![url("root"), url("a"), url("b")]
    );
    assert_eq!(web.fetch_count(&url("c")), 0);
    assert_eq!(outcome.summary.count(TargetState::Recorded), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_each_url_fetched_once_with_many_workers() {
    let dir = TempDir::new().unwrap();

    // Every page links to every other page
    let names: Vec<String> = (0..20).map(|i| format!("p{}", i)).collect();
    let mut web = FakeWeb::default();
    for name in &names {
        let links: Vec<&str> = names.iter().map(String::as_str).collect();
        web = web.page(name, "Page", &links);
    }
    let web = Arc::new(web);

    let seeds: Vec<&str> = names.iter().take(8).map(String::as_str).collect();
    let config = create_test_config(dir.path(), 3, 8);

    let outcome = coordinator(
        &config,
        Arc::new(StaticSearch::new(&seeds)),
        web.clone(),
        RunContext::new(),
    )
    .run()
    .await
    .expect("Crawl failed");

    let recorded = recorded_urls(&outcome.output_path);
    let distinct: HashSet<&String> = recorded.iter().collect();
    assert_eq!(recorded.len(), 20);
    assert_eq!(distinct.len(), 20);

    for name in &names {
        assert_eq!(web.fetch_count(&url(name)), 1, "{} fetched more than once", name);
    }
    assert_eq!(outcome.total_visited, 20);
}

#[tokio::test]
async fn test_sibling_failure_isolation() {
    let dir = TempDir::new().unwrap();
    let web = Arc::new(
        FakeWeb::default()
            .page("root", "Root", &["s1", "s2", "s3"])
            .page("s1", "S1", &[])
            .broken("s2")
            .page("s3", "S3", &[]),
    );
    let config = create_test_config(dir.path(), 1, 1);

    let outcome = coordinator(
        &config,
        Arc::new(StaticSearch::new(&["root"])),
        web,
        RunContext::new(),
    )
    .run()
    .await
    .expect("Crawl failed");

    assert_eq!(
        recorded_urls(&outcome.output_path),
        vec![url("root"), url("s1"), url("s3")]
    );
    assert_eq!(outcome.summary.count(TargetState::FetchFailed), 1);
}

#[tokio::test]
async fn test_panicking_page_counts_as_failed() {
    let dir = TempDir::new().unwrap();
    let web = Arc::new(
        FakeWeb::default()
            .page("root", "Root", &["s1", "s2", "s3"])
            .page("s1", "S1", &[])
            .crashing("s2")
            .page("s3", "S3", &[]),
    );
    let config = create_test_config(dir.path(), 1, 1);

    let outcome = coordinator(
        &config,
        Arc::new(StaticSearch::new(&["root"])),
        web,
        RunContext::new(),
    )
    .run()
    .await
    .expect("Crawl failed");

    assert_eq!(
        recorded_urls(&outcome.output_path),
        vec![url("root"), url("s1"), url("s3")]
    );
    assert_eq!(outcome.summary.count(TargetState::FetchFailed), 1);
    assert_eq!(outcome.summary.total_terminal(), 4);
    assert!(!outcome.summary.cancelled);
}

/// Cancels the run while serving the first result page
struct CancellingSearch {
    ctx: RunContext,
    calls: AtomicUsize,
}

#[async_trait]
impl SearchSource for CancellingSearch {
    async fn search_page(&self, request: &SearchRequest) -> Result<SearchPage, TrawlError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.ctx.cancel();
        Ok(SearchPage {
            urls: vec![
                url(&format!("p{}-a", request.page)),
                url(&format!("p{}-b", request.page)),
            ],
            has_next: true,
        })
    }
}

#[tokio::test]
async fn test_search_stops_at_page_boundary_on_cancel() {
    let ctx = RunContext::new();
    let source = CancellingSearch {
        ctx: ctx.clone(),
        calls: AtomicUsize::new(0),
    };
    let params = SearchParams {
        query: "rust".to_string(),
        locales: vec!["tw".to_string(), "us".to_string()],
        max_results: 50,
        max_pages: 3,
        date_range: None,
        backoff: std::time::Duration::ZERO,
    };

    let results = search(&source, &params, &ctx, &LogProgressSink).await;

    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    assert_eq!(results, vec![url("p0-a"), url("p0-b")]);
}

#[tokio::test]
async fn test_cancelled_search_saves_seeds_as_remaining_work() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), 2, 2);
    let ctx = RunContext::new();
    let search_source = Arc::new(CancellingSearch {
        ctx: ctx.clone(),
        calls: AtomicUsize::new(0),
    });
    let web = Arc::new(FakeWeb::default());

    let outcome = Coordinator::new(
        &config,
        search_source.clone(),
        Arc::new(FakeFactory(web.clone())),
        Arc::new(LogProgressSink),
        ctx,
    )
    .expect("Failed to create coordinator")
    .run()
    .await
    .expect("Crawl failed");

    assert_eq!(search_source.calls.load(Ordering::SeqCst), 1);
    assert_eq!(web.total_fetches(), 0);
    assert!(outcome.summary.cancelled);
    assert_eq!(outcome.summary.remaining, 2);

    let snapshot = SqliteStateStore::new(&outcome.state_path)
        .unwrap()
        .load()
        .unwrap()
        .expect("Missing run snapshot");
    assert_eq!(snapshot.state.status, RunStatus::Interrupted);
    let remaining: Vec<&str> = snapshot
        .state
        .remaining_work
        .iter()
        .map(|t| t.url.as_str())
        .collect();
    assert_eq!(remaining, vec![url("p0-a"), url("p0-b")]);
    assert!(snapshot.state.remaining_work.iter().all(|t| t.depth == 0));
    assert!(snapshot.visited.is_empty());
}

#[tokio::test]
async fn test_documents_are_saved_not_followed() {
    let dir = TempDir::new().unwrap();
    let web = Arc::new(
        FakeWeb::default()
            .page("root", "Root", &["files/paper.pdf"])
            .document("files/paper.pdf", b"%PDF-1.4 test"),
    );
    let config = create_test_config(dir.path(), 2, 2);

    let outcome = coordinator(
        &config,
        Arc::new(StaticSearch::new(&["root"])),
        web,
        RunContext::new(),
    )
    .run()
    .await
    .expect("Crawl failed");

    let rows = read_records(&outcome.output_path).unwrap();
    assert_eq!(rows.len(), 2);

    let document_row = &rows[1];
    assert_eq!(document_row[0], "PDF document");
    assert_eq!(document_row[1], url("files/paper.pdf"));

    let saved = document_row[2]
        .strip_prefix("saved to: ")
        .expect("Missing saved path");
    let file_name = Path::new(saved).file_name().unwrap().to_string_lossy();
    assert!(file_name.starts_with("paper_"), "{}", file_name);
    assert!(file_name.ends_with(".pdf"));
    assert_eq!(std::fs::read(saved).unwrap(), b"%PDF-1.4 test");
    assert_eq!(outcome.summary.count(TargetState::DocumentSaved), 1);
}

#[tokio::test]
async fn test_resume_after_cancellation() {
    let dir = TempDir::new().unwrap();
    let build_web = || {
        FakeWeb::default()
            .page("r1", "R1", &["a", "b"])
            .page("r2", "R2", &["c"])
            .page("a", "A", &[])
            .page("b", "B", &[])
            .page("c", "C", &[])
    };
    let config = create_test_config(dir.path(), 2, 1);

    // First run: cancelled after two pages
    let ctx = RunContext::new();
    let first_web = Arc::new(build_web().cancel_after(2, ctx.clone()));
    let first = coordinator(
        &config,
        Arc::new(StaticSearch::new(&["r1", "r2"])),
        first_web.clone(),
        ctx,
    )
    .run()
    .await
    .expect("First run failed");

    assert!(first.summary.cancelled);
    assert!(first.summary.remaining > 0);
    assert_eq!(first_web.total_fetches(), 2);

    // Second run resumes from the saved frontier without searching again
    let search = Arc::new(StaticSearch::new(&["r1", "r2"]));
    let second_web = Arc::new(build_web());
    let second = coordinator(&config, search.clone(), second_web.clone(), RunContext::resuming())
        .run()
        .await
        .expect("Resumed run failed");

    assert!(!second.summary.cancelled);
    assert_eq!(second.summary.remaining, 0);
    assert_eq!(search.calls.load(Ordering::SeqCst), 0);
    assert_eq!(second.output_path, first.output_path);

    // No URL fetched by the first run is fetched again
    for (fetched_url, _) in first_web.fetches.lock().unwrap().iter() {
        assert_eq!(second_web.fetch_count(fetched_url), 0);
    }

    let recorded = recorded_urls(&second.output_path);
    let distinct: HashSet<&String> = recorded.iter().collect();
    assert_eq!(recorded.len(), 5);
    assert_eq!(distinct.len(), 5);
    assert_eq!(second.total_visited, 5);
}

#[tokio::test]
async fn test_full_crawl_over_http() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    // Search results page
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("first", "1"))
        .and(query_param("cc", "tw"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            format!(
                r#"<html><body><ol id="b_results">
                <li class="b_algo"><h2><a href="{0}/">Home</a></h2></li>
                </ol></body></html>"#,
                base_url
            ),
            "text/html",
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Mock index page with links
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><head><title>Home</title></head><body>
            <nav><a href="/page1">Page 1</a></nav>
            <p>Welcome</p>
            <a href="/page2">Page 2</a>
            </body></html>"#,
            "text/html",
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page1"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><head><title>Page 1</title></head><body>Content 1</body></html>"#,
            "text/html",
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page2"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path(), 1, 2);
    if let Some(search) = config.search.as_mut() {
        search.endpoint = format!("{}/search", base_url);
        search.max_pages = 1;
    }

    let outcome = Coordinator::from_config(&config, Arc::new(LogProgressSink), RunContext::new())
        .expect("Failed to create coordinator")
        .run()
        .await
        .expect("Crawl failed");

    let rows = read_records(&outcome.output_path).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][0], "Home");
    assert_eq!(rows[0][2], "Welcome Page 2");
    assert_eq!(rows[1][0], "Page 1");
    assert_eq!(rows[1][2], "Content 1");

    assert_eq!(outcome.summary.count(TargetState::Recorded), 2);
    assert_eq!(outcome.summary.count(TargetState::FetchFailed), 1);
    assert!(outcome.state_path.exists());
}

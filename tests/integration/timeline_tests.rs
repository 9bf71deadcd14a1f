//! Integration tests for the timeline harvester
//!
//! Timeline pages are served from a scripted in-memory source; the last
//! test goes through the GraphQL client against a wiremock server.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use sumi_trawl::config::{
    Config, CrawlerConfig, HttpConfig, OutputConfig, TimelineConfig, TimelineMode,
};
use sumi_trawl::events::LogProgressSink;
use sumi_trawl::output::read_records;
use sumi_trawl::timeline::{MediaFetcher, TimelineRequest, TimelineRunner, TimelineSource};
use sumi_trawl::{ConfigError, RunContext, TrawlError};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_config(dir: &Path, mode: TimelineMode, target_count: usize) -> Config {
    Config {
        http: HttpConfig::default(),
        output: OutputConfig {
            directory: dir.display().to_string(),
        },
        search: None,
        crawler: CrawlerConfig::default(),
        timeline: Some(TimelineConfig {
            bearer_token: "test-token".to_string(),
            cookie: "auth_token=abc; ct0=csrf123;".to_string(),
            tag: "#faker".to_string(),
            filter: "filter:links".to_string(),
            target_count,
            mode,
            max_concurrent_downloads: 4,
            download_attempts: 3,
            retry_backoff_ms: 0,
            endpoint: "https://api.example/graphql/SearchTimeline".to_string(),
        }),
    }
}

fn tweet(screen_name: &str, id: &str, media: Value) -> Value {
    json!({
        "core": {"user_results": {"result": {"legacy": {
            "name": format!("{} display", screen_name),
            "screen_name": screen_name
        }}}},
        "edit_control": {"editable_until_msecs": "1711530000000"},
        "legacy": {
            "conversation_id_str": id,
            "full_text": format!("post {} https://t.co/xyz", id),
            "favorite_count": 10,
            "retweet_count": 3,
            "reply_count": 1,
            "extended_entities": {"media": media}
        }
    })
}

fn image(url: &str) -> Value {
    json!({"type": "photo", "media_url_https": url})
}

fn text_entry(entry_id: &str, result: Value) -> Value {
    json!({
        "entryId": entry_id,
        "content": {"itemContent": {"itemType": "TimelineTweet", "tweet_results": {"result": result}}}
    })
}

fn bottom_cursor(value: &str) -> Value {
    json!({"entryId": "cursor-bottom-0", "content": {"cursorType": "Bottom", "value": value}})
}

fn timeline(instructions: Value) -> Value {
    json!({"data": {"search_by_raw_query": {"search_timeline": {"timeline": {
        "instructions": instructions
    }}}}})
}

fn text_page(entries: Vec<Value>, cursor: Option<&str>) -> Value {
    let mut entries = entries;
    if let Some(cursor) = cursor {
        entries.push(bottom_cursor(cursor));
    }
    timeline(json!([{"type": "TimelineAddEntries", "entries": entries}]))
}

fn media_page(items: Vec<Value>, cursor: &str) -> Value {
    let items: Vec<Value> = items
        .into_iter()
        .enumerate()
        .map(|(i, result)| {
            json!({"entryId": format!("search-grid-0-tweet-{}", i), "item": {"itemContent": {"tweet_results": {"result": result}}}})
        })
        .collect();
    timeline(json!([{"type": "TimelineAddEntries", "entries": [
        {"entryId": "search-grid-0", "content": {"items": items}},
        bottom_cursor(cursor)
    ]}]))
}

/// Serves scripted responses in order and records every request
#[derive(Default)]
struct ScriptedSource {
    responses: Mutex<VecDeque<Result<Value, TrawlError>>>,
    requests: Mutex<Vec<TimelineRequest>>,
}

impl ScriptedSource {
    fn new(responses: Vec<Result<Value, TrawlError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl TimelineSource for ScriptedSource {
    async fn fetch_page(&self, request: &TimelineRequest) -> Result<Value, TrawlError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TrawlError::UnexpectedShape("script exhausted".to_string())))
    }
}

/// Fails every download whose URL contains `broken`
#[derive(Default)]
struct FakeMedia {
    attempts: Mutex<Vec<String>>,
}

#[async_trait]
impl MediaFetcher for FakeMedia {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TrawlError> {
        self.attempts.lock().unwrap().push(url.to_string());
        if url.contains("broken") {
            return Err(TrawlError::Status {
                url: url.to_string(),
                status: 503,
            });
        }
        Ok(b"media-bytes".to_vec())
    }
}

fn runner(
    config: &Config,
    source: Arc<ScriptedSource>,
    media: Arc<FakeMedia>,
    ctx: RunContext,
) -> TimelineRunner {
    TimelineRunner::new(config, source, media, Arc::new(LogProgressSink), ctx)
        .expect("Failed to create runner")
}

#[tokio::test]
async fn test_pagination_stops_without_cursor() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), TimelineMode::Text, 100);
    let source = Arc::new(ScriptedSource::new(vec![
        Ok(text_page(vec![text_entry("tweet-1", tweet("alice", "1", json!([])))], Some("page-2"))),
        Ok(text_page(vec![text_entry("tweet-2", tweet("bob", "2", json!([])))], None)),
        Ok(text_page(vec![text_entry("tweet-3", tweet("carol", "3", json!([])))], None)),
    ]));

    let outcome = runner(&config, source.clone(), Arc::default(), RunContext::new())
        .run()
        .await
        .expect("Run failed");

    assert_eq!(source.request_count(), 2);
    let requests = source.requests.lock().unwrap();
    assert_eq!(requests[0].cursor, None);
    assert_eq!(requests[1].cursor.as_deref(), Some("page-2"));
    assert_eq!(requests[0].raw_query, "#faker filter:links");
    assert_eq!(requests[0].count, 20);

    let rows = read_records(&outcome.output_path).unwrap();
    let handles: Vec<&str> = rows.iter().map(|r| r[2].as_str()).collect();
    assert_eq!(handles, vec!["@alice", "@bob"]);
    assert_eq!(rows[0].len(), 8);
    assert_eq!(rows[0][3], "https://twitter.com/alice/status/1");
    assert_eq!(rows[0][4], "post 1");
    assert_eq!(outcome.records_written, 2);
    assert_eq!(outcome.folder, dir.path().join("#faker"));
}

#[tokio::test]
async fn test_promoted_entries_never_written() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), TimelineMode::Text, 100);

    let mut flagged = text_entry("tweet-3", tweet("sponsor", "3", json!([])));
    flagged["content"]["itemContent"]["promotedMetadata"] = json!({"advertiser_results": {}});

    let source = Arc::new(ScriptedSource::new(vec![Ok(text_page(
        vec![
            text_entry("tweet-1", tweet("alice", "1", json!([]))),
            text_entry("promoted-tweet-2", tweet("sponsor", "2", json!([]))),
            flagged,
            text_entry("tweet-4", tweet("dave", "4", json!([]))),
        ],
        None,
    ))]));

    let outcome = runner(&config, source, Arc::default(), RunContext::new())
        .run()
        .await
        .expect("Run failed");

    let rows = read_records(&outcome.output_path).unwrap();
    assert!(rows.iter().all(|r| r[2] != "@sponsor"));
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_interstitial_first_page_is_exhausted() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), TimelineMode::Media, 100);

    // Only the top and bottom cursors, no grid module
    let interstitial = timeline(json!([{"type": "TimelineAddEntries", "entries": [
        {"entryId": "cursor-top-0", "content": {"cursorType": "Top", "value": "top"}},
        bottom_cursor("bottom")
    ]}]));
    let source = Arc::new(ScriptedSource::new(vec![Ok(interstitial)]));

    let outcome = runner(&config, source.clone(), Arc::default(), RunContext::new())
        .run()
        .await
        .expect("Run failed");

    assert_eq!(source.request_count(), 1);
    assert_eq!(outcome.items_discovered, 0);
    assert!(read_records(&outcome.output_path).unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_page_ends_pagination_keeping_results() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), TimelineMode::Text, 100);
    let source = Arc::new(ScriptedSource::new(vec![
        Ok(text_page(vec![text_entry("tweet-1", tweet("alice", "1", json!([])))], Some("next"))),
        Err(TrawlError::Status {
            url: "https://api.example".to_string(),
            status: 429,
        }),
        Ok(text_page(vec![text_entry("tweet-2", tweet("bob", "2", json!([])))], None)),
    ]));

    let outcome = runner(&config, source.clone(), Arc::default(), RunContext::new())
        .run()
        .await
        .expect("Run failed");

    assert_eq!(source.request_count(), 2);
    assert_eq!(outcome.records_written, 1);
}

#[tokio::test]
async fn test_target_count_limits_pages() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), TimelineMode::Text, 2);
    let source = Arc::new(ScriptedSource::new(vec![
        Ok(text_page(
            vec![
                text_entry("tweet-1", tweet("alice", "1", json!([]))),
                text_entry("tweet-2", tweet("bob", "2", json!([]))),
            ],
            Some("more"),
        )),
        Ok(text_page(vec![text_entry("tweet-3", tweet("carol", "3", json!([])))], None)),
    ]));

    let outcome = runner(&config, source.clone(), Arc::default(), RunContext::new())
        .run()
        .await
        .expect("Run failed");

    assert_eq!(source.request_count(), 1);
    assert_eq!(outcome.records_written, 2);
}

#[tokio::test]
async fn test_cancelled_run_requests_nothing() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), TimelineMode::Text, 100);
    let source = Arc::new(ScriptedSource::new(Vec::new()));

    let ctx = RunContext::new();
    ctx.cancel();
    let outcome = runner(&config, source.clone(), Arc::default(), ctx)
        .run()
        .await
        .expect("Run failed");

    assert_eq!(source.request_count(), 0);
    assert_eq!(outcome.records_written, 0);
}

#[tokio::test]
async fn test_failed_download_writes_no_row() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), TimelineMode::Media, 100);
    let source = Arc::new(ScriptedSource::new(vec![Ok(media_page(
        vec![
            tweet("alice", "1", json!([image("https://pbs.example/ok-1.jpg")])),
            tweet("bob", "2", json!([image("https://pbs.example/broken.jpg")])),
            tweet(
                "carol",
                "3",
                json!([{
                    "type": "video",
                    "media_url_https": "https://pbs.example/thumb.jpg",
                    "video_info": {"variants": [
                        {"bitrate": 256000, "url": "https://video.example/low.mp4"},
                        {"bitrate": 2176000, "url": "https://video.example/high.mp4"}
                    ]}
                }]),
            ),
        ],
        "next",
    ))]));
    let media = Arc::new(FakeMedia::default());

    let outcome = runner(&config, source, media.clone(), RunContext::new())
        .run()
        .await
        .expect("Run failed");

    assert_eq!(outcome.items_discovered, 3);
    assert_eq!(outcome.records_written, 2);

    let rows = read_records(&outcome.output_path).unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.len() == 11));
    assert!(rows.iter().all(|r| r[2] != "@bob"));

    let video = rows.iter().find(|r| r[4] == "Video").expect("Missing video row");
    assert_eq!(video[5], "https://video.example/high.mp4");
    assert!(Path::new(&video[6]).exists());
    assert!(video[6].ends_with(".mp4"));

    let attempts = media.attempts.lock().unwrap();
    let broken_attempts = attempts.iter().filter(|u| u.contains("broken")).count();
    assert_eq!(broken_attempts, 3);
    assert!(attempts
        .iter()
        .any(|u| u == "https://pbs.example/ok-1.jpg?format=png&name=4096x4096"));
}

/// Serves one media page and cancels the run while doing so
struct CancellingSource {
    ctx: RunContext,
    page: Value,
}

#[async_trait]
impl TimelineSource for CancellingSource {
    async fn fetch_page(&self, _request: &TimelineRequest) -> Result<Value, TrawlError> {
        self.ctx.cancel();
        Ok(self.page.clone())
    }
}

#[tokio::test]
async fn test_cancel_during_pagination_skips_downloads() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), TimelineMode::Media, 500);
    let posts = (0..20)
        .map(|i| {
            tweet(
                &format!("user{}", i),
                &i.to_string(),
                json!([image(&format!("https://pbs.example/{}.jpg", i))]),
            )
        })
        .collect();

    let ctx = RunContext::new();
    let source = Arc::new(CancellingSource {
        ctx: ctx.clone(),
        page: media_page(posts, "next"),
    });
    let media = Arc::new(FakeMedia::default());

    let outcome = TimelineRunner::new(&config, source, media.clone(), Arc::new(LogProgressSink), ctx)
        .expect("Failed to create runner")
        .run()
        .await
        .expect("Run failed");

    assert_eq!(outcome.pages_requested, 1);
    assert_eq!(outcome.items_discovered, 20);
    assert_eq!(outcome.items_skipped, 20);
    assert_eq!(outcome.records_written, 0);
    assert!(media.attempts.lock().unwrap().is_empty());
    assert!(read_records(&outcome.output_path).unwrap().is_empty());
}

#[test]
fn test_missing_csrf_cookie_fails_before_network() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path(), TimelineMode::Text, 10);
    if let Some(timeline) = config.timeline.as_mut() {
        timeline.cookie = "auth_token=abc".to_string();
    }

    let result = TimelineRunner::from_config(&config, Arc::new(LogProgressSink), RunContext::new());
    assert!(matches!(
        result,
        Err(TrawlError::Config(ConfigError::MissingCredential(_)))
    ));
}

#[tokio::test]
async fn test_text_harvest_over_http() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/graphql/SearchTimeline"))
        .and(header("authorization", "Bearer test-token"))
        .and(header("x-csrf-token", "csrf123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_page(
            vec![text_entry("tweet-7", tweet("erin", "7", json!([])))],
            None,
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path(), TimelineMode::Text, 50);
    if let Some(timeline) = config.timeline.as_mut() {
        timeline.endpoint = format!("{}/graphql/SearchTimeline", mock_server.uri());
    }

    let outcome = TimelineRunner::from_config(&config, Arc::new(LogProgressSink), RunContext::new())
        .expect("Failed to create runner")
        .run()
        .await
        .expect("Run failed");

    let rows = read_records(&outcome.output_path).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][2], "@erin");
    assert_eq!(outcome.pages_requested, 1);
}

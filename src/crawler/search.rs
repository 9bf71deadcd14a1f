//! Search-result pagination
//!
//! Collects result URLs for one query across several locales and pages,
//! deduplicated and in first-seen order, up to a global cap.

use crate::config::{CrawlerConfig, SearchConfig};
use crate::context::RunContext;
use crate::crawler::fetcher::fetch_url;
use crate::events::{notify, ProgressSink};
use crate::state::DateRange;
use crate::url::normalize_url;
use crate::TrawlError;
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

/// Results shown on one search page
pub const RESULTS_PER_PAGE: u32 = 10;

/// One search page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub locale: String,
    /// Zero-based page number
    pub page: u32,
    pub date_range: Option<DateRange>,
}

impl SearchRequest {
    /// 1-based index of the first result on this page
    pub fn offset(&self) -> u32 {
        self.page * RESULTS_PER_PAGE + 1
    }

    /// Query text with the date-range operator appended when set
    pub fn query_text(&self) -> String {
        match &self.date_range {
            Some(range) => format!("{} {}", self.query, range.query_fragment()),
            None => self.query.clone(),
        }
    }
}

/// Result URLs of one page and whether another page follows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    pub urls: Vec<String>,
    pub has_next: bool,
}

/// A search engine answering one page at a time
#[async_trait]
pub trait SearchSource: Send + Sync {
    async fn search_page(&self, request: &SearchRequest) -> Result<SearchPage, TrawlError>;
}

/// Parameters of the search phase
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub query: String,
    pub locales: Vec<String>,
    pub max_results: usize,
    pub max_pages: u32,
    pub date_range: Option<DateRange>,
    /// Delay after a failed page request
    pub backoff: Duration,
}

impl SearchParams {
    pub fn from_config(search: &SearchConfig, crawler: &CrawlerConfig) -> Self {
        Self {
            query: search.query.clone(),
            locales: search.locales.clone(),
            max_results: search.max_results,
            max_pages: search.max_pages,
            date_range: DateRange::from_bounds(search.since.as_deref(), search.until.as_deref()),
            backoff: Duration::from_millis(crawler.search_backoff_ms),
        }
    }
}

/// Collects up to `max_results` distinct result URLs
///
/// Locales are visited in order, each for at most `max_pages` pages. A locale
/// ends early when its page reports no next page. A failed page is logged,
/// followed by the backoff delay, and skipped. Cancellation and the cap are
/// checked before every page request.
///
/// # Arguments
///
/// * `source` - Result page provider
/// * `params` - Query, locales, bounds and backoff
/// * `ctx` - Checked before each page; a cancelled search returns what it has
/// * `progress` - Notified once per new URL
///
/// # Returns
///
/// Result URLs in the order they were first seen, without duplicates.
///
/// # Example
///
/// ```no_run
/// use sumi_trawl::crawler::{build_http_client, search, BingSearch, SearchParams};
/// use sumi_trawl::config::HttpConfig;
/// use sumi_trawl::events::LogProgressSink;
/// use sumi_trawl::RunContext;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), sumi_trawl::TrawlError> {
/// let client = build_http_client(&HttpConfig::default())?;
/// let source = BingSearch::new(client, "https://www.bing.com/search")?;
/// let params = SearchParams {
///     query: "rust crawler".to_string(),
///     locales: vec!["us".to_string()],
///     max_results: 20,
///     max_pages: 2,
///     date_range: None,
///     backoff: Duration::from_secs(2),
/// };
/// let urls = search(&source, &params, &RunContext::new(), &LogProgressSink).await;
/// # Ok(())
/// # }
/// ```
pub async fn search(
    source: &dyn SearchSource,
    params: &SearchParams,
    ctx: &RunContext,
    progress: &dyn ProgressSink,
) -> Vec<String> {
    let mut results: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    'locales: for locale in &params.locales {
        for page in 0..params.max_pages {
            if ctx.is_cancelled() {
                tracing::info!("Search cancelled with {} results", results.len());
                break 'locales;
            }
            if results.len() >= params.max_results {
                break 'locales;
            }

            let request = SearchRequest {
                query: params.query.clone(),
                locale: locale.clone(),
                page,
                date_range: params.date_range.clone(),
            };

            match source.search_page(&request).await {
                Ok(result_page) => {
                    for url in result_page.urls {
                        if results.len() >= params.max_results {
                            break;
                        }
                        if seen.insert(url.clone()) {
                            notify(
                                progress,
                                format!("search [{} p{}] {}", locale, page + 1, url),
                                results.len() + 1,
                            );
                            results.push(url);
                        }
                    }

                    if !result_page.has_next {
                        tracing::debug!("No further result pages for locale {}", locale);
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "Search page {} for locale {} failed: {}",
                        page + 1,
                        locale,
                        e
                    );
                    if !params.backoff.is_zero() {
                        tokio::time::sleep(params.backoff).await;
                    }
                }
            }
        }
    }

    tracing::info!("Search collected {} result URLs", results.len());
    results
}

/// Search source scraping the Bing result page
pub struct BingSearch {
    client: Client,
    endpoint: Url,
}

impl BingSearch {
    pub fn new(client: Client, endpoint: &str) -> Result<Self, TrawlError> {
        Ok(Self {
            client,
            endpoint: Url::parse(endpoint)?,
        })
    }

    fn request_url(&self, request: &SearchRequest) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("q", &request.query_text())
            .append_pair("first", &request.offset().to_string())
            .append_pair("cc", &request.locale);
        url
    }
}

#[async_trait]
impl SearchSource for BingSearch {
    async fn search_page(&self, request: &SearchRequest) -> Result<SearchPage, TrawlError> {
        let url = self.request_url(request);
        tracing::debug!("Requesting search page {}", url);

        let fetched = fetch_url(&self.client, url.as_str())
            .await
            .into_body(url.as_str())?;
        let html = String::from_utf8_lossy(&fetched.body);
        parse_results_page(&html)
    }
}

/// Extracts organic result links and the next-page marker
///
/// A page without a result list (a consent wall or captcha) is an error.
pub fn parse_results_page(html: &str) -> Result<SearchPage, TrawlError> {
    let document = Html::parse_document(html);

    let results_selector = selector("#b_results")?;
    if document.select(&results_selector).next().is_none() {
        return Err(TrawlError::UnexpectedShape(
            "search page has no result list".to_string(),
        ));
    }

    let link_selector = selector("li.b_algo h2 a[href]")?;
    let urls = document
        .select(&link_selector)
        .filter_map(|element| element.value().attr("href"))
        .filter(|href| href.starts_with("http"))
        .filter_map(|href| normalize_url(href).ok())
        .map(|url| url.to_string())
        .collect();

    let next_selector = selector("a.sb_pagN")?;
    let has_next = document.select(&next_selector).next().is_some();

    Ok(SearchPage { urls, has_next })
}

fn selector(css: &str) -> Result<Selector, TrawlError> {
    Selector::parse(css).map_err(|e| TrawlError::UnexpectedShape(format!("bad selector {}: {}", css, e)))
}

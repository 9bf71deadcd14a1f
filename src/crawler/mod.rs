//! Search-driven recursive crawler
//!
//! This module contains the crawling pipeline, including:
//! - Search-result pagination across locales
//! - HTTP fetching and HTML extraction
//! - The shared frontier worked by a fixed pool of workers
//! - Overall crawl coordination, persistence and resumption

mod coordinator;
mod fetcher;
mod frontier;
mod parser;
mod search;

pub use coordinator::{run_crawl, Coordinator, CrawlOutcome};
pub use fetcher::{
    build_http_client, fetch_url, FetchResult, FetchedBody, FetchedPage, HttpPageSource,
    HttpPageSourceFactory, PageSource, PageSourceFactory,
};
pub use frontier::Frontier;
pub use parser::{parse_html, ParsedPage};
pub use search::{
    parse_results_page, search, BingSearch, SearchPage, SearchParams, SearchRequest,
    SearchSource, RESULTS_PER_PAGE,
};

//! Run parameters and the resumable snapshot of a crawl

use crate::config::{CrawlerConfig, SearchConfig};
use std::fmt;

/// A URL to crawl together with its distance from the search results
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CrawlTarget {
    pub url: String,

    /// 0 for a search result, +1 per followed link
    pub depth: u32,
}

impl CrawlTarget {
    pub fn new(url: impl Into<String>, depth: u32) -> Self {
        Self {
            url: url.into(),
            depth,
        }
    }

    /// A search result at depth zero
    pub fn seed(url: impl Into<String>) -> Self {
        Self::new(url, 0)
    }

    /// A link discovered on this target's page
    pub fn child(&self, url: impl Into<String>) -> Self {
        Self::new(url, self.depth + 1)
    }
}

/// Inclusive date range appended to search queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub since: String,
    pub until: String,
}

impl DateRange {
    /// Builds a range only when both ends are present
    pub fn from_bounds(since: Option<&str>, until: Option<&str>) -> Option<Self> {
        match (since, until) {
            (Some(since), Some(until)) => Some(Self {
                since: since.to_string(),
                until: until.to_string(),
            }),
            _ => None,
        }
    }

    /// Query fragment understood by the search engine
    pub fn query_fragment(&self) -> String {
        format!("daterange:{}-{}", self.since, self.until)
    }
}

/// Lifecycle of a persisted run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            _ => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Parameters and remaining work of one crawl run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    pub query: String,
    pub locales: Vec<String>,
    pub max_results: usize,
    pub max_pages: u32,
    pub date_range: Option<DateRange>,
    pub max_depth: u32,
    pub total_results_seen: usize,
    pub remaining_work: Vec<CrawlTarget>,
    pub output_path: String,
    pub status: RunStatus,
    pub config_hash: String,
}

impl RunState {
    /// Creates the state of a new run from its configuration
    pub fn new(search: &SearchConfig, crawler: &CrawlerConfig, output_path: String) -> Self {
        Self {
            query: search.query.clone(),
            locales: search.locales.clone(),
            max_results: search.max_results,
            max_pages: search.max_pages,
            date_range: DateRange::from_bounds(search.since.as_deref(), search.until.as_deref()),
            max_depth: crawler.max_depth,
            total_results_seen: 0,
            remaining_work: Vec::new(),
            output_path,
            status: RunStatus::Running,
            config_hash: String::new(),
        }
    }

    /// Whether a resumed run has anything left to do
    pub fn has_remaining_work(&self) -> bool {
        !self.remaining_work.is_empty()
    }
}

/// Everything persisted at the end of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSnapshot {
    pub state: RunState,

    /// Every URL claimed so far, sorted
    pub visited: Vec<String>,
}

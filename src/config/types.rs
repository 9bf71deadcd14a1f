use serde::Deserialize;

/// Main configuration structure for Sumi-Trawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    pub output: OutputConfig,
    pub search: Option<SearchConfig>,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub timeline: Option<TimelineConfig>,
}

/// HTTP client configuration shared by every source
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HttpConfig {
    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Total request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connect timeout (seconds)
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving CSV files, documents and run state
    pub directory: String,
}

/// Search query configuration for the crawler
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SearchConfig {
    /// Query text sent to the search engine
    pub query: String,

    /// Locale (country) codes, searched in order
    pub locales: Vec<String>,

    /// Global cap on collected result URLs
    pub max_results: usize,

    /// Result pages requested per locale
    pub max_pages: u32,

    /// Start of the date range (YYYY-MM-DD)
    #[serde(default)]
    pub since: Option<String>,

    /// End of the date range (YYYY-MM-DD)
    #[serde(default)]
    pub until: Option<String>,

    /// Search endpoint, overridable for testing
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum link depth below a search result
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Upper bound on parallel crawl workers
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Maximum characters of extracted text kept per page
    #[serde(default = "default_text_limit")]
    pub text_limit: usize,

    /// Fixed delay after a failed search page request (milliseconds)
    #[serde(default = "default_search_backoff_ms")]
    pub search_backoff_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_workers: default_max_workers(),
            text_limit: default_text_limit(),
            search_backoff_ms: default_search_backoff_ms(),
        }
    }
}

/// Timeline harvesting configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TimelineConfig {
    /// Bearer token of the web client
    pub bearer_token: String,

    /// Session cookie; must carry the `ct0` CSRF value
    pub cookie: String,

    /// Tag or free-text query
    #[serde(default)]
    pub tag: String,

    /// Search operators appended to the tag
    #[serde(default)]
    pub filter: String,

    /// Number of items to collect before stopping
    pub target_count: usize,

    /// Which timeline to page through
    #[serde(default)]
    pub mode: TimelineMode,

    /// Upper bound on in-flight media downloads
    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: usize,

    /// Attempts per media download
    #[serde(default = "default_download_attempts")]
    pub download_attempts: u32,

    /// Delay between download attempts (milliseconds)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Timeline endpoint, overridable for testing
    #[serde(default = "default_timeline_endpoint")]
    pub endpoint: String,
}

/// Timeline variant being harvested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimelineMode {
    /// Text records from the latest tab, no downloads
    Text,
    /// Media timeline with downloads
    #[default]
    Media,
    /// Media attached to posts of the latest tab
    MediaLatest,
}

impl TimelineMode {
    /// Items requested per page
    pub fn page_size(&self) -> usize {
        match self {
            Self::Media => 50,
            Self::Text | Self::MediaLatest => 20,
        }
    }

    /// The `product` tab requested from the API
    pub fn product(&self) -> &'static str {
        match self {
            Self::Media => "Media",
            Self::Text | Self::MediaLatest => "Latest",
        }
    }

    /// Whether items of this mode are downloaded
    pub fn downloads_media(&self) -> bool {
        !matches!(self, Self::Text)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Media => "media",
            Self::MediaLatest => "media-latest",
        }
    }
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_search_endpoint() -> String {
    "https://www.bing.com/search".to_string()
}

fn default_max_depth() -> u32 {
    2
}

fn default_max_workers() -> usize {
    4
}

fn default_text_limit() -> usize {
    10_000
}

fn default_search_backoff_ms() -> u64 {
    2_000
}

fn default_max_concurrent_downloads() -> usize {
    8
}

fn default_download_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_timeline_endpoint() -> String {
    "https://twitter.com/i/api/graphql/tUJgNbJvuiieOXvq7OmHwA/SearchTimeline".to_string()
}

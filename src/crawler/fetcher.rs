//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests made by the crawler, including:
//! - Building HTTP clients from the `[http]` configuration
//! - GET requests with status and network error classification
//! - The `PageSource` seam the workers fetch through

use crate::config::HttpConfig;
use crate::crawler::parser::parse_html;
use crate::TrawlError;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Successful response body together with what the server said about it
#[derive(Debug, Clone)]
pub struct FetchedBody {
    /// Final URL after redirects
    pub final_url: String,
    /// HTTP status code
    pub status_code: u16,
    /// Content-Type header value, lowercased
    pub content_type: String,
    /// Raw response body
    pub body: Vec<u8>,
}

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched the resource
    Success(FetchedBody),

    /// The server answered with a non-2xx status
    HttpError {
        /// The HTTP status code
        status_code: u16,
    },

    /// Network error (connection refused, timeout, body read failure)
    NetworkError {
        /// The underlying client error
        source: reqwest::Error,
    },
}

impl FetchResult {
    /// Converts the result into the body or a `TrawlError` naming `url`
    pub fn into_body(self, url: &str) -> Result<FetchedBody, TrawlError> {
        match self {
            Self::Success(body) => Ok(body),
            Self::HttpError { status_code } => Err(TrawlError::Status {
                url: url.to_string(),
                status: status_code,
            }),
            Self::NetworkError { source } => Err(TrawlError::Http {
                url: url.to_string(),
                source,
            }),
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use sumi_trawl::config::HttpConfig;
/// use sumi_trawl::crawler::build_http_client;
///
/// let client = build_http_client(&HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL with GET and classifies the outcome
///
/// | Condition | Result |
/// |-----------|--------|
/// | 2xx | `Success` with the full body |
/// | Any other status | `HttpError` |
/// | Timeout, refused connection, TLS failure | `NetworkError` |
/// | Body read failure | `NetworkError` |
pub async fn fetch_url(client: &Client, url: &str) -> FetchResult {
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            if e.is_timeout() {
                tracing::debug!("Request timeout for {}", url);
            } else if e.is_connect() {
                tracing::debug!("Connection failed for {}", url);
            }
            return FetchResult::NetworkError { source: e };
        }
    };

    let status = response.status();
    if !status.is_success() {
        return FetchResult::HttpError {
            status_code: status.as_u16(),
        };
    }

    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    match response.bytes().await {
        Ok(body) => FetchResult::Success(FetchedBody {
            final_url,
            status_code: status.as_u16(),
            content_type,
            body: body.to_vec(),
        }),
        Err(e) => FetchResult::NetworkError { source: e },
    }
}

/// A rendered page reduced to what the crawler records and follows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// URL the content was finally served from
    pub final_url: String,
    pub title: Option<String>,
    pub text: String,
    /// Absolute outbound links in document order
    pub links: Vec<String>,
}

/// Source of page content for one crawl worker
///
/// Each worker owns its own source; implementations need not be shared
/// between workers.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetches an HTML page and extracts its title, text and links
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage, TrawlError>;

    /// Fetches the raw bytes of a PDF document
    async fn fetch_document(&self, url: &str) -> Result<Vec<u8>, TrawlError>;
}

/// Creates one independent `PageSource` per worker
pub trait PageSourceFactory: Send + Sync {
    fn create(&self) -> Result<Arc<dyn PageSource>, TrawlError>;
}

/// `PageSource` backed by a plain HTTP client
pub struct HttpPageSource {
    client: Client,
    text_limit: usize,
}

impl HttpPageSource {
    pub fn new(client: Client, text_limit: usize) -> Self {
        Self { client, text_limit }
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage, TrawlError> {
        let fetched = fetch_url(&self.client, url).await.into_body(url)?;

        if !is_html(&fetched.content_type) {
            return Err(TrawlError::HtmlParse {
                url: url.to_string(),
                message: format!("expected HTML, got '{}'", fetched.content_type),
            });
        }

        let base_url = Url::parse(&fetched.final_url)?;
        let html = String::from_utf8_lossy(&fetched.body);
        let parsed = parse_html(&html, &base_url, self.text_limit);

        Ok(FetchedPage {
            final_url: fetched.final_url,
            title: parsed.title,
            text: parsed.text,
            links: parsed.links,
        })
    }

    async fn fetch_document(&self, url: &str) -> Result<Vec<u8>, TrawlError> {
        let fetched = fetch_url(&self.client, url).await.into_body(url)?;

        if !fetched.content_type.contains("application/pdf") {
            return Err(TrawlError::HtmlParse {
                url: url.to_string(),
                message: format!("expected a PDF document, got '{}'", fetched.content_type),
            });
        }

        Ok(fetched.body)
    }
}

/// Builds a fresh HTTP client for every worker
pub struct HttpPageSourceFactory {
    http: HttpConfig,
    text_limit: usize,
}

impl HttpPageSourceFactory {
    pub fn new(http: HttpConfig, text_limit: usize) -> Self {
        Self { http, text_limit }
    }
}

impl PageSourceFactory for HttpPageSourceFactory {
    fn create(&self) -> Result<Arc<dyn PageSource>, TrawlError> {
        let client = build_http_client(&self.http)?;
        Ok(Arc::new(HttpPageSource::new(client, self.text_limit)))
    }
}

/// Missing content types are treated as HTML
fn is_html(content_type: &str) -> bool {
    content_type.is_empty()
        || content_type.contains("text/html")
        || content_type.contains("application/xhtml+xml")
}

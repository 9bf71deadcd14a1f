//! Network seams of the timeline harvester
//!
//! `TimelineSource` answers one page request with the decoded response;
//! `MediaFetcher` returns the bytes behind a media URL.

use crate::config::{csrf_token, HttpConfig, TimelineConfig};
use crate::crawler::{build_http_client, fetch_url};
use crate::timeline::request::TimelineRequest;
use crate::{ConfigError, TrawlError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use url::Url;

/// A paginated timeline endpoint
#[async_trait]
pub trait TimelineSource: Send + Sync {
    /// Fetches and decodes one page; any non-2xx status or undecodable body is an error
    async fn fetch_page(&self, request: &TimelineRequest) -> Result<Value, TrawlError>;
}

/// Source of media bytes
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TrawlError>;
}

/// The web client's GraphQL `SearchTimeline` endpoint
pub struct GraphqlTimelineSource {
    client: Client,
    endpoint: Url,
    authorization: String,
    cookie: String,
    csrf_token: String,
    referer: String,
}

impl GraphqlTimelineSource {
    /// Builds the source, failing before any request when credentials are unusable
    pub fn new(http: &HttpConfig, timeline: &TimelineConfig, raw_query: &str) -> Result<Self, TrawlError> {
        if timeline.bearer_token.trim().is_empty() {
            return Err(ConfigError::MissingCredential("bearer-token is empty".to_string()).into());
        }
        let csrf = csrf_token(&timeline.cookie).ok_or_else(|| {
            ConfigError::MissingCredential("cookie must contain a ct0 value".to_string())
        })?;

        let endpoint = Url::parse(&timeline.endpoint)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid timeline endpoint: {}", e)))?;

        let mut referer = Url::parse("https://twitter.com/search")?;
        referer
            .query_pairs_mut()
            .append_pair("q", raw_query)
            .append_pair("src", "typed_query")
            .append_pair("f", "media");

        Ok(Self {
            client: build_http_client(http)?,
            endpoint,
            authorization: format!("Bearer {}", timeline.bearer_token.trim()),
            cookie: timeline.cookie.clone(),
            csrf_token: csrf.to_string(),
            referer: referer.to_string(),
        })
    }
}

#[async_trait]
impl TimelineSource for GraphqlTimelineSource {
    async fn fetch_page(&self, request: &TimelineRequest) -> Result<Value, TrawlError> {
        let url = request.to_url(&self.endpoint);
        tracing::debug!(
            "Requesting timeline page (cursor: {})",
            request.cursor.as_deref().unwrap_or("<initial>")
        );

        let response = self
            .client
            .get(url.as_str())
            .header("authorization", &self.authorization)
            .header("cookie", &self.cookie)
            .header("x-csrf-token", &self.csrf_token)
            .header("referer", &self.referer)
            .send()
            .await
            .map_err(|source| TrawlError::Http {
                url: self.endpoint.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TrawlError::Status {
                url: self.endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|source| TrawlError::Http {
            url: self.endpoint.to_string(),
            source,
        })?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Downloads media over plain HTTP
pub struct HttpMediaFetcher {
    client: Client,
}

impl HttpMediaFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(http: &HttpConfig) -> Result<Self, TrawlError> {
        Ok(Self::new(build_http_client(http)?))
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TrawlError> {
        let fetched = fetch_url(&self.client, url).await.into_body(url)?;
        Ok(fetched.body)
    }
}

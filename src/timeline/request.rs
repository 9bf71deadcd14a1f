//! Timeline page requests

use crate::config::TimelineMode;
use serde_json::{json, Value};
use url::Url;

/// One page request against the search timeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineRequest {
    /// Tag and filter operators as typed into the search box
    pub raw_query: String,

    /// Items requested for this page
    pub count: usize,

    /// Continuation token; `None` for the first page
    pub cursor: Option<String>,

    /// Timeline tab, `"Latest"` or `"Media"`
    pub product: &'static str,
}

impl TimelineRequest {
    pub fn new(raw_query: impl Into<String>, mode: TimelineMode, cursor: Option<String>) -> Self {
        Self {
            raw_query: raw_query.into(),
            count: mode.page_size(),
            cursor,
            product: mode.product(),
        }
    }

    /// The `variables` parameter of the GraphQL request
    pub fn variables(&self) -> Value {
        json!({
            "rawQuery": self.raw_query,
            "count": self.count,
            "cursor": self.cursor.as_deref().unwrap_or(""),
            "querySource": "typed_query",
            "product": self.product,
        })
    }

    /// Full request URL with JSON-encoded `variables` and `features`
    pub fn to_url(&self, endpoint: &Url) -> Url {
        let mut url = endpoint.clone();
        url.query_pairs_mut()
            .append_pair("variables", &self.variables().to_string())
            .append_pair("features", &features().to_string());
        url
    }
}

/// Joins the tag and its filter operators into one query
pub fn raw_query(tag: &str, filter: &str) -> String {
    format!("{} {}", tag.trim(), filter.trim()).trim().to_string()
}

/// Feature switches the web client sends with every timeline request
pub(crate) fn features() -> Value {
    json!({
        "rweb_tipjar_consumption_enabled": true,
        "responsive_web_graphql_exclude_directive_enabled": true,
        "verified_phone_label_enabled": false,
        "creator_subscriptions_tweet_preview_api_enabled": true,
        "responsive_web_graphql_timeline_navigation_enabled": true,
        "responsive_web_graphql_skip_user_profile_image_extensions_enabled": false,
        "communities_web_enable_tweet_community_results_fetch": true,
        "c9s_tweet_anatomy_moderator_badge_enabled": true,
        "articles_preview_enabled": true,
        "tweetypie_unmention_optimization_enabled": true,
        "responsive_web_edit_tweet_api_enabled": true,
        "graphql_is_translatable_rweb_tweet_is_translatable_enabled": true,
        "view_counts_everywhere_api_enabled": true,
        "longform_notetweets_consumption_enabled": true,
        "responsive_web_twitter_article_tweet_consumption_enabled": true,
        "tweet_awards_web_tipping_enabled": false,
        "creator_subscriptions_quote_tweet_preview_enabled": false,
        "freedom_of_speech_not_reach_fetch_enabled": true,
        "standardized_nudges_misinfo": true,
        "tweet_with_visibility_results_prefer_gql_limited_actions_policy_enabled": true,
        "tweet_with_visibility_results_prefer_gql_media_interstitial_enabled": true,
        "rweb_video_timestamps_enabled": true,
        "longform_notetweets_rich_text_read_enabled": true,
        "longform_notetweets_inline_media_enabled": true,
        "responsive_web_enhance_cards_enabled": false
    })
}

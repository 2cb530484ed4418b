//! HTTP transport for the timeline endpoint
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - Assembling the search query parameters for a page request
//! - Classifying failures as transient (retry) or fatal (abort the run)
//!
//! # Error Classification
//!
//! | Condition | Variant | Retried |
//! |-----------|---------|---------|
//! | Body cannot be decoded as a timeline envelope | `Decode` | yes |
//! | Body stream failed mid-read | `Body` | yes |
//! | Connection refused / DNS / TLS | `Connect` | no |
//! | Timeout | `Timeout` | no |
//! | Non-2xx status | `Status` | no |
//! | Anything else from the client | `Request` | no |

use crate::config::{CrawlerConfig, EndpointConfig, UserAgentConfig};
use crate::crawler::cursor::Cursor;
use crate::query::Query;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while fetching or decoding one page
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("malformed response: {0}")]
    Decode(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("unexpected HTTP status {status}")]
    Status { status: u16 },

    #[error("request failed: {0}")]
    Request(String),
}

impl FetchError {
    /// Returns true if repeating the identical request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::Body(_))
    }
}

/// Query parameters for one timeline request
pub type RequestParams = Vec<(String, String)>;

/// Builds the query parameters for a page request
///
/// `max_position` is only present on continuation requests.
pub fn build_params(
    endpoint: &EndpointConfig,
    query: &Query,
    cursor: Option<&Cursor>,
    last_note_ts: i64,
) -> RequestParams {
    let flag = |on: bool| String::from(if on { "1" } else { "0" });

    let mut params = vec![
        ("q".to_string(), query.text()),
        ("f".to_string(), endpoint.result_type.clone()),
        (
            "include_available_features".to_string(),
            flag(endpoint.include_available_features),
        ),
        ("include_entities".to_string(), flag(endpoint.include_entities)),
        ("last_note_ts".to_string(), last_note_ts.to_string()),
    ];

    if let Some(cursor) = cursor {
        params.push(("max_position".to_string(), cursor.as_str().to_string()));
    }

    params.push(("src".to_string(), endpoint.source.clone()));
    params
}

/// Issues a GET against the timeline endpoint
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches `base_url` with the given query parameters and returns the body text
    async fn fetch(
        &self,
        base_url: &str,
        params: &[(String, String)],
    ) -> Result<String, FetchError>;
}

/// `reqwest`-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a transport with a client configured from the crawler settings
    pub fn from_config(
        user_agent: &UserAgentConfig,
        crawler: &CrawlerConfig,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(user_agent, crawler)?))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(
        &self,
        base_url: &str,
        params: &[(String, String)],
    ) -> Result<String, FetchError> {
        let response = self
            .client
            .get(base_url)
            .query(params)
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use tweet_trawl::config::{CrawlerConfig, UserAgentConfig};
/// use tweet_trawl::crawler::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default(), &CrawlerConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    crawler: &CrawlerConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(crawler.request_timeout_secs))
        .connect_timeout(Duration::from_secs(crawler.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

fn classify_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_connect() {
        FetchError::Connect(e.to_string())
    } else if e.is_body() || e.is_decode() {
        FetchError::Body(e.to_string())
    } else {
        FetchError::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TweetId;
    use crate::query::{DateRange, Query};

    fn query() -> Query {
        let range = DateRange::new(
            "2014-12-01".parse().unwrap(),
            "2014-12-31".parse().unwrap(),
        )
        .unwrap();
        Query::word("foo", range).unwrap()
    }

    fn param<'a>(params: &'a RequestParams, key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_initial_params() {
        let params = build_params(&EndpointConfig::default(), &query(), None, 1_400_000_000);

        assert_eq!(param(&params, "q"), Some("foo since:2014-12-01 until:2014-12-31"));
        assert_eq!(param(&params, "f"), Some("tweets"));
        assert_eq!(param(&params, "include_available_features"), Some("1"));
        assert_eq!(param(&params, "include_entities"), Some("1"));
        assert_eq!(param(&params, "last_note_ts"), Some("1400000000"));
        assert_eq!(param(&params, "src"), Some("typd"));
        assert_eq!(param(&params, "max_position"), None);
    }

    #[test]
    fn test_continuation_params_carry_cursor() {
        let cursor = Cursor::new(&TweetId::new("10"), &TweetId::new("30"));
        let params = build_params(&EndpointConfig::default(), &query(), Some(&cursor), 0);
        assert_eq!(param(&params, "max_position"), Some("TWEET-10-30"));
    }

    #[test]
    fn test_disabled_feature_flags() {
        let endpoint = EndpointConfig {
            include_entities: false,
            ..EndpointConfig::default()
        };
        let params = build_params(&endpoint, &query(), None, 0);
        assert_eq!(param(&params, "include_entities"), Some("0"));
    }

    #[test]
    fn test_error_classification() {
        assert!(FetchError::Decode("bad json".into()).is_transient());
        assert!(FetchError::Body("reset".into()).is_transient());
        assert!(!FetchError::Timeout.is_transient());
        assert!(!FetchError::Connect("refused".into()).is_transient());
        assert!(!FetchError::Status { status: 503 }.is_transient());
        assert!(!FetchError::Request("builder".into()).is_transient());
    }

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&UserAgentConfig::default(), &CrawlerConfig::default());
        assert!(client.is_ok());
    }
}

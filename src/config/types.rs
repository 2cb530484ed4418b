use crate::crawler::MinIdPolicy;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Tweet-Trawl
///
/// Every section is optional; missing keys fall back to the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default, rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Search endpoint and the fixed query parameters sent with every request
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    /// Timeline search URL
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// Value of the `f` parameter
    #[serde(rename = "result-type", default = "default_result_type")]
    pub result_type: String,

    /// Value of the `src` parameter
    #[serde(default = "default_source")]
    pub source: String,

    #[serde(rename = "include-available-features", default = "default_true")]
    pub include_available_features: bool,

    #[serde(rename = "include-entities", default = "default_true")]
    pub include_entities: bool,
}

/// Pagination, throttling and retry behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Upper bound of the random pause between page requests (milliseconds, 0 disables)
    #[serde(rename = "max-delay-ms", default)]
    pub max_delay_ms: u64,

    /// Fixed pause before retrying an undecodable response (milliseconds)
    #[serde(rename = "error-delay-ms", default = "default_error_delay_ms")]
    pub error_delay_ms: u64,

    /// Total attempts per request when the response cannot be decoded
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// How the leading id of the cursor is tracked across pages
    #[serde(rename = "min-id-policy", default)]
    pub min_id_policy: MinIdPolicy,

    /// Stop after this many pages (0 means unlimited)
    #[serde(rename = "max-pages", default)]
    pub max_pages: u32,

    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl CrawlerConfig {
    pub fn error_delay(&self) -> Duration {
        Duration::from_millis(self.error_delay_ms)
    }

    /// Page cap, or `None` when unlimited
    pub fn page_limit(&self) -> Option<u32> {
        (self.max_pages > 0).then_some(self.max_pages)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name", default = "default_crawler_name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version", default = "default_crawler_version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url", default)]
    pub contact_url: Option<String>,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    ///
    /// Format: `CrawlerName/Version` or `CrawlerName/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        match &self.contact_url {
            Some(url) => format!("{}/{} (+{})", self.crawler_name, self.crawler_version, url),
            None => format!("{}/{}", self.crawler_name, self.crawler_version),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory the CSV file is written to
    #[serde(default = "default_output_directory")]
    pub directory: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            result_type: default_result_type(),
            source: default_source(),
            include_available_features: true,
            include_entities: true,
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_delay_ms: 0,
            error_delay_ms: default_error_delay_ms(),
            max_attempts: default_max_attempts(),
            min_id_policy: MinIdPolicy::default(),
            max_pages: 0,
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: default_crawler_name(),
            crawler_version: default_crawler_version(),
            contact_url: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
        }
    }
}

fn default_base_url() -> String {
    "https://twitter.com/i/search/timeline".to_string()
}

fn default_result_type() -> String {
    "tweets".to_string()
}

fn default_source() -> String {
    "typd".to_string()
}

fn default_true() -> bool {
    true
}

fn default_error_delay_ms() -> u64 {
    5000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_crawler_name() -> String {
    "tweet-trawl".to_string()
}

fn default_crawler_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_output_directory() -> String {
    ".".to_string()
}

//! Tweet-Trawl: a cursor-driven timeline search crawler
//!
//! This crate walks a paginated search timeline backwards in time, deriving
//! each continuation cursor from the ids of the page it just received, and
//! writes everything it collected as a chronological CSV table.

pub mod config;
pub mod crawler;
pub mod model;
pub mod output;
pub mod query;

use thiserror::Error;

/// Main error type for Tweet-Trawl operations
#[derive(Debug, Error)]
pub enum TrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch failed after {attempts} attempt(s): {source}")]
    Fetch {
        attempts: u32,
        source: crawler::FetchError,
    },

    #[error("Crawl cancelled")]
    Cancelled,

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

impl TrawlError {
    /// Returns true if the run was stopped by the caller rather than by a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Tweet-Trawl operations
pub type Result<T> = std::result::Result<T, TrawlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, CrawlOutcome, MinIdPolicy};
pub use model::{Page, Tweet, TweetId, User};
pub use query::{DateRange, Query};

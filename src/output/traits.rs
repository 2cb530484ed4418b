//! Output sink trait and error types
//!
//! A sink receives the finished run's records oldest first and lays them out
//! in that order. Flattening a `Tweet` into table columns is
//! a pure projection done here, never a mutation of the record.

use crate::model::Tweet;
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Column names of the output table, in order
pub const CSV_HEADER: [&str; 8] = [
    "tweet_id",
    "tweet",
    "user_id",
    "user_name",
    "user_screen_name",
    "timestamp",
    "retweets",
    "favourites",
];

/// Timestamp format used in the output table
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One flattened output row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsvRow<'a> {
    pub tweet_id: &'a str,
    pub tweet: &'a str,
    pub user_id: &'a str,
    pub user_name: &'a str,
    pub user_screen_name: &'a str,
    pub timestamp: String,
    pub retweets: u64,
    pub favourites: u64,
}

impl<'a> From<&'a Tweet> for CsvRow<'a> {
    fn from(tweet: &'a Tweet) -> Self {
        Self {
            tweet_id: tweet.tweet_id.as_str(),
            tweet: &tweet.text,
            user_id: &tweet.user.user_id,
            user_name: &tweet.user.user_name,
            user_screen_name: &tweet.user.user_screen_name,
            timestamp: tweet.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            retweets: tweet.retweets,
            favourites: tweet.favourites,
        }
    }
}

/// Trait for output sinks
pub trait Sink {
    /// Writes the run's records
    ///
    /// # Arguments
    ///
    /// * `records` - All records, oldest first
    fn write(&mut self, records: &[Tweet]) -> OutputResult<()>;
}

//! Crawled item types
//!
//! A `Tweet` is produced once by the page parser and never mutated. The
//! author is kept as an embedded `User` value; flattening into table columns
//! only happens at the output boundary.

use chrono::{DateTime, Utc};
use std::fmt;

/// Opaque item identifier as it appears in the timeline markup
///
/// Identifiers are only compared for equality. Their position within a page
/// carries the ordering, not their value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TweetId(String);

impl TweetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TweetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TweetId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Author of a tweet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Numeric account id (kept as text)
    pub user_id: String,

    /// Display name
    pub user_name: String,

    /// Handle without the leading '@'
    pub user_screen_name: String,
}

/// One crawled timeline item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tweet {
    pub tweet_id: TweetId,
    pub text: String,
    pub user: User,
    pub timestamp: DateTime<Utc>,
    pub retweets: u64,
    pub favourites: u64,
}

/// The parsed result of a single timeline fetch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    /// Records in upstream order (newest first)
    pub records: Vec<Tweet>,

    /// Continuation flag reported by the endpoint
    pub has_more_items: bool,

    /// Number of items dropped because a required field was missing or invalid
    pub skipped: usize,
}

impl Page {
    pub fn new(records: Vec<Tweet>, has_more_items: bool) -> Self {
        Self {
            records,
            has_more_items,
            skipped: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Id of the first (newest) record on the page
    pub fn first_id(&self) -> Option<&TweetId> {
        self.records.first().map(|t| &t.tweet_id)
    }

    /// Id of the last (oldest) record on the page
    pub fn last_id(&self) -> Option<&TweetId> {
        self.records.last().map(|t| &t.tweet_id)
    }
}

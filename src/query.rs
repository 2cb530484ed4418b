//! Search query construction
//!
//! The endpoint takes a single free-text `q` parameter. Author filters and
//! date bounds are expressed with the search operators `from:`, `since:` and
//! `until:` baked into that text.

use crate::TrawlError;
use chrono::NaiveDate;
use std::fmt;

/// Default lower date bound for searches
pub const DEFAULT_SINCE: &str = "2014-12-01";

/// Default upper date bound for searches
pub const DEFAULT_UNTIL: &str = "2014-12-31";

/// Inclusive date window for a search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub since: NaiveDate,
    pub until: NaiveDate,
}

impl DateRange {
    /// Creates a date range, rejecting windows that end before they start
    pub fn new(since: NaiveDate, until: NaiveDate) -> Result<Self, TrawlError> {
        if since > until {
            return Err(TrawlError::InvalidQuery(format!(
                "since date {} is after until date {}",
                since, until
            )));
        }
        Ok(Self { since, until })
    }
}

/// What the search is about
#[derive(Debug, Clone, PartialEq, Eq)]
enum Subject {
    Word(String),
    User(String),
}

/// An immutable search query, built once per run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    subject: Subject,
    range: DateRange,
}

impl Query {
    /// Free-text search for `word`
    pub fn word(word: &str, range: DateRange) -> Result<Self, TrawlError> {
        let word = non_empty(word, "search word")?;
        Ok(Self {
            subject: Subject::Word(word),
            range,
        })
    }

    /// Search for tweets posted by `handle` (a leading '@' is ignored)
    pub fn user(handle: &str, range: DateRange) -> Result<Self, TrawlError> {
        let handle = non_empty(handle.trim().trim_start_matches('@'), "user handle")?;
        if handle.chars().any(char::is_whitespace) {
            return Err(TrawlError::InvalidQuery(format!(
                "user handle '{}' cannot contain whitespace",
                handle
            )));
        }
        Ok(Self {
            subject: Subject::User(handle),
            range,
        })
    }

    /// The `q` parameter value sent to the endpoint
    pub fn text(&self) -> String {
        match &self.subject {
            Subject::Word(word) => format!(
                "{} since:{} until:{}",
                word, self.range.since, self.range.until
            ),
            Subject::User(user) => format!(
                "from:{} since:{} until:{}",
                user, self.range.since, self.range.until
            ),
        }
    }

    /// Base name for the output file
    pub fn output_stem(&self) -> &str {
        match &self.subject {
            Subject::Word(word) => word,
            Subject::User(user) => user,
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

fn non_empty(value: &str, what: &str) -> Result<String, TrawlError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TrawlError::InvalidQuery(format!("{} cannot be empty", what)));
    }
    Ok(trimmed.to_string())
}

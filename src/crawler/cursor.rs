//! Cursor engine: continuation tokens and termination
//!
//! The timeline is walked backwards. After each page the engine looks at the
//! page's first (newest) and last (oldest) ids and either produces the
//! `max_position` token for the next request or decides the crawl is over.
//!
//! # Decision order
//!
//! | Condition | Result |
//! |-----------|--------|
//! | Page has no records | `Stop(EndOfResults)` |
//! | Running min id equals the page's last id | `Stop(Stagnated)` |
//! | Next cursor equals the previous cursor | `Stop(Stagnated)` |
//! | Endpoint reports no more items | `Stop(NoMoreItems)` |
//! | Otherwise | `Continue(cursor)` |

use crate::model::{Page, TweetId};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// How the leading id of the cursor is tracked between pages
///
/// The two policies only diverge when id order within the timeline is not
/// monotonic, or when the endpoint keeps returning overlapping windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MinIdPolicy {
    /// Take the first id of every page
    #[default]
    Rolling,

    /// Take the first id of the first non-empty page and keep it for the run
    Fixed,
}

impl MinIdPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rolling => "rolling",
            Self::Fixed => "fixed",
        }
    }
}

impl fmt::Display for MinIdPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MinIdPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rolling" => Ok(Self::Rolling),
            "fixed" => Ok(Self::Fixed),
            other => Err(format!(
                "unknown min-id policy '{}' (expected 'rolling' or 'fixed')",
                other
            )),
        }
    }
}

/// Opaque pagination token, sent as `max_position`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor(String);

impl Cursor {
    /// Formats `TWEET-<max_id>-<min_id>`
    pub fn new(max_id: &TweetId, min_id: &TweetId) -> Self {
        Self(format!("TWEET-{}-{}", max_id, min_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why the crawl ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The last page had no parseable records
    EndOfResults,

    /// The cursor would not move the window any further
    Stagnated,

    /// The endpoint reported that nothing older is available
    NoMoreItems,

    /// The configured page cap was reached
    PageLimit,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::EndOfResults => "end of results",
            Self::Stagnated => "cursor stagnated",
            Self::NoMoreItems => "no more items",
            Self::PageLimit => "page limit reached",
        };
        f.write_str(s)
    }
}

/// Outcome of feeding one page to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    Continue(Cursor),
    Stop(StopReason),
}

/// Tracks cursor state across the pages of one run
#[derive(Debug, Clone)]
pub struct CursorEngine {
    policy: MinIdPolicy,
    min_id: Option<TweetId>,
    last_cursor: Option<Cursor>,
}

impl CursorEngine {
    pub fn new(policy: MinIdPolicy) -> Self {
        Self {
            policy,
            min_id: None,
            last_cursor: None,
        }
    }

    /// The running min id, if any page has been seen
    pub fn min_id(&self) -> Option<&TweetId> {
        self.min_id.as_ref()
    }

    /// Feeds the page just received and decides what happens next
    pub fn advance(&mut self, page: &Page) -> Advance {
        let (first_id, last_id) = match (page.first_id(), page.last_id()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Advance::Stop(StopReason::EndOfResults),
        };

        match self.policy {
            MinIdPolicy::Rolling => self.min_id = Some(first_id.clone()),
            MinIdPolicy::Fixed => {
                if self.min_id.is_none() {
                    self.min_id = Some(first_id.clone());
                }
            }
        }

        let min_id = match &self.min_id {
            Some(id) => id,
            None => return Advance::Stop(StopReason::EndOfResults),
        };
        let max_id = last_id;

        if min_id == max_id {
            return Advance::Stop(StopReason::Stagnated);
        }

        let cursor = Cursor::new(max_id, min_id);
        if self.last_cursor.as_ref() == Some(&cursor) {
            return Advance::Stop(StopReason::Stagnated);
        }

        if !page.has_more_items {
            return Advance::Stop(StopReason::NoMoreItems);
        }

        self.last_cursor = Some(cursor.clone());
        Advance::Continue(cursor)
    }
}

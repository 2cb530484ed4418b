//! Timeline page parser
//!
//! A timeline response is a JSON envelope:
//!
//! ```json
//! { "has_more_items": true, "items_html": "<li class=\"js-stream-item\" ...>...</li>" }
//! ```
//!
//! The envelope must decode, otherwise the whole response is rejected with a
//! `DecodeError` (which the driver retries). Inside `items_html` every
//! `li.js-stream-item` is extracted independently; an item missing a required
//! field is skipped and counted, the rest of the page is kept.
//!
//! # Fields
//!
//! | Field | Source |
//! |-------|--------|
//! | tweet id | `li.js-stream-item[data-item-id]` |
//! | text | `p.js-tweet-text` text content |
//! | timestamp | `span._timestamp[data-time]` (unix seconds) |
//! | user | `div.tweet[data-user-id, data-name, data-screen-name]` |
//! | retweets | `span.ProfileTweet-action--retweet span.ProfileTweet-actionCount[data-tweet-stat-count]` |
//! | favourites | `span.ProfileTweet-action--favorite span.ProfileTweet-actionCount[data-tweet-stat-count]` |

use crate::crawler::fetcher::FetchError;
use crate::model::{Page, Tweet, TweetId, User};
use chrono::{DateTime, TimeZone, Utc};
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use thiserror::Error;

/// The response body could not be turned into a page
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid timeline envelope: {0}")]
    Envelope(#[from] serde_json::Error),

    #[error("invalid selector '{0}'")]
    Selector(&'static str),
}

impl From<DecodeError> for FetchError {
    fn from(e: DecodeError) -> Self {
        FetchError::Decode(e.to_string())
    }
}

/// A single item could not be extracted
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("missing field '{0}'")]
    Missing(&'static str),

    #[error("invalid value '{value}' for field '{field}'")]
    Invalid { field: &'static str, value: String },
}

/// Turns one response body into a page of records
pub trait PageParser: Send + Sync {
    fn parse(&self, body: &str) -> Result<Page, DecodeError>;
}

/// Raw JSON envelope returned by the timeline endpoint
#[derive(Debug, Deserialize)]
struct Envelope {
    has_more_items: bool,
    items_html: String,
}

/// Parser for the legacy search timeline markup
#[derive(Debug, Clone, Copy, Default)]
pub struct TimelineParser;

impl TimelineParser {
    pub fn new() -> Self {
        Self
    }
}

impl PageParser for TimelineParser {
    fn parse(&self, body: &str) -> Result<Page, DecodeError> {
        let envelope: Envelope = serde_json::from_str(body)?;
        let (records, skipped) = parse_items(&envelope.items_html)?;

        Ok(Page {
            records,
            has_more_items: envelope.has_more_items,
            skipped,
        })
    }
}

/// Compiled selectors for one parse
struct Selectors {
    item: Selector,
    text: Selector,
    timestamp: Selector,
    user: Selector,
    retweets: Selector,
    favourites: Selector,
}

impl Selectors {
    fn new() -> Result<Self, DecodeError> {
        Ok(Self {
            item: selector("li.js-stream-item")?,
            text: selector("p.js-tweet-text")?,
            timestamp: selector("span._timestamp")?,
            user: selector("div.tweet")?,
            retweets: selector(
                "span.ProfileTweet-action--retweet span.ProfileTweet-actionCount",
            )?,
            favourites: selector(
                "span.ProfileTweet-action--favorite span.ProfileTweet-actionCount",
            )?,
        })
    }
}

fn selector(css: &'static str) -> Result<Selector, DecodeError> {
    Selector::parse(css).map_err(|_| DecodeError::Selector(css))
}

/// Extracts every item from an `items_html` fragment
///
/// Returns the records in document order and the number of skipped items.
pub fn parse_items(html: &str) -> Result<(Vec<Tweet>, usize), DecodeError> {
    let selectors = Selectors::new()?;
    let fragment = Html::parse_fragment(html);

    let mut records = Vec::new();
    let mut skipped = 0;

    for element in fragment.select(&selectors.item) {
        match extract_tweet(&element, &selectors) {
            Ok(tweet) => records.push(tweet),
            Err(e) => {
                let id = element.value().attr("data-item-id").unwrap_or("?");
                tracing::debug!("Skipping item {}: {}", id, e);
                skipped += 1;
            }
        }
    }

    Ok((records, skipped))
}

fn extract_tweet(item: &ElementRef<'_>, selectors: &Selectors) -> Result<Tweet, FieldError> {
    let tweet_id = attr(item, "data-item-id")?;

    let text = item
        .select(&selectors.text)
        .next()
        .map(|el| el.text().collect::<String>())
        .ok_or(FieldError::Missing("tweet"))?;

    let raw_time = attr(&first(item, &selectors.timestamp, "timestamp")?, "data-time")?;
    let timestamp = parse_timestamp(raw_time)?;

    let user_el = first(item, &selectors.user, "user")?;
    let user = User {
        user_id: attr(&user_el, "data-user-id")?.to_string(),
        user_name: attr(&user_el, "data-name")?.to_string(),
        user_screen_name: attr(&user_el, "data-screen-name")?.to_string(),
    };

    let retweets = stat_count(item, &selectors.retweets, "retweets")?;
    let favourites = stat_count(item, &selectors.favourites, "favourites")?;

    Ok(Tweet {
        tweet_id: TweetId::new(tweet_id),
        text,
        user,
        timestamp,
        retweets,
        favourites,
    })
}

fn first<'a>(
    item: &ElementRef<'a>,
    selector: &Selector,
    field: &'static str,
) -> Result<ElementRef<'a>, FieldError> {
    item.select(selector).next().ok_or(FieldError::Missing(field))
}

fn attr<'a>(element: &ElementRef<'a>, name: &'static str) -> Result<&'a str, FieldError> {
    element.value().attr(name).ok_or(FieldError::Missing(name))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, FieldError> {
    let invalid = || FieldError::Invalid {
        field: "timestamp",
        value: raw.to_string(),
    };
    let secs: i64 = raw.trim().parse().map_err(|_| invalid())?;
    Utc.timestamp_opt(secs, 0).single().ok_or_else(invalid)
}

fn stat_count(
    item: &ElementRef<'_>,
    selector: &Selector,
    field: &'static str,
) -> Result<u64, FieldError> {
    let raw = attr(&first(item, selector, field)?, "data-tweet-stat-count")?;
    raw.trim().parse().map_err(|_| FieldError::Invalid {
        field,
        value: raw.to_string(),
    })
}

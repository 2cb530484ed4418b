//! Crawler module for walking the search timeline
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with transient/fatal error classification
//! - Timeline envelope decoding and per-item extraction
//! - Cursor derivation and stop decisions
//! - Bounded retry of undecodable responses
//! - Overall crawl coordination

mod coordinator;
mod cursor;
mod fetcher;
mod parser;
mod retry;

pub use coordinator::{run_crawl, Accumulator, Coordinator, CrawlOutcome, CrawlReport};
pub use cursor::{Advance, Cursor, CursorEngine, MinIdPolicy, StopReason};
pub use fetcher::{
    build_http_client, build_params, FetchError, HttpTransport, RequestParams, Transport,
};
pub use parser::{parse_items, DecodeError, FieldError, PageParser, TimelineParser};
pub use retry::{Attempted, RetryPolicy};

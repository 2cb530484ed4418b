//! Crawler coordinator - main pagination loop
//!
//! This module contains the crawl loop that ties the pieces together:
//! - Building request parameters from the query and the current cursor
//! - Fetching and parsing pages under the retry policy
//! - Accumulating records in fetch order
//! - Asking the cursor engine whether to continue
//! - Throttling between requests and honoring cancellation

use crate::config::{Config, CrawlerConfig, EndpointConfig};
use crate::crawler::cursor::{Advance, Cursor, CursorEngine, StopReason};
use crate::crawler::fetcher::{build_params, FetchError, HttpTransport, Transport};
use crate::crawler::parser::{PageParser, TimelineParser};
use crate::crawler::retry::RetryPolicy;
use crate::model::{Page, Tweet};
use crate::query::Query;
use crate::TrawlError;
use rand::Rng;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// All records of a run in fetch order (newest first)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Accumulator {
    records: Vec<Tweet>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a page's records after everything seen so far
    pub fn extend(&mut self, records: Vec<Tweet>) {
        self.records.extend(records);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in fetch order
    pub fn as_slice(&self) -> &[Tweet] {
        &self.records
    }

    /// Consumes the accumulator and returns the records oldest first
    pub fn into_chronological(self) -> Vec<Tweet> {
        let mut records = self.records;
        records.reverse();
        records
    }
}

/// Counters describing a finished run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    /// Pages fetched and parsed, including the final empty one
    pub pages: u32,

    /// Records collected
    pub records: usize,

    /// Items dropped by the parser for missing or invalid fields
    pub skipped_items: usize,

    /// Extra attempts spent on undecodable responses
    pub retries: u32,

    pub stop_reason: StopReason,

    pub elapsed: Duration,
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    pub records: Accumulator,
    pub report: CrawlReport,
}

/// Drives one crawl from the first request to a stop decision
pub struct Coordinator<T, P> {
    transport: T,
    parser: P,
    endpoint: EndpointConfig,
    crawler: CrawlerConfig,
}

impl Coordinator<HttpTransport, TimelineParser> {
    /// Creates a coordinator using the HTTP transport and timeline parser
    pub fn from_config(config: &Config) -> Result<Self, TrawlError> {
        let transport = HttpTransport::from_config(&config.user_agent, &config.crawler)?;
        Ok(Self::new(transport, TimelineParser::new(), config))
    }
}

impl<T: Transport, P: PageParser> Coordinator<T, P> {
    pub fn new(transport: T, parser: P, config: &Config) -> Self {
        Self {
            transport,
            parser,
            endpoint: config.endpoint.clone(),
            crawler: config.crawler.clone(),
        }
    }

    /// Runs the pagination loop for `query`
    ///
    /// # Flow
    ///
    /// 1. Fetch the first page (no cursor)
    /// 2. Stop on an empty page
    /// 3. Append the page's records
    /// 4. Ask the cursor engine for the next cursor or a stop reason
    /// 5. Sleep a random duration up to `max-delay-ms`, then fetch with the cursor
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlOutcome)` - The run reached a stop decision
    /// * `Err(TrawlError::Fetch)` - A request failed fatally or exhausted its retries
    /// * `Err(TrawlError::Cancelled)` - `cancel` fired between or during requests
    pub async fn run(
        &self,
        query: &Query,
        cancel: &CancellationToken,
    ) -> Result<CrawlOutcome, TrawlError> {
        tracing::info!("Starting crawl for query: {}", query);

        let start_time = Instant::now();
        let retry = RetryPolicy::new(self.crawler.max_attempts, self.crawler.error_delay());
        let page_limit = self.crawler.page_limit();

        let mut engine = CursorEngine::new(self.crawler.min_id_policy);
        let mut accumulator = Accumulator::new();
        let mut cursor: Option<Cursor> = None;
        let mut pages = 0u32;
        let mut skipped_items = 0usize;
        let mut retries = 0u32;

        let stop_reason = loop {
            if cancel.is_cancelled() {
                tracing::info!("Crawl cancelled after {} pages", pages);
                return Err(TrawlError::Cancelled);
            }

            let current = cursor.as_ref();
            let fetched = retry
                .run(cancel, move |attempt| self.fetch_page(query, current, attempt))
                .await?;
            retries += fetched.attempts - 1;
            let page = fetched.value;
            pages += 1;
            skipped_items += page.skipped;

            tracing::debug!(
                "Page {}: {} records, {} skipped, has_more_items={}",
                pages,
                page.records.len(),
                page.skipped,
                page.has_more_items
            );

            let advance = engine.advance(&page);
            accumulator.extend(page.records);

            let next = match advance {
                Advance::Stop(reason) => break reason,
                Advance::Continue(next) => next,
            };

            if page_limit.is_some_and(|limit| pages >= limit) {
                break StopReason::PageLimit;
            }

            if pages % 10 == 0 {
                tracing::info!(
                    "Progress: {} pages, {} records, {:.1}s elapsed",
                    pages,
                    accumulator.len(),
                    start_time.elapsed().as_secs_f64()
                );
            }

            self.throttle(cancel).await?;
            cursor = Some(next);
        };

        let report = CrawlReport {
            pages,
            records: accumulator.len(),
            skipped_items,
            retries,
            stop_reason,
            elapsed: start_time.elapsed(),
        };

        tracing::info!(
            "Crawl finished ({}): {} records from {} pages in {:?}",
            report.stop_reason,
            report.records,
            report.pages,
            report.elapsed
        );

        Ok(CrawlOutcome {
            records: accumulator,
            report,
        })
    }

    /// Fetches and parses one page
    async fn fetch_page(
        &self,
        query: &Query,
        cursor: Option<&Cursor>,
        attempt: u32,
    ) -> Result<Page, FetchError> {
        let params = build_params(
            &self.endpoint,
            query,
            cursor,
            chrono::Utc::now().timestamp(),
        );

        match cursor {
            Some(c) => tracing::debug!("Fetching page at {} (attempt {})", c, attempt),
            None => tracing::debug!("Fetching first page (attempt {})", attempt),
        }

        let body = self.transport.fetch(&self.endpoint.base_url, &params).await?;
        Ok(self.parser.parse(&body)?)
    }

    /// Sleeps a random duration bounded by `max-delay-ms`
    async fn throttle(&self, cancel: &CancellationToken) -> Result<(), TrawlError> {
        let max_ms = self.crawler.max_delay_ms;
        if max_ms == 0 {
            return Ok(());
        }

        let pause = Duration::from_millis(rand::rng().random_range(0..=max_ms));
        tracing::trace!("Throttling for {:?}", pause);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TrawlError::Cancelled),
            _ = tokio::time::sleep(pause) => Ok(()),
        }
    }
}

/// Runs a crawl against the configured endpoint with the default transport and parser
///
/// # Example
///
/// ```no_run
/// use tweet_trawl::{Config, DateRange, Query};
/// use tweet_trawl::crawler::run_crawl;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let range = DateRange::new("2014-12-01".parse()?, "2014-12-31".parse()?)?;
/// let query = Query::word("rust", range)?;
/// let outcome = run_crawl(&Config::default(), &query, &CancellationToken::new()).await?;
/// println!("{} tweets", outcome.report.records);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: &Config,
    query: &Query,
    cancel: &CancellationToken,
) -> Result<CrawlOutcome, TrawlError> {
    let coordinator = Coordinator::from_config(config)?;
    coordinator.run(query, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::cursor::MinIdPolicy;
    use crate::crawler::parser::DecodeError;
    use crate::model::test_support::page;
    use crate::query::DateRange;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// One scripted transport reply
    enum Reply {
        Page(Page),
        Undecodable,
        Fatal,
    }

    /// Transport that replays scripted responses and records the cursors it saw
    struct ScriptedTransport {
        replies: Mutex<VecDeque<Reply>>,
        cursors: Mutex<Vec<Option<String>>>,
        cancel_on_first: Mutex<Option<CancellationToken>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Reply>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                cursors: Mutex::new(Vec::new()),
                cancel_on_first: Mutex::new(None),
            }
        }

        /// Fires `token` while serving the first request
        fn cancelling(replies: Vec<Reply>, token: CancellationToken) -> Self {
            let transport = Self::new(replies);
            *transport.cancel_on_first.lock().unwrap() = Some(token);
            transport
        }

        fn cursors(&self) -> Vec<Option<String>> {
            self.cursors.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn fetch(
            &self,
            _base_url: &str,
            params: &[(String, String)],
        ) -> Result<String, FetchError> {
            let cursor = params
                .iter()
                .find(|(k, _)| k == "max_position")
                .map(|(_, v)| v.clone());
            self.cursors.lock().unwrap().push(cursor);
            if let Some(token) = self.cancel_on_first.lock().unwrap().take() {
                token.cancel();
            }

            match self.replies.lock().unwrap().pop_front() {
                Some(Reply::Page(page)) => Ok(encode(&page)),
                Some(Reply::Undecodable) => Ok("garbage".to_string()),
                Some(Reply::Fatal) | None => Err(FetchError::Status { status: 500 }),
            }
        }
    }

    /// Parser counterpart of `encode`, so tests can script whole pages
    struct ScriptParser;

    impl PageParser for ScriptParser {
        fn parse(&self, body: &str) -> Result<Page, DecodeError> {
            let (flag, ids) = body
                .split_once('|')
                .ok_or(DecodeError::Selector("scripted body"))?;
            let ids: Vec<&str> = ids.split(',').filter(|s| !s.is_empty()).collect();
            Ok(page(&ids, flag == "more"))
        }
    }

    fn encode(page: &Page) -> String {
        let ids: Vec<&str> = page.records.iter().map(|t| t.tweet_id.as_str()).collect();
        let flag = if page.has_more_items { "more" } else { "done" };
        format!("{}|{}", flag, ids.join(","))
    }

    fn test_config(policy: MinIdPolicy) -> Config {
        let mut config = Config::default();
        config.endpoint.base_url = "http://127.0.0.1:9/timeline".to_string();
        config.crawler.error_delay_ms = 1;
        config.crawler.max_attempts = 3;
        config.crawler.min_id_policy = policy;
        config
    }

    fn query(word: &str) -> Query {
        let range = DateRange::new(
            "2014-12-01".parse().unwrap(),
            "2014-12-31".parse().unwrap(),
        )
        .unwrap();
        Query::word(word, range).unwrap()
    }

    fn ids(records: &[Tweet]) -> Vec<&str> {
        records.iter().map(|t| t.tweet_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_stagnation_scenario() {
        let transport = ScriptedTransport::new(vec![
            Reply::Page(page(&["30", "20", "10"], true)),
            Reply::Page(page(&["9", "9"], true)),
        ]);
        let coordinator =
            Coordinator::new(transport, ScriptParser, &test_config(MinIdPolicy::Rolling));

        let outcome = coordinator
            .run(&query("foo"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.report.pages, 2);
        assert_eq!(outcome.report.stop_reason, StopReason::Stagnated);
        assert_eq!(ids(outcome.records.as_slice()), vec!["30", "20", "10", "9", "9"]);
        assert_eq!(
            coordinator.transport.cursors(),
            vec![None, Some("TWEET-10-30".to_string())]
        );

        let chronological = outcome.records.into_chronological();
        assert_eq!(chronological.len(), 5);
        assert_eq!(chronological[0].tweet_id.as_str(), "9");
        assert_eq!(chronological[4].tweet_id.as_str(), "30");
    }

    #[tokio::test]
    async fn test_empty_first_page() {
        let transport = ScriptedTransport::new(vec![Reply::Page(page(&[], true))]);
        let coordinator =
            Coordinator::new(transport, ScriptParser, &test_config(MinIdPolicy::Rolling));

        let outcome = coordinator
            .run(&query("bar"), &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.records.is_empty());
        assert_eq!(outcome.report.pages, 1);
        assert_eq!(outcome.report.stop_reason, StopReason::EndOfResults);
    }

    #[tokio::test]
    async fn test_walks_until_empty_page() {
        let transport = ScriptedTransport::new(vec![
            Reply::Page(page(&["60", "50"], true)),
            Reply::Page(page(&["40", "30"], true)),
            Reply::Page(page(&["20", "10"], true)),
            Reply::Page(page(&[], true)),
        ]);
        let coordinator =
            Coordinator::new(transport, ScriptParser, &test_config(MinIdPolicy::Rolling));

        let outcome = coordinator
            .run(&query("foo"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(ids(outcome.records.as_slice()), vec!["60", "50", "40", "30", "20", "10"]);
        assert_eq!(outcome.report.stop_reason, StopReason::EndOfResults);
        assert_eq!(
            coordinator.transport.cursors(),
            vec![
                None,
                Some("TWEET-50-60".to_string()),
                Some("TWEET-30-40".to_string()),
                Some("TWEET-10-20".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_fixed_policy_cursors() {
        let transport = ScriptedTransport::new(vec![
            Reply::Page(page(&["60", "50"], true)),
            Reply::Page(page(&["40", "30"], false)),
        ]);
        let coordinator =
            Coordinator::new(transport, ScriptParser, &test_config(MinIdPolicy::Fixed));

        let outcome = coordinator
            .run(&query("foo"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.report.stop_reason, StopReason::NoMoreItems);
        assert_eq!(outcome.records.len(), 4);
        assert_eq!(
            coordinator.transport.cursors(),
            vec![None, Some("TWEET-50-60".to_string())]
        );
    }

    #[tokio::test]
    async fn test_retry_recovers_below_limit() {
        let transport = ScriptedTransport::new(vec![
            Reply::Page(page(&["30", "20"], true)),
            Reply::Undecodable,
            Reply::Undecodable,
            Reply::Page(page(&["19", "10"], false)),
        ]);
        let coordinator =
            Coordinator::new(transport, ScriptParser, &test_config(MinIdPolicy::Rolling));

        let outcome = coordinator
            .run(&query("foo"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.report.retries, 2);
        assert_eq!(outcome.report.pages, 2);
        assert_eq!(outcome.records.len(), 4);

        // Retries repeat the identical cursor
        let cursors = coordinator.transport.cursors();
        assert_eq!(cursors.len(), 4);
        assert!(cursors[1..].iter().all(|c| c.as_deref() == Some("TWEET-20-30")));
    }

    #[tokio::test]
    async fn test_retry_exhaustion_fails_run() {
        let transport = ScriptedTransport::new(vec![
            Reply::Undecodable,
            Reply::Undecodable,
            Reply::Undecodable,
            Reply::Page(page(&["30", "20"], false)),
        ]);
        let coordinator =
            Coordinator::new(transport, ScriptParser, &test_config(MinIdPolicy::Rolling));

        let result = coordinator
            .run(&query("foo"), &CancellationToken::new())
            .await;

        match result {
            Err(TrawlError::Fetch { attempts, source }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(source, FetchError::Decode(_)));
            }
            other => panic!("expected fetch failure, got {:?}", other.map(|o| o.report)),
        }
    }

    #[tokio::test]
    async fn test_fatal_error_aborts_mid_run() {
        let transport = ScriptedTransport::new(vec![
            Reply::Page(page(&["30", "20"], true)),
            Reply::Fatal,
        ]);
        let coordinator =
            Coordinator::new(transport, ScriptParser, &test_config(MinIdPolicy::Rolling));

        let result = coordinator
            .run(&query("foo"), &CancellationToken::new())
            .await;

        assert!(matches!(
            result,
            Err(TrawlError::Fetch {
                attempts: 1,
                source: FetchError::Status { status: 500 }
            })
        ));
        assert_eq!(coordinator.transport.cursors().len(), 2);
    }

    #[tokio::test]
    async fn test_page_limit() {
        let transport = ScriptedTransport::new(vec![
            Reply::Page(page(&["60", "50"], true)),
            Reply::Page(page(&["40", "30"], true)),
            Reply::Page(page(&["20", "10"], true)),
        ]);
        let mut config = test_config(MinIdPolicy::Rolling);
        config.crawler.max_pages = 2;
        let coordinator = Coordinator::new(transport, ScriptParser, &config);

        let outcome = coordinator
            .run(&query("foo"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.report.stop_reason, StopReason::PageLimit);
        assert_eq!(outcome.report.pages, 2);
        assert_eq!(outcome.records.len(), 4);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let transport = ScriptedTransport::new(vec![Reply::Page(page(&["30", "20"], true))]);
        let coordinator =
            Coordinator::new(transport, ScriptParser, &test_config(MinIdPolicy::Rolling));

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = coordinator.run(&query("foo"), &cancel).await;
        assert!(matches!(result, Err(TrawlError::Cancelled)));
        assert!(coordinator.transport.cursors().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_fetch_stops_before_next_page() {
        let cancel = CancellationToken::new();
        let transport = ScriptedTransport::cancelling(
            vec![
                Reply::Page(page(&["30", "20"], true)),
                Reply::Page(page(&["19", "10"], true)),
                Reply::Page(page(&["9", "5"], false)),
            ],
            cancel.clone(),
        );
        let mut config = test_config(MinIdPolicy::Rolling);
        config.crawler.max_delay_ms = 600_000;
        let coordinator = Coordinator::new(transport, ScriptParser, &config);

        // The pause before page two can be up to ten minutes
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            coordinator.run(&query("foo"), &cancel),
        )
        .await
        .expect("run should return promptly after cancellation");

        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(coordinator.transport.cursors(), vec![None]);
    }

    #[tokio::test]
    async fn test_throttle_yields_to_cancellation() {
        let mut config = test_config(MinIdPolicy::Rolling);
        config.crawler.max_delay_ms = 600_000;
        let coordinator = Coordinator::new(ScriptedTransport::new(vec![]), ScriptParser, &config);

        let cancel = CancellationToken::new();
        cancel.cancel();

        for _ in 0..20 {
            let result = coordinator.throttle(&cancel).await;
            assert!(matches!(result, Err(TrawlError::Cancelled)));
        }
    }

    #[tokio::test]
    async fn test_throttle_disabled_with_zero_delay() {
        let mut config = test_config(MinIdPolicy::Rolling);
        config.crawler.max_delay_ms = 0;
        let coordinator = Coordinator::new(ScriptedTransport::new(vec![]), ScriptParser, &config);

        assert!(coordinator.throttle(&CancellationToken::new()).await.is_ok());
    }

    #[test]
    fn test_accumulator_order_round_trip() {
        let mut acc = Accumulator::new();
        acc.extend(page(&["30", "20"], true).records);
        acc.extend(page(&["10"], true).records);

        let fetch_order: Vec<String> = acc
            .as_slice()
            .iter()
            .map(|t| t.tweet_id.to_string())
            .collect();
        let mut chronological = acc.clone().into_chronological();
        assert_eq!(ids(&chronological), vec!["10", "20", "30"]);

        chronological.reverse();
        let restored: Vec<String> = chronological.iter().map(|t| t.tweet_id.to_string()).collect();
        assert_eq!(restored, fetch_order);
    }
}

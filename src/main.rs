//! Tweet-Trawl main entry point
//!
//! This is the command-line interface for the timeline search crawler.

use anyhow::Context;
use chrono::NaiveDate;
use clap::{ArgGroup, Parser};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tweet_trawl::config::{load_config_with_hash, validate, Config};
use tweet_trawl::crawler::{run_crawl, MinIdPolicy};
use tweet_trawl::output::{csv_path, print_report, write_csv};
use tweet_trawl::query::{DEFAULT_SINCE, DEFAULT_UNTIL};
use tweet_trawl::{DateRange, Query};

/// Tweet-Trawl: collect every tweet matching a search
///
/// Walks the search timeline backwards page by page and writes the results
/// to `<word>.csv` or `<user>.csv`, oldest tweet first.
#[derive(Parser, Debug)]
#[command(name = "tweet-trawl")]
#[command(version)]
#[command(about = "Collect every tweet matching a search", long_about = None)]
#[command(group(ArgGroup::new("subject").required(true).args(["word", "user"])))]
struct Cli {
    /// Search for tweets containing this text
    #[arg(long, value_name = "TEXT")]
    word: Option<String>,

    /// Search for tweets posted by this user
    #[arg(long, value_name = "HANDLE")]
    user: Option<String>,

    /// Earliest date to include (YYYY-MM-DD)
    #[arg(long, value_name = "DATE", default_value = DEFAULT_SINCE)]
    since: NaiveDate,

    /// Latest date to include (YYYY-MM-DD)
    #[arg(long, value_name = "DATE", default_value = DEFAULT_UNTIL)]
    until: NaiveDate,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Directory to write the CSV file into
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Upper bound of the random pause between pages, in milliseconds
    #[arg(long, value_name = "MS")]
    max_delay_ms: Option<u64>,

    /// Pause before retrying an undecodable response, in milliseconds
    #[arg(long, value_name = "MS")]
    error_delay_ms: Option<u64>,

    /// Total attempts per request when the response cannot be decoded
    #[arg(long, value_name = "N")]
    max_attempts: Option<u32>,

    /// Stop after this many pages (0 = unlimited)
    #[arg(long, value_name = "N")]
    max_pages: Option<u32>,

    /// How the cursor's leading id is tracked: rolling or fixed
    #[arg(long, value_name = "POLICY")]
    min_id_policy: Option<MinIdPolicy>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn query(&self) -> Result<Query, tweet_trawl::TrawlError> {
        let range = DateRange::new(self.since, self.until)?;
        match (&self.word, &self.user) {
            (Some(word), _) => Query::word(word, range),
            (None, Some(user)) => Query::user(user, range),
            (None, None) => Err(tweet_trawl::TrawlError::InvalidQuery(
                "either --word or --user is required".to_string(),
            )),
        }
    }

    /// Applies command-line overrides on top of the file configuration
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(dir) = &self.output_dir {
            config.output.directory = dir.display().to_string();
        }
        if let Some(ms) = self.max_delay_ms {
            config.crawler.max_delay_ms = ms;
        }
        if let Some(ms) = self.error_delay_ms {
            config.crawler.error_delay_ms = ms;
        }
        if let Some(n) = self.max_attempts {
            config.crawler.max_attempts = n;
        }
        if let Some(n) = self.max_pages {
            config.crawler.max_pages = n;
        }
        if let Some(policy) = self.min_id_policy {
            config.crawler.min_id_policy = policy;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (cfg, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        None => Config::default(),
    };
    cli.apply_overrides(&mut config);
    validate(&config).context("invalid configuration")?;

    let query = cli.query()?;
    let output_path = csv_path(Path::new(&config.output.directory), query.output_stem());

    tracing::info!(
        "Query: {} (policy: {}, max delay: {}ms, attempts: {})",
        query,
        config.crawler.min_id_policy,
        config.crawler.max_delay_ms,
        config.crawler.max_attempts
    );

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let outcome = match run_crawl(&config, &query, &cancel).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(anyhow::Error::new(e).context("no output written"));
        }
    };

    let report = outcome.report;
    let records = outcome.records.into_chronological();
    write_csv(&records, &output_path)
        .with_context(|| format!("failed to write {}", output_path.display()))?;

    if !cli.quiet {
        print_report(&report, &output_path);
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("tweet_trawl=info,warn"),
            1 => EnvFilter::new("tweet_trawl=debug,info"),
            2 => EnvFilter::new("tweet_trawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Cancels the crawl on Ctrl-C
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping crawl");
            cancel.cancel();
        }
    });
}

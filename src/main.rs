//! candleview - stock OHLCV dashboard over a cache-synced object store
//!
//! Fetches a columnar OHLCV dataset from a remote object store, keeps a
//! local on-disk cache in sync with the remote copy, and serves filtered
//! per-symbol time-series views.

mod cache;
mod config;
mod dashboard;
mod data;
mod store;

use std::env;
use std::io::{self, BufRead, Write};

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use cache::{FetchSource, SyncedFetcher};
use config::Config;
use dashboard::Dashboard;
use data::Bar;
use store::{HttpStoreClient, ObjectStore};

/// CLI command
#[derive(Debug)]
enum Command {
    /// Interactive dashboard (default)
    Dash,
    /// Bring the local cache in sync with the store
    Sync { force: bool },
    /// List tickers present in the dataset
    Symbols,
    /// Print the OHLCV view for one ticker
    Show {
        ticker: String,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        force: bool,
    },
    /// Show cache entry state
    Status,
    /// Show help
    Help,
}

fn print_help() {
    eprintln!(
        r#"candleview - Stock OHLCV dashboard over a cache-synced object store

USAGE:
    candleview                                        # Interactive dashboard (default)
    candleview sync [--force]
    candleview symbols
    candleview show <TICKER> [START] [END] [--force]
    candleview status
    candleview help

COMMANDS:
    (none)   Interactive dashboard: list symbols, view series, refresh
    sync     Download the dataset if the remote copy changed
    symbols  List tickers present in the dataset
    show     Print the OHLCV view for one ticker (dates as YYYY-MM-DD)
    status   Show the cached entry and whether the remote copy differs
    help     Show this help message

EXAMPLES:
    candleview sync --force
    candleview show FPT 2025-01-01 2025-06-30

ENVIRONMENT:
    STORE_ENDPOINT   Object store endpoint, e.g. https://s3.example.com (required)
    STORE_BUCKET     Bucket holding the dataset (required)
    STORE_FILE_KEY   Object key of the dataset file (required)
    STORE_KEY_ID     Access key ID (optional, together with STORE_KEY)
    STORE_KEY        Access key secret (optional, together with STORE_KEY_ID)
    CACHE_DIR        Cache directory (default: platform cache dir)
    RUST_LOG         Log level (trace, debug, info, warn, error)
"#
    );
}

fn parse_args() -> Result<Command> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        return Ok(Command::Dash);
    }

    let force = args.iter().any(|a| a == "--force");
    let positional: Vec<&String> = args[2..].iter().filter(|a| !a.starts_with("--")).collect();

    match args[1].as_str() {
        "sync" => Ok(Command::Sync { force }),
        "symbols" => Ok(Command::Symbols),
        "show" => {
            let ticker = positional.first().ok_or_else(|| {
                anyhow!("Usage: candleview show <TICKER> [START] [END] [--force]")
            })?;
            let start = positional.get(1).map(|s| parse_date(s)).transpose()?;
            let end = positional.get(2).map(|s| parse_date(s)).transpose()?;
            Ok(Command::Show {
                ticker: ticker.to_uppercase(),
                start,
                end,
                force,
            })
        }
        "status" => Ok(Command::Status),
        "help" | "--help" | "-h" => Ok(Command::Help),
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            Ok(Command::Help)
        }
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| anyhow!("Invalid date '{}': expected YYYY-MM-DD", raw))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let log_level = env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Parse command
    let command = match parse_args() {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    if let Command::Help = command {
        print_help();
        return Ok(());
    }

    let config = Config::from_env()?;
    let client = HttpStoreClient::new(&config.endpoint, config.credentials.as_ref())?;

    match command {
        Command::Dash => run_dash(client, &config).await,
        Command::Sync { force } => run_sync(client, &config, force).await,
        Command::Symbols => run_symbols(client, &config).await,
        Command::Show {
            ticker,
            start,
            end,
            force,
        } => run_show(client, &config, &ticker, start, end, force).await,
        Command::Status => run_status(client, &config).await,
        Command::Help => unreachable!(),
    }
}

/// `sync`: bring the cache current and validate the dataset decodes
async fn run_sync(client: HttpStoreClient, config: &Config, force: bool) -> Result<()> {
    let fetcher = SyncedFetcher::new(client, &config.cache_dir)?;
    let fetched = fetcher.fetch(&config.bucket, &config.key, force).await?;

    match fetched.source {
        FetchSource::Downloaded => println!(
            "Downloaded {}/{} ({} bytes) -> {}",
            config.bucket,
            config.key,
            fetched.bytes.len(),
            fetched.path.display()
        ),
        FetchSource::CacheHit => println!("Cache up to date: {}", fetched.path.display()),
        FetchSource::StaleFallback => {
            println!("WARNING: store unreachable; keeping existing local copy")
        }
    }

    let bars = data::decode(&fetched.bytes)?;
    println!(
        "{} bars across {} symbols",
        bars.len(),
        data::series::tickers(&bars).len()
    );
    Ok(())
}

/// `symbols`: list tickers with their bar counts
async fn run_symbols(client: HttpStoreClient, config: &Config) -> Result<()> {
    let fetcher = SyncedFetcher::new(client, &config.cache_dir)?;
    let dashboard = Dashboard::load(fetcher, &config.bucket, &config.key, false).await?;

    if dashboard.served_stale() {
        println!("WARNING: store unreachable; listing may be out of date");
    }

    let tickers = dashboard.tickers();
    for ticker in &tickers {
        println!("  {} ({} bars)", ticker, dashboard.series(ticker).len());
    }
    println!("{} symbols", tickers.len());
    Ok(())
}

/// `show`: print the OHLCV view for one ticker
async fn run_show(
    client: HttpStoreClient,
    config: &Config,
    ticker: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    force: bool,
) -> Result<()> {
    let fetcher = SyncedFetcher::new(client, &config.cache_dir)?;
    let dashboard = Dashboard::load(fetcher, &config.bucket, &config.key, force).await?;

    if dashboard.served_stale() {
        println!("WARNING: store unreachable; data may be out of date");
    }

    if !dashboard.tickers().iter().any(|t| t == ticker) {
        return Err(anyhow!("Ticker '{}' not present in dataset", ticker));
    }

    let view = dashboard.view(ticker, start, end);
    if view.is_empty() {
        println!("No data for {} in the selected range", ticker);
    } else {
        print_view(&view);
    }
    Ok(())
}

/// `status`: report the cache entry and whether the remote copy differs
async fn run_status(client: HttpStoreClient, config: &Config) -> Result<()> {
    let fetcher = SyncedFetcher::new(client.clone(), &config.cache_dir)?;
    let path = fetcher.entry_path(&config.bucket, &config.key);

    println!("Entry:  {}/{}", config.bucket, config.key);
    println!("Local:  {}", path.display());

    let meta = fetcher.stored_meta(&config.bucket, &config.key);
    match (path.exists(), meta) {
        (true, Some(local)) => {
            println!(
                "Cached: yes ({} bytes, hash {})",
                local.size, local.content_hash
            );
            match client.head(&config.bucket, &config.key).await {
                Ok(remote) => {
                    if cache::staleness::is_stale(&remote, Some(&local)) {
                        println!(
                            "Remote: changed ({} bytes, hash {}); run `candleview sync`",
                            remote.size, remote.content_hash
                        );
                    } else {
                        println!("Remote: unchanged");
                    }
                }
                Err(e) if e.is_not_found() => println!("Remote: object no longer exists"),
                Err(e) => println!("Remote: unreachable ({})", e),
            }
        }
        (true, None) => {
            println!("Cached: body present but metadata missing; next fetch re-syncs")
        }
        (false, _) => println!("Cached: no; run `candleview sync`"),
    }
    Ok(())
}

/// Interactive dashboard loop (default mode)
async fn run_dash(client: HttpStoreClient, config: &Config) -> Result<()> {
    info!("Starting interactive dashboard");

    let fetcher = SyncedFetcher::new(client, &config.cache_dir)?;
    let mut dashboard = Dashboard::load(fetcher, &config.bucket, &config.key, false).await?;

    if dashboard.served_stale() {
        println!("WARNING: store unreachable; dataset may be out of date");
    }
    println!(
        "Loaded {} bars across {} symbols.",
        dashboard.bar_count(),
        dashboard.tickers().len()
    );
    print_dash_help();

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let parts: Vec<&str> = line.split_whitespace().collect();

        match parts.as_slice() {
            [] => continue,
            ["quit"] | ["exit"] | ["q"] => break,
            ["symbols"] => {
                for ticker in dashboard.tickers() {
                    println!("  {} ({} bars)", ticker, dashboard.series(&ticker).len());
                }
            }
            ["show", ticker, rest @ ..] => {
                let ticker = ticker.to_uppercase();
                if !dashboard.tickers().iter().any(|t| *t == ticker) {
                    println!("Unknown ticker: {}", ticker);
                    continue;
                }
                let start = match rest.first().map(|s| parse_date(s)).transpose() {
                    Ok(date) => date,
                    Err(e) => {
                        println!("{}", e);
                        continue;
                    }
                };
                let end = match rest.get(1).map(|s| parse_date(s)).transpose() {
                    Ok(date) => date,
                    Err(e) => {
                        println!("{}", e);
                        continue;
                    }
                };
                let view = dashboard.view(&ticker, start, end);
                if view.is_empty() {
                    println!("No data for {} in the selected range", ticker);
                } else {
                    print_view(&view);
                }
            }
            ["refresh", rest @ ..] => {
                let force = rest.contains(&"--force");
                match dashboard.refresh(force).await {
                    Ok(FetchSource::Downloaded) => {
                        println!("Dataset updated: {} bars", dashboard.bar_count())
                    }
                    Ok(FetchSource::CacheHit) => println!("Local copy already current"),
                    Ok(FetchSource::StaleFallback) => {
                        println!("Store unreachable; keeping local copy")
                    }
                    Err(e) => println!("Refresh failed: {:#}", e),
                }
            }
            _ => print_dash_help(),
        }
    }

    dashboard.log_metrics();
    Ok(())
}

fn print_dash_help() {
    println!("Commands: symbols | show <TICKER> [START] [END] | refresh [--force] | quit");
}

/// Print bars as a fixed-width table
fn print_view(bars: &[Bar]) {
    println!(
        "{:<12} {:>10} {:>10} {:>10} {:>10} {:>12}",
        "Date", "Open", "High", "Low", "Close", "Volume"
    );
    for bar in bars {
        println!(
            "{:<12} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>12}",
            bar.date.to_string(),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume
        );
    }
    println!("{} bars", bars.len());
}

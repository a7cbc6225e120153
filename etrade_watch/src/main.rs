//! Watch client: tracks a set of symbols through the market-data pool and logs the
//! price table at a fixed rate until Ctrl+C.
//!
//! Usage example (CLI):
//! ```bash
//! export ETRADE_CLIENT_KEY=... ETRADE_CLIENT_SECRET=...
//! export ETRADE_RESOURCE_OWNER_KEY=... ETRADE_RESOURCE_OWNER_SECRET=...
//! etrade_watch --sandbox --symbols AAPL,MSFT --path ./watchlist.txt
//! ```
//!
//! Credentials come from flags or the `ETRADE_*` environment variables.
#![warn(missing_docs)]
mod args;

use crate::args::Args;
use clap::Parser;
use etrade_common::symbols::{SymbolParser, parse_symbol_list};
use etrade_common::{MarketError, Result, Symbol};
use etrade_market::retry::DEFAULT_STATUS_FORCELIST;
use etrade_market::{Credentials, MarketData, RetryPolicy};
use log::{info, warn};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::{Duration, Instant};

fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            info!("Ctrl+C received. Shutting down...");
            shutdown.store(true, Ordering::SeqCst);
        })
        .map_err(|e| MarketError::Configuration(format!("Error setting Ctrl+C handler: {}", e)))?;
    }

    let symbols = collect_symbols(&args)?;
    info!("Symbols: {}", symbols.iter().map(Symbol::as_str).collect::<Vec<_>>().join(","));

    let market = MarketData::builder()
        .credentials(credentials(&args)?)
        .retry_policy(RetryPolicy::new(args.retries, args.backoff, DEFAULT_STATUS_FORCELIST)?)
        .sandbox(args.sandbox)
        .poll_interval(Duration::from_millis(args.interval_ms))
        .request_timeout(Duration::from_secs(args.timeout_secs))
        .build()?;
    info!("Polling {}", market.config().base_url);

    market.add_symbols(symbols.iter().map(Symbol::as_str))?;
    report_loop(&market, Duration::from_millis(args.report_ms), &shutdown)?;

    market.shutdown()?;
    info!("All pollers stopped");
    Ok(())
}

/// Logs the price table every `every` until `shutdown` is set.
fn report_loop(market: &MarketData, every: Duration, shutdown: &AtomicBool) -> Result<()> {
    let mut next_report = Instant::now() + every;
    while !shutdown.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(100));
        if Instant::now() < next_report {
            continue;
        }
        next_report += every;

        let prices = market.prices()?;
        let mut quotes: Vec<_> = prices.values().collect();
        quotes.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        for quote in quotes {
            match (quote.price, quote.updated_at) {
                (Some(price), Some(at)) => info!(
                    "QUOTE: {} Price={:.2} Updated={}",
                    quote.symbol,
                    price,
                    at.format("%H:%M:%S%.3f")
                ),
                _ => info!("QUOTE: {} Price=n/a", quote.symbol),
            }
        }
    }
    Ok(())
}

/// Credentials from flags or their `ETRADE_*` variables; an access token
/// without its secret (or the reverse) is rejected.
fn credentials(args: &Args) -> Result<Credentials> {
    let mut credentials = Credentials::new(&args.client_key, &args.client_secret);
    match (&args.resource_owner_key, &args.resource_owner_secret) {
        (Some(key), Some(secret)) => credentials = credentials.with_resource_owner(key, secret),
        (None, None) => {}
        _ => {
            return Err(MarketError::Configuration(
                "--resource-owner-key and --resource-owner-secret must be given together".to_string(),
            ));
        }
    }
    if let Some(uri) = &args.callback_uri {
        credentials = credentials.with_callback_uri(uri);
    }
    credentials.validate()?;
    Ok(credentials)
}

/// Symbols from `--symbols` followed by those from `--path`, first occurrence kept.
fn collect_symbols(args: &Args) -> Result<Vec<Symbol>> {
    let mut symbols = Vec::new();
    for raw in &args.symbols {
        symbols.extend(parse_symbol_list(raw)?);
    }

    if let Some(path) = &args.path {
        let file_path = normalize_path(path);
        if !is_file_exist(&file_path) {
            return Err(MarketError::Validation(format!("{} is not a file", file_path.display())));
        }
        let file = File::open(&file_path)?;
        symbols.extend(Symbol::parse_from_file(BufReader::new(file))?);
    }

    let mut unique: Vec<Symbol> = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        if unique.contains(&symbol) {
            warn!("{} listed more than once", symbol);
        } else {
            unique.push(symbol);
        }
    }
    if unique.is_empty() {
        return Err(MarketError::Validation(
            "no symbols given; use --symbols or --path".to_string(),
        ));
    }
    Ok(unique)
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

/// Normalize a CLI-provided path string by trimming whitespace and matching quotes.
///
/// This allows passing Windows paths in quotes without breaking parsing.
fn normalize_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    let no_quotes = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    PathBuf::from(no_quotes)
}

/// Returns `true` if the provided path exists and is a regular file.
fn is_file_exist(path: &PathBuf) -> bool {
    path.exists() && path.is_file()
}

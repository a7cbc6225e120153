//! API endpoints and request defaults shared by the library and the client.
use std::time::Duration;

/// Production market API root.
pub const LIVE_MARKET_URL: &str = "https://api.etrade.com/v1/market";
/// Sandbox market API root.
pub const SANDBOX_MARKET_URL: &str = "https://apisb.etrade.com/v1/market";

/// Maximum number of symbols a single quote request (and poller) may carry.
pub const MAX_SYMBOLS_PER_REQUEST: usize = 25;

/// Per-request timeout used when the caller does not pick one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause between two poll cycles of the same poller.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Market API root for the selected environment.
pub fn market_url(sandbox: bool) -> &'static str {
    if sandbox {
        SANDBOX_MARKET_URL
    } else {
        LIVE_MARKET_URL
    }
}

/// Build the quote endpoint for a comma-joined list of symbols.
pub fn quote_url(base: &str, joined_symbols: &str) -> String {
    format!("{}/quote/{}.json", base.trim_end_matches('/'), joined_symbols)
}

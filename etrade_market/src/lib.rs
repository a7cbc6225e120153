//! Live market data for the E*TRADE v1 REST API.
//!
//! Register symbols with [`MarketData::add_symbols`]; the pool spreads them over
//! background pollers (25 symbols each), every poller keeps re-fetching its batch
//! through an OAuth1-signed [`SecureTransport`], and [`MarketData::prices`] hands
//! out snapshots of the shared price table.
//!
//! Modules, leaves first:
//! - `oauth`: credential set and HMAC-SHA1 request signing.
//! - `retry`: immutable retry/backoff policy.
//! - `transport`: the `Transport` seam and its blocking HTTP implementation.
//! - `quote_fetcher`: one quote request for a batch of symbols.
//! - `model`: quote record, quote payload and the price table.
//! - `poller`: background worker for one batch.
//! - `pool`: the pool manager.
//! - `config`: builder and resolved settings.
pub mod config;
pub mod model;
pub mod oauth;
pub mod poller;
pub mod pool;
pub mod quote_fetcher;
pub mod retry;
pub mod transport;

pub use config::{MarketConfig, MarketDataBuilder};
pub use model::quote::Quote;
pub use oauth::Credentials;
pub use pool::MarketData;
pub use retry::RetryPolicy;
pub use transport::{HttpResponse, Method, SecureTransport, Transport};

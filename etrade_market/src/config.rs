//! Construction-time settings for [`MarketData`](crate::pool::MarketData).
//!
//! A pool needs a transport. It is either handed in ready-made (tests, custom
//! stacks) or built from a credential set and a retry policy; with neither the
//! builder fails with `Configuration`.
use std::sync::Arc;
use std::time::Duration;

use etrade_common::net::{DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT, market_url};
use etrade_common::{MarketError, Result};

use crate::oauth::Credentials;
use crate::pool::MarketData;
use crate::retry::RetryPolicy;
use crate::transport::{SecureTransport, Transport};

/// Resolved settings shared by every poller of a pool.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketConfig {
    /// Market API root, e.g. `https://api.etrade.com/v1/market`.
    pub base_url: String,
    /// Pause between two cycles of the same poller.
    pub poll_interval: Duration,
    /// Timeout applied to every HTTP call.
    pub request_timeout: Duration,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_url: market_url(false).to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Builder for [`MarketData`].
///
/// ```ignore
/// let market = MarketData::builder()
///     .credentials(Credentials::from_env()?)
///     .sandbox(true)
///     .poll_interval(Duration::from_millis(500))
///     .build()?;
/// market.add_symbols(["AAPL", "MSFT"])?;
/// ```
#[derive(Default)]
pub struct MarketDataBuilder {
    transport: Option<Arc<dyn Transport>>,
    credentials: Option<Credentials>,
    retry: RetryPolicy,
    sandbox: bool,
    base_url: Option<String>,
    poll_interval: Option<Duration>,
    request_timeout: Option<Duration>,
}

impl MarketDataBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a ready-made transport. Takes precedence over `credentials`.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build a [`SecureTransport`] from these credentials.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Retry policy for the transport built from `credentials`.
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Target the sandbox environment.
    pub fn sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }

    /// Override the market API root (wins over `sandbox`).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Resolved settings, without building anything.
    pub fn config(&self) -> MarketConfig {
        let defaults = MarketConfig::default();
        MarketConfig {
            base_url: self
                .base_url
                .clone()
                .unwrap_or_else(|| market_url(self.sandbox).to_string()),
            poll_interval: self.poll_interval.unwrap_or(defaults.poll_interval),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
        }
    }

    pub fn build(self) -> Result<MarketData> {
        let config = self.config();
        if config.request_timeout.is_zero() {
            return Err(MarketError::Configuration("request timeout must be positive".to_string()));
        }
        let transport: Arc<dyn Transport> = match (self.transport, self.credentials) {
            (Some(transport), _) => transport,
            (None, Some(credentials)) => Arc::new(SecureTransport::new(credentials, self.retry)?),
            (None, None) => {
                return Err(MarketError::Configuration(
                    "either a transport or a credential set is required".to_string(),
                ));
            }
        };
        Ok(MarketData::new(transport, config))
    }
}

//! Retry policy applied by the transport.
//!
//! A policy is built once and never mutated. `retries` is the number of
//! re-attempts after the first try; connect failures, read failures and
//! retryable statuses all draw from that single budget. A `Retry-After` header on
//! a 413, 429 or 503 response replaces the computed backoff for that retry.
use std::time::Duration;

use chrono::{DateTime, Utc};
use etrade_common::{MarketError, Result};

/// Default number of retries.
pub const DEFAULT_RETRIES: u32 = 3;
/// Default backoff factor, in seconds.
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;
/// Statuses retried by default.
pub const DEFAULT_STATUS_FORCELIST: [u16; 4] = [500, 502, 503, 504];

/// Statuses whose `Retry-After` header is honoured.
pub const RETRY_AFTER_STATUSES: [u16; 3] = [413, 429, 503];

/// Retry count, backoff factor and retryable status codes.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    retries: u32,
    backoff_factor: f64,
    status_forcelist: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            status_forcelist: DEFAULT_STATUS_FORCELIST.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// Fails with `Configuration` if the backoff factor is negative or not finite.
    pub fn new(
        retries: u32,
        backoff_factor: f64,
        status_forcelist: impl IntoIterator<Item = u16>,
    ) -> Result<Self> {
        if !backoff_factor.is_finite() || backoff_factor < 0.0 {
            return Err(MarketError::Configuration(format!(
                "backoff factor must be a non-negative number, got {}",
                backoff_factor
            )));
        }
        let mut status_forcelist: Vec<u16> = status_forcelist.into_iter().collect();
        status_forcelist.sort_unstable();
        status_forcelist.dedup();
        Ok(Self {
            retries,
            backoff_factor,
            status_forcelist,
        })
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            retries: 0,
            ..Self::default()
        }
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    pub fn status_forcelist(&self) -> &[u16] {
        &self.status_forcelist
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.status_forcelist.contains(&status)
    }

    /// Sleep before the `retry`-th re-attempt (1-based):
    /// `backoff_factor * 2^(retry - 1)` seconds.
    pub fn backoff(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        let secs = self.backoff_factor * 2f64.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

/// Delay asked for by a `Retry-After` header on a `status` response, if any.
pub fn retry_after(status: u16, header: Option<&str>) -> Option<Duration> {
    if !RETRY_AFTER_STATUSES.contains(&status) {
        return None;
    }
    parse_retry_after(header?, Utc::now())
}

/// `Retry-After` is either delta-seconds or an HTTP date; a date in the past
/// means no wait.
fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?;
    Some((at.with_timezone(&Utc) - now).to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.retries(), 3);
        assert_eq!(policy.backoff_factor(), 2.0);
        assert_eq!(policy.status_forcelist(), &[500, 502, 503, 504]);
    }

    #[test]
    fn backoff_doubles_per_retry() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::ZERO);
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));

        let fast = RetryPolicy::new(3, 0.05, [503]).unwrap();
        assert_eq!(fast.backoff(2), Duration::from_millis(100));
    }

    #[test]
    fn forcelist_is_normalised() {
        let policy = RetryPolicy::new(1, 0.0, [503, 500, 503]).unwrap();
        assert_eq!(policy.status_forcelist(), &[500, 503]);
        assert!(policy.is_retryable_status(503));
        assert!(!policy.is_retryable_status(404));
    }

    #[test]
    fn rejects_bad_backoff_factor() {
        assert!(matches!(RetryPolicy::new(3, -1.0, vec![503]), Err(MarketError::Configuration(_))));
        assert!(matches!(RetryPolicy::new(3, f64::NAN, vec![503]), Err(MarketError::Configuration(_))));
    }

    #[test]
    fn retry_after_accepts_seconds_and_dates() {
        let now = DateTime::parse_from_rfc2822("Wed, 21 Oct 2015 07:28:00 GMT")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(parse_retry_after(" 7 ", now), Some(Duration::from_secs(7)));
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:30 GMT", now),
            Some(Duration::from_secs(30))
        );
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:00:00 GMT", now), Some(Duration::ZERO));
        assert_eq!(parse_retry_after("soon", now), None);
    }

    #[test]
    fn retry_after_only_applies_to_throttling_statuses() {
        assert_eq!(retry_after(503, Some("2")), Some(Duration::from_secs(2)));
        assert_eq!(retry_after(429, Some("1")), Some(Duration::from_secs(1)));
        assert_eq!(retry_after(500, Some("2")), None);
        assert_eq!(retry_after(503, None), None);
    }
}

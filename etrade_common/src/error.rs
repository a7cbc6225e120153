//! Error types shared between the market-data library and the watch client.
//!
//! The `MarketError` enum covers caller mistakes (validation, duplicate or
//! unknown symbols, full pollers), configuration problems, and failures of the
//! HTTP transport or of the quote payload, so every crate can propagate a
//! single error type.
use std::io;
use std::sync::PoisonError;

use thiserror::Error;

/// Unified error type shared by the library and the client.
#[derive(Error, Debug)]
pub enum MarketError {
    /// Missing or invalid credentials/settings detected at construction time.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Empty or malformed caller input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The symbol is already tracked (or repeated in the same request).
    #[error("Symbol is already tracked: {0}")]
    DuplicateSymbol(String),

    /// The symbol is not tracked by the pool.
    #[error("Symbol is not tracked: {0}")]
    NotTracked(String),

    /// The symbol is not part of the poller it was removed from.
    #[error("Symbol not found in poller batch: {0}")]
    NotFound(String),

    /// The poller already holds its maximum number of symbols.
    #[error("Poller is full: capacity of {0} symbols reached")]
    Capacity(usize),

    /// Network failure, or retries exhausted on a retryable status.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with a status the caller cannot use.
    #[error("HTTP status {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Response body, as received.
        body: String,
    },

    /// The server answered successfully but the quote payload is malformed.
    #[error("Quote parse error: {0}")]
    QuoteParse(String),

    /// I/O error originating from the standard library or files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// Crossbeam/channel receive failed (e.g., sender dropped); contains a short context string.
    #[error("Channel receive failed: {0}")]
    ChannelRecv(String),

    /// A background worker thread panicked before it could be joined.
    #[error("Worker thread panicked: {0}")]
    WorkerPanicked(String),

    /// Error indicating a poisoned mutex/lock was encountered.
    #[error("Mutex Lock Poisoned: {0}")]
    MutexLock(String),
}

impl MarketError {
    /// Whether a poll cycle that failed with this error should simply be retried
    /// on the next cycle.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MarketError::Transport(_) | MarketError::HttpStatus { .. } | MarketError::QuoteParse(_)
        )
    }
}

impl<T> From<PoisonError<T>> for MarketError {
    fn from(err: PoisonError<T>) -> Self {
        MarketError::MutexLock(err.to_string())
    }
}

impl From<reqwest::Error> for MarketError {
    fn from(err: reqwest::Error) -> Self {
        MarketError::Transport(err.to_string())
    }
}

//! Quote record and quote-endpoint payload.
//!
//! A `Quote` is what callers read from the price table: the symbol, the last trade
//! price (unknown until the first successful poll) and the UTC time it was
//! written. The `QuoteEnvelope` family mirrors the JSON returned by
//! `GET /v1/market/quote/{symbols}.json`, keeping only the fields we use.

use chrono::{DateTime, Utc};
use etrade_common::Symbol;
use serde::{Deserialize, Serialize};

/// Price table entry for a single symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Normalised ticker symbol.
    pub symbol: Symbol,
    /// Last trade price, `None` until a poll has reported one.
    pub price: Option<f64>,
    /// When `price` was last written by a poller.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Quote {
    /// Entry for a symbol that has just been registered and not polled yet.
    pub fn placeholder(symbol: Symbol) -> Self {
        Quote {
            symbol,
            price: None,
            updated_at: None,
        }
    }

    /// Entry carrying a freshly fetched price.
    pub fn priced(symbol: Symbol, price: Option<f64>) -> Self {
        Quote {
            symbol,
            price,
            updated_at: Some(Utc::now()),
        }
    }
}

/// Top-level quote response.
#[derive(Debug, Deserialize)]
pub(crate) struct QuoteEnvelope {
    #[serde(rename = "QuoteResponse")]
    pub quote_response: QuoteResponse,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuoteResponse {
    #[serde(rename = "QuoteData")]
    pub quote_data: OneOrMany<QuoteData>,
}

/// A single quote may be serialised as a bare object instead of a one-element array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuoteData {
    pub symbol: Option<String>,
    #[serde(rename = "Product")]
    pub product: Option<Product>,
    #[serde(rename = "All")]
    pub all: Option<AllQuoteDetails>,
}

impl QuoteData {
    pub fn symbol(&self) -> Option<&str> {
        self.symbol
            .as_deref()
            .or_else(|| self.product.as_ref().map(|p| p.symbol.as_str()))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Product {
    pub symbol: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AllQuoteDetails {
    #[serde(rename = "lastTrade")]
    pub last_trade: Option<f64>,
}

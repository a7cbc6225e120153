//! One quote request for a batch of symbols.
//!
//! `fetch_quotes` issues `GET {base}/quote/{SYM1,SYM2,...}.json` through a
//! [`Transport`] and turns the payload into a symbol → last-trade map. It adds no
//! retries of its own; those belong to the transport, and a poller simply tries
//! again on its next cycle.
use std::collections::HashMap;
use std::time::Duration;

use etrade_common::net::{MAX_SYMBOLS_PER_REQUEST, quote_url};
use etrade_common::symbols::join_symbols;
use etrade_common::{MarketError, Result, Symbol};
use log::{debug, warn};

use crate::model::quote::QuoteEnvelope;
use crate::transport::Transport;

/// Last trade price per symbol, as reported by one quote response.
pub type QuoteMap = HashMap<Symbol, Option<f64>>;

/// Fetch last-trade prices for `symbols` (1..=25 of them).
///
/// Fails with `Validation` for an empty or oversized batch, `HttpStatus` when
/// the server answers with a non-2xx status, `QuoteParse` when the body lacks
/// the quote structure, and passes transport errors through unchanged.
pub fn fetch_quotes(base_url: &str, transport: &dyn Transport, symbols: &[Symbol], timeout: Duration) -> Result<QuoteMap> {
    if symbols.is_empty() {
        return Err(MarketError::Validation("quote batch is empty".to_string()));
    }
    if symbols.len() > MAX_SYMBOLS_PER_REQUEST {
        return Err(MarketError::Validation(format!(
            "quote batch holds {} symbols, at most {} allowed",
            symbols.len(),
            MAX_SYMBOLS_PER_REQUEST
        )));
    }

    let url = quote_url(base_url, &join_symbols(symbols));
    let response = transport.get(&url, &[], timeout)?;
    if !response.is_success() {
        return Err(MarketError::HttpStatus {
            status: response.status,
            body: response.body,
        });
    }

    let quotes = parse_quotes(&response.body)?;
    debug!("Fetched {} of {} quotes from {}", quotes.len(), symbols.len(), url);
    Ok(quotes)
}

/// Parse a quote response body into a symbol → last-trade map.
///
/// Entries whose symbol is missing or invalid, or that lack the `All` detail
/// block, are skipped with a warning; a body without `QuoteResponse.QuoteData` is a `QuoteParse` error.
pub fn parse_quotes(body: &str) -> Result<QuoteMap> {
    let envelope: QuoteEnvelope =
        serde_json::from_str(body).map_err(|e| MarketError::QuoteParse(e.to_string()))?;

    let mut quotes = QuoteMap::new();
    for data in envelope.quote_response.quote_data.into_vec() {
        let Some(raw) = data.symbol() else {
            warn!("Quote entry without a symbol skipped");
            continue;
        };
        let symbol = match Symbol::parse(raw) {
            Ok(symbol) => symbol,
            Err(e) => {
                warn!("Quote entry skipped: {}", e);
                continue;
            }
        };
        match &data.all {
            Some(all) => {
                quotes.insert(symbol, all.last_trade);
            }
            None => warn!("Quote entry for {} has no detail block; skipped", symbol),
        }
    }
    Ok(quotes)
}

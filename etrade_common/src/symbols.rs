//! Ticker symbols and helpers shared between the library and the client.
//!
//! Symbols are case-normalised to upper case so that `aapl` and `AAPL` address
//! the same price table entry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::BufRead;
use std::str::FromStr;

use crate::error::MarketError;

/// A validated, upper-cased ticker symbol.
#[derive(Debug, Clone, Serialize, Deserialize, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Normalises and validates a raw symbol.
    ///
    /// Surrounding whitespace is trimmed and the result upper-cased. Only ASCII
    /// letters, digits, `.`, `-` and `:` are accepted, since the symbol ends up in
    /// a URL path segment joined by commas. `:` separates the fields of an option
    /// symbol such as `GOOG:2024:01:19:CALL:150`.
    pub fn parse(raw: &str) -> Result<Self, MarketError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(MarketError::Validation("symbol must not be empty".to_string()));
        }
        if let Some(bad) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(*c, '.' | '-' | ':')))
        {
            return Err(MarketError::Validation(format!(
                "symbol {:?} contains invalid character {:?}",
                trimmed, bad
            )));
        }
        Ok(Symbol(trimmed.to_ascii_uppercase()))
    }

    /// The normalised symbol text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Symbol {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Symbol::parse(s)
    }
}

impl TryFrom<String> for Symbol {
    type Error = MarketError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Symbol::parse(&value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Joins symbols with commas, the form the quote endpoint expects.
pub fn join_symbols(symbols: &[Symbol]) -> String {
    symbols
        .iter()
        .map(Symbol::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

/// Parses a list of symbols separated by commas and/or whitespace.
pub fn parse_symbol_list(text: &str) -> Result<Vec<Symbol>, MarketError> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(Symbol::parse)
        .collect()
}

/// Trait providing file parsing for symbols.
pub trait SymbolParser {
    /// Parses symbols from a buffered reader.
    ///
    /// Symbols may be separated by commas, spaces, or new lines. Anything after
    /// a `#` on a line is ignored. Repeated symbols are kept once, in first-seen
    /// order. Returns an error if any token is not a valid symbol.
    fn parse_from_file<R: BufRead>(reader: R) -> Result<Vec<Symbol>, MarketError>;
}

impl SymbolParser for Symbol {
    fn parse_from_file<R: BufRead>(reader: R) -> Result<Vec<Self>, MarketError> {
        let mut symbols: Vec<Symbol> = Vec::new();

        for line_result in reader.lines() {
            let line = line_result?;
            let content = line.split('#').next().unwrap_or_default();
            for symbol in parse_symbol_list(content)? {
                if !symbols.contains(&symbol) {
                    symbols.push(symbol);
                }
            }
        }
        Ok(symbols)
    }
}

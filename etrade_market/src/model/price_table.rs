//! In-memory symbol → quote table.
//!
//! The table itself is not synchronized; the pool shares it as
//! [`SharedPriceTable`] (`Arc<Mutex<_>>`) between pollers and callers. Pollers
//! only ever refresh entries that already exist, so a symbol that was removed
//! while its poller was mid-fetch is never written back.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use etrade_common::Symbol;

use crate::model::quote::Quote;

/// Price table shared between the pool manager, its pollers and callers.
pub type SharedPriceTable = Arc<Mutex<PriceTable>>;

/// Latest known quote per tracked symbol.
#[derive(Debug, Default, Clone)]
pub struct PriceTable {
    quotes: HashMap<Symbol, Quote>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a fresh table for sharing.
    pub fn shared() -> SharedPriceTable {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.quotes.contains_key(symbol)
    }

    /// Register `symbol` with an unknown price. Returns `false` if it was already present.
    pub fn insert_placeholder(&mut self, symbol: Symbol) -> bool {
        if self.quotes.contains_key(&symbol) {
            return false;
        }
        self.quotes.insert(symbol.clone(), Quote::placeholder(symbol));
        true
    }

    /// Overwrite the price of a tracked symbol. Untracked symbols are ignored
    /// and `false` is returned.
    pub fn update_price(&mut self, symbol: &Symbol, price: Option<f64>) -> bool {
        match self.quotes.get_mut(symbol) {
            Some(entry) => {
                *entry = Quote::priced(symbol.clone(), price);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, symbol: &Symbol) -> Option<Quote> {
        self.quotes.remove(symbol)
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&Quote> {
        self.quotes.get(symbol)
    }

    /// Point-in-time copy of every entry.
    pub fn snapshot(&self) -> HashMap<Symbol, Quote> {
        self.quotes.clone()
    }

    /// Tracked symbols in sorted order.
    pub fn symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self.quotes.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn clear(&mut self) {
        self.quotes.clear();
    }
}

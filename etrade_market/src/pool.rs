//! Market data pool manager.
//!
//! `MarketData` owns the shared price table and the list of active pollers. It
//! spreads tracked symbols over pollers of at most 25 symbols each: a new symbol
//! goes to the first poller with room, or to a freshly spawned one; a poller whose
//! last symbol is removed is stopped, joined and dropped.
//!
//! Concurrency:
//! - The poller list sits behind one mutex. `add_symbols` and `remove_symbols`
//!   hold it for the whole call, so "already tracked?" and "has room?" checks and
//!   the mutations that follow cannot interleave with another caller.
//! - The price table has its own mutex, taken briefly by callers, by the manager,
//!   and by pollers after a fetch. No HTTP call ever runs under it, so reading
//!   prices never waits on the network.
//! - Lock order is poller list → poller batch → price table.
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use etrade_common::{MarketError, Result, Symbol};
use log::{debug, error, info};

use crate::config::{MarketConfig, MarketDataBuilder};
use crate::model::price_table::{PriceTable, SharedPriceTable};
use crate::model::quote::Quote;
use crate::poller::{PollContext, Poller};
use crate::transport::Transport;

/// Live price table backed by a pool of background pollers.
pub struct MarketData {
    config: MarketConfig,
    ctx: PollContext,
    prices: SharedPriceTable,
    pollers: Mutex<Vec<Poller>>,
    next_poller_id: AtomicUsize,
}

impl MarketData {
    pub fn builder() -> MarketDataBuilder {
        MarketDataBuilder::new()
    }

    /// Pool over an existing transport.
    pub fn new(transport: Arc<dyn Transport>, config: MarketConfig) -> Self {
        let prices = PriceTable::shared();
        let ctx = PollContext {
            base_url: Arc::from(config.base_url.as_str()),
            transport,
            prices: Arc::clone(&prices),
            poll_interval: config.poll_interval,
            request_timeout: config.request_timeout,
        };
        Self {
            config,
            ctx,
            prices,
            pollers: Mutex::new(Vec::new()),
            next_poller_id: AtomicUsize::new(1),
        }
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    /// Start tracking `symbols`.
    ///
    /// Fails with `Validation` if the list is empty or a symbol is malformed, and
    /// with `DuplicateSymbol` if a symbol is already tracked or listed twice. All
    /// checks run before anything is changed.
    pub fn add_symbols<I, S>(&self, symbols: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let requested = parse_request(symbols, "track")?;
        let mut pollers = self.pollers.lock()?;

        {
            let prices = self.prices.lock()?;
            let mut seen = HashSet::new();
            for symbol in &requested {
                if prices.contains(symbol) || !seen.insert(symbol) {
                    return Err(MarketError::DuplicateSymbol(symbol.to_string()));
                }
            }
        }

        for symbol in requested {
            self.prices.lock()?.insert_placeholder(symbol.clone());
            if let Err(e) = self.place(&mut pollers, symbol.clone()) {
                self.prices.lock()?.remove(&symbol);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Stop tracking `symbols`.
    ///
    /// Fails with `Validation` if the list is empty, malformed or repeats a
    /// symbol, and with `NotTracked` if a symbol is not tracked. All checks run
    /// before anything is changed. Pollers left without symbols are joined before
    /// this returns.
    pub fn remove_symbols<I, S>(&self, symbols: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let requested = parse_request(symbols, "remove")?;
        let mut pollers = self.pollers.lock()?;

        {
            let prices = self.prices.lock()?;
            let mut seen = HashSet::new();
            for symbol in &requested {
                if !seen.insert(symbol) {
                    return Err(MarketError::Validation(format!("symbol {} listed twice", symbol)));
                }
                if !prices.contains(symbol) {
                    return Err(MarketError::NotTracked(symbol.to_string()));
                }
            }
        }

        for symbol in &requested {
            let owner = owner_of(&pollers, symbol)?;
            let emptied = match owner {
                Some(index) => pollers[index].remove_symbol(symbol)?,
                None => {
                    error!("Symbol {} has a price entry but no poller", symbol);
                    false
                }
            };
            self.prices.lock()?.remove(symbol);
            debug!("Stopped tracking {}", symbol);

            if let (true, Some(index)) = (emptied, owner) {
                let poller = pollers.remove(index);
                let id = poller.id();
                poller.join()?;
                info!("Poller {} retired ({} active)", id, pollers.len());
            }
        }
        Ok(())
    }

    /// Point-in-time copy of the price table.
    pub fn prices(&self) -> Result<HashMap<Symbol, Quote>> {
        Ok(self.prices.lock()?.snapshot())
    }

    /// Latest quote for one symbol, if tracked.
    pub fn price(&self, symbol: &str) -> Result<Option<Quote>> {
        let symbol = Symbol::parse(symbol)?;
        Ok(self.prices.lock()?.get(&symbol).cloned())
    }

    /// Tracked symbols, sorted.
    pub fn symbols(&self) -> Result<Vec<Symbol>> {
        Ok(self.prices.lock()?.symbols())
    }

    pub fn poller_count(&self) -> Result<usize> {
        Ok(self.pollers.lock()?.len())
    }

    /// Each active poller's batch, in poller creation order.
    pub fn batches(&self) -> Result<Vec<Vec<Symbol>>> {
        self.pollers.lock()?.iter().map(Poller::symbols).collect()
    }

    /// Stop every poller, wait for all of them and clear the table.
    ///
    /// All pollers are signalled before the first join, so the total wait is
    /// bounded by the slowest one rather than their sum. The poller list stays
    /// locked until the table is cleared; a concurrent `add_symbols` runs either
    /// entirely before or entirely after.
    pub fn shutdown(&self) -> Result<()> {
        let mut pollers = self.pollers.lock()?;
        if pollers.is_empty() {
            return Ok(());
        }
        info!("Shutting down {} pollers", pollers.len());
        for poller in pollers.iter() {
            poller.stop();
        }
        let mut first_error = None;
        for poller in pollers.drain(..) {
            if let Err(e) = poller.join() {
                error!("Poller join failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
        self.prices.lock()?.clear();
        first_error.map_or(Ok(()), Err)
    }

    /// First poller with room gets the symbol; otherwise a new poller is spawned.
    fn place(&self, pollers: &mut Vec<Poller>, symbol: Symbol) -> Result<()> {
        for poller in pollers.iter() {
            if !poller.is_full()? {
                debug!("Tracking {} on poller {}", symbol, poller.id());
                return poller.add_symbol(symbol);
            }
        }

        let id = self.next_poller_id.fetch_add(1, Ordering::Relaxed);
        info!("Spawning poller {} for {}", id, symbol);
        pollers.push(Poller::spawn(id, symbol, self.ctx.clone())?);
        Ok(())
    }
}

impl Drop for MarketData {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("Market data shutdown failed: {}", e);
        }
    }
}

/// Index of the poller whose batch holds `symbol`.
fn owner_of(pollers: &[Poller], symbol: &Symbol) -> Result<Option<usize>> {
    for (index, poller) in pollers.iter().enumerate() {
        if poller.contains(symbol)? {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

fn parse_request<I, S>(symbols: I, action: &str) -> Result<Vec<Symbol>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let requested = symbols
        .into_iter()
        .map(|s| Symbol::parse(s.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    if requested.is_empty() {
        return Err(MarketError::Validation(format!(
            "You must provide at least one symbol to {}",
            action
        )));
    }
    Ok(requested)
}

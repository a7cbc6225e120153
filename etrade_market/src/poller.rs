//! Background worker that keeps the prices of up to 25 symbols fresh.
//!
//! A `Poller` owns a mutex-guarded batch of symbols and one thread running
//! [`run_poll_loop`]. Each cycle snapshots the batch, fetches quotes for it and
//! writes the results into the shared price table, then waits the poll interval.
//!
//! Lifecycle:
//! - `Idle`: spawned, first cycle not started yet.
//! - `Running`: cycling.
//! - `Draining`: the last symbol was removed; the loop has been told to exit.
//! - `Stopped`: the loop has returned; the thread is ready to be joined.
//!
//! The loop stops when it sees an empty batch or a stop signal. The stop signal is
//! checked before every fetch and raced against the in-flight fetch itself, so a
//! stop never waits for a slow HTTP call: the fetch runs on a helper thread whose
//! late result is simply dropped.
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, select};
use etrade_common::net::MAX_SYMBOLS_PER_REQUEST;
use etrade_common::{MarketError, Result, Symbol};
use log::{debug, error, info, warn};
use strum_macros::Display;

use crate::model::price_table::SharedPriceTable;
use crate::quote_fetcher::{QuoteMap, fetch_quotes};
use crate::transport::Transport;

/// Observable lifecycle state of a poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PollerState {
    Idle,
    Running,
    Draining,
    Stopped,
}

/// Everything a poll loop needs besides its own batch. Cheap to clone.
#[derive(Clone)]
pub struct PollContext {
    pub base_url: Arc<str>,
    pub transport: Arc<dyn Transport>,
    pub prices: SharedPriceTable,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

struct Batch {
    symbols: Vec<Symbol>,
    state: PollerState,
}

type SharedBatch = Arc<Mutex<Batch>>;

enum CycleOutcome {
    Fetched(QuoteMap),
    Failed(MarketError),
    Cancelled,
}

/// A running worker and its batch of symbols.
pub struct Poller {
    id: usize,
    batch: SharedBatch,
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    /// Spawn a poller seeded with `first` and start its loop.
    pub fn spawn(id: usize, first: Symbol, ctx: PollContext) -> Result<Self> {
        let batch = Arc::new(Mutex::new(Batch {
            symbols: vec![first],
            state: PollerState::Idle,
        }));
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let loop_batch = Arc::clone(&batch);
        let handle = thread::Builder::new()
            .name(format!("poller-{}", id))
            .spawn(move || {
                if let Err(e) = run_poll_loop(id, &loop_batch, &ctx, &stop_rx) {
                    error!("Poller {} loop failed: {}", id, e);
                }
                if let Ok(mut batch) = loop_batch.lock() {
                    batch.state = PollerState::Stopped;
                }
                debug!("Poller {} stopped", id);
            })?;

        Ok(Self {
            id,
            batch,
            stop_tx,
            handle: Some(handle),
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> Result<PollerState> {
        Ok(self.batch.lock()?.state)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.batch.lock()?.symbols.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn is_full(&self) -> Result<bool> {
        Ok(self.len()? >= MAX_SYMBOLS_PER_REQUEST)
    }

    pub fn contains(&self, symbol: &Symbol) -> Result<bool> {
        Ok(self.batch.lock()?.symbols.contains(symbol))
    }

    /// Copy of the batch, in insertion order.
    pub fn symbols(&self) -> Result<Vec<Symbol>> {
        Ok(self.batch.lock()?.symbols.clone())
    }

    /// Append `symbol` to the batch; picked up from the next cycle on.
    pub fn add_symbol(&self, symbol: Symbol) -> Result<()> {
        let mut batch = self.batch.lock()?;
        if batch.symbols.len() >= MAX_SYMBOLS_PER_REQUEST {
            return Err(MarketError::Capacity(MAX_SYMBOLS_PER_REQUEST));
        }
        if batch.symbols.contains(&symbol) {
            return Err(MarketError::DuplicateSymbol(symbol.to_string()));
        }
        batch.symbols.push(symbol);
        Ok(())
    }

    /// Remove `symbol` from the batch. Returns `true` when the batch is now empty;
    /// the loop has then been told to exit and the caller must [`join`](Self::join).
    pub fn remove_symbol(&self, symbol: &Symbol) -> Result<bool> {
        let mut batch = self.batch.lock()?;
        let Some(index) = batch.symbols.iter().position(|s| s == symbol) else {
            return Err(MarketError::NotFound(symbol.to_string()));
        };
        batch.symbols.remove(index);
        if !batch.symbols.is_empty() {
            return Ok(false);
        }
        if batch.state != PollerState::Stopped {
            batch.state = PollerState::Draining;
        }
        drop(batch);
        self.stop();
        Ok(true)
    }

    /// Ask the loop to exit, abandoning any fetch in flight.
    pub fn stop(&self) {
        let _ = self.stop_tx.try_send(());
    }

    /// Wait for the loop thread to finish.
    pub fn join(mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| MarketError::WorkerPanicked(format!("poller-{}", self.id))),
            None => Ok(()),
        }
    }

    /// Stop the loop and wait for it.
    pub fn shutdown(self) -> Result<()> {
        self.stop();
        self.join()
    }
}

/// Poll loop run by each poller thread.
///
/// Exits on an empty batch or a stop signal (including the poller handle being
/// dropped). Fetch errors are logged and the next cycle is the retry; prices
/// already in the table stay as they are.
fn run_poll_loop(id: usize, batch: &SharedBatch, ctx: &PollContext, stop_rx: &Receiver<()>) -> Result<()> {
    info!("Poller {} started", id);
    loop {
        if stop_requested(stop_rx) {
            break;
        }

        let symbols = {
            let mut batch = batch.lock()?;
            if batch.symbols.is_empty() {
                break;
            }
            batch.state = PollerState::Running;
            batch.symbols.clone()
        };

        match fetch_cancellable(id, ctx, symbols, stop_rx)? {
            CycleOutcome::Fetched(quotes) => {
                let mut prices = ctx.prices.lock()?;
                let written = quotes
                    .into_iter()
                    .filter(|(symbol, price)| prices.update_price(symbol, *price))
                    .count();
                debug!("Poller {} refreshed {} prices", id, written);
            }
            CycleOutcome::Failed(e) if e.is_transient() => warn!("Poller {} cycle failed: {}", id, e),
            CycleOutcome::Failed(e) => error!("Poller {} cycle failed: {}", id, e),
            CycleOutcome::Cancelled => break,
        }

        match stop_rx.recv_timeout(ctx.poll_interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    info!("Poller {} exiting", id);
    Ok(())
}

fn stop_requested(stop_rx: &Receiver<()>) -> bool {
    !matches!(stop_rx.try_recv(), Err(crossbeam_channel::TryRecvError::Empty))
}

/// Run one fetch on a helper thread and race it against the stop signal.
fn fetch_cancellable(id: usize, ctx: &PollContext, symbols: Vec<Symbol>, stop_rx: &Receiver<()>) -> Result<CycleOutcome> {
    let (done_tx, done_rx) = bounded::<Result<QuoteMap>>(1);
    let base_url = Arc::clone(&ctx.base_url);
    let transport = Arc::clone(&ctx.transport);
    let timeout = ctx.request_timeout;

    thread::Builder::new()
        .name(format!("poller-{}-fetch", id))
        .spawn(move || {
            let result = fetch_quotes(&base_url, transport.as_ref(), &symbols, timeout);
            // The poller may have moved on already.
            let _ = done_tx.send(result);
        })?;

    let outcome = select! {
        recv(stop_rx) -> _ => CycleOutcome::Cancelled,
        recv(done_rx) -> msg => match msg {
            Ok(Ok(quotes)) => CycleOutcome::Fetched(quotes),
            Ok(Err(e)) => CycleOutcome::Failed(e),
            Err(e) => CycleOutcome::Failed(MarketError::ChannelRecv(e.to_string())),
        },
    };
    Ok(outcome)
}

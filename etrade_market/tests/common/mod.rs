//! Shared test doubles: an in-memory quote transport and a polling helper.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use etrade_common::{MarketError, Result};
use etrade_market::{HttpResponse, MarketData, Method, Transport};
use serde_json::json;

pub const BASE_URL: &str = "http://stub.local/v1/market";

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Answers quote requests from an in-memory price list.
#[derive(Default)]
pub struct StubTransport {
    prices: Mutex<HashMap<String, f64>>,
    failing: AtomicBool,
    delay: Mutex<Duration>,
    calls: AtomicUsize,
    batches: Mutex<Vec<Vec<String>>>,
}

impl StubTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_prices(prices: &[(&str, f64)]) -> Arc<Self> {
        let stub = Self::new();
        for (symbol, price) in prices {
            stub.set_price(symbol, *price);
        }
        stub
    }

    pub fn set_price(&self, symbol: &str, price: f64) {
        self.prices.lock().unwrap().insert(symbol.to_string(), price);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Symbols of every request seen so far, in request order.
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }
}

impl Transport for StubTransport {
    fn send(&self, method: Method, url: &str, _params: &[(String, String)], _timeout: Duration) -> Result<HttpResponse> {
        assert_eq!(method, Method::Get);
        self.calls.fetch_add(1, Ordering::SeqCst);

        let symbols: Vec<String> = url
            .rsplit_once("/quote/")
            .and_then(|(_, tail)| tail.strip_suffix(".json"))
            .map(|joined| joined.split(',').map(str::to_string).collect())
            .unwrap_or_default();
        self.batches.lock().unwrap().push(symbols.clone());

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(MarketError::Transport("stubbed outage".to_string()));
        }

        let prices = self.prices.lock().unwrap();
        let data: Vec<_> = symbols
            .iter()
            .map(|s| json!({"symbol": s, "All": {"lastTrade": prices.get(s)}}))
            .collect();
        let body = json!({"QuoteResponse": {"QuoteData": data}});
        Ok(HttpResponse::new(200, body.to_string()))
    }
}

/// Pool over `transport` with a short poll interval.
pub fn market(transport: Arc<StubTransport>, poll_interval: Duration) -> MarketData {
    MarketData::builder()
        .transport(transport)
        .base_url(BASE_URL)
        .poll_interval(poll_interval)
        .build()
        .unwrap()
}

/// Polls `condition` every 10 ms until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

pub fn symbol_names(count: usize, prefix: &str) -> Vec<String> {
    (1..=count).map(|i| format!("{}{}", prefix, i)).collect()
}

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::{StubTransport, init_logger, market, symbol_names, wait_until};
use etrade_common::{MarketError, Symbol};

const FAST: Duration = Duration::from_millis(20);
const WAIT: Duration = Duration::from_secs(5);

fn assert_consistent(market: &etrade_market::MarketData) {
    let batches = market.batches().unwrap();
    let mut owned = HashSet::new();
    for batch in &batches {
        assert!(!batch.is_empty(), "empty poller left behind");
        assert!(batch.len() <= 25, "poller over capacity: {}", batch.len());
        for symbol in batch {
            assert!(owned.insert(symbol.clone()), "{} owned twice", symbol);
        }
    }
    let tracked: HashSet<Symbol> = market.symbols().unwrap().into_iter().collect();
    assert_eq!(owned, tracked);
}

#[test]
fn added_symbols_are_owned_exactly_once() {
    init_logger();
    let market = market(StubTransport::new(), FAST);
    market.add_symbols(symbol_names(30, "SYM")).unwrap();

    assert_eq!(market.symbols().unwrap().len(), 30);
    let sizes: Vec<usize> = market.batches().unwrap().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![25, 5]);
    assert_consistent(&market);
}

#[test]
fn twenty_sixth_symbol_spawns_second_poller() {
    init_logger();
    let market = market(StubTransport::new(), FAST);
    for name in symbol_names(25, "SYM") {
        market.add_symbols([name]).unwrap();
    }
    assert_eq!(market.poller_count().unwrap(), 1);
    assert_eq!(market.batches().unwrap()[0].len(), 25);

    market.add_symbols(["SYM26"]).unwrap();
    let batches = market.batches().unwrap();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[1], vec![Symbol::parse("SYM26").unwrap()]);
    assert_consistent(&market);
}

#[test]
fn freed_capacity_is_reused_before_spawning() {
    init_logger();
    let market = market(StubTransport::new(), FAST);
    market.add_symbols(symbol_names(26, "SYM")).unwrap();
    market.remove_symbols(["SYM3"]).unwrap();

    market.add_symbols(["NEW"]).unwrap();
    let batches = market.batches().unwrap();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].len(), 25);
    assert_eq!(batches[0].last().unwrap().as_str(), "NEW");
}

#[test]
fn duplicate_add_fails_and_leaves_state_unchanged() {
    init_logger();
    let market = market(StubTransport::new(), FAST);
    market.add_symbols(["AAPL", "MSFT"]).unwrap();

    let err = market.add_symbols(["TSLA", "aapl"]).unwrap_err();
    assert!(matches!(err, MarketError::DuplicateSymbol(ref s) if s == "AAPL"));

    let err = market.add_symbols(["NFLX", "nflx"]).unwrap_err();
    assert!(matches!(err, MarketError::DuplicateSymbol(_)));

    let names: Vec<String> = market.symbols().unwrap().iter().map(|s| s.to_string()).collect();
    assert_eq!(names, vec!["AAPL", "MSFT"]);
    assert_eq!(market.poller_count().unwrap(), 1);
    assert_consistent(&market);
}

#[test]
fn untracked_remove_fails_and_leaves_state_unchanged() {
    init_logger();
    let market = market(StubTransport::new(), FAST);
    market.add_symbols(["AAPL"]).unwrap();

    let err = market.remove_symbols(["AAPL", "NFLX"]).unwrap_err();
    assert!(matches!(err, MarketError::NotTracked(ref s) if s == "NFLX"));
    assert!(market.price("AAPL").unwrap().is_some());
    assert_eq!(market.poller_count().unwrap(), 1);

    let err = market.remove_symbols(["AAPL", "AAPL"]).unwrap_err();
    assert!(matches!(err, MarketError::Validation(_)));
    assert!(market.price("AAPL").unwrap().is_some());
}

#[test]
fn empty_or_malformed_input_is_rejected() {
    init_logger();
    let market = market(StubTransport::new(), FAST);
    let none: [&str; 0] = [];
    assert!(matches!(market.add_symbols(none), Err(MarketError::Validation(_))));
    assert!(matches!(market.remove_symbols(none), Err(MarketError::Validation(_))));
    assert!(matches!(market.add_symbols(["AAPL", "BAD SYM"]), Err(MarketError::Validation(_))));
    assert!(market.symbols().unwrap().is_empty());
    assert_eq!(market.poller_count().unwrap(), 0);
}

#[test]
fn removing_last_symbol_retires_poller() {
    init_logger();
    let market = market(StubTransport::new(), FAST);
    market.add_symbols(symbol_names(26, "SYM")).unwrap();
    assert_eq!(market.poller_count().unwrap(), 2);

    market.remove_symbols(["SYM26"]).unwrap();
    assert_eq!(market.poller_count().unwrap(), 1);

    market.remove_symbols(symbol_names(25, "SYM")).unwrap();
    assert_eq!(market.poller_count().unwrap(), 0);
    assert!(market.prices().unwrap().is_empty());
}

#[test]
fn fetch_cycle_writes_exactly_the_polled_prices() {
    init_logger();
    let stub = StubTransport::with_prices(&[("AAPL", 150.00), ("GOOGL", 2700.00), ("MSFT", 410.0)]);
    let market = market(Arc::clone(&stub), FAST);
    market.add_symbols(["AAPL", "GOOGL"]).unwrap();

    assert!(wait_until(WAIT, || {
        let prices = market.prices().unwrap();
        prices.values().all(|q| q.price.is_some())
    }));

    let prices = market.prices().unwrap();
    assert_eq!(prices.len(), 2);
    assert_eq!(prices[&Symbol::parse("AAPL").unwrap()].price, Some(150.00));
    assert_eq!(prices[&Symbol::parse("GOOGL").unwrap()].price, Some(2700.00));
    assert!(prices[&Symbol::parse("AAPL").unwrap()].updated_at.is_some());
    assert_eq!(stub.batches().last().unwrap(), &vec!["AAPL".to_string(), "GOOGL".to_string()]);
}

#[test]
fn new_symbols_start_as_placeholders() {
    init_logger();
    let stub = StubTransport::new();
    stub.set_delay(Duration::from_millis(300));
    let market = market(stub, FAST);
    market.add_symbols(["aapl"]).unwrap();

    let quote = market.price("AAPL").unwrap().unwrap();
    assert_eq!(quote.symbol.as_str(), "AAPL");
    assert_eq!(quote.price, None);
    assert_eq!(quote.updated_at, None);
}

#[test]
fn failed_fetches_keep_last_known_prices() {
    init_logger();
    let stub = StubTransport::with_prices(&[("AAPL", 150.0)]);
    let market = market(Arc::clone(&stub), FAST);
    market.add_symbols(["AAPL"]).unwrap();
    assert!(wait_until(WAIT, || market.price("AAPL").unwrap().unwrap().price == Some(150.0)));

    stub.set_failing(true);
    let calls = stub.calls();
    assert!(wait_until(WAIT, || stub.calls() >= calls + 3), "poller stopped cycling after errors");

    assert_eq!(market.price("AAPL").unwrap().unwrap().price, Some(150.0));
    assert_eq!(market.poller_count().unwrap(), 1);

    stub.set_price("AAPL", 999.0);
    stub.set_failing(false);
    assert!(wait_until(WAIT, || market.price("AAPL").unwrap().unwrap().price == Some(999.0)));
}

#[test]
fn removed_symbol_is_never_written_back() {
    init_logger();
    let stub = StubTransport::with_prices(&[("AAPL", 150.0), ("MSFT", 410.0)]);
    let market = market(Arc::clone(&stub), FAST);
    market.add_symbols(["AAPL", "MSFT"]).unwrap();
    assert!(wait_until(WAIT, || market.price("MSFT").unwrap().is_some_and(|q| q.price.is_some())));

    market.remove_symbols(["msft"]).unwrap();
    let calls = stub.calls();
    assert!(wait_until(WAIT, || stub.calls() >= calls + 3));

    assert_eq!(market.price("MSFT").unwrap(), None);
    assert_eq!(market.symbols().unwrap(), vec![Symbol::parse("AAPL").unwrap()]);
    assert_eq!(stub.batches().last().unwrap(), &vec!["AAPL".to_string()]);
}

#[test]
fn retiring_a_poller_does_not_wait_for_its_fetch() {
    init_logger();
    let stub = StubTransport::new();
    stub.set_delay(Duration::from_secs(10));
    let market = market(Arc::clone(&stub), FAST);
    market.add_symbols(["AAPL"]).unwrap();
    assert!(wait_until(WAIT, || stub.calls() >= 1));

    let started = Instant::now();
    market.remove_symbols(["AAPL"]).unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(market.poller_count().unwrap(), 0);
}

#[test]
fn shutdown_stops_every_poller() {
    init_logger();
    let stub = StubTransport::new();
    let market = market(Arc::clone(&stub), FAST);
    market.add_symbols(symbol_names(60, "SYM")).unwrap();
    assert_eq!(market.poller_count().unwrap(), 3);
    assert!(wait_until(WAIT, || stub.calls() >= 3));

    market.shutdown().unwrap();
    assert_eq!(market.poller_count().unwrap(), 0);
    assert!(market.prices().unwrap().is_empty());

    // Let any fetch helper that was already spawned finish its call.
    thread::sleep(Duration::from_millis(50));
    let calls = stub.calls();
    thread::sleep(Duration::from_millis(150));
    assert_eq!(stub.calls(), calls);
}

#[test]
fn add_during_shutdown_keeps_pollers_and_table_in_step() {
    init_logger();
    for round in 0..5 {
        let market = Arc::new(market(StubTransport::new(), Duration::from_secs(3600)));
        market.add_symbols(symbol_names(500, "SYM")).unwrap();
        assert_eq!(market.poller_count().unwrap(), 20);

        let stopper = {
            let market = Arc::clone(&market);
            thread::spawn(move || market.shutdown().unwrap())
        };
        let mut added: usize = 0;
        while !stopper.is_finished() {
            market.add_symbols([format!("NEW{}X{}", round, added)]).unwrap();
            added += 1;
        }
        stopper.join().unwrap();

        assert_consistent(&market);
        for symbol in market.symbols().unwrap() {
            assert!(symbol.as_str().starts_with("NEW"), "{} survived shutdown", symbol);
        }
        let last = format!("NEW{}X{}", round, added.saturating_sub(1));
        if added > 0 && market.price(&last).unwrap().is_some() {
            market.remove_symbols([last]).unwrap();
        }
        assert_consistent(&market);
    }
}

#[test]
fn concurrent_callers_keep_the_pool_consistent() {
    init_logger();
    let market = Arc::new(market(StubTransport::new(), FAST));

    let workers: Vec<_> = (0..4)
        .map(|t| {
            let market = Arc::clone(&market);
            thread::spawn(move || {
                for name in symbol_names(20, &format!("T{}X", t)) {
                    market.add_symbols([name]).unwrap();
                }
                market.remove_symbols([format!("T{}X1", t)]).unwrap();
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(market.symbols().unwrap().len(), 76);
    assert_eq!(market.poller_count().unwrap(), 4);
    assert_consistent(&market);
}

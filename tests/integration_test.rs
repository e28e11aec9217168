//! End-to-end tests over the feed → engine → portfolio → analyzer pipeline.
//!
//! Covers:
//! - Full single-symbol runs over a mock store (buy-and-hold, SMA crossover)
//! - Empty date range failing before any strategy hook fires
//! - Batch ranking, failure isolation and CSV export
//! - Determinism: replaying the same feed twice is bit-identical
//! - The same pipeline through a seeded in-memory SQLite store
//! - Config-driven wiring via the INI adapter

mod common;

use common::*;
use std::cell::RefCell;
use tapetrader::domain::engine::{BatchConfig, Engine, EngineState, run_multiple};
use tapetrader::domain::error::{FeedError, TapetraderError};
use tapetrader::domain::feed::Feed;
use tapetrader::domain::position::Side;
use tapetrader::domain::strategy::{BuyAndHold, SmaCrossover, Strategy};

fn strategy_factory() -> Box<dyn Strategy> {
    Box::new(BuyAndHold::new())
}

mod full_pipeline {
    use super::*;

    #[test]
    fn buy_and_hold_over_mock_store() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let store = MockBarStore::new().with_bars("AAPL", make_bars("AAPL", &closes));

        let feed = Feed::open(&store, "AAPL", minute(0), minute(100), 4).unwrap();
        let mut engine = Engine::new(feed, Box::new(BuyAndHold::new()), 10_000.0);
        let report = engine.run().unwrap();

        assert_eq!(engine.state(), EngineState::Finished);
        assert_eq!(report.bars, 10);

        // 10,000 cash at close 100 buys exactly 100 shares.
        let portfolio = engine.portfolio();
        assert_eq!(portfolio.trade_log().len(), 1);
        assert_eq!(portfolio.trade_log()[0].side, Side::Buy);
        assert_eq!(portfolio.trade_log()[0].quantity, 100);
        assert!(portfolio.cash().abs() < 1e-9);
        assert_eq!(portfolio.quantity("AAPL"), 100);

        // Marked from 100 to 109.
        assert!((report.metrics.final_equity - 10_900.0).abs() < 1e-9);
        assert!((report.metrics.total_return_pct - 9.0).abs() < 1e-9);
        assert_eq!(portfolio.equity_curve().len(), 10);

        // Accounting identity at the final snapshot.
        let last = portfolio.equity_curve().last().unwrap();
        let identity = portfolio.cash() + portfolio.quantity("AAPL") as f64 * 109.0;
        assert!((last.equity - identity).abs() < 1e-9);
    }

    #[test]
    fn sma_crossover_round_trips_positions() {
        let store = MockBarStore::new().with_bars("AAPL", zigzag_bars("AAPL", 100.0, 120));

        let feed = Feed::open(&store, "AAPL", minute(0), minute(500), 16).unwrap();
        let mut engine = Engine::new(feed, Box::new(SmaCrossover::new(3, 8, 50)), 50_000.0);
        let report = engine.run().unwrap();

        let log = engine.portfolio().trade_log();
        assert!(!log.is_empty(), "zig-zag data must produce crossovers");
        assert_eq!(log[0].side, Side::Buy);
        // Alternating entries and exits, all whole positive quantities.
        for pair in log.windows(2) {
            assert_ne!(pair[0].side, pair[1].side);
        }
        assert!(log.iter().all(|t| t.quantity > 0));
        assert!(engine.portfolio().cash() >= 0.0);
        assert_eq!(report.metrics.num_trades, log.len());
    }
}

mod empty_range {
    use super::*;

    #[test]
    fn feed_open_reports_no_data() {
        let store = MockBarStore::new().with_bars("AAPL", make_bars("AAPL", &[100.0]));
        // Window entirely after the only stored bar.
        let err = Feed::open(&store, "AAPL", minute(10), minute(20), 4).unwrap_err();
        assert!(matches!(err, FeedError::NoData { .. }));
    }

    #[test]
    fn failed_open_never_instantiates_the_strategy() {
        let store = MockBarStore::new().with_bars("AAPL", make_bars("AAPL", &[100.0, 101.0]));
        let instantiated = RefCell::new(0usize);

        let factory = || -> Box<dyn Strategy> {
            *instantiated.borrow_mut() += 1;
            Box::new(BuyAndHold::new())
        };

        let symbols = vec!["GONE".to_string(), "AAPL".to_string()];
        let outcome = run_multiple(
            &store,
            &symbols,
            &factory,
            minute(0),
            minute(100),
            &BatchConfig::default(),
        )
        .unwrap();

        // Only the symbol with data ever got a strategy; the empty one
        // failed at open, before any hook could fire.
        assert_eq!(*instantiated.borrow(), 1);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].symbol, "GONE");
        assert!(matches!(
            outcome.failed[0].error,
            TapetraderError::Feed(FeedError::NoData { .. })
        ));
    }
}

mod batch {
    use super::*;
    use tapetrader::adapters::csv_report_adapter::CsvReportAdapter;
    use tapetrader::ports::report_port::ReportPort;

    fn three_symbol_store() -> MockBarStore {
        MockBarStore::new()
            .with_bars("AAA", make_bars("AAA", &[100.0, 110.0])) // +10%
            .with_bars("BBB", make_bars("BBB", &[100.0, 130.0])) // +30%
            .with_bars("CCC", make_bars("CCC", &[100.0, 120.0])) // +20%
    }

    #[test]
    fn ranking_orders_by_total_return() {
        let store = three_symbol_store();
        let symbols: Vec<String> = ["AAA", "BBB", "CCC"].map(String::from).into();

        let outcome = run_multiple(
            &store,
            &symbols,
            &super::strategy_factory,
            minute(0),
            minute(100),
            &BatchConfig {
                initial_cash: 10_000.0,
                ..BatchConfig::default()
            },
        )
        .unwrap();

        let order: Vec<&str> = outcome.ranked.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(order, vec!["BBB", "CCC", "AAA"]);
        assert!(outcome.failed.is_empty());
    }

    #[test]
    fn storage_failure_is_isolated_per_symbol() {
        let store = three_symbol_store().with_error("BAD", "device gone");
        let symbols: Vec<String> = ["AAA", "BAD", "BBB"].map(String::from).into();

        let outcome = run_multiple(
            &store,
            &symbols,
            &super::strategy_factory,
            minute(0),
            minute(100),
            &BatchConfig::default(),
        )
        .unwrap();

        assert_eq!(outcome.ranked.len(), 2);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].symbol, "BAD");
    }

    #[test]
    fn ranking_exports_to_csv() {
        let store = three_symbol_store();
        let symbols: Vec<String> = ["AAA", "BBB", "CCC"].map(String::from).into();

        let outcome = run_multiple(
            &store,
            &symbols,
            &super::strategy_factory,
            minute(0),
            minute(100),
            &BatchConfig::default(),
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ranking.csv");
        CsvReportAdapter::new()
            .write_ranking(&outcome.ranked, &path)
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("BBB,"));
        assert!(lines[2].starts_with("CCC,"));
        assert!(lines[3].starts_with("AAA,"));
    }
}

mod determinism {
    use super::*;

    #[test]
    fn replaying_the_same_feed_twice_matches_exactly() {
        let store = MockBarStore::new().with_bars("AAPL", zigzag_bars("AAPL", 100.0, 200));

        let run = || {
            let feed = Feed::open(&store, "AAPL", minute(0), minute(500), 32).unwrap();
            let mut engine = Engine::new(feed, Box::new(SmaCrossover::new(3, 8, 50)), 50_000.0);
            engine.run().unwrap();
            (
                engine.portfolio().trade_log().to_vec(),
                engine.portfolio().equity_curve().to_vec(),
            )
        };

        let (trades_a, curve_a) = run();
        let (trades_b, curve_b) = run();
        assert_eq!(trades_a, trades_b);
        assert_eq!(curve_a, curve_b);
    }
}

#[cfg(feature = "sqlite")]
mod sqlite_pipeline {
    use super::*;
    use tapetrader::adapters::sqlite_store::SqliteStore;
    use tapetrader::cli;
    use tapetrader::ports::bar_store::BarStore;

    fn seeded_sqlite(closes: &[f64]) -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        store.initialize_schema().unwrap();
        store.insert_bars(&make_bars("AAPL", closes)).unwrap();
        store
    }

    #[test]
    fn sqlite_and_mock_stores_produce_identical_runs() {
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + ((i * 3) % 11) as f64).collect();

        let sqlite = seeded_sqlite(&closes);
        let mock = MockBarStore::new().with_bars("AAPL", make_bars("AAPL", &closes));

        let run = |store: &dyn BarStore| {
            let feed = Feed::open(store, "AAPL", minute(0), minute(500), 8).unwrap();
            let mut engine = Engine::new(feed, Box::new(SmaCrossover::new(3, 8, 50)), 50_000.0);
            engine.run().unwrap();
            (
                engine.portfolio().trade_log().to_vec(),
                engine.portfolio().equity_curve().to_vec(),
            )
        };

        let (sqlite_trades, sqlite_curve) = run(&sqlite);
        let (mock_trades, mock_curve) = run(&mock);
        assert_eq!(sqlite_trades, mock_trades);
        assert_eq!(sqlite_curve, mock_curve);
    }

    #[test]
    fn config_driven_run_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("bars.sqlite");
        let config_path = dir.path().join("tapetrader.ini");

        std::fs::write(
            &config_path,
            format!(
                "[sqlite]\npath = {}\n\n\
                 [feed]\nchunk_size = 8\n\n\
                 [backtest]\nstart = 2024-01-01\nend = 2024-06-30\ninitial_cash = 10000\n\n\
                 [universe]\nsymbols = AAPL\n",
                db_path.display()
            ),
        )
        .unwrap();

        let adapter = cli::load_config(&config_path).unwrap_or_else(|_| panic!("config loads"));
        let store = SqliteStore::from_config(&adapter).unwrap();
        store.initialize_schema().unwrap();
        store
            .insert_bars(&make_bars("AAPL", &[100.0, 105.0, 110.0]))
            .unwrap();

        let (start, end) = cli::parse_date_range(&adapter).unwrap();
        let batch = cli::build_batch_config(&adapter).unwrap();
        let strategy = cli::build_strategy(&adapter).unwrap();

        let feed = Feed::open(&store, "AAPL", start, end, batch.chunk_size).unwrap();
        let mut engine = Engine::new(feed, strategy, batch.initial_cash);
        let report = engine.run().unwrap();

        assert_eq!(engine.state(), EngineState::Finished);
        assert_eq!(report.strategy, "buy_and_hold");
        assert!((report.metrics.total_return_pct - 10.0).abs() < 1e-9);
    }
}

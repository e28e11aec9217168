//! CLI definition and dispatch.
//!
//! The CLI is glue: it loads configuration, wires adapters to the engine and
//! prints results. All simulation semantics live in [`crate::domain`].

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::domain::analyzer::RankMetric;
use crate::domain::engine::{BatchConfig, Report};
use crate::domain::error::TapetraderError;
use crate::domain::feed::DEFAULT_CHUNK_SIZE;
use crate::domain::strategy::{BuyAndHold, SmaCrossover, Strategy};
use crate::ports::config_port::ConfigPort;

#[derive(Parser, Debug)]
#[command(name = "tapetrader", about = "Bar-replay strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a single-symbol backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Override the configured symbol
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Run every configured symbol and rank the results
    Rank {
        #[arg(short, long)]
        config: PathBuf,
        /// Write the ranking table to a CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List symbols available in the store
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the stored data range for a symbol
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    #[cfg(feature = "sqlite")]
    {
        dispatch(cli)
    }
    #[cfg(not(feature = "sqlite"))]
    {
        let _ = cli;
        eprintln!("error: the sqlite feature is required for the CLI");
        ExitCode::from(1)
    }
}

#[cfg(feature = "sqlite")]
fn dispatch(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest { config, symbol } => run_backtest(&config, symbol.as_deref()),
        Command::Rank { config, output } => run_rank(&config, output.as_deref()),
        Command::ListSymbols { config } => run_list_symbols(&config),
        Command::Info { config, symbol } => run_info(&config, &symbol),
    }
}

pub fn load_config(
    path: &PathBuf,
) -> Result<crate::adapters::file_config_adapter::FileConfigAdapter, ExitCode> {
    crate::adapters::file_config_adapter::FileConfigAdapter::from_file(path).map_err(|e| {
        let err = TapetraderError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Inclusive date range from `[backtest] start`/`end`: the start date opens
/// at midnight, the end date runs to the final second of the day.
pub fn parse_date_range(
    adapter: &dyn ConfigPort,
) -> Result<(DateTime<Utc>, DateTime<Utc>), TapetraderError> {
    let start = parse_date(adapter, "start")?
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always valid")
        .and_utc();
    let end = parse_date(adapter, "end")?
        .and_hms_opt(23, 59, 59)
        .expect("23:59:59 is always valid")
        .and_utc();

    if end < start {
        return Err(TapetraderError::ConfigInvalid {
            section: "backtest".into(),
            key: "end".into(),
            reason: "end date precedes start date".into(),
        });
    }
    Ok((start, end))
}

fn parse_date(adapter: &dyn ConfigPort, key: &str) -> Result<NaiveDate, TapetraderError> {
    let raw = adapter
        .get_string("backtest", key)
        .ok_or_else(|| TapetraderError::ConfigMissing {
            section: "backtest".into(),
            key: key.into(),
        })?;

    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| TapetraderError::ConfigInvalid {
        section: "backtest".into(),
        key: key.into(),
        reason: "invalid date format (expected YYYY-MM-DD)".into(),
    })
}

pub fn build_batch_config(adapter: &dyn ConfigPort) -> Result<BatchConfig, TapetraderError> {
    let rank_by = match adapter.get_string("backtest", "rank_by") {
        Some(raw) => raw
            .parse::<RankMetric>()
            .map_err(|reason| TapetraderError::ConfigInvalid {
                section: "backtest".into(),
                key: "rank_by".into(),
                reason,
            })?,
        None => RankMetric::TotalReturn,
    };

    Ok(BatchConfig {
        initial_cash: adapter.get_double("backtest", "initial_cash", 100_000.0),
        chunk_size: adapter
            .get_int("feed", "chunk_size", DEFAULT_CHUNK_SIZE as i64)
            .max(1) as usize,
        rank_by,
        fail_fast: adapter.get_bool("backtest", "fail_fast", false),
    })
}

/// Comma-separated symbol list from `[universe] symbols`: trimmed,
/// uppercased, duplicates rejected.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, TapetraderError> {
    let invalid = |reason: String| TapetraderError::ConfigInvalid {
        section: "universe".into(),
        key: "symbols".into(),
        reason,
    };

    let mut symbols = Vec::new();
    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty token in symbol list".into()));
        }
        let symbol = trimmed.to_uppercase();
        if symbols.contains(&symbol) {
            return Err(invalid(format!("duplicate symbol: {symbol}")));
        }
        symbols.push(symbol);
    }
    Ok(symbols)
}

pub fn build_strategy(adapter: &dyn ConfigPort) -> Result<Box<dyn Strategy>, TapetraderError> {
    let name = adapter
        .get_string("strategy", "name")
        .unwrap_or_else(|| "buy_and_hold".to_string());

    match name.as_str() {
        "buy_and_hold" => Ok(Box::new(BuyAndHold::new())),
        "sma_crossover" => {
            let fast = adapter.get_int("strategy", "fast", 10);
            let slow = adapter.get_int("strategy", "slow", 20);
            let trade_size = adapter.get_int("strategy", "trade_size", 100);
            if fast < 1 || fast >= slow {
                return Err(TapetraderError::ConfigInvalid {
                    section: "strategy".into(),
                    key: "fast".into(),
                    reason: format!("fast period {fast} must be in 1..{slow}"),
                });
            }
            if trade_size <= 0 {
                return Err(TapetraderError::ConfigInvalid {
                    section: "strategy".into(),
                    key: "trade_size".into(),
                    reason: "trade size must be positive".into(),
                });
            }
            Ok(Box::new(SmaCrossover::new(
                fast as usize,
                slow as usize,
                trade_size,
            )))
        }
        other => Err(TapetraderError::ConfigInvalid {
            section: "strategy".into(),
            key: "name".into(),
            reason: format!("unknown strategy: {other}"),
        }),
    }
}

fn print_report(report: &Report) {
    let m = &report.metrics;
    println!("{} | {} | {} bars", report.symbol, report.strategy, report.bars);
    println!("  final equity   : {:.2}", m.final_equity);
    println!("  total return   : {:+.2}%", m.total_return_pct);
    println!("  CAGR           : {:+.2}%", m.cagr_pct);
    println!("  Sharpe         : {:.3}", m.sharpe);
    println!("  max drawdown   : {:.2}%", m.max_drawdown_pct);
    println!("  volatility     : {:.2}%", m.volatility_pct);
    println!("  win rate       : {:.1}%", m.win_rate_pct);
    println!("  profit factor  : {:.2}", m.profit_factor);
    println!("  trades         : {}", m.num_trades);
}

#[cfg(feature = "sqlite")]
fn run_backtest(config_path: &PathBuf, symbol_override: Option<&str>) -> ExitCode {
    use crate::adapters::sqlite_store::SqliteStore;
    use crate::domain::engine::Engine;
    use crate::domain::feed::Feed;

    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let staged = || -> Result<Report, TapetraderError> {
        let (start, end) = parse_date_range(&adapter)?;
        let batch = build_batch_config(&adapter)?;
        let strategy = build_strategy(&adapter)?;

        let symbol = match symbol_override {
            Some(s) => s.to_uppercase(),
            None => {
                let raw = adapter.get_string("universe", "symbols").ok_or_else(|| {
                    TapetraderError::ConfigMissing {
                        section: "universe".into(),
                        key: "symbols".into(),
                    }
                })?;
                parse_symbols(&raw)?
                    .into_iter()
                    .next()
                    .expect("parse_symbols rejects empty lists")
            }
        };

        let store = SqliteStore::from_config(&adapter)?;
        let feed = Feed::open(&store, &symbol, start, end, batch.chunk_size)?;
        Engine::new(feed, strategy, batch.initial_cash).run()
    };

    match staged() {
        Ok(report) => {
            print_report(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

#[cfg(feature = "sqlite")]
fn run_rank(config_path: &PathBuf, output: Option<&std::path::Path>) -> ExitCode {
    use crate::adapters::csv_report_adapter::CsvReportAdapter;
    use crate::adapters::sqlite_store::SqliteStore;
    use crate::domain::engine::run_multiple;
    use crate::ports::report_port::ReportPort;

    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let staged = || -> Result<(), TapetraderError> {
        let (start, end) = parse_date_range(&adapter)?;
        let batch = build_batch_config(&adapter)?;

        let raw = adapter.get_string("universe", "symbols").ok_or_else(|| {
            TapetraderError::ConfigMissing {
                section: "universe".into(),
                key: "symbols".into(),
            }
        })?;
        let symbols = parse_symbols(&raw)?;

        // Validate the strategy config once up front; the factory then
        // hands each run a fresh instance.
        build_strategy(&adapter)?;
        let factory =
            || build_strategy(&adapter).expect("strategy config validated before the batch");

        let store = SqliteStore::from_config(&adapter)?;
        let outcome = run_multiple(&store, &symbols, &factory, start, end, &batch)?;

        println!(
            "{:<8} {:<16} {:>10} {:>10} {:>8} {:>10} {:>7}",
            "symbol", "strategy", "return%", "cagr%", "sharpe", "max_dd%", "trades"
        );
        for report in &outcome.ranked {
            let m = &report.metrics;
            println!(
                "{:<8} {:<16} {:>10.2} {:>10.2} {:>8.3} {:>10.2} {:>7}",
                report.symbol,
                report.strategy,
                m.total_return_pct,
                m.cagr_pct,
                m.sharpe,
                m.max_drawdown_pct,
                m.num_trades
            );
        }
        for failed in &outcome.failed {
            eprintln!("skipped {}: {}", failed.symbol, failed.error);
        }

        if let Some(path) = output {
            CsvReportAdapter::new().write_ranking(&outcome.ranked, path)?;
            eprintln!("ranking written to {}", path.display());
        }
        Ok(())
    };

    match staged() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

#[cfg(feature = "sqlite")]
fn run_list_symbols(config_path: &PathBuf) -> ExitCode {
    use crate::adapters::sqlite_store::SqliteStore;
    use crate::ports::bar_store::BarStore;

    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let staged = || -> Result<(), TapetraderError> {
        let store = SqliteStore::from_config(&adapter)?;
        for symbol in store.list_symbols().map_err(TapetraderError::from)? {
            println!("{symbol}");
        }
        Ok(())
    };

    match staged() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

#[cfg(feature = "sqlite")]
fn run_info(config_path: &PathBuf, symbol: &str) -> ExitCode {
    use crate::adapters::sqlite_store::SqliteStore;
    use crate::ports::bar_store::BarStore;

    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let symbol = symbol.to_uppercase();
    let staged = || -> Result<(), TapetraderError> {
        let store = SqliteStore::from_config(&adapter)?;
        match store.symbol_range(&symbol).map_err(TapetraderError::from)? {
            Some((first, last, count)) => {
                println!("{symbol}: {count} bars from {first} to {last}");
            }
            None => println!("{symbol}: no data"),
        }
        Ok(())
    };

    match staged() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

//! CSV ranking report adapter.
//!
//! One row per completed run, in ranked order, matching the tabular result
//! the batch interface exposes.

use crate::domain::engine::Report;
use crate::domain::error::TapetraderError;
use crate::ports::report_port::ReportPort;
use std::path::Path;

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

fn report_err(err: csv::Error) -> TapetraderError {
    TapetraderError::Report {
        reason: err.to_string(),
    }
}

impl ReportPort for CsvReportAdapter {
    fn write_ranking(&self, reports: &[Report], output_path: &Path) -> Result<(), TapetraderError> {
        let mut writer = csv::Writer::from_path(output_path).map_err(report_err)?;

        writer
            .write_record([
                "symbol",
                "strategy",
                "total_return_pct",
                "cagr_pct",
                "sharpe",
                "max_drawdown_pct",
                "num_trades",
                "win_rate_pct",
                "profit_factor",
                "final_equity",
            ])
            .map_err(report_err)?;

        for report in reports {
            let m = &report.metrics;
            writer
                .write_record([
                    report.symbol.clone(),
                    report.strategy.clone(),
                    format!("{:.4}", m.total_return_pct),
                    format!("{:.4}", m.cagr_pct),
                    format!("{:.4}", m.sharpe),
                    format!("{:.4}", m.max_drawdown_pct),
                    m.num_trades.to_string(),
                    format!("{:.2}", m.win_rate_pct),
                    format!("{:.4}", m.profit_factor),
                    format!("{:.2}", m.final_equity),
                ])
                .map_err(report_err)?;
        }

        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analyzer::Metrics;

    fn report(symbol: &str, total_return_pct: f64) -> Report {
        Report {
            symbol: symbol.to_string(),
            strategy: "buy_and_hold".to_string(),
            bars: 10,
            metrics: Metrics {
                final_equity: 11_000.0,
                total_return_pct,
                cagr_pct: 12.0,
                sharpe: 1.5,
                volatility_pct: 8.0,
                max_drawdown_pct: -3.5,
                num_trades: 2,
                win_rate_pct: 100.0,
                profit_factor: 2.0,
            },
        }
    }

    #[test]
    fn writes_header_and_rows_in_ranked_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ranking.csv");

        let reports = vec![report("NVDA", 30.0), report("AAPL", 10.0)];
        CsvReportAdapter::new()
            .write_ranking(&reports, &path)
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("symbol,strategy,total_return_pct"));
        assert!(lines[1].starts_with("NVDA,buy_and_hold,30.0000"));
        assert!(lines[2].starts_with("AAPL,buy_and_hold,10.0000"));
    }

    #[test]
    fn empty_ranking_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ranking.csv");

        CsvReportAdapter::new().write_ranking(&[], &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn unwritable_path_surfaces_report_error() {
        let err = CsvReportAdapter::new()
            .write_ranking(&[], Path::new("/nonexistent/dir/out.csv"))
            .unwrap_err();
        assert!(matches!(err, TapetraderError::Report { .. }));
    }
}

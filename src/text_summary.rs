//! Text summary builder for CLI output.
//!
//! Formats human-readable lines for a finished back test.

use crate::model::BacktestReport;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.2}")).unwrap_or_else(|| "-".into())
}

/// Build a text summary from a completed run.
pub(crate) fn build_text_summary(report: &BacktestReport) -> TextSummary {
    let mut lines = Vec::new();

    lines.push(format!("Strategy: {}", report.strategy));
    lines.push(format!("Data file: {}", report.data_file.display()));
    lines.push(format!(
        "Snapshots: {} in {}",
        report.snapshots,
        humantime::format_duration(std::time::Duration::from_millis(
            report.elapsed.as_millis() as u64
        ))
    ));
    lines.push(format!(
        "Trades: {} (won {}, win rate {})",
        report.trades.len(),
        report.winning_trades,
        report
            .win_rate()
            .map(|r| format!("{:.1}%", r * 100.0))
            .unwrap_or_else(|| "-".into())
    ));
    lines.push(format!(
        "Net PnL: {:.2}  Max drawdown: {:.2}",
        report.net_pnl, report.max_drawdown
    ));
    let s = &report.trade_stats;
    lines.push(format!(
        "Per trade: avg {} med {} p25 {} p75 {}",
        fmt_opt(s.mean),
        fmt_opt(s.median),
        fmt_opt(s.p25),
        fmt_opt(s.p75)
    ));

    TextSummary { lines }
}

use crate::model::{Trade, TradeStats};

/// Compute metrics (mean, median, 25th percentile, 75th percentile) from samples
pub fn compute_metrics(samples: &[f64]) -> Option<(f64, f64, f64, f64)> {
    if samples.len() < 2 {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    let median = sorted[n / 2];
    let p25 = sorted[n / 4];
    let p75 = sorted[3 * n / 4];
    Some((mean, median, p25, p75))
}

/// Per-trade PnL distribution.
pub fn trade_stats(trades: &[Trade]) -> TradeStats {
    let pnl: Vec<f64> = trades.iter().map(|t| t.pnl).collect();
    match compute_metrics(&pnl) {
        Some((mean, median, p25, p75)) => TradeStats {
            mean: Some(mean),
            median: Some(median),
            p25: Some(p25),
            p75: Some(p75),
        },
        None => TradeStats {
            mean: pnl.first().copied(),
            ..Default::default()
        },
    }
}

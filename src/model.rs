use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use time::PrimitiveDateTime;

/// Parameters for the built-in strategy and the replay loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub fast_period: usize,
    pub slow_period: usize,
    /// Contracts held while in a position.
    pub quantity: i64,
    /// Currency value of one point of price movement per contract.
    pub multiplier: f64,
    /// Minimum absolute depth balance required to enter a position.
    #[serde(default)]
    pub min_balance: Option<f64>,
    /// Emit a progress update every N snapshots.
    pub progress_every: u64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            fast_period: 10,
            slow_period: 30,
            quantity: 1,
            multiplier: 1.0,
            min_balance: None,
            progress_every: 1_000,
        }
    }
}

/// A request to run one backtest, handed to the launcher by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub file_path: PathBuf,
    pub run_id: String,
}

/// Progress reported by the runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub completed: u64,
    pub total: u64,
    pub label: String,
}

impl ProgressUpdate {
    pub fn new(completed: u64, total: u64, label: impl Into<String>) -> Self {
        Self {
            completed,
            total,
            label: label.into(),
        }
    }

    /// Whole percentage, truncated and clamped to 0..=100.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let pct = (self.completed as u128 * 100) / self.total as u128;
        pct.min(100) as u8
    }

    /// Text painted over the progress bar.
    pub fn percent_text(&self) -> String {
        format!("{}%", self.percent())
    }
}

/// Events posted by the background runner onto the dialog's queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RunEvent {
    /// Free-form status; resets the bar to zero.
    Status(String),
    Progress(ProgressUpdate),
    Completed {
        // Boxed so the queue carries small messages while progress is streaming.
        report: Box<BacktestReport>,
    },
    Failed(String),
    Cancelled,
}

/// One row of recorded market depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketSnapshot {
    pub time: PrimitiveDateTime,
    /// Depth balance in percent, bid-heavy positive.
    pub balance: f64,
    pub price: f64,
    pub volume: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

/// A closed round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub side: Side,
    pub quantity: i64,
    pub entry_price: f64,
    pub exit_price: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub entry_time: time::OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub exit_time: time::OffsetDateTime,
    pub pnl: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeStats {
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub p25: Option<f64>,
    pub p75: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    #[serde(default)]
    pub timestamp_utc: String,
    pub run_id: String,
    pub strategy: String,
    pub data_file: PathBuf,
    pub config: StrategyConfig,
    pub snapshots: u64,
    pub trades: Vec<Trade>,
    pub net_pnl: f64,
    pub max_drawdown: f64,
    pub winning_trades: usize,
    pub trade_stats: TradeStats,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
}

impl BacktestReport {
    /// Fraction of closed trades with positive PnL.
    pub fn win_rate(&self) -> Option<f64> {
        if self.trades.is_empty() {
            None
        } else {
            Some(self.winning_trades as f64 / self.trades.len() as f64)
        }
    }
}

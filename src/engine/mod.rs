mod history;
mod position;
pub mod strategy;

use crate::model::{BacktestReport, ProgressUpdate, RunEvent, RunRequest, StrategyConfig};
use anyhow::{bail, Result};
use std::time::Instant;
use strategy::Strategy;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

pub(crate) const RUNNING_LABEL: &str = "Running back test";

#[derive(Debug, Clone)]
pub enum EngineControl {
    /// Stop at the next snapshot boundary
    Cancel,
}

/// Non-blocking view of the control channel, polled between units of work.
pub(crate) struct CancelWatch {
    control_rx: mpsc::UnboundedReceiver<EngineControl>,
    cancelled: bool,
}

impl CancelWatch {
    pub fn new(control_rx: mpsc::UnboundedReceiver<EngineControl>) -> Self {
        Self {
            control_rx,
            cancelled: false,
        }
    }

    /// A dropped control sender counts as a cancel: nobody is left to read the result.
    pub fn is_cancelled(&mut self) -> bool {
        if !self.cancelled {
            match self.control_rx.try_recv() {
                Ok(EngineControl::Cancel) | Err(TryRecvError::Disconnected) => {
                    self.cancelled = true;
                }
                Err(TryRecvError::Empty) => {}
            }
        }
        self.cancelled
    }
}

pub enum RunOutcome {
    Finished(Box<BacktestReport>),
    Cancelled,
}

pub struct BacktestEngine {
    request: RunRequest,
    cfg: StrategyConfig,
    strategy: Box<dyn Strategy>,
}

impl BacktestEngine {
    pub fn new(request: RunRequest, cfg: StrategyConfig, strategy: Box<dyn Strategy>) -> Self {
        Self {
            request,
            cfg,
            strategy,
        }
    }

    /// Load the data file and replay it through the strategy. Blocking; run it off the UI thread.
    pub fn run(
        mut self,
        event_tx: &mpsc::UnboundedSender<RunEvent>,
        control_rx: mpsc::UnboundedReceiver<EngineControl>,
    ) -> Result<RunOutcome> {
        let started = Instant::now();
        let mut cancel = CancelWatch::new(control_rx);
        let progress_every = self.cfg.progress_every.max(1);

        let _ = event_tx.send(RunEvent::Status("Reading historical data file...".into()));
        let snapshots = match history::load_snapshots(history::LoadParams {
            path: &self.request.file_path,
            progress_every,
            event_tx,
            cancel: &mut cancel,
        })? {
            Some(s) => s,
            None => return Ok(RunOutcome::Cancelled),
        };
        let Some(last) = snapshots.last().copied() else {
            bail!(
                "Historical file \"{}\" contains no market data.",
                self.request.file_path.display()
            );
        };
        tracing::debug!(
            run_id = %self.request.run_id,
            snapshots = snapshots.len(),
            "historical data loaded"
        );

        let _ = event_tx.send(RunEvent::Status("Running back test...".into()));
        let total = snapshots.len() as u64;
        let mut tracker = position::PositionTracker::new(self.cfg.multiplier);
        for (i, snapshot) in snapshots.iter().enumerate() {
            if cancel.is_cancelled() {
                return Ok(RunOutcome::Cancelled);
            }
            let target = self.strategy.on_snapshot(snapshot);
            tracker.update(target, snapshot);

            let done = i as u64 + 1;
            if done % progress_every == 0 || done == total {
                let _ = event_tx.send(RunEvent::Progress(ProgressUpdate::new(
                    done,
                    total,
                    RUNNING_LABEL,
                )));
            }
        }
        tracker.close(&last);

        let net_pnl = tracker.realized();
        let max_drawdown = tracker.max_drawdown();
        let trades = tracker.into_trades();
        let winning_trades = trades.iter().filter(|t| t.pnl > 0.0).count();
        let trade_stats = crate::metrics::trade_stats(&trades);

        Ok(RunOutcome::Finished(Box::new(BacktestReport {
            timestamp_utc: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_else(|_| "now".into()),
            run_id: self.request.run_id,
            strategy: self.strategy.name().to_string(),
            data_file: self.request.file_path,
            config: self.cfg,
            snapshots: total,
            trades,
            net_pnl,
            max_drawdown,
            winning_trades,
            trade_stats,
            elapsed: started.elapsed(),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::strategy::MovingAverageCrossover;
    use super::*;
    use std::io::Write;

    fn data_file(prices: &[f64]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        for (i, p) in prices.iter().enumerate() {
            writeln!(f, "010524,0930{:02},10,{p},5", i % 60).unwrap();
        }
        f
    }

    fn engine(path: &std::path::Path, cfg: StrategyConfig) -> BacktestEngine {
        let request = RunRequest {
            file_path: path.to_path_buf(),
            run_id: "test".into(),
        };
        let strategy = Box::new(MovingAverageCrossover::new(&cfg));
        BacktestEngine::new(request, cfg, strategy)
    }

    fn cfg() -> StrategyConfig {
        StrategyConfig {
            fast_period: 2,
            slow_period: 3,
            progress_every: 2,
            ..Default::default()
        }
    }

    #[test]
    fn replay_produces_report_and_progress() {
        let f = data_file(&[100.0, 101.0, 102.0, 103.0, 104.0, 100.0, 96.0]);
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (_ctrl_tx, ctrl_rx) = mpsc::unbounded_channel();

        let outcome = engine(f.path(), cfg()).run(&event_tx, ctrl_rx).unwrap();
        let RunOutcome::Finished(report) = outcome else {
            panic!("expected a finished run");
        };
        assert_eq!(report.snapshots, 7);
        assert_eq!(report.strategy, "MA crossover 2/3");
        assert!(!report.trades.is_empty());
        assert_eq!(report.trades[0].entry_price, 102.0);

        let mut running = Vec::new();
        while let Ok(ev) = event_rx.try_recv() {
            if let RunEvent::Progress(p) = ev {
                if p.label == RUNNING_LABEL {
                    running.push(p.completed);
                }
            }
        }
        assert_eq!(running, vec![2, 4, 6, 7]);
    }

    #[test]
    fn cancel_stops_the_replay() {
        let f = data_file(&[100.0, 101.0, 102.0]);
        let (event_tx, _event_rx) = mpsc::unbounded_channel();
        let (ctrl_tx, ctrl_rx) = mpsc::unbounded_channel();
        ctrl_tx.send(EngineControl::Cancel).unwrap();

        let outcome = engine(f.path(), cfg()).run(&event_tx, ctrl_rx).unwrap();
        assert!(matches!(outcome, RunOutcome::Cancelled));
    }

    #[test]
    fn empty_file_fails() {
        let f = data_file(&[]);
        let (event_tx, _event_rx) = mpsc::unbounded_channel();
        let (_ctrl_tx, ctrl_rx) = mpsc::unbounded_channel();

        let err = engine(f.path(), cfg()).run(&event_tx, ctrl_rx).err().unwrap();
        assert!(err.to_string().contains("contains no market data"));
    }

    #[test]
    fn closed_event_queue_is_not_an_error() {
        let f = data_file(&[100.0, 101.0, 102.0, 103.0]);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        drop(event_rx);
        let (_ctrl_tx, ctrl_rx) = mpsc::unbounded_channel();

        let outcome = engine(f.path(), cfg()).run(&event_tx, ctrl_rx).unwrap();
        assert!(matches!(outcome, RunOutcome::Finished(_)));
    }
}

//! Background runner handles.
//!
//! The controller talks to runs only through these traits so tests can substitute a fake.

use crate::engine::strategy::MovingAverageCrossover;
use crate::engine::{BacktestEngine, EngineControl, RunOutcome};
use crate::model::{RunEvent, RunRequest, StrategyConfig};
use anyhow::{bail, Result};
use tokio::sync::mpsc::{self, UnboundedSender};

/// Handle to an in-flight run.
pub trait BackgroundRunner {
    /// Ask the run to stop. Must not block waiting for it to do so.
    fn cancel(&mut self);
}

/// Starts runs. `events` is the dialog's dispatch queue; sends after the dialog is gone are dropped.
pub trait RunLauncher {
    type Runner: BackgroundRunner;

    fn launch(&self, request: RunRequest, events: UnboundedSender<RunEvent>) -> Result<Self::Runner>;
}

/// Control handle for a run spawned by [`EngineLauncher`].
pub struct RunCtx {
    ctrl_tx: UnboundedSender<EngineControl>,
}

impl BackgroundRunner for RunCtx {
    fn cancel(&mut self) {
        let _ = self.ctrl_tx.send(EngineControl::Cancel);
    }
}

/// Runs [`BacktestEngine`] on the tokio blocking pool.
pub struct EngineLauncher {
    cfg: StrategyConfig,
    runtime: tokio::runtime::Handle,
}

impl EngineLauncher {
    pub fn new(cfg: StrategyConfig, runtime: tokio::runtime::Handle) -> Self {
        Self { cfg, runtime }
    }
}

/// Longest moving-average window accepted, in snapshots.
const MAX_PERIOD: usize = 1_000_000;

fn check_config(cfg: &StrategyConfig) -> Result<()> {
    if cfg.fast_period == 0 {
        bail!("fast period must be at least 1");
    }
    if cfg.slow_period > MAX_PERIOD {
        bail!("slow period ({}) must be at most {MAX_PERIOD}", cfg.slow_period);
    }
    if cfg.slow_period <= cfg.fast_period {
        bail!(
            "slow period ({}) must be greater than fast period ({})",
            cfg.slow_period,
            cfg.fast_period
        );
    }
    if cfg.quantity < 1 {
        bail!("quantity must be at least 1");
    }
    if cfg.progress_every == 0 {
        bail!("progress interval must be at least 1");
    }
    Ok(())
}

impl RunLauncher for EngineLauncher {
    type Runner = RunCtx;

    fn launch(&self, request: RunRequest, events: UnboundedSender<RunEvent>) -> Result<RunCtx> {
        check_config(&self.cfg)?;
        let (ctrl_tx, ctrl_rx) = mpsc::unbounded_channel::<EngineControl>();
        let strategy = Box::new(MovingAverageCrossover::new(&self.cfg));
        let engine = BacktestEngine::new(request.clone(), self.cfg.clone(), strategy);

        // Fire and forget: completion is observed through `events`, never by joining.
        let _ = self.runtime.spawn_blocking(move || {
            let event = match engine.run(&events, ctrl_rx) {
                Ok(RunOutcome::Finished(report)) => {
                    tracing::info!(
                        run_id = %request.run_id,
                        trades = report.trades.len(),
                        net_pnl = report.net_pnl,
                        "back test finished"
                    );
                    RunEvent::Completed { report }
                }
                Ok(RunOutcome::Cancelled) => {
                    tracing::info!(run_id = %request.run_id, "back test cancelled");
                    RunEvent::Cancelled
                }
                Err(e) => {
                    tracing::warn!(run_id = %request.run_id, "back test failed: {e:#}");
                    RunEvent::Failed(format!("{e:#}"))
                }
            };
            let _ = events.send(event);
        });

        Ok(RunCtx { ctrl_tx })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn request(path: &std::path::Path) -> RunRequest {
        RunRequest {
            file_path: path.to_path_buf(),
            run_id: "r1".into(),
        }
    }

    #[test]
    fn bad_config_fails_to_launch() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let launcher = EngineLauncher::new(
            StrategyConfig {
                fast_period: 5,
                slow_period: 5,
                ..Default::default()
            },
            rt.handle().clone(),
        );
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = launcher
            .launch(request(std::path::Path::new("unused.csv")), tx)
            .err()
            .unwrap();
        assert!(err.to_string().contains("slow period"));
    }

    #[test]
    fn oversized_period_fails_to_launch() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let launcher = EngineLauncher::new(
            StrategyConfig {
                fast_period: 10,
                slow_period: usize::MAX,
                ..Default::default()
            },
            rt.handle().clone(),
        );
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = launcher
            .launch(request(std::path::Path::new("unused.csv")), tx)
            .err()
            .unwrap();
        assert!(err.to_string().contains("must be at most"), "{err}");
    }

    #[tokio::test]
    async fn launched_run_reports_completion() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        for (i, p) in [100.0, 101.0, 102.0, 103.0].iter().enumerate() {
            writeln!(f, "010524,09300{i},0,{p},1").unwrap();
        }
        let cfg = StrategyConfig {
            fast_period: 1,
            slow_period: 2,
            ..Default::default()
        };
        let launcher = EngineLauncher::new(cfg, tokio::runtime::Handle::current());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _runner = launcher.launch(request(f.path()), tx).unwrap();

        let mut saw_progress = false;
        loop {
            match rx.recv().await.unwrap() {
                RunEvent::Progress(_) => saw_progress = true,
                RunEvent::Completed { report } => {
                    assert_eq!(report.snapshots, 4);
                    break;
                }
                RunEvent::Status(_) => {}
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert!(saw_progress);
    }

    #[tokio::test]
    async fn missing_file_reports_failure() {
        let launcher =
            EngineLauncher::new(StrategyConfig::default(), tokio::runtime::Handle::current());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _runner = launcher
            .launch(request(std::path::Path::new("/nonexistent/data.csv")), tx)
            .unwrap();

        loop {
            match rx.recv().await.unwrap() {
                RunEvent::Failed(msg) => {
                    assert!(msg.contains("/nonexistent/data.csv"), "{msg}");
                    break;
                }
                RunEvent::Status(_) => {}
                other => panic!("unexpected event {other:?}"),
            }
        }
    }
}

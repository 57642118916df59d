use crate::model::StrategyConfig;
use crate::orchestrator::{self, BacktestDialog, DialogState, EngineLauncher, View};
use crate::preferences::FilePreferences;
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
pub(crate) enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "backtest-dialog",
    version,
    about = "Replay historical market data through a trading strategy"
)]
pub struct Cli {
    /// Historical data file (overrides the last file used)
    #[arg(long)]
    pub data_file: Option<PathBuf>,

    /// Preferences file (defaults to the platform config directory)
    #[arg(long)]
    pub prefs: Option<PathBuf>,

    /// Run immediately without the terminal dialog; Ctrl-C cancels
    #[arg(long)]
    pub headless: bool,

    /// Fast moving average period, in snapshots
    #[arg(long, default_value_t = 10)]
    pub fast_period: usize,

    /// Slow moving average period, in snapshots
    #[arg(long, default_value_t = 30)]
    pub slow_period: usize,

    /// Contracts per position
    #[arg(long, default_value_t = 1)]
    pub quantity: i64,

    /// Currency value of one price point per contract
    #[arg(long, default_value_t = 1.0)]
    pub multiplier: f64,

    /// Only enter positions when |depth balance| is at least this much
    #[arg(long)]
    pub min_balance: Option<f64>,

    /// Report progress every N snapshots
    #[arg(long, default_value_t = 1_000)]
    pub progress_every: u64,

    /// Terminal redraw interval
    #[arg(long, default_value = "100ms")]
    pub tick_rate: humantime::Duration,

    /// Export the finished run's report as JSON
    #[arg(long)]
    pub export_json: Option<PathBuf>,
}

impl Cli {
    /// Whether this invocation drives the terminal dialog.
    pub fn uses_tui(&self) -> bool {
        !self.headless && cfg!(feature = "tui")
    }
}

/// Build a `StrategyConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> StrategyConfig {
    StrategyConfig {
        fast_period: args.fast_period,
        slow_period: args.slow_period,
        quantity: args.quantity,
        multiplier: args.multiplier,
        min_balance: args.min_balance,
        progress_every: args.progress_every,
    }
}

pub(crate) fn open_preferences(args: &Cli) -> Result<FilePreferences> {
    let path = match args.prefs.clone() {
        Some(p) => p,
        None => crate::preferences::default_path()?,
    };
    let prefs = FilePreferences::open(path)?;
    tracing::debug!(path = %prefs.path().display(), "preferences loaded");
    Ok(prefs)
}

/// Run the dialog and return the state it finished in.
pub async fn run(args: Cli) -> Result<DialogState> {
    if args.uses_tui() {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
    }
    run_headless(args).await
}

/// Line-oriented view for scripted runs.
struct HeadlessView {
    out: mpsc::UnboundedSender<OutputLine>,
    last_progress: Option<(String, String)>,
}

impl HeadlessView {
    fn new(out: mpsc::UnboundedSender<OutputLine>) -> Self {
        Self {
            out,
            last_progress: None,
        }
    }
}

impl View for HeadlessView {
    fn set_field(&mut self, text: &str) {
        if !text.is_empty() {
            let _ = self
                .out
                .send(OutputLine::Stderr(format!("Historical data file: {text}")));
        }
    }

    fn set_progress(&mut self, label: &str, _percent: u8, text: &str) {
        let next = (label.to_string(), text.to_string());
        if self.last_progress.as_ref() == Some(&next) {
            return;
        }
        let line = if label.is_empty() {
            text.to_string()
        } else {
            format!("{label}: {text}")
        };
        let _ = self.out.send(OutputLine::Stderr(line));
        self.last_progress = Some(next);
    }

    fn set_progress_visible(&mut self, _visible: bool) {}

    fn set_buttons_enabled(&mut self, _submit: bool, _cancel: bool) {}

    fn show_error(&mut self, message: &str) {
        let _ = self.out.send(OutputLine::Stderr(format!("Error: {message}")));
    }

    fn close(&mut self) {}
}

async fn run_headless(args: Cli) -> Result<DialogState> {
    let prefs = open_preferences(&args)?;
    let launcher = EngineLauncher::new(build_config(&args), tokio::runtime::Handle::current());
    let (out_tx, out_handle) = spawn_output_writer();

    let mut dialog = BacktestDialog::new(HeadlessView::new(out_tx.clone()), prefs, launcher);
    if let Some(p) = args.data_file.as_deref() {
        dialog.set_field_text(&p.to_string_lossy());
    }
    let file = dialog.field().to_string();
    if file.is_empty() {
        bail!("no historical data file; pass --data-file");
    }

    // Errors are already shown by the view; the final state carries the outcome.
    if dialog.submit(&file).is_ok() {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        while !dialog.state().is_terminal() {
            tokio::select! {
                _ = dialog.dispatch_next() => {}
                res = &mut ctrl_c => {
                    res.context("listen for Ctrl-C")?;
                    let _ = out_tx.send(OutputLine::Stderr("Cancelling…".into()));
                    dialog.cancel();
                }
            }
        }
    }

    let state = dialog.state();
    if let Some(report) = dialog.take_report() {
        let processed = orchestrator::process_run_completion(&args, &report);
        for line in processed.summary {
            let _ = out_tx.send(OutputLine::Stdout(line));
        }
        for msg in processed.export_messages {
            let _ = out_tx.send(OutputLine::Stderr(msg));
        }
    }

    drop(dialog);
    drop(out_tx);
    let _ = out_handle.await;
    Ok(state)
}

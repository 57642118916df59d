mod cli;
mod engine;
mod error;
mod metrics;
mod model;
mod orchestrator;
mod preferences;
mod text_summary;
#[cfg(feature = "tui")]
mod tui;

use anyhow::{Context, Result};
use clap::Parser;
use orchestrator::DialogState;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    if let Err(e) = init_tracing(&args) {
        eprintln!("warning: logging disabled: {e:#}");
    }

    let state = cli::run(args).await?;
    tracing::debug!(?state, "dialog finished");
    match state {
        DialogState::Completed | DialogState::Cancelled => Ok(()),
        // Failures were already shown to the user; only the exit code is left to report.
        _ => std::process::exit(1),
    }
}

/// The terminal dialog owns the screen, so it logs to a file; headless runs log to stderr.
fn init_tracing(args: &cli::Cli) -> Result<()> {
    let filter = std::env::var("BACKTEST_DIALOG_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter =
        tracing_subscriber::EnvFilter::try_new(filter).context("invalid log filter")?;
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);

    if args.uses_tui() {
        let dir = dirs::data_dir()
            .context("no data dir")?
            .join("backtest-dialog");
        std::fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        let path = dir.join("backtest-dialog.log");
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open {}", path.display()))?;
        builder
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
    } else {
        builder.with_writer(std::io::stderr).init();
    }
    Ok(())
}

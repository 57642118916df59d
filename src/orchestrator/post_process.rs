//! Post-run processing utilities.
//!
//! Handles summary formatting and exports after a run completes.

use crate::cli::Cli;
use crate::model::BacktestReport;
use anyhow::{Context, Result};
use std::path::Path;

/// Result of post-run processing, ready for presentation layers.
pub(crate) struct ProcessedRun {
    pub summary: Vec<String>,
    pub export_messages: Vec<String>,
}

/// Write the report as pretty JSON.
pub(crate) fn export_json(path: &Path, report: &BacktestReport) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    let data = serde_json::to_vec_pretty(report)?;
    std::fs::write(path, data).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Process a completed run: format the summary and run any requested exports.
pub(crate) fn process_run_completion(args: &Cli, report: &BacktestReport) -> ProcessedRun {
    let summary = crate::text_summary::build_text_summary(report).lines;

    let mut export_messages = Vec::new();
    if let Some(export_path) = args.export_json.as_deref() {
        match export_json(export_path, report) {
            Ok(_) => export_messages.push(format!("Exported JSON: {}", export_path.display())),
            Err(e) => export_messages.push(format!("Export JSON failed: {e:#}")),
        }
    }

    ProcessedRun {
        summary,
        export_messages,
    }
}

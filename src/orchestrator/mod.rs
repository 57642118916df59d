//! Application-level orchestration utilities.
//!
//! This module owns the back test dialog controller, the runner seam it starts runs
//! through, and post-run processing such as summaries and exports. UI/CLI layers
//! implement [`View`] and drive the controller.

mod controller;
mod post_process;
pub(crate) mod runner;
mod view;

pub(crate) use controller::{BacktestDialog, DialogState};
pub(crate) use post_process::process_run_completion;
pub(crate) use runner::EngineLauncher;
pub(crate) use view::{FilePicker, View};

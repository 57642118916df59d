//! Back test dialog controller.
//!
//! Owns the view, validates the chosen data file, starts and cancels the background run,
//! and applies runner events on the thread that owns the view.

use super::runner::{BackgroundRunner, RunLauncher};
use super::view::{FilePicker, View};
use crate::error::DialogError;
use crate::model::{BacktestReport, ProgressUpdate, RunEvent, RunRequest};
use crate::preferences::{Preferences, DATA_FILE_KEY};
use rand::RngCore;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl DialogState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DialogState::Completed | DialogState::Failed | DialogState::Cancelled
        )
    }
}

pub struct BacktestDialog<V: View, P: Preferences, L: RunLauncher> {
    view: V,
    preferences: P,
    launcher: L,
    state: DialogState,
    field: String,
    run: Option<L::Runner>,
    report: Option<BacktestReport>,
    // The runner holds the only sender; widgets are touched from `dispatch_*`.
    event_rx: Option<UnboundedReceiver<RunEvent>>,
}

const RUNNER_VANISHED: &str = "Back test stopped without reporting a result.";

/// Generate a random identifier for correlating a run's log lines.
fn gen_run_id() -> String {
    let mut b = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut b);
    b.iter().map(|x| format!("{x:02x}")).collect()
}

impl<V: View, P: Preferences, L: RunLauncher> BacktestDialog<V, P, L> {
    pub fn new(mut view: V, preferences: P, launcher: L) -> Self {
        let field = preferences.get(DATA_FILE_KEY).unwrap_or_default();
        view.set_field(&field);
        view.set_progress_visible(false);
        view.set_buttons_enabled(true, true);
        Self {
            view,
            preferences,
            launcher,
            state: DialogState::Idle,
            field,
            run: None,
            report: None,
            event_rx: None,
        }
    }

    pub fn state(&self) -> DialogState {
        self.state
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    /// Take the report of a completed run.
    pub fn take_report(&mut self) -> Option<BacktestReport> {
        self.report.take()
    }

    /// Text typed into the field by the user.
    pub fn set_field_text(&mut self, text: &str) {
        if self.state != DialogState::Idle {
            return;
        }
        self.field = text.to_string();
        self.view.set_field(&self.field);
    }

    /// Validate `file_path` and start a back test on it.
    pub fn submit(&mut self, file_path: &str) -> Result<(), DialogError> {
        if self.state != DialogState::Idle {
            tracing::debug!(state = ?self.state, "submit ignored");
            return Ok(());
        }

        let path = Path::new(file_path);
        if !path.is_file() {
            let err = DialogError::Validation(format!(
                "Historical file \"{file_path}\" does not exist."
            ));
            self.view.show_error(&err.to_string());
            return Err(err);
        }
        if let Err(e) = std::fs::File::open(path) {
            let err = DialogError::Validation(format!(
                "Historical file \"{file_path}\" cannot be read: {e}"
            ));
            self.view.show_error(&err.to_string());
            return Err(err);
        }

        if let Err(e) = self.preferences.set(DATA_FILE_KEY, file_path) {
            tracing::warn!("failed to save data file preference: {e:#}");
        }

        let request = RunRequest {
            file_path: path.to_path_buf(),
            run_id: gen_run_id(),
        };
        let run_id = request.run_id.clone();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let runner = match self.launcher.launch(request, event_tx) {
            Ok(r) => r,
            Err(e) => {
                let err = DialogError::Startup(format!("{e:#}"));
                tracing::warn!("{err}");
                self.view.show_error(&err.to_string());
                return Err(err);
            }
        };
        tracing::info!(%run_id, file = %file_path, "back test started");

        self.run = Some(runner);
        self.event_rx = Some(event_rx);
        self.state = DialogState::Running;
        self.view.set_progress("", 0, "Starting back test...");
        self.view.set_progress_visible(true);
        self.view.set_buttons_enabled(false, true);
        Ok(())
    }

    pub fn on_progress(&mut self, update: &ProgressUpdate) {
        if self.state != DialogState::Running {
            return;
        }
        self.view
            .set_progress(&update.label, update.percent(), &update.percent_text());
    }

    /// Reset the bar and show a status line in it.
    pub fn on_status(&mut self, text: &str) {
        if self.state != DialogState::Running {
            return;
        }
        self.view.set_progress("", 0, text);
    }

    pub fn on_completed(&mut self, report: BacktestReport) {
        if self.state != DialogState::Running {
            return;
        }
        self.run = None;
        self.report = Some(report);
        self.state = DialogState::Completed;
        self.view.close();
    }

    pub fn on_failed(&mut self, message: &str) {
        if self.state != DialogState::Running {
            return;
        }
        self.run = None;
        self.state = DialogState::Failed;
        self.view.show_error(message);
        self.view.close();
    }

    /// Close the dialog, asking any active run to stop without waiting for it.
    pub fn cancel(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        if let Some(mut run) = self.run.take() {
            run.cancel();
            tracing::info!("back test cancel requested");
        }
        self.state = DialogState::Cancelled;
        self.view.close();
    }

    /// Prompt for a data file, seeded with the current field.
    pub fn choose_file(&mut self, picker: &mut impl FilePicker) {
        if self.state != DialogState::Idle {
            return;
        }
        let seed = (!self.field.is_empty()).then(|| PathBuf::from(&self.field));
        let Some(chosen) = picker.pick(seed.as_deref()) else {
            return;
        };
        let chosen = std::path::absolute(&chosen).unwrap_or(chosen);
        self.field = chosen.to_string_lossy().into_owned();
        self.view.set_field(&self.field);
    }

    fn apply(&mut self, event: RunEvent) {
        match event {
            RunEvent::Status(text) => self.on_status(&text),
            RunEvent::Progress(update) => self.on_progress(&update),
            RunEvent::Completed { report } => self.on_completed(*report),
            RunEvent::Failed(message) => self.on_failed(&message),
            // The dialog is already closed by the time a cancelled run winds down.
            RunEvent::Cancelled => {}
        }
    }

    /// Apply every queued runner event. Returns how many were handled.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut n = 0;
        while let Some(rx) = self.event_rx.as_mut() {
            match rx.try_recv() {
                Ok(event) => self.apply(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.on_runner_gone(),
            }
            n += 1;
        }
        n
    }

    /// Wait for the next runner event and apply it.
    pub async fn dispatch_next(&mut self) {
        let Some(rx) = self.event_rx.as_mut() else {
            return;
        };
        match rx.recv().await {
            Some(event) => self.apply(event),
            None => self.on_runner_gone(),
        }
    }

    /// The runner dropped its sender. Fails the dialog if no outcome arrived first.
    fn on_runner_gone(&mut self) {
        self.event_rx = None;
        if self.state == DialogState::Running {
            tracing::warn!("back test runner exited without a result");
            self.on_failed(RUNNER_VANISHED);
        }
    }
}

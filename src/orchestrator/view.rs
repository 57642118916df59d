//! Presentation seams for the back test dialog.

use std::path::{Path, PathBuf};

/// Everything the dialog controller needs from a UI toolkit.
///
/// Implementations are only ever called from the thread that owns the controller.
pub trait View {
    /// Show `text` in the data file field.
    fn set_field(&mut self, text: &str);

    /// Update the progress label and bar together.
    fn set_progress(&mut self, label: &str, percent: u8, text: &str);

    fn set_progress_visible(&mut self, visible: bool);

    fn set_buttons_enabled(&mut self, submit: bool, cancel: bool);

    fn show_error(&mut self, message: &str);

    /// Dispose of the dialog.
    fn close(&mut self);
}

/// A modal file chooser.
pub trait FilePicker {
    /// `seed` is the field's current value, if any. `None` means the prompt was dismissed.
    fn pick(&mut self, seed: Option<&Path>) -> Option<PathBuf>;
}

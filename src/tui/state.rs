use crate::orchestrator::View;

/// Everything the dialog draws. Owned by the UI thread only; no cross-thread mutation.
#[derive(Debug, Default, Clone)]
pub struct DialogScreen {
    pub field: String,
    pub progress_label: String,
    pub percent: u8,
    pub progress_text: String,
    pub progress_visible: bool,
    pub submit_enabled: bool,
    pub cancel_enabled: bool,
    pub error: Option<String>,
    pub closed: bool,
}

impl DialogScreen {
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl View for DialogScreen {
    fn set_field(&mut self, text: &str) {
        self.field = text.to_string();
        // A new path invalidates whatever was wrong with the old one.
        self.error = None;
    }

    fn set_progress(&mut self, label: &str, percent: u8, text: &str) {
        self.progress_label = label.to_string();
        self.percent = percent;
        self.progress_text = text.to_string();
    }

    fn set_progress_visible(&mut self, visible: bool) {
        self.progress_visible = visible;
    }

    fn set_buttons_enabled(&mut self, submit: bool, cancel: bool) {
        self.submit_enabled = submit;
        self.cancel_enabled = cancel;
    }

    fn show_error(&mut self, message: &str) {
        self.error = Some(message.to_string());
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

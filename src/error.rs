use thiserror::Error;

/// Errors surfaced by the dialog controller. Both leave the dialog idle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DialogError {
    /// The chosen historical data file cannot be used.
    #[error("{0}")]
    Validation(String),

    /// The background runner could not be constructed or started.
    #[error("Could not start back test: {0}")]
    Startup(String),
}

use thiserror::Error;

/// Every failure the studio can report, grouped by what the caller should do about it.
#[derive(Debug, Error)]
pub enum StudioError {
    /// Out-of-domain numeric input (non-positive tempo or factor, negative variation, ...).
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A bounded value landed outside its allowed window.
    #[error("Value out of range: {0}")]
    OutOfRange(String),

    #[error("Invalid scale format: {0}")]
    InvalidScaleFormat(String),

    /// Program number or instrument name not in the general-MIDI table.
    #[error("Invalid instrument: {0}")]
    InvalidInstrument(String),

    #[error("Missing input: {0}")]
    MissingInput(String),

    /// An external model, service or encoder failed or returned garbage.
    #[error("Collaborator failure: {0}")]
    CollaboratorFailure(String),

    #[error("I/O failure: {0}")]
    IoFailure(String),
}

impl From<std::io::Error> for StudioError {
    fn from(err: std::io::Error) -> Self {
        StudioError::IoFailure(err.to_string())
    }
}

impl From<serde_json::Error> for StudioError {
    fn from(err: serde_json::Error) -> Self {
        StudioError::IoFailure(format!("JSON error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, StudioError>;

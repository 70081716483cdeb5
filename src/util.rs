use crate::error::{Result, StudioError};
use log::{info, warn};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub const AUDIO_EXTENSIONS: [&str; 4] = ["mp3", "wav", "ogg", "flac"];

/// Shared between the Ctrl-C handler and whatever is running a request.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            warn!("Cancellation requested, stopping after the current step..!");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Errors out if cancellation was requested before `step` starts.
    pub fn check(&self, step: &str) -> Result<()> {
        if self.is_cancelled() {
            return Err(StudioError::CollaboratorFailure(format!(
                "interrupted before {}",
                step
            )));
        }

        Ok(())
    }
}

/// An audio input must exist and carry one of the supported extensions.
pub fn validate_audio_input(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(StudioError::MissingInput(format!(
            "audio file {} does not exist",
            path.display()
        )));
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if !AUDIO_EXTENSIONS.contains(&extension.as_str()) {
        return Err(StudioError::MissingInput(format!(
            "{} is not a supported audio file (expected one of {})",
            path.display(),
            AUDIO_EXTENSIONS.join(", ")
        )));
    }

    Ok(())
}

pub fn require_file(path: &Path, what: &str) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(StudioError::MissingInput(format!(
            "{} {} does not exist",
            what,
            path.display()
        )))
    }
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }

    std::fs::create_dir_all(path).map_err(|e| {
        StudioError::IoFailure(format!("Failed to create directory {}: {}", path.display(), e))
    })?;
    info!("Created directory {}..!", path.display());
    Ok(())
}

/// Pulls the body out of a ```json fenced reply, or returns the trimmed text untouched.
pub fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(open) = trimmed.find("```") else {
        return trimmed;
    };

    let after_open = &trimmed[open + 3..];
    let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_open[body_start..];

    match body.rfind("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

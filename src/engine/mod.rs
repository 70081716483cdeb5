use crate::error::Result;
use crate::model::lyrics::TranscribedWord;
use crate::model::style::ParameterSpec;
use serde_json::Value;
use std::path::{Path, PathBuf};

pub mod ffmpeg;
pub mod models;
pub mod process;
pub mod resolver;

pub use ffmpeg::*;
pub use models::*;
pub use resolver::*;

/// Turns a free-text instruction into a raw style parameter object.
/// The reply is untrusted and gets validated by the caller.
pub trait StyleResolver {
    fn resolve(&self, instruction: &str, schema: &[ParameterSpec]) -> Result<Value>;
}

pub trait Transcriber {
    /// Word-level transcription in time order.
    fn transcribe(&self, audio: &Path) -> Result<Vec<TranscribedWord>>;
}

pub trait Translator {
    fn supported_languages(&self) -> Result<Vec<String>>;

    /// One output string per input string, in order.
    fn translate(&self, texts: &[String], target_language: &str) -> Result<Vec<String>>;
}

pub trait MediaProbe {
    /// Duration in seconds.
    fn duration(&self, path: &Path) -> Result<f64>;
}

pub trait VideoEncoder {
    fn encode(&self, job: &EncodeJob) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct StemPaths {
    pub other: PathBuf,
    pub vocals: PathBuf,
    pub bass: PathBuf,
    pub drums: PathBuf,
}

impl StemPaths {
    pub fn all(&self) -> [&Path; 4] {
        [
            self.other.as_path(),
            self.vocals.as_path(),
            self.bass.as_path(),
            self.drums.as_path(),
        ]
    }
}

pub trait StemSeparator {
    fn separate(&self, audio: &Path, output_dir: &Path) -> Result<StemPaths>;
}

pub trait StemMerger {
    /// Plays `stems` on top of each other into a single track at `output`.
    fn merge(&self, stems: &[PathBuf], output: &Path) -> Result<()>;
}

pub trait PitchTranscriber {
    /// Writes a MIDI file into `output_dir` and returns its path.
    fn transcribe_to_midi(&self, audio: &Path, output_dir: &Path) -> Result<PathBuf>;
}

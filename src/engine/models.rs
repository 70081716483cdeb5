use crate::engine::process::{run_collaborator, split_command};
use crate::engine::{PitchTranscriber, StemPaths, StemSeparator, Transcriber, Translator};
use crate::error::{Result, StudioError};
use crate::model::config::CollaboratorConfig;
use crate::model::lyrics::TranscribedWord;
use crate::util::{CancelFlag, validate_audio_input};
use log::{debug, info};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const STEM_NAMES: [&str; 4] = ["other", "vocals", "bass", "drums"];

/// Runs the demucs separation model through python.
#[derive(Debug, Clone)]
pub struct DemucsSeparator {
    pub python: String,
    pub model: String,
    pub device: String,
    /// `None` keeps demucs' wav output.
    pub mp3_bitrate: Option<u32>,
    pub cancel: CancelFlag,
}

impl DemucsSeparator {
    pub fn from_config(config: &CollaboratorConfig, cancel: CancelFlag) -> Self {
        Self {
            python: config.python.clone(),
            model: config.separation_model.clone(),
            device: config.separation_device.clone(),
            mp3_bitrate: Some(config.mp3_bitrate),
            cancel,
        }
    }

    pub fn args(&self, audio: &Path, output_dir: &Path) -> Vec<String> {
        let mut args = vec![
            "-m".to_string(),
            "demucs.separate".into(),
            "-o".into(),
            output_dir.display().to_string(),
            "-n".into(),
            self.model.clone(),
            "--device".into(),
            self.device.clone(),
        ];

        if let Some(bitrate) = self.mp3_bitrate {
            args.push("--mp3".into());
            args.push(format!("--mp3-bitrate={}", bitrate));
        }

        args.push(audio.display().to_string());
        args
    }

    /// Where demucs leaves the four stems: `<out>/<model>/<track>/<stem>.<ext>`.
    pub fn stem_paths(&self, audio: &Path, output_dir: &Path) -> StemPaths {
        let track = audio
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let extension = if self.mp3_bitrate.is_some() { "mp3" } else { "wav" };
        let base = output_dir.join(&self.model).join(track);
        let stem = |name: &str| base.join(format!("{}.{}", name, extension));

        StemPaths {
            other: stem(STEM_NAMES[0]),
            vocals: stem(STEM_NAMES[1]),
            bass: stem(STEM_NAMES[2]),
            drums: stem(STEM_NAMES[3]),
        }
    }
}

impl StemSeparator for DemucsSeparator {
    fn separate(&self, audio: &Path, output_dir: &Path) -> Result<StemPaths> {
        validate_audio_input(audio)?;
        run_collaborator(&self.python, &self.args(audio, output_dir), None, &self.cancel)?;

        let stems = self.stem_paths(audio, output_dir);
        if let Some(missing) = stems.all().into_iter().find(|p| !p.is_file()) {
            return Err(StudioError::CollaboratorFailure(format!(
                "separation finished but stem {} is missing",
                missing.display()
            )));
        }

        info!("Separated {} into {} stems..!", audio.display(), STEM_NAMES.len());
        Ok(stems)
    }
}

/// Runs the basic-pitch command line tool.
#[derive(Debug, Clone)]
pub struct BasicPitchTranscriber {
    pub program: String,
    pub onset_threshold: f64,
    pub frame_threshold: f64,
    /// Milliseconds.
    pub minimum_note_length: f64,
    pub midi_tempo: f64,
    pub cancel: CancelFlag,
}

impl BasicPitchTranscriber {
    pub fn from_config(config: &CollaboratorConfig, cancel: CancelFlag) -> Self {
        Self {
            program: config.basic_pitch.clone(),
            onset_threshold: config.onset_threshold,
            frame_threshold: config.frame_threshold,
            minimum_note_length: config.minimum_note_length,
            midi_tempo: config.midi_tempo,
            cancel,
        }
    }

    pub fn args(&self, audio: &Path, output_dir: &Path) -> Vec<String> {
        vec![
            output_dir.display().to_string(),
            audio.display().to_string(),
            "--onset-threshold".into(),
            self.onset_threshold.to_string(),
            "--frame-threshold".into(),
            self.frame_threshold.to_string(),
            "--minimum-note-length".into(),
            self.minimum_note_length.to_string(),
            "--midi-tempo".into(),
            self.midi_tempo.to_string(),
        ]
    }

    pub fn midi_path(audio: &Path, output_dir: &Path) -> PathBuf {
        let stem = audio
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        output_dir.join(format!("{}_basic_pitch.mid", stem))
    }
}

impl PitchTranscriber for BasicPitchTranscriber {
    fn transcribe_to_midi(&self, audio: &Path, output_dir: &Path) -> Result<PathBuf> {
        validate_audio_input(audio)?;

        if !(0.0..=1.0).contains(&self.onset_threshold) || !(0.0..=1.0).contains(&self.frame_threshold) {
            return Err(StudioError::InvalidParameter(format!(
                "onset/frame thresholds must be within 0..=1, got {} / {}",
                self.onset_threshold, self.frame_threshold
            )));
        }

        let midi = Self::midi_path(audio, output_dir);
        run_collaborator(&self.program, &self.args(audio, output_dir), None, &self.cancel)?;

        if !midi.is_file() {
            return Err(StudioError::CollaboratorFailure(format!(
                "pitch transcription finished but {} is missing",
                midi.display()
            )));
        }

        info!("Transcribed {} to {}..!", audio.display(), midi.display());
        Ok(midi)
    }
}

#[derive(Deserialize)]
struct Segment {
    #[serde(default)]
    words: Vec<TranscribedWord>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TranscriptionReply {
    Words(Vec<TranscribedWord>),
    Document { words: Vec<TranscribedWord> },
    Segments { segments: Vec<Segment> },
}

/// Accepts a bare word array, `{"words": [..]}` or `{"segments": [{"words": [..]}]}`.
pub fn parse_transcription(output: &str) -> Result<Vec<TranscribedWord>> {
    let reply: TranscriptionReply = serde_json::from_str(output.trim()).map_err(|e| {
        StudioError::CollaboratorFailure(format!("transcriber output is not a word list: {}", e))
    })?;

    Ok(match reply {
        TranscriptionReply::Words(words) => words,
        TranscriptionReply::Document { words } => words,
        TranscriptionReply::Segments { segments } => {
            segments.into_iter().flat_map(|s| s.words).collect()
        }
    })
}

/// External speech-to-text program; the audio path is appended to its arguments.
#[derive(Debug, Clone)]
pub struct CommandTranscriber {
    pub command: Vec<String>,
    pub cancel: CancelFlag,
}

impl CommandTranscriber {
    pub fn new(command: Vec<String>, cancel: CancelFlag) -> Self {
        Self { command, cancel }
    }
}

impl Transcriber for CommandTranscriber {
    fn transcribe(&self, audio: &Path) -> Result<Vec<TranscribedWord>> {
        let (program, args) = split_command(&self.command)?;
        let mut args = args.to_vec();
        args.push(audio.display().to_string());

        let output = run_collaborator(program, &args, None, &self.cancel)?;
        let words = parse_transcription(&output)?;
        debug!("Transcriber returned {} word(s)", words.len());
        Ok(words)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LanguageReply {
    Codes(Vec<String>),
    /// name -> code
    Named(BTreeMap<String, String>),
}

/// External translation program.
///
/// `--list-languages` prints the supported codes. `--target <code>` reads
/// `{"target", "texts"}` on stdin and prints a JSON string array.
#[derive(Debug, Clone)]
pub struct CommandTranslator {
    pub command: Vec<String>,
    pub cancel: CancelFlag,
}

impl CommandTranslator {
    pub fn new(command: Vec<String>, cancel: CancelFlag) -> Self {
        Self { command, cancel }
    }
}

impl Translator for CommandTranslator {
    fn supported_languages(&self) -> Result<Vec<String>> {
        let (program, args) = split_command(&self.command)?;
        let mut args = args.to_vec();
        args.push("--list-languages".into());

        let output = run_collaborator(program, &args, None, &self.cancel)?;
        let reply: LanguageReply = serde_json::from_str(output.trim()).map_err(|e| {
            StudioError::CollaboratorFailure(format!("translator language list is malformed: {}", e))
        })?;

        Ok(match reply {
            LanguageReply::Codes(codes) => codes,
            LanguageReply::Named(named) => named.into_values().collect(),
        })
    }

    fn translate(&self, texts: &[String], target_language: &str) -> Result<Vec<String>> {
        let (program, args) = split_command(&self.command)?;
        let mut args = args.to_vec();
        args.push("--target".into());
        args.push(target_language.into());

        let payload = json!({ "target": target_language, "texts": texts }).to_string();
        let output = run_collaborator(program, &args, Some(&payload), &self.cancel)?;

        serde_json::from_str::<Vec<String>>(output.trim()).map_err(|e| {
            StudioError::CollaboratorFailure(format!("translator output is not a string list: {}", e))
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn demucs_command_and_stem_layout() {
        env_logger::try_init().unwrap_or(());

        let separator = DemucsSeparator::from_config(&CollaboratorConfig::default(), CancelFlag::new());
        let args = separator.args(Path::new("songs/tune.wav"), Path::new("out"));
        assert_eq!(
            args,
            [
                "-m",
                "demucs.separate",
                "-o",
                "out",
                "-n",
                "htdemucs_ft",
                "--device",
                "cpu",
                "--mp3",
                "--mp3-bitrate=320",
                "songs/tune.wav"
            ]
            .map(String::from)
            .to_vec()
        );

        let stems = separator.stem_paths(Path::new("songs/tune.wav"), Path::new("out"));
        assert_eq!(stems.vocals, PathBuf::from("out/htdemucs_ft/tune/vocals.mp3"));
        assert_eq!(stems.other, PathBuf::from("out/htdemucs_ft/tune/other.mp3"));
    }

    #[test]
    fn separator_rejects_non_audio_inputs() {
        env_logger::try_init().unwrap_or(());

        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("lyrics.txt");
        std::fs::write(&text, "la").unwrap();

        let separator = DemucsSeparator::from_config(&CollaboratorConfig::default(), CancelFlag::new());
        assert!(matches!(
            separator.separate(&text, dir.path()),
            Err(StudioError::MissingInput(_))
        ));
    }

    #[test]
    fn basic_pitch_command_and_output_name() {
        env_logger::try_init().unwrap_or(());

        let transcriber = BasicPitchTranscriber::from_config(&CollaboratorConfig::default(), CancelFlag::new());
        let args = transcriber.args(Path::new("stems/other.mp3"), Path::new("midi"));
        assert_eq!(args[0], "midi");
        assert_eq!(args[1], "stems/other.mp3");
        assert_eq!(args[3], "0.5");
        assert_eq!(args[7], "127.7");
        assert_eq!(args[9], "120");
        assert_eq!(
            BasicPitchTranscriber::midi_path(Path::new("stems/other.mp3"), Path::new("midi")),
            PathBuf::from("midi/other_basic_pitch.mid")
        );
    }

    #[test]
    fn transcription_shapes() {
        env_logger::try_init().unwrap_or(());

        let bare = parse_transcription(r#"[{"word": "hi", "start": 0.0, "end": 0.2}]"#).unwrap();
        assert_eq!(bare.len(), 1);

        let segmented = parse_transcription(
            r#"{"segments": [{"words": [{"word": "a", "start": 0, "end": 1}]}, {"words": [{"word": "b", "start": 1, "end": 2, "probability": 0.4}]}]}"#,
        )
        .unwrap();
        assert_eq!(segmented.len(), 2);
        assert_eq!(segmented[1].probability, 0.4);

        assert!(matches!(
            parse_transcription("Traceback (most recent call last)"),
            Err(StudioError::CollaboratorFailure(_))
        ));
    }
}

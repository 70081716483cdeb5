use crate::error::{Result, StudioError};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "STEM_STUDIO",
    about = "Restyle MIDI stems and build karaoke videos from a song!"
)]
pub struct Args {
    /// Optional JSON file with subtitle, encoder, segmentation and collaborator settings.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rewrite a MIDI file from a free-text style instruction.
    Restyle {
        /// Path to the source MIDI file.
        midi: PathBuf,

        /// Where to write the result. Defaults to `<name>_restyled.mid` next to the source.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Free-text instruction, e.g. "swing it at 140 bpm in D minor".
        #[arg(short, long)]
        instruction: Option<String>,

        /// A style parameter JSON object to apply directly instead of resolving an instruction.
        #[arg(short, long)]
        params: Option<String>,

        /// Seed for the humanize step.
        #[arg(short, long)]
        seed: Option<u64>,

        /// Resolver program (and arguments) that reads the prompt on stdin and prints JSON.
        #[arg(long, num_args = 1.., value_delimiter = ' ')]
        resolver: Option<Vec<String>>,
    },

    /// Print the style parameter schema prompt handed to resolvers.
    Schema {
        /// Instruction embedded at the end of the prompt.
        #[arg(default_value = "")]
        instruction: String,
    },

    /// Guess the major or minor scale that best fits a MIDI file.
    DetectScale {
        midi: PathBuf,
    },

    /// Split a song into other/vocals/bass/drums stems.
    Separate {
        audio: PathBuf,

        #[arg(short, long, default_value = "./audio_processing/output_stems")]
        output: PathBuf,

        /// Separation model name.
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Convert an audio stem into a MIDI file.
    ToMidi {
        audio: PathBuf,

        #[arg(short, long, default_value = "./audio_processing/output_midi")]
        output: PathBuf,
    },

    /// Transcribe vocals into a timed lyric document.
    Lyrics {
        audio: PathBuf,

        /// Lyric JSON to write.
        #[arg(short, long)]
        output: PathBuf,

        /// Translate the words into this language code after transcription.
        #[arg(short, long)]
        translate: Option<String>,
    },

    /// Show or correct the words of a lyric document. Timings are never touched.
    EditLyrics {
        lyrics: PathBuf,

        /// JSON list of {verse_number, word_number, word} corrections.
        #[arg(short, long)]
        edits: Option<PathBuf>,

        /// Where to write the edited document. Defaults to overwriting `lyrics`.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write an ASS subtitle script from a lyric document.
    Subtitles {
        lyrics: PathBuf,

        /// Audio to take the total duration from.
        #[arg(short, long, required_unless_present = "duration")]
        audio: Option<PathBuf>,

        /// Total duration in seconds, instead of probing audio.
        #[arg(short, long)]
        duration: Option<f64>,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(long)]
        title: Option<String>,
    },

    /// Mix the bass, drums and other stems of a separation folder into one instrumental track.
    MergeStems {
        /// Folder holding `bass`, `drums` and `other` audio files.
        stems: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Render a karaoke video: black background, instrumental audio and lyric subtitles.
    Karaoke {
        lyrics: PathBuf,

        /// Instrumental track to play under the subtitles.
        #[arg(required_unless_present = "stems")]
        audio: Option<PathBuf>,

        /// Separation folder to build the instrumental track from, instead of `audio`.
        #[arg(long, conflicts_with = "audio")]
        stems: Option<PathBuf>,

        #[arg(short, long)]
        output: PathBuf,

        /// Where to keep the generated subtitle script. Defaults to the output path with `.ass`.
        #[arg(long)]
        ass: Option<PathBuf>,

        #[arg(long)]
        title: Option<String>,

        /// Output resolution as WxH.
        #[arg(long)]
        resolution: Option<String>,
    },

    /// Print the effective configuration as JSON.
    ShowConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SubtitleStyle {
    pub title: String,
    pub font: String,
    pub font_size: u32,
    pub title_font_size: u32,
    /// `WxH`, e.g. `1280x720`.
    pub resolution: String,
    pub primary_color: String,
    pub highlight_color: String,
    pub loader_color: String,
    pub border_color: String,
    pub shift_lyrics_after_intro: bool,
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            title: "Karaoke".into(),
            font: "Arial".into(),
            font_size: 48,
            title_font_size: 72,
            resolution: "1280x720".into(),
            primary_color: "&H00FFFFFF".into(),
            highlight_color: "&H00FFFF00".into(),
            loader_color: "&H00FF0000".into(),
            border_color: "&HFFFFFF00".into(),
            shift_lyrics_after_intro: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EncoderSettings {
    pub resolution: String,
    pub preset: String,
    pub crf: u32,
    pub fps: u32,
    pub video_bitrate: String,
    pub audio_bitrate: String,
    pub video_codec: String,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            resolution: "1280x720".into(),
            preset: "fast".into(),
            crf: 23,
            fps: 24,
            video_bitrate: "3000k".into(),
            audio_bitrate: "192k".into(),
            video_codec: "libx264".into(),
        }
    }
}

/// When a new verse starts while grouping transcribed words.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Silence between two words, in seconds, that ends a verse.
    pub gap_threshold: f64,
    pub max_words: usize,
    /// Longest span, in seconds, from the first word's start to the last word's end.
    pub max_verse_duration: f64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            gap_threshold: 1.0,
            max_words: 12,
            max_verse_duration: 8.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CollaboratorConfig {
    pub python: String,
    pub separation_model: String,
    pub separation_device: String,
    pub mp3_bitrate: u32,
    pub basic_pitch: String,
    pub onset_threshold: f64,
    pub frame_threshold: f64,
    pub minimum_note_length: f64,
    pub midi_tempo: f64,
    pub ffmpeg: String,
    pub ffprobe: String,
    /// Program plus arguments. When unset the offline keyword resolver is used.
    pub resolver: Option<Vec<String>>,
    /// Program plus arguments; the audio path is appended.
    pub transcriber: Option<Vec<String>>,
    pub translator: Option<Vec<String>>,
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            python: "python".into(),
            separation_model: "htdemucs_ft".into(),
            separation_device: "cpu".into(),
            mp3_bitrate: 320,
            basic_pitch: "basic-pitch".into(),
            onset_threshold: 0.5,
            frame_threshold: 0.3,
            minimum_note_length: 127.7,
            midi_tempo: 120.0,
            ffmpeg: "ffmpeg".into(),
            ffprobe: "ffprobe".into(),
            resolver: None,
            transcriber: None,
            translator: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct StudioConfig {
    pub subtitles: SubtitleStyle,
    pub encoder: EncoderSettings,
    pub segmentation: SegmentationConfig,
    pub collaborators: CollaboratorConfig,
}

pub fn load_config(path: &Path) -> Result<StudioConfig> {
    let text = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StudioError::MissingInput(format!("config file {} does not exist", path.display()))
        } else {
            StudioError::IoFailure(format!("Failed to read config {}: {}", path.display(), e))
        }
    })?;

    serde_json::from_str(&text)
        .map_err(|e| StudioError::InvalidParameter(format!("config {}: {}", path.display(), e)))
}

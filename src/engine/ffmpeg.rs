use crate::engine::process::run_collaborator;
use crate::engine::{MediaProbe, StemMerger, VideoEncoder};
use crate::error::{Result, StudioError};
use crate::model::config::EncoderSettings;
use crate::util::{CancelFlag, validate_audio_input};
use log::info;
use std::path::{Path, PathBuf};

/// Everything one karaoke render needs: black background of `duration` seconds, audio and burned-in subtitles.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeJob {
    pub settings: EncoderSettings,
    pub duration: f64,
    pub audio: PathBuf,
    pub subtitles: PathBuf,
    pub output: PathBuf,
}

impl EncodeJob {
    pub fn ffmpeg_args(&self) -> Vec<String> {
        let s = &self.settings;
        vec![
            "-y".into(),
            "-f".into(),
            "lavfi".into(),
            "-i".into(),
            format!("color=c=black:s={}:d={}", s.resolution, self.duration),
            "-i".into(),
            self.audio.display().to_string(),
            "-vf".into(),
            format!("subtitles={}", escape_filter_path(&self.subtitles)),
            "-c:v".into(),
            s.video_codec.clone(),
            "-preset".into(),
            s.preset.clone(),
            "-crf".into(),
            s.crf.to_string(),
            "-r".into(),
            s.fps.to_string(),
            "-b:v".into(),
            s.video_bitrate.clone(),
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            s.audio_bitrate.clone(),
            "-shortest".into(),
            self.output.display().to_string(),
        ]
    }
}

/// The subtitles filter treats `:` and `\` specially, so Windows paths need both neutralised.
fn escape_filter_path(path: &Path) -> String {
    path.display()
        .to_string()
        .replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

#[derive(Debug, Clone)]
pub struct FfprobeDurationProbe {
    pub program: String,
    pub cancel: CancelFlag,
}

impl FfprobeDurationProbe {
    pub fn new(program: impl Into<String>, cancel: CancelFlag) -> Self {
        Self {
            program: program.into(),
            cancel,
        }
    }

    pub fn args(path: &Path) -> Vec<String> {
        vec![
            "-i".into(),
            path.display().to_string(),
            "-show_entries".into(),
            "format=duration".into(),
            "-v".into(),
            "quiet".into(),
            "-of".into(),
            "csv=p=0".into(),
        ]
    }
}

pub fn parse_duration(output: &str) -> Result<f64> {
    let text = output.trim();
    match text.parse::<f64>() {
        Ok(seconds) if seconds.is_finite() && seconds >= 0.0 => Ok(seconds),
        _ => Err(StudioError::CollaboratorFailure(format!(
            "invalid duration reported by the media probe: '{}'",
            text
        ))),
    }
}

impl MediaProbe for FfprobeDurationProbe {
    fn duration(&self, path: &Path) -> Result<f64> {
        let output = run_collaborator(&self.program, &Self::args(path), None, &self.cancel)?;
        parse_duration(&output)
    }
}

#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    pub program: String,
    pub cancel: CancelFlag,
}

impl FfmpegEncoder {
    pub fn new(program: impl Into<String>, cancel: CancelFlag) -> Self {
        Self {
            program: program.into(),
            cancel,
        }
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn encode(&self, job: &EncodeJob) -> Result<()> {
        run_collaborator(&self.program, &job.ffmpeg_args(), None, &self.cancel)?;

        if !job.output.is_file() {
            return Err(StudioError::CollaboratorFailure(format!(
                "encoder finished but {} was not written",
                job.output.display()
            )));
        }

        info!("Video written to {}..!", job.output.display());
        Ok(())
    }
}

/// Overlays stems at full level, without amix's usual per-input attenuation.
#[derive(Debug, Clone, PartialEq)]
pub struct MixJob {
    pub stems: Vec<PathBuf>,
    pub audio_bitrate: String,
    pub output: PathBuf,
}

impl MixJob {
    pub fn ffmpeg_args(&self) -> Vec<String> {
        let mut args = vec!["-y".to_string()];
        for stem in self.stems.iter() {
            args.push("-i".into());
            args.push(stem.display().to_string());
        }

        args.push("-filter_complex".into());
        args.push(format!("amix=inputs={}:duration=longest:normalize=0", self.stems.len()));
        args.push("-b:a".into());
        args.push(self.audio_bitrate.clone());
        args.push(self.output.display().to_string());
        args
    }
}

#[derive(Debug, Clone)]
pub struct FfmpegStemMerger {
    pub program: String,
    pub audio_bitrate: String,
    pub cancel: CancelFlag,
}

impl FfmpegStemMerger {
    pub fn new(program: impl Into<String>, audio_bitrate: impl Into<String>, cancel: CancelFlag) -> Self {
        Self {
            program: program.into(),
            audio_bitrate: audio_bitrate.into(),
            cancel,
        }
    }
}

impl StemMerger for FfmpegStemMerger {
    fn merge(&self, stems: &[PathBuf], output: &Path) -> Result<()> {
        if stems.is_empty() {
            return Err(StudioError::InvalidParameter("no stems given to merge".into()));
        }
        for stem in stems.iter() {
            validate_audio_input(stem)?;
        }

        let job = MixJob {
            stems: stems.to_vec(),
            audio_bitrate: self.audio_bitrate.clone(),
            output: output.to_path_buf(),
        };
        run_collaborator(&self.program, &job.ffmpeg_args(), None, &self.cancel)?;

        if !output.is_file() {
            return Err(StudioError::CollaboratorFailure(format!(
                "stem merge finished but {} was not written",
                output.display()
            )));
        }

        info!("Merged {} stem(s) into {}..!", stems.len(), output.display());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encode_job_builds_the_full_argument_list() {
        env_logger::try_init().unwrap_or(());

        let job = EncodeJob {
            settings: EncoderSettings::default(),
            duration: 183.5,
            audio: PathBuf::from("stems/other.mp3"),
            subtitles: PathBuf::from("C:\\karaoke\\song.ass"),
            output: PathBuf::from("out/song.mp4"),
        };

        let args = job.ffmpeg_args();
        let expected = [
            "-y",
            "-f",
            "lavfi",
            "-i",
            "color=c=black:s=1280x720:d=183.5",
            "-i",
            "stems/other.mp3",
            "-vf",
            "subtitles=C\\:/karaoke/song.ass",
            "-c:v",
            "libx264",
            "-preset",
            "fast",
            "-crf",
            "23",
            "-r",
            "24",
            "-b:v",
            "3000k",
            "-c:a",
            "aac",
            "-b:a",
            "192k",
            "-shortest",
            "out/song.mp4",
        ];
        assert_eq!(args, expected.map(String::from).to_vec());
    }

    #[test]
    fn probe_output_parsing() {
        env_logger::try_init().unwrap_or(());

        assert_eq!(parse_duration("12.345000\n").unwrap(), 12.345);
        assert!(matches!(parse_duration("N/A"), Err(StudioError::CollaboratorFailure(_))));
        assert!(matches!(parse_duration(""), Err(StudioError::CollaboratorFailure(_))));
        assert_eq!(
            FfprobeDurationProbe::args(Path::new("a.mp3"))[0..2],
            ["-i".to_string(), "a.mp3".to_string()]
        );
    }

    #[test]
    fn mix_job_overlays_every_stem() {
        env_logger::try_init().unwrap_or(());

        let job = MixJob {
            stems: vec![
                PathBuf::from("stems/bass.mp3"),
                PathBuf::from("stems/drums.mp3"),
                PathBuf::from("stems/other.mp3"),
            ],
            audio_bitrate: "192k".into(),
            output: PathBuf::from("out/instrumental.mp3"),
        };

        let expected = [
            "-y",
            "-i",
            "stems/bass.mp3",
            "-i",
            "stems/drums.mp3",
            "-i",
            "stems/other.mp3",
            "-filter_complex",
            "amix=inputs=3:duration=longest:normalize=0",
            "-b:a",
            "192k",
            "out/instrumental.mp3",
        ];
        assert_eq!(job.ffmpeg_args(), expected.map(String::from).to_vec());
    }

    #[test]
    fn merger_rejects_bad_stems_before_running() {
        env_logger::try_init().unwrap_or(());

        let dir = tempfile::tempdir().unwrap();
        // a program that cannot exist, so reaching it would fail differently
        let merger = FfmpegStemMerger::new("definitely-not-ffmpeg-here", "192k", CancelFlag::new());
        let output = dir.path().join("mix.mp3");

        assert!(matches!(merger.merge(&[], &output), Err(StudioError::InvalidParameter(_))));
        assert!(matches!(
            merger.merge(&[dir.path().join("bass.mp3")], &output),
            Err(StudioError::MissingInput(_))
        ));
        assert!(!output.exists());
    }
}

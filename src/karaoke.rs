use crate::engine::{EncodeJob, MediaProbe, StemMerger, VideoEncoder};
use crate::error::{Result, StudioError};
use crate::model::config::{EncoderSettings, SubtitleStyle};
use crate::model::lyrics::{Verse, load_verses};
use crate::subtitles::{parse_resolution, synthesize_subtitles, write_subtitles};
use crate::util::{AUDIO_EXTENSIONS, CancelFlag, require_file, validate_audio_input};
use log::info;
use std::path::{Path, PathBuf};

pub const ACCOMPANIMENT_STEMS: [&str; 3] = ["bass", "drums", "other"];

/// Finds the bass, drums and other stems in a separation output folder, in that order.
pub fn accompaniment_stems(dir: &Path) -> Result<Vec<PathBuf>> {
    ACCOMPANIMENT_STEMS
        .iter()
        .map(|name| {
            AUDIO_EXTENSIONS
                .iter()
                .map(|extension| dir.join(format!("{}.{}", name, extension)))
                .find(|path| path.is_file())
                .ok_or_else(|| {
                    StudioError::MissingInput(format!("no {} stem found in {}", name, dir.display()))
                })
        })
        .collect()
}

/// Mixes the accompaniment stems of `dir` into the instrumental track at `output`.
pub fn merge_accompaniment<M: StemMerger>(merger: &M, dir: &Path, output: &Path, cancel: &CancelFlag) -> Result<PathBuf> {
    let stems = accompaniment_stems(dir)?;

    cancel.check("stem merge")?;
    info!("Merging {} stems from {}..!", stems.len(), dir.display());
    merger.merge(&stems, output)?;
    Ok(output.to_path_buf())
}

#[derive(Debug, Clone, PartialEq)]
pub struct KaraokeReport {
    pub duration: f64,
    pub subtitles: PathBuf,
    pub output: PathBuf,
    pub event_count: usize,
}

/// Probes the audio, writes the subtitle script and hands both to the encoder. One attempt, no retries.
pub struct KaraokeAssembler<P: MediaProbe, E: VideoEncoder> {
    probe: P,
    encoder: E,
    style: SubtitleStyle,
    settings: EncoderSettings,
    cancel: CancelFlag,
}

impl<P: MediaProbe, E: VideoEncoder> KaraokeAssembler<P, E> {
    pub fn new(probe: P, encoder: E, style: SubtitleStyle, settings: EncoderSettings, cancel: CancelFlag) -> Self {
        Self {
            probe,
            encoder,
            style,
            settings,
            cancel,
        }
    }

    pub fn assemble(&self, verses: &[Verse], audio: &Path, subtitles: &Path, output: &Path) -> Result<KaraokeReport> {
        validate_audio_input(audio)?;
        parse_resolution(&self.settings.resolution)?;

        self.cancel.check("duration probe")?;
        let duration = self.probe.duration(audio)?;
        info!("Audio {} runs for {:.2}s..!", audio.display(), duration);

        let script = synthesize_subtitles(verses, duration, &self.style)?;
        write_subtitles(&script, subtitles)?;

        self.cancel.check("video encoding")?;
        let job = EncodeJob {
            settings: self.settings.clone(),
            duration,
            audio: audio.to_path_buf(),
            subtitles: subtitles.to_path_buf(),
            output: output.to_path_buf(),
        };
        info!("Encoding karaoke video to {}..!", output.display());
        self.encoder.encode(&job)?;

        Ok(KaraokeReport {
            duration,
            subtitles: subtitles.to_path_buf(),
            output: output.to_path_buf(),
            event_count: script.events.len(),
        })
    }

    pub fn assemble_from_file(&self, lyrics: &Path, audio: &Path, subtitles: &Path, output: &Path) -> Result<KaraokeReport> {
        require_file(lyrics, "Lyrics document")?;
        let verses = load_verses(lyrics)?;
        self.assemble(&verses, audio, subtitles, output)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::lyrics::{Word, save_verses};
    use std::cell::RefCell;
    use std::fs;

    struct FixedProbe(Option<f64>);

    impl MediaProbe for FixedProbe {
        fn duration(&self, _path: &Path) -> Result<f64> {
            self.0
                .ok_or_else(|| StudioError::CollaboratorFailure("probe exploded".into()))
        }
    }

    #[derive(Default)]
    struct RecordingEncoder {
        jobs: RefCell<Vec<EncodeJob>>,
        fail: bool,
    }

    impl VideoEncoder for RecordingEncoder {
        fn encode(&self, job: &EncodeJob) -> Result<()> {
            self.jobs.borrow_mut().push(job.clone());
            if self.fail {
                return Err(StudioError::CollaboratorFailure("ffmpeg exited with 1".into()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingMerger {
        calls: RefCell<Vec<(Vec<PathBuf>, PathBuf)>>,
    }

    impl StemMerger for RecordingMerger {
        fn merge(&self, stems: &[PathBuf], output: &Path) -> Result<()> {
            self.calls.borrow_mut().push((stems.to_vec(), output.to_path_buf()));
            Ok(())
        }
    }

    fn verses() -> Vec<Verse> {
        vec![Verse {
            verse_number: 1,
            start: 1.0,
            end: 2.0,
            words: vec![
                Word {
                    word_number: 1,
                    word: "sing".into(),
                    start: 1.0,
                    end: 1.4,
                    probability: 0.8,
                },
                Word {
                    word_number: 2,
                    word: "along".into(),
                    start: 1.5,
                    end: 2.0,
                    probability: 0.95,
                },
            ],
        }]
    }

    fn assembler(probe: Option<f64>, encoder: RecordingEncoder) -> KaraokeAssembler<FixedProbe, RecordingEncoder> {
        KaraokeAssembler::new(
            FixedProbe(probe),
            encoder,
            SubtitleStyle::default(),
            EncoderSettings::default(),
            CancelFlag::new(),
        )
    }

    #[test]
    fn assembles_subtitles_and_encodes_once() {
        env_logger::try_init().unwrap_or(());

        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("other.mp3");
        fs::write(&audio, b"ID3").unwrap();
        let lyrics = dir.path().join("lyrics.json");
        save_verses(&verses(), &lyrics).unwrap();
        let ass = dir.path().join("song.ass");
        let video = dir.path().join("song.mp4");

        let karaoke = assembler(Some(10.0), RecordingEncoder::default());
        let report = karaoke.assemble_from_file(&lyrics, &audio, &ass, &video).unwrap();

        assert_eq!(report.duration, 10.0);
        assert!(fs::read_to_string(&ass).unwrap().contains("[Events]"));

        let jobs = karaoke.encoder.jobs.borrow();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].duration, 10.0);
        assert_eq!(jobs[0].subtitles, ass);
        assert_eq!(jobs[0].output, video);
        assert!(jobs[0].ffmpeg_args().contains(&"color=c=black:s=1280x720:d=10".to_string()));
    }

    #[test]
    fn missing_audio_fails_before_probing() {
        env_logger::try_init().unwrap_or(());

        let dir = tempfile::tempdir().unwrap();
        let karaoke = assembler(Some(10.0), RecordingEncoder::default());
        let result = karaoke.assemble(
            &verses(),
            &dir.path().join("nope.mp3"),
            &dir.path().join("a.ass"),
            &dir.path().join("a.mp4"),
        );

        assert!(matches!(result, Err(StudioError::MissingInput(_))));
        assert!(karaoke.encoder.jobs.borrow().is_empty());

        let audio = dir.path().join("other.mp3");
        fs::write(&audio, b"ID3").unwrap();
        let result = karaoke.assemble_from_file(
            &dir.path().join("no_lyrics.json"),
            &audio,
            &dir.path().join("a.ass"),
            &dir.path().join("a.mp4"),
        );
        assert!(matches!(result, Err(StudioError::MissingInput(_))));
        assert!(!dir.path().join("a.ass").exists());
    }

    #[test]
    fn probe_and_encoder_failures_surface_unchanged() {
        env_logger::try_init().unwrap_or(());

        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("other.wav");
        fs::write(&audio, b"RIFF").unwrap();
        let ass = dir.path().join("a.ass");
        let video = dir.path().join("a.mp4");

        let karaoke = assembler(None, RecordingEncoder::default());
        assert!(matches!(
            karaoke.assemble(&verses(), &audio, &ass, &video),
            Err(StudioError::CollaboratorFailure(_))
        ));
        assert!(!ass.exists());

        let karaoke = assembler(
            Some(5.0),
            RecordingEncoder {
                fail: true,
                ..Default::default()
            },
        );
        assert!(matches!(
            karaoke.assemble(&verses(), &audio, &ass, &video),
            Err(StudioError::CollaboratorFailure(_))
        ));
        assert_eq!(karaoke.encoder.jobs.borrow().len(), 1);
    }

    #[test]
    fn accompaniment_is_merged_without_vocals() {
        env_logger::try_init().unwrap_or(());

        let dir = tempfile::tempdir().unwrap();
        for name in ["other.mp3", "vocals.mp3", "bass.mp3", "drums.wav"] {
            fs::write(dir.path().join(name), b"ID3").unwrap();
        }
        let output = dir.path().join("instrumental.mp3");

        let merger = RecordingMerger::default();
        let merged = merge_accompaniment(&merger, dir.path(), &output, &CancelFlag::new()).unwrap();
        assert_eq!(merged, output);

        let calls = merger.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].0,
            vec![
                dir.path().join("bass.mp3"),
                dir.path().join("drums.wav"),
                dir.path().join("other.mp3"),
            ]
        );
        assert_eq!(calls[0].1, output);
    }

    #[test]
    fn missing_stem_or_cancel_skips_the_merge() {
        env_logger::try_init().unwrap_or(());

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bass.mp3"), b"ID3").unwrap();
        fs::write(dir.path().join("other.mp3"), b"ID3").unwrap();
        let output = dir.path().join("instrumental.mp3");

        let merger = RecordingMerger::default();
        assert!(matches!(
            merge_accompaniment(&merger, dir.path(), &output, &CancelFlag::new()),
            Err(StudioError::MissingInput(_))
        ));

        fs::write(dir.path().join("drums.mp3"), b"ID3").unwrap();
        let cancel = CancelFlag::new();
        cancel.cancel();
        assert!(merge_accompaniment(&merger, dir.path(), &output, &cancel).is_err());
        assert!(merger.calls.borrow().is_empty());
    }
}

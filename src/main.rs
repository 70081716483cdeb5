use STEM_STUDIO::{
    Args, BasicPitchTranscriber, CancelFlag, Command, CommandStyleResolver, CommandTranscriber,
    CommandTranslator, DemucsSeparator, FfmpegEncoder, FfmpegStemMerger, FfprobeDurationProbe, KaraokeAssembler,
    KeywordStyleResolver, LyricTimingExtractor, MediaProbe, PitchTranscriber, STYLE_SCHEMA,
    StemSeparator, StudioConfig, StudioError, StyleConverter, StyleParameterSet, StyleResolver,
    WordEdit, apply_word_edits, default_output_path, detect_scale, ensure_directory, import_score,
    load_config, load_verses, merge_accompaniment, save_verses, style_prompt, synthesize_subtitles, translate_verses,
    word_table, write_subtitles,
};
use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => StudioConfig::default(),
    };
    debug!("Effective config: {:?}", config);

    let cancel = CancelFlag::new();
    let cancel_for_handler = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("Ctrl-C received, cancelling..!");
        cancel_for_handler.cancel();
    })
    .expect("Error setting Ctrl-C handler..!");

    match args.command {
        Command::Restyle {
            midi,
            output,
            instruction,
            params,
            seed,
            resolver,
        } => {
            let output = output.unwrap_or_else(|| default_output_path(&midi));

            match resolver.or_else(|| config.collaborators.resolver.clone()) {
                Some(command) => {
                    let converter = StyleConverter::new(
                        CommandStyleResolver::new(command, cancel.clone()),
                        seed,
                        cancel.clone(),
                    );
                    restyle(&converter, &midi, &output, instruction, params)?;
                }
                None => {
                    info!("No resolver command configured, using the keyword resolver..!");
                    let converter = StyleConverter::new(KeywordStyleResolver, seed, cancel.clone());
                    restyle(&converter, &midi, &output, instruction, params)?;
                }
            }
        }
        Command::Schema { instruction } => {
            println!("{}", style_prompt(&instruction, &STYLE_SCHEMA));
        }
        Command::DetectScale { midi } => {
            let score = import_score(&midi)?;
            match detect_scale(&score) {
                Some(scale) => println!("{}", scale),
                None => warn!("'{}' has no notes to detect a scale from..!", midi.display()),
            }
        }
        Command::Separate {
            audio,
            output,
            model,
        } => {
            let mut separator = DemucsSeparator::from_config(&config.collaborators, cancel.clone());
            if let Some(model) = model {
                separator.model = model;
            }

            ensure_directory(&output)?;
            let stems = separator.separate(&audio, &output)?;
            for stem in stems.all() {
                println!("{}", stem.display());
            }
        }
        Command::ToMidi { audio, output } => {
            let transcriber = BasicPitchTranscriber::from_config(&config.collaborators, cancel.clone());
            ensure_directory(&output)?;
            let midi = transcriber.transcribe_to_midi(&audio, &output)?;
            println!("{}", midi.display());
        }
        Command::Lyrics {
            audio,
            output,
            translate,
        } => {
            let command = config.collaborators.transcriber.clone().ok_or_else(|| {
                StudioError::MissingInput("no transcriber command configured (collaborators.transcriber)".into())
            })?;

            let extractor = LyricTimingExtractor::new(
                CommandTranscriber::new(command, cancel.clone()),
                config.segmentation.clone(),
                cancel.clone(),
            );
            let mut verses = extractor.extract(&audio)?;

            if let Some(language) = translate {
                let command = config.collaborators.translator.clone().ok_or_else(|| {
                    StudioError::MissingInput("no translator command configured (collaborators.translator)".into())
                })?;
                verses = translate_verses(&verses, &CommandTranslator::new(command, cancel.clone()), &language)?;
            }

            save_verses(&verses, &output)?;
        }
        Command::EditLyrics {
            lyrics,
            edits,
            output,
        } => {
            let mut verses = load_verses(&lyrics)?;

            if let Some(edits) = edits {
                let text = fs::read_to_string(&edits)
                    .with_context(|| format!("Failed to read edits from {}", edits.display()))?;
                let edits: Vec<WordEdit> = serde_json::from_str(&text)
                    .with_context(|| format!("{} is not a list of word edits", edits.display()))?;

                let changed = apply_word_edits(&mut verses, &edits)?;
                info!("Applied {} word edit(s)..!", changed);
                save_verses(&verses, output.as_deref().unwrap_or(lyrics.as_path()))?;
            }

            for (verse, number, word, start, end, probability) in word_table(&verses) {
                println!(
                    "{:>3} {:>3}  {:<20} {:>8.2} {:>8.2}  {:.2}",
                    verse, number, word, start, end, probability
                );
            }
        }
        Command::Subtitles {
            lyrics,
            audio,
            duration,
            output,
            title,
        } => {
            let verses = load_verses(&lyrics)?;
            let duration = match (duration, audio) {
                (Some(seconds), _) => seconds,
                (None, Some(audio)) => {
                    FfprobeDurationProbe::new(config.collaborators.ffprobe.clone(), cancel.clone()).duration(&audio)?
                }
                (None, None) => {
                    return Err(StudioError::MissingInput("either --audio or --duration is required".into()).into());
                }
            };

            let mut style = config.subtitles.clone();
            if let Some(title) = title {
                style.title = title;
            }

            let script = synthesize_subtitles(&verses, duration, &style)?;
            write_subtitles(&script, &output)?;
        }
        Command::MergeStems { stems, output } => {
            let merger = FfmpegStemMerger::new(
                config.collaborators.ffmpeg.clone(),
                config.encoder.audio_bitrate.clone(),
                cancel.clone(),
            );
            let merged = merge_accompaniment(&merger, &stems, &output, &cancel)?;
            println!("{}", merged.display());
        }
        Command::Karaoke {
            lyrics,
            audio,
            stems,
            output,
            ass,
            title,
            resolution,
        } => {
            let mut style = config.subtitles.clone();
            let mut settings = config.encoder.clone();
            if let Some(title) = title {
                style.title = title;
            }
            if let Some(resolution) = resolution {
                style.resolution = resolution.clone();
                settings.resolution = resolution;
            }

            let audio = match (audio, stems) {
                (Some(audio), _) => audio,
                (None, Some(stems)) => {
                    let merger = FfmpegStemMerger::new(
                        config.collaborators.ffmpeg.clone(),
                        settings.audio_bitrate.clone(),
                        cancel.clone(),
                    );
                    merge_accompaniment(&merger, &stems, &output.with_extension("instrumental.mp3"), &cancel)?
                }
                (None, None) => {
                    return Err(StudioError::MissingInput("either an audio track or --stems is required".into()).into());
                }
            };

            let ass: PathBuf = ass.unwrap_or_else(|| output.with_extension("ass"));
            let assembler = KaraokeAssembler::new(
                FfprobeDurationProbe::new(config.collaborators.ffprobe.clone(), cancel.clone()),
                FfmpegEncoder::new(config.collaborators.ffmpeg.clone(), cancel.clone()),
                style,
                settings,
                cancel.clone(),
            );

            let report = assembler.assemble_from_file(&lyrics, &audio, &ass, &output)?;
            info!(
                "Karaoke video {} ready ({:.2}s, {} subtitle events)..!",
                report.output.display(),
                report.duration,
                report.event_count
            );
        }
        Command::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    if cancel.is_cancelled() {
        warn!("Finished after a cancellation request..!");
    }

    Ok(())
}

fn restyle<R: StyleResolver>(
    converter: &StyleConverter<R>,
    midi: &Path,
    output: &Path,
    instruction: Option<String>,
    params: Option<String>,
) -> Result<()> {
    let report = match params {
        Some(document) => {
            if instruction.is_some() {
                warn!("Both --params and --instruction given, ignoring the instruction..!");
            }

            let raw: serde_json::Value =
                serde_json::from_str(&document).context("--params is not valid JSON")?;
            let params = StyleParameterSet::from_value(&raw)?;
            converter.convert_with(midi, output, &params)?
        }
        None => converter.convert(midi, output, instruction.as_deref())?,
    };

    info!(
        "Wrote {} ({} notes) after [{}]..!",
        report.output.display(),
        report.note_count,
        report.steps.join(", ")
    );
    Ok(())
}

use crate::engine::StyleResolver;
use crate::error::{Result, StudioError};
use crate::midi_exporter::export_score;
use crate::midi_importer::import_score;
use crate::model::score::Score;
use crate::model::style::{STYLE_SCHEMA, StyleParameterSet};
use crate::transforms::*;
use crate::util::{CancelFlag, require_file};
use log::{debug, info};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionReport {
    pub output: PathBuf,
    pub steps: Vec<&'static str>,
    pub note_count: usize,
}

/// Runs every active step of `params` against `score`, in the fixed application order.
pub fn apply_parameters(score: &mut Score, params: &StyleParameterSet, rng: &mut StdRng) -> Result<()> {
    if let Some(scale) = &params.scale {
        quantize_to_scale(score, scale);
    }
    if let Some(bpm) = params.tempo {
        rescale_tempo(score, bpm)?;
    }
    if let Some(semitones) = params.transpose {
        transpose(score, semitones)?;
    }
    if let Some(factor) = params.duration_factor {
        scale_durations(score, factor)?;
    }
    if params.swing {
        apply_swing(score, DEFAULT_SWING)?;
    }
    if let Some(factor) = params.velocity_factor {
        scale_velocity(score, factor)?;
    }
    if params.arpeggiate {
        arpeggiate(score, DEFAULT_ARPEGGIO_INTERVAL)?;
    }
    if params.harmony {
        add_harmony(score, DEFAULT_HARMONY_INTERVAL);
    }
    if params.humanize {
        humanize(score, DEFAULT_TIMING_VARIATION, DEFAULT_VELOCITY_VARIATION, rng)?;
    }
    if let Some(effect) = params.volume_effect {
        add_volume_event(score, effect.value as i32, effect.time)?;
    }
    if !params.instruments.is_empty() {
        remap_instruments(score, &params.instruments)?;
    }

    Ok(())
}

/// Returns a restyled copy. `score` itself is never touched, and a failing step discards the copy.
///
/// Bounds that depend on the score, like the volume event time, are checked against the copy
/// as it stands when that step runs.
pub fn restyle_score(score: &Score, params: &StyleParameterSet, rng: &mut StdRng) -> Result<Score> {
    let mut working = score.clone();
    apply_parameters(&mut working, params, rng)?;
    Ok(working)
}

/// `song.mid` becomes `song_restyled.mid` in the same directory.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "score".into());
    input.with_file_name(format!("{}_restyled.mid", stem))
}

pub struct StyleConverter<R: StyleResolver> {
    resolver: R,
    seed: Option<u64>,
    cancel: CancelFlag,
}

impl<R: StyleResolver> StyleConverter<R> {
    pub fn new(resolver: R, seed: Option<u64>, cancel: CancelFlag) -> Self {
        Self {
            resolver,
            seed,
            cancel,
        }
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// An absent or blank instruction resolves to an empty parameter set without asking the resolver.
    pub fn resolve_parameters(&self, instruction: Option<&str>) -> Result<StyleParameterSet> {
        let instruction = instruction.map(str::trim).unwrap_or_default();
        if instruction.is_empty() {
            info!("No style instruction given, nothing to resolve..!");
            return Ok(StyleParameterSet::default());
        }

        self.cancel.check("style resolution")?;
        info!("Resolving style instruction: '{}'..!", instruction);
        let raw: Value = self.resolver.resolve(instruction, &STYLE_SCHEMA)?;
        debug!("Resolved raw parameters: {}", raw);

        StyleParameterSet::from_value(&raw)
    }

    pub fn convert(&self, input: &Path, output: &Path, instruction: Option<&str>) -> Result<ConversionReport> {
        check_paths(input, output)?;
        let params = self.resolve_parameters(instruction)?;
        self.convert_with(input, output, &params)
    }

    /// Same as [`convert`](Self::convert) with parameters that were already validated.
    pub fn convert_with(&self, input: &Path, output: &Path, params: &StyleParameterSet) -> Result<ConversionReport> {
        check_paths(input, output)?;

        self.cancel.check("score import")?;
        let score = import_score(input)?;
        info!(
            "Loaded {} with {} instrument(s) and {} note(s)..!",
            input.display(),
            score.instruments.len(),
            score.note_count()
        );

        if let Some(scale) = detect_scale(&score) {
            info!("Source looks like it is in {}..!", scale);
        }

        let steps = params.active_steps();
        info!("Applying steps: [{}]..!", steps.join(", "));

        let restyled = restyle_score(&score, params, &mut self.rng())?;

        self.cancel.check("score export")?;
        export_score(&restyled, output)?;

        Ok(ConversionReport {
            output: output.to_path_buf(),
            steps,
            note_count: restyled.note_count(),
        })
    }
}

fn check_paths(input: &Path, output: &Path) -> Result<()> {
    require_file(input, "MIDI file")?;

    let same = match (input.canonicalize(), output.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => input == output,
    };
    if same {
        return Err(StudioError::InvalidParameter(format!(
            "refusing to overwrite the source file {}, pick another output path",
            input.display()
        )));
    }

    Ok(())
}

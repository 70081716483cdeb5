use crate::error::{Result, StudioError};
use crate::model::instruments::{checked_program, program_for_name, program_table_text};
use crate::model::scale::ScaleSpec;
use log::warn;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const MAX_TRANSPOSE: i32 = 48;

/// Order in which parameters are applied to a score. Instrument remapping always runs last.
pub const APPLICATION_ORDER: [&str; 11] = [
    "scale",
    "tempo",
    "transpose",
    "duration_factor",
    "swing",
    "velocity_factor",
    "arpeggiate",
    "harmony",
    "humanize",
    "volume_effect",
    "instruments",
];

/// Describes one key of the parameter schema handed to a natural-language resolver.
#[derive(Serialize, Debug, Clone, Copy)]
pub struct ParameterSpec {
    pub key: &'static str,
    pub value_type: &'static str,
    pub description: &'static str,
    pub constraints: &'static str,
    /// Whether the constraint text must reach the resolver alongside the description.
    pub complex: bool,
}

pub const STYLE_SCHEMA: [ParameterSpec; 11] = [
    ParameterSpec {
        key: "instruments",
        value_type: "dict[int, int]",
        description: "Mapping of instrument indices to general-MIDI program numbers.",
        constraints: "Keys must be integer channel indices; values must be program numbers (0-127) from the provided table. Do not use instruments outside that table.",
        complex: true,
    },
    ParameterSpec {
        key: "scale",
        value_type: "str",
        description: "Target scale to move every note into. Format: '(Note)(Accidental)(Octave)_(Type)', e.g. 'C#4_major' or 'D-1_minor'. Notes are A-G, accidentals '#' (sharp) or 'b' (flat), the octave is optional and between -1 and 9.",
        constraints: "Must follow the exact format 'Root_Type'. Types: major or minor.",
        complex: true,
    },
    ParameterSpec {
        key: "tempo",
        value_type: "float",
        description: "Target tempo in beats per minute.",
        constraints: "Must be a positive number.",
        complex: true,
    },
    ParameterSpec {
        key: "transpose",
        value_type: "int",
        description: "Number of semitones to transpose.",
        constraints: "Range: -48 to 48.",
        complex: true,
    },
    ParameterSpec {
        key: "duration_factor",
        value_type: "float",
        description: "Factor to scale note durations.",
        constraints: "Must be a positive number.",
        complex: true,
    },
    ParameterSpec {
        key: "swing",
        value_type: "bool",
        description: "Add swing to notes.",
        constraints: "Set to true to enable.",
        complex: false,
    },
    ParameterSpec {
        key: "velocity_factor",
        value_type: "float",
        description: "Factor to scale note velocities.",
        constraints: "Must be a positive number.",
        complex: true,
    },
    ParameterSpec {
        key: "arpeggiate",
        value_type: "bool",
        description: "Apply arpeggiation to chords.",
        constraints: "Set to true to enable.",
        complex: false,
    },
    ParameterSpec {
        key: "harmony",
        value_type: "bool",
        description: "Add harmonic notes.",
        constraints: "Set to true to enable.",
        complex: false,
    },
    ParameterSpec {
        key: "humanize",
        value_type: "bool",
        description: "Add randomness for a humanized feel.",
        constraints: "Set to true to enable.",
        complex: false,
    },
    ParameterSpec {
        key: "volume_effect",
        value_type: "dict",
        description: "Volume effect parameters.",
        constraints: "Must contain 'value' (int, 0-127) and 'time' (float, seconds within the MIDI duration).",
        complex: true,
    },
];

const PROMPT_PREFIX: &str =
    "You are a music AI assistant. Based on the user's description, generate parameters to modify a MIDI file.";

/// Builds the full instruction text for a natural-language resolver.
pub fn style_prompt(instruction: &str, schema: &[ParameterSpec]) -> String {
    let fields = schema
        .iter()
        .map(|spec| {
            let description = if spec.complex {
                format!("{} Constraints: {}", spec.description, spec.constraints)
            } else {
                spec.description.to_string()
            };
            format!("\t\"{}\": {}  // {}", spec.key, spec.value_type, description)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{}\n\n\
         ENSURE OUTPUT FORMAT IS STRICTLY VALID JSON (DO NOT ADD COMMENTS).\n\
         The output should be a markdown code snippet formatted in the following schema, \
         including the leading and trailing \"```json\" and \"```\":\n\n\
         ```json\n{{\n{}\n}}\n```\n\n\
         IMPORTANT CONSTRAINTS:\n\
         1. Instruments must be represented by their MIDI program numbers (0-127) from this mapping:\n   {}\n\
         2. The keys of \"instruments\" are integer instrument indices (0, 1, 2, ...).\n\
         3. Leave out or set to null any parameter the request does not ask for.\n\n\
         User request: {}. Reminder: Only select instruments from the list of available instruments.",
        PROMPT_PREFIX,
        fields,
        program_table_text(),
        instruction.trim()
    )
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct VolumeEffect {
    pub value: u8,
    /// Seconds.
    pub time: f64,
}

/// A fully validated set of style changes. Built once per conversion, never mutated afterwards.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct StyleParameterSet {
    pub scale: Option<ScaleSpec>,
    pub tempo: Option<f64>,
    pub transpose: Option<i32>,
    pub duration_factor: Option<f64>,
    pub swing: bool,
    pub velocity_factor: Option<f64>,
    pub arpeggiate: bool,
    pub harmony: bool,
    pub humanize: bool,
    pub volume_effect: Option<VolumeEffect>,
    pub instruments: BTreeMap<usize, u8>,
}

impl StyleParameterSet {
    /// Validates an untrusted JSON object. Any bad field rejects the whole set.
    pub fn from_value(value: &Value) -> Result<Self> {
        let Some(fields) = value.as_object() else {
            return Err(StudioError::InvalidParameter(format!(
                "style parameters must be a JSON object, got: {}",
                value
            )));
        };

        let mut params = StyleParameterSet::default();

        for (key, raw) in fields.iter() {
            if raw.is_null() {
                continue;
            }

            match key.as_str() {
                "scale" => {
                    let text = raw.as_str().ok_or_else(|| {
                        StudioError::InvalidScaleFormat(format!("scale must be a string, got {}", raw))
                    })?;
                    params.scale = Some(ScaleSpec::parse(text)?);
                }
                "tempo" => params.tempo = Some(positive_number(key, raw)?),
                "transpose" => {
                    let semitones = integer(key, raw)?;
                    if !(-(MAX_TRANSPOSE as i64)..=MAX_TRANSPOSE as i64).contains(&semitones) {
                        return Err(StudioError::OutOfRange(format!(
                            "transpose must be within -{0}..={0}, got {1}",
                            MAX_TRANSPOSE, semitones
                        )));
                    }
                    params.transpose = Some(semitones as i32);
                }
                "duration_factor" => params.duration_factor = Some(positive_number(key, raw)?),
                "velocity_factor" => params.velocity_factor = Some(positive_number(key, raw)?),
                "swing" => params.swing = flag(key, raw)?,
                "arpeggiate" => params.arpeggiate = flag(key, raw)?,
                "harmony" => params.harmony = flag(key, raw)?,
                "humanize" => params.humanize = flag(key, raw)?,
                "volume_effect" => params.volume_effect = Some(volume_effect(raw)?),
                "instruments" => params.instruments = instrument_map(raw)?,
                other => warn!("Ignoring unknown style parameter '{}'..!", other),
            }
        }

        Ok(params)
    }

    pub fn is_empty(&self) -> bool {
        self.active_steps().is_empty()
    }

    /// Names of the steps this set will run, in application order.
    pub fn active_steps(&self) -> Vec<&'static str> {
        APPLICATION_ORDER
            .iter()
            .copied()
            .filter(|step| match *step {
                "scale" => self.scale.is_some(),
                "tempo" => self.tempo.is_some(),
                "transpose" => self.transpose.is_some(),
                "duration_factor" => self.duration_factor.is_some(),
                "swing" => self.swing,
                "velocity_factor" => self.velocity_factor.is_some(),
                "arpeggiate" => self.arpeggiate,
                "harmony" => self.harmony,
                "humanize" => self.humanize,
                "volume_effect" => self.volume_effect.is_some(),
                "instruments" => !self.instruments.is_empty(),
                _ => false,
            })
            .collect()
    }
}

fn positive_number(key: &str, raw: &Value) -> Result<f64> {
    let number = raw.as_f64().ok_or_else(|| {
        StudioError::InvalidParameter(format!("{} must be a number, got {}", key, raw))
    })?;

    if !(number.is_finite() && number > 0.0) {
        return Err(StudioError::InvalidParameter(format!(
            "{} must be a positive number, got {}",
            key, number
        )));
    }

    Ok(number)
}

fn integer(key: &str, raw: &Value) -> Result<i64> {
    if let Some(number) = raw.as_i64() {
        return Ok(number);
    }

    match raw.as_f64() {
        Some(number) if number.fract() == 0.0 && number.abs() < i64::MAX as f64 => Ok(number as i64),
        _ => Err(StudioError::InvalidParameter(format!(
            "{} must be an integer, got {}",
            key, raw
        ))),
    }
}

fn flag(key: &str, raw: &Value) -> Result<bool> {
    raw.as_bool().ok_or_else(|| {
        StudioError::InvalidParameter(format!("{} must be true or false, got {}", key, raw))
    })
}

fn volume_effect(raw: &Value) -> Result<VolumeEffect> {
    let empty = Map::new();
    let fields = raw.as_object().unwrap_or(&empty);

    let (Some(value), Some(time)) = (fields.get("value"), fields.get("time")) else {
        return Err(StudioError::InvalidParameter(format!(
            "volume_effect must contain 'value' and 'time', got {}",
            raw
        )));
    };

    let value = integer("volume_effect.value", value)?;
    if !(0..=127).contains(&value) {
        return Err(StudioError::OutOfRange(format!(
            "volume value must be within 0..=127, got {}",
            value
        )));
    }

    let time = time.as_f64().ok_or_else(|| {
        StudioError::InvalidParameter(format!("volume_effect.time must be a number, got {}", time))
    })?;
    if !(time.is_finite() && time >= 0.0) {
        return Err(StudioError::OutOfRange(format!(
            "volume effect time must be a non-negative number of seconds, got {}",
            time
        )));
    }

    Ok(VolumeEffect {
        value: value as u8,
        time,
    })
}

fn instrument_map(raw: &Value) -> Result<BTreeMap<usize, u8>> {
    let Some(entries) = raw.as_object() else {
        return Err(StudioError::InvalidInstrument(format!(
            "instruments must map indices to programs, got {}",
            raw
        )));
    };

    let mut mapping = BTreeMap::new();
    for (index, program) in entries.iter() {
        let index = index.trim().parse::<usize>().map_err(|_| {
            StudioError::InvalidParameter(format!("instrument index '{}' is not an integer", index))
        })?;

        let program = match program {
            Value::String(name) => program_for_name(name)?,
            other => match other.as_i64() {
                Some(number) => checked_program(number)?,
                None => {
                    return Err(StudioError::InvalidInstrument(format!(
                        "instrument {} must be a program number or name, got {}",
                        index, other
                    )));
                }
            },
        };

        mapping.insert(index, program);
    }

    Ok(mapping)
}

use crate::engine::StyleResolver;
use crate::engine::process::{run_collaborator, split_command};
use crate::error::{Result, StudioError};
use crate::model::instruments::GENERAL_MIDI_PROGRAMS;
use crate::model::style::{ParameterSpec, style_prompt};
use crate::util::{CancelFlag, strip_code_fence};
use log::debug;
use serde_json::{Map, Value, json};

pub const LOUDER_FACTOR: f64 = 1.2;
pub const SOFTER_FACTOR: f64 = 0.8;
pub const LEGATO_FACTOR: f64 = 1.5;
pub const STACCATO_FACTOR: f64 = 0.5;

/// Parses a resolver reply into a JSON object, unwrapping a code fence if there is one.
pub fn parse_resolver_reply(reply: &str) -> Result<Value> {
    let body = strip_code_fence(reply);
    let value: Value = serde_json::from_str(body).map_err(|e| {
        StudioError::CollaboratorFailure(format!("resolver reply is not valid JSON ({}): {}", e, body))
    })?;

    if !value.is_object() {
        return Err(StudioError::CollaboratorFailure(format!(
            "resolver reply must be a JSON object, got: {}",
            value
        )));
    }

    Ok(value)
}

/// Hands the full prompt to an external program on stdin and reads the parameter JSON from stdout.
#[derive(Debug, Clone)]
pub struct CommandStyleResolver {
    pub command: Vec<String>,
    pub cancel: CancelFlag,
}

impl CommandStyleResolver {
    pub fn new(command: Vec<String>, cancel: CancelFlag) -> Self {
        Self { command, cancel }
    }
}

impl StyleResolver for CommandStyleResolver {
    fn resolve(&self, instruction: &str, schema: &[ParameterSpec]) -> Result<Value> {
        let (program, args) = split_command(&self.command)?;
        let prompt = style_prompt(instruction, schema);
        let reply = run_collaborator(program, args, Some(&prompt), &self.cancel)?;
        debug!("Resolver replied: {}", reply.trim());
        parse_resolver_reply(&reply)
    }
}

/// Offline resolver that recognises a handful of phrases.
///
/// Understands swing, arpeggio, harmony, humanize, louder/softer, legato/staccato,
/// `N bpm`, `up|down N semitones`, `in <root> major|minor` and general-MIDI instrument names.
#[derive(Debug, Clone, Default)]
pub struct KeywordStyleResolver;

impl StyleResolver for KeywordStyleResolver {
    fn resolve(&self, instruction: &str, _schema: &[ParameterSpec]) -> Result<Value> {
        let lowered = instruction.to_lowercase();
        let words = lowered
            .split(|c: char| c.is_whitespace() || c == ',' || c == '.' || c == '!' || c == ';')
            .filter(|w| !w.is_empty())
            .collect::<Vec<&str>>();

        let mut params = Map::new();
        let has = |stem: &str| words.iter().any(|w| w.starts_with(stem));

        if has("swing") {
            params.insert("swing".into(), json!(true));
        }
        if has("arpeggi") {
            params.insert("arpeggiate".into(), json!(true));
        }
        if has("harmon") {
            params.insert("harmony".into(), json!(true));
        }
        if has("humaniz") || has("humanis") || has("loose") {
            params.insert("humanize".into(), json!(true));
        }

        if has("louder") {
            params.insert("velocity_factor".into(), json!(LOUDER_FACTOR));
        } else if has("softer") || has("quieter") {
            params.insert("velocity_factor".into(), json!(SOFTER_FACTOR));
        }

        if has("legato") || has("longer") {
            params.insert("duration_factor".into(), json!(LEGATO_FACTOR));
        } else if has("staccato") || has("shorter") {
            params.insert("duration_factor".into(), json!(STACCATO_FACTOR));
        }

        for (i, word) in words.iter().enumerate() {
            let next = words.get(i + 1).copied();

            if let Some(bpm) = word.strip_suffix("bpm").filter(|n| !n.is_empty())
                && let Ok(bpm) = bpm.parse::<f64>()
            {
                params.insert("tempo".into(), json!(bpm));
            } else if next == Some("bpm")
                && let Ok(bpm) = word.parse::<f64>()
            {
                params.insert("tempo".into(), json!(bpm));
            }

            if matches!(*word, "up" | "down")
                && let Some(amount) = next.and_then(|n| n.parse::<i64>().ok())
                && words.get(i + 2).is_some_and(|unit| unit.starts_with("semitone"))
            {
                let semitones = if *word == "up" { amount } else { -amount };
                params.insert("transpose".into(), json!(semitones));
            }

            if *word == "in"
                && let (Some(root), Some(kind)) = (next, words.get(i + 2))
                && matches!(*kind, "major" | "minor")
            {
                params.insert("scale".into(), json!(format!("{}_{}", capitalize(root), kind)));
            }
        }

        // longest match first, so "acoustic grand piano" beats "piano"-like fragments
        let best = GENERAL_MIDI_PROGRAMS
            .iter()
            .enumerate()
            .filter(|(_, name)| lowered.contains(&name.to_lowercase()))
            .max_by_key(|(_, name)| name.len());
        if let Some((program, name)) = best {
            debug!("Instruction mentions '{}'", name);
            params.insert("instruments".into(), json!({ "0": program }));
        }

        Ok(Value::Object(params))
    }
}

fn capitalize(root: &str) -> String {
    let mut chars = root.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

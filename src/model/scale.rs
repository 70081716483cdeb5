use crate::error::{Result, StudioError};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const PITCH_CLASS_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

const MAJOR_INTERVALS: [u8; 7] = [0, 2, 4, 5, 7, 9, 11];
const MINOR_INTERVALS: [u8; 7] = [0, 2, 3, 5, 7, 8, 10];

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScaleKind {
    Major,
    Minor,
}

impl ScaleKind {
    pub fn intervals(&self) -> &'static [u8; 7] {
        match self {
            ScaleKind::Major => &MAJOR_INTERVALS,
            ScaleKind::Minor => &MINOR_INTERVALS,
        }
    }
}

impl fmt::Display for ScaleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleKind::Major => write!(f, "major"),
            ScaleKind::Minor => write!(f, "minor"),
        }
    }
}

/// A target scale parsed from the `Root_Type` shape, e.g. `C#4_major` or `Bb_minor`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScaleSpec {
    /// Pitch class of the root, 0 = C.
    pub root: u8,
    pub kind: ScaleKind,
}

impl ScaleSpec {
    pub fn new(root: u8, kind: ScaleKind) -> Self {
        Self {
            root: root % 12,
            kind,
        }
    }

    pub fn parse(input: &str) -> Result<Self> {
        let parts = input.trim().split('_').collect::<Vec<_>>();
        let [root, kind] = parts.as_slice() else {
            return Err(StudioError::InvalidScaleFormat(format!(
                "'{}' must look like 'Root_Type', e.g. 'C#4_major'",
                input
            )));
        };

        let root = pitch_class_of(root)?;
        let kind = match kind.to_ascii_lowercase().as_str() {
            "major" => ScaleKind::Major,
            "minor" => ScaleKind::Minor,
            other => {
                return Err(StudioError::InvalidScaleFormat(format!(
                    "unknown scale type '{}', expected 'major' or 'minor'",
                    other
                )));
            }
        };

        Ok(Self::new(root, kind))
    }

    /// Member pitch classes in ascending order.
    pub fn pitch_classes(&self) -> Vec<u8> {
        let mut classes = self
            .kind
            .intervals()
            .iter()
            .map(|interval| (self.root + interval) % 12)
            .collect::<Vec<_>>();
        classes.sort_unstable();
        classes
    }

    pub fn contains(&self, pitch: u8) -> bool {
        self.pitch_classes().contains(&(pitch % 12))
    }
}

impl fmt::Display for ScaleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", PITCH_CLASS_NAMES[self.root as usize], self.kind)
    }
}

const OCTAVE_RANGE: std::ops::RangeInclusive<i32> = -1..=9;
const MAX_ACCIDENTALS: i32 = 11;

/// Parses a note name (`C`, `c#4`, `Bb-1`, `F##`) into a MIDI note number.
/// Without an octave the note is placed in octave -1, so the result is its pitch class.
pub fn note_name_to_number(name: &str) -> Result<i32> {
    let invalid = || StudioError::InvalidScaleFormat(format!("'{}' is not a note name", name));

    let mut chars = name.trim().chars().peekable();
    let letter = chars.next().ok_or_else(invalid)?;
    let base: i32 = match letter.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return Err(invalid()),
    };

    let mut offset: i32 = 0;
    while let Some(&c) = chars.peek() {
        match c {
            '#' => offset += 1,
            'b' | '!' => offset -= 1,
            _ => break,
        }
        if offset.abs() > MAX_ACCIDENTALS {
            return Err(invalid());
        }
        chars.next();
    }

    let octave_text = chars.collect::<String>();
    let octave = if octave_text.is_empty() {
        -1
    } else {
        octave_text.parse::<i32>().map_err(|_| invalid())?
    };
    if !OCTAVE_RANGE.contains(&octave) {
        return Err(invalid());
    }

    Ok(12 * (octave + 1) + base + offset)
}

fn pitch_class_of(name: &str) -> Result<u8> {
    Ok(note_name_to_number(name)?.rem_euclid(12) as u8)
}

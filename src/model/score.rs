use crate::error::{Result, StudioError};
use crate::model::instruments::program_name;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BPM: f64 = 120.0;
pub const DEFAULT_RESOLUTION: u16 = 220;
pub const VOLUME_CONTROLLER: u8 = 7;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Note {
    pub pitch: u8,
    pub velocity: u8,
    /// Seconds.
    pub start: f64,
    /// Seconds, never before `start`.
    pub end: f64,
}

impl Note {
    pub fn new(pitch: u8, velocity: u8, start: f64, end: f64) -> Self {
        Self {
            pitch,
            velocity,
            start,
            end,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ControlEvent {
    pub number: u8,
    pub value: u8,
    pub time: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct TempoChange {
    pub time: f64,
    pub bpm: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum MetaKind {
    Lyric(String),
    KeySignature { sharps: i8, minor: bool },
    TimeSignature { numerator: u8, denominator: u8 },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MetaEvent {
    pub time: f64,
    pub kind: MetaKind,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Instrument {
    pub program: u8,
    pub name: String,
    pub is_drum: bool,
    pub notes: Vec<Note>,
    pub control_events: Vec<ControlEvent>,
}

impl Instrument {
    /// Builds an empty instrument named after its general-MIDI program.
    pub fn new(program: u8) -> Result<Self> {
        let name = program_name(program)?;
        Ok(Self {
            program,
            name: name.to_string(),
            is_drum: false,
            notes: Vec::new(),
            control_events: Vec::new(),
        })
    }

    pub fn set_program(&mut self, program: u8) -> Result<()> {
        self.name = program_name(program)?.to_string();
        self.program = program;
        Ok(())
    }

    pub fn end_time(&self) -> f64 {
        let note_end = self.notes.iter().map(|n| n.end).fold(0.0, f64::max);
        let control_end = self.control_events.iter().map(|c| c.time).fold(0.0, f64::max);
        note_end.max(control_end)
    }
}

/// A multi-instrument note sequence with its tempo map and meta events, all timed in seconds.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Score {
    /// Ticks per quarter note used when the score is written back out.
    pub resolution: u16,
    pub tempo_changes: Vec<TempoChange>,
    pub instruments: Vec<Instrument>,
    pub meta_events: Vec<MetaEvent>,
}

impl Default for Score {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            tempo_changes: vec![TempoChange {
                time: 0.0,
                bpm: DEFAULT_BPM,
            }],
            instruments: Vec::new(),
            meta_events: Vec::new(),
        }
    }
}

impl Score {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn end_time(&self) -> f64 {
        let instrument_end = self
            .instruments
            .iter()
            .map(Instrument::end_time)
            .fold(0.0, f64::max);
        let meta_end = self.meta_events.iter().map(|m| m.time).fold(0.0, f64::max);
        let tempo_end = self.tempo_changes.iter().map(|t| t.time).fold(0.0, f64::max);

        instrument_end.max(meta_end).max(tempo_end)
    }

    pub fn note_count(&self) -> usize {
        self.instruments.iter().map(|i| i.notes.len()).sum()
    }

    /// Mean of the tempo map's BPM values, or 120 when the map is empty.
    pub fn mean_tempo(&self) -> f64 {
        if self.tempo_changes.is_empty() {
            return DEFAULT_BPM;
        }

        self.tempo_changes.iter().map(|t| t.bpm).sum::<f64>() / self.tempo_changes.len() as f64
    }

    pub fn notes_mut(&mut self) -> impl Iterator<Item = &mut Note> {
        self.instruments.iter_mut().flat_map(|i| i.notes.iter_mut())
    }

    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.instruments.iter().flat_map(|i| i.notes.iter())
    }

    /// Multiplies every time-bearing field by `ratio`.
    pub fn scale_times(&mut self, ratio: f64) -> Result<()> {
        if !(ratio.is_finite() && ratio > 0.0) {
            return Err(StudioError::InvalidParameter(format!(
                "time scale ratio must be positive, got {}",
                ratio
            )));
        }

        for instrument in self.instruments.iter_mut() {
            for note in instrument.notes.iter_mut() {
                note.start *= ratio;
                note.end *= ratio;
            }
            for control in instrument.control_events.iter_mut() {
                control.time *= ratio;
            }
        }

        for meta in self.meta_events.iter_mut() {
            meta.time *= ratio;
        }

        for tempo in self.tempo_changes.iter_mut() {
            tempo.time *= ratio;
        }

        Ok(())
    }
}

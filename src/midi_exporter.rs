use crate::error::{Result, StudioError};
use crate::midi_importer::{DRUM_CHANNEL, MICROSECONDS_PER_MINUTE};
use crate::model::score::*;
use log::{debug, info};
use midly::num::{u4, u7, u15, u24, u28};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::fs;
use std::path::Path;

const MAX_MPQN: u32 = 0x00FF_FFFF;
const MAX_DELTA: u64 = 0x0FFF_FFFF;

// Ordering at equal ticks, so a re-struck pitch is released before it sounds again.
const ORDER_PROGRAM: u8 = 0;
const ORDER_CONTROL: u8 = 1;
const ORDER_NOTE_OFF: u8 = 2;
const ORDER_NOTE_ON: u8 = 3;

struct ClockSegment {
    pub time: f64,
    pub bpm: f64,
    pub tick: f64,
}

/// Maps seconds back onto ticks using the score's tempo map.
struct TickClock {
    segments: Vec<ClockSegment>,
    ticks_per_quarter: f64,
}

impl TickClock {
    fn new(score: &Score) -> Self {
        let ticks_per_quarter = score.resolution.max(1) as f64;

        let mut changes = score
            .tempo_changes
            .iter()
            .filter(|t| t.bpm.is_finite() && t.bpm > 0.0 && t.time.is_finite())
            .copied()
            .collect::<Vec<TempoChange>>();
        changes.sort_by(|a, b| a.time.total_cmp(&b.time));

        if changes.first().is_none_or(|t| t.time > 0.0) {
            changes.insert(
                0,
                TempoChange {
                    time: 0.0,
                    bpm: DEFAULT_BPM,
                },
            );
        }

        let mut segments: Vec<ClockSegment> = Vec::with_capacity(changes.len());
        for change in changes.into_iter() {
            let tick = match segments.last() {
                Some(prev) => prev.tick + (change.time - prev.time) * prev.bpm / 60.0 * ticks_per_quarter,
                None => 0.0,
            };
            segments.push(ClockSegment {
                time: change.time,
                bpm: change.bpm,
                tick,
            });
        }

        Self {
            segments,
            ticks_per_quarter,
        }
    }

    fn tick_at(&self, seconds: f64) -> u64 {
        let seconds = seconds.max(0.0);
        let Some(segment) = self.segments.iter().rfind(|seg| seg.time <= seconds) else {
            return 0;
        };

        let tick = segment.tick + (seconds - segment.time) * segment.bpm / 60.0 * self.ticks_per_quarter;
        tick.round().max(0.0) as u64
    }
}

fn mpqn_for(bpm: f64) -> u32 {
    (MICROSECONDS_PER_MINUTE / bpm).round().clamp(1.0, MAX_MPQN as f64) as u32
}

fn to_track<'a>(mut events: Vec<(u64, u8, TrackEventKind<'a>)>) -> Vec<TrackEvent<'a>> {
    events.sort_by_key(|(tick, order, _)| (*tick, *order));

    let mut track = Vec::with_capacity(events.len() + 1);
    let mut last_tick = 0u64;
    for (tick, _, kind) in events.into_iter() {
        let delta = (tick - last_tick).min(MAX_DELTA) as u32;
        track.push(TrackEvent {
            delta: u28::new(delta),
            kind,
        });
        last_tick = tick;
    }

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    track
}

fn conductor_track<'a>(score: &'a Score, clock: &TickClock) -> Vec<TrackEvent<'a>> {
    let mut events: Vec<(u64, u8, TrackEventKind<'a>)> = Vec::new();

    for segment in clock.segments.iter() {
        events.push((
            segment.tick.round() as u64,
            ORDER_PROGRAM,
            TrackEventKind::Meta(MetaMessage::Tempo(u24::new(mpqn_for(segment.bpm)))),
        ));
    }

    for meta in score.meta_events.iter() {
        let message = match &meta.kind {
            MetaKind::Lyric(text) => MetaMessage::Lyric(text.as_bytes()),
            MetaKind::KeySignature { sharps, minor } => MetaMessage::KeySignature(*sharps, *minor),
            MetaKind::TimeSignature {
                numerator,
                denominator,
            } => MetaMessage::TimeSignature(
                *numerator,
                (*denominator).max(1).trailing_zeros() as u8,
                24,
                8,
            ),
        };
        events.push((clock.tick_at(meta.time), ORDER_CONTROL, TrackEventKind::Meta(message)));
    }

    to_track(events)
}

fn instrument_track<'a>(instrument: &'a Instrument, channel: u8, clock: &TickClock) -> Vec<TrackEvent<'a>> {
    let channel = u4::new(channel);
    let mut events: Vec<(u64, u8, TrackEventKind<'a>)> = vec![
        (
            0,
            ORDER_PROGRAM,
            TrackEventKind::Meta(MetaMessage::TrackName(instrument.name.as_bytes())),
        ),
        (
            0,
            ORDER_PROGRAM,
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::ProgramChange {
                    program: u7::new(instrument.program.min(127)),
                },
            },
        ),
    ];

    for control in instrument.control_events.iter() {
        events.push((
            clock.tick_at(control.time),
            ORDER_CONTROL,
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::Controller {
                    controller: u7::new(control.number.min(127)),
                    value: u7::new(control.value.min(127)),
                },
            },
        ));
    }

    for note in instrument.notes.iter() {
        let start_tick = clock.tick_at(note.start);
        // zero-length notes still need an audible tick
        let end_tick = clock.tick_at(note.end).max(start_tick + 1);
        let key = u7::new(note.pitch.min(127));

        events.push((
            start_tick,
            ORDER_NOTE_ON,
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn {
                    key,
                    vel: u7::new(note.velocity.clamp(1, 127)),
                },
            },
        ));
        events.push((
            end_tick,
            ORDER_NOTE_OFF,
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOff { key, vel: u7::new(0) },
            },
        ));
    }

    to_track(events)
}

/// Builds a format 1 file: one conductor track, then one track per instrument.
pub fn score_to_smf(score: &Score) -> Smf<'_> {
    let resolution = score.resolution.clamp(1, i16::MAX as u16);
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(resolution)),
    ));

    let clock = TickClock::new(score);
    smf.tracks.push(conductor_track(score, &clock));

    let melodic_channels = (0u8..16).filter(|ch| *ch != DRUM_CHANNEL).collect::<Vec<u8>>();
    let mut next_melodic = 0usize;

    for instrument in score.instruments.iter() {
        let channel = if instrument.is_drum {
            DRUM_CHANNEL
        } else {
            let ch = melodic_channels[next_melodic % melodic_channels.len()];
            next_melodic += 1;
            ch
        };

        debug!(
            "Writing '{}' (program {}) on channel {}",
            instrument.name, instrument.program, channel
        );
        smf.tracks.push(instrument_track(instrument, channel, &clock));
    }

    smf
}

/// Writes the score next to `path` first and moves it into place, so a failure never leaves a half-written file.
pub fn export_score<P: AsRef<Path>>(score: &Score, path: P) -> Result<()> {
    let path = path.as_ref();
    let staging = path.with_extension("mid.partial");

    let smf = score_to_smf(score);
    smf.save(&staging).map_err(|e| {
        let _ = fs::remove_file(&staging);
        StudioError::IoFailure(format!("Failed to write MIDI file {}: {}", path.display(), e))
    })?;

    fs::rename(&staging, path).map_err(|e| {
        let _ = fs::remove_file(&staging);
        StudioError::IoFailure(format!("Failed to move MIDI file into {}: {}", path.display(), e))
    })?;

    info!(
        "Wrote {} instrument(s), {} note(s) to {}..!",
        score.instruments.len(),
        score.note_count(),
        path.display()
    );
    Ok(())
}

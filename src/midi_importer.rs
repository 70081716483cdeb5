use crate::error::{Result, StudioError};
use crate::model::instruments::program_name;
use crate::model::score::*;
use log::{debug, warn};
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub const DEFAULT_MPQN: u32 = 500_000;
pub const MICROSECONDS_PER_MINUTE: f64 = 60_000_000.0;
pub const DRUM_CHANNEL: u8 = 9;

/// (track, channel, program) identifies one instrument, the same way most SMF readers split them.
type InstrumentKey = (usize, u8, u8);

struct NoteInterval {
    pub key: InstrumentKey,
    pub pitch: u8,
    pub start_tick: u64,
    pub end_tick: u64,
    pub velocity: u8,
}

struct ControlPoint {
    pub key: InstrumentKey,
    pub tick: u64,
    pub number: u8,
    pub value: u8,
}

#[derive(Debug, Clone)]
struct TempoSegment {
    pub mpqn: u32,
    pub start_tick: u64,
    pub seconds_at_start: f64,
}

pub fn import_score<P: AsRef<Path>>(path: P) -> Result<Score> {
    let bytes = fs::read(path.as_ref()).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StudioError::MissingInput(format!("MIDI file {} does not exist", path.as_ref().display()))
        } else {
            StudioError::IoFailure(format!(
                "Failed to read MIDI file {}: {}",
                path.as_ref().display(),
                e
            ))
        }
    })?;

    midi_bytes_to_score(&bytes)
}

pub fn midi_bytes_to_score(bytes: &[u8]) -> Result<Score> {
    let smf = Smf::parse(bytes)
        .map_err(|e| StudioError::IoFailure(format!("Failed to parse MIDI: {:?}", e)))?;

    let ticks_per_quarter = match smf.header.timing {
        Timing::Metrical(t) => t.as_int() as u64,
        Timing::Timecode(_fps, _subframe) => {
            return Err(StudioError::InvalidParameter(
                "SMPTE timecode midi timing is not currently supported..!".into(),
            ));
        }
    };

    debug!("Ticks per quarter note: {}", ticks_per_quarter);
    debug!(
        "MIDI format: {:?}, tracks: {}",
        smf.header.format,
        smf.tracks.len()
    );

    let mut tempo_changes: Vec<(u64, u32)> = Vec::new();
    tempo_changes.push((0u64, DEFAULT_MPQN)); // default tempo to 120bpm until a tempo meta appears

    let mut intervals: Vec<NoteInterval> = Vec::new();
    let mut controls: Vec<ControlPoint> = Vec::new();
    let mut metas: Vec<(u64, MetaKind)> = Vec::new();
    let mut track_names: HashMap<usize, String> = HashMap::new();
    let mut open_notes: HashMap<(usize, u8, u8), Vec<(u64, u8, u8)>> = HashMap::new();
    let mut instrument_order: Vec<InstrumentKey> = Vec::new();

    for (track_idx, track) in smf.tracks.iter().enumerate() {
        let mut abs_tick: u64 = 0;
        let mut programs = [0u8; 16];

        for event in track.iter() {
            abs_tick = abs_tick.saturating_add(event.delta.as_int() as u64);

            match &event.kind {
                TrackEventKind::Meta(meta) => match meta {
                    MetaMessage::Tempo(micro) => {
                        let mpqn: u32 = micro.as_int();
                        tempo_changes.push((abs_tick, mpqn));
                        debug!(
                            "Tempo change at tick {} -> {} us/qn (track {})",
                            abs_tick, mpqn, track_idx
                        );
                    }
                    MetaMessage::TrackName(bytes) => {
                        track_names
                            .entry(track_idx)
                            .or_insert_with(|| String::from_utf8_lossy(bytes).trim().to_string());
                    }
                    MetaMessage::Lyric(bytes) => {
                        metas.push((abs_tick, MetaKind::Lyric(String::from_utf8_lossy(bytes).to_string())));
                    }
                    MetaMessage::KeySignature(sharps, minor) => {
                        metas.push((
                            abs_tick,
                            MetaKind::KeySignature {
                                sharps: *sharps,
                                minor: *minor,
                            },
                        ));
                    }
                    MetaMessage::TimeSignature(numerator, denominator_pow, _, _) => {
                        metas.push((
                            abs_tick,
                            MetaKind::TimeSignature {
                                numerator: *numerator,
                                denominator: 1u8.checked_shl(*denominator_pow as u32).unwrap_or(4),
                            },
                        ));
                    }
                    _ => {}
                },
                TrackEventKind::Midi { channel, message } => {
                    let ch: u8 = channel.as_int();
                    let key = (track_idx, ch, programs[ch as usize]);

                    match message {
                        MidiMessage::ProgramChange { program } => {
                            programs[ch as usize] = program.as_int();
                        }
                        MidiMessage::Controller { controller, value } => {
                            register(&mut instrument_order, key);
                            controls.push(ControlPoint {
                                key,
                                tick: abs_tick,
                                number: controller.as_int(),
                                value: value.as_int(),
                            });
                        }
                        MidiMessage::NoteOn { key: pitch, vel } => {
                            let velocity: u8 = vel.as_int();

                            if velocity == 0 {
                                close_note(
                                    &mut open_notes,
                                    &mut intervals,
                                    (track_idx, ch, pitch.as_int()),
                                    abs_tick,
                                );
                            } else {
                                register(&mut instrument_order, key);
                                open_notes
                                    .entry((track_idx, ch, pitch.as_int()))
                                    .or_default()
                                    .push((abs_tick, velocity, programs[ch as usize]));
                            }
                        }
                        MidiMessage::NoteOff { key: pitch, vel: _ } => {
                            close_note(
                                &mut open_notes,
                                &mut intervals,
                                (track_idx, ch, pitch.as_int()),
                                abs_tick,
                            );
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }
    }

    let last_tick_estimate = intervals
        .iter()
        .map(|interval| interval.end_tick)
        .max()
        .unwrap_or(0)
        .max(
            tempo_changes
                .iter()
                .map(|(tick, _)| *tick)
                .max()
                .unwrap_or(0),
        );

    for ((track_idx, ch, pitch), stack) in open_notes.into_iter() {
        for (start_tick, start_vel, program) in stack {
            let end_tick = if last_tick_estimate > start_tick {
                last_tick_estimate
            } else {
                start_tick + ticks_per_quarter
            };

            intervals.push(NoteInterval {
                key: (track_idx, ch, program),
                pitch,
                start_tick,
                end_tick,
                velocity: start_vel,
            });

            warn!(
                "Unclosed NoteOn for {}, channel: {} at tick: {} auto-closing at: {}..!",
                pitch, ch, start_tick, end_tick
            );
        }
    }

    let mut last_tick: u64 = 0;
    let mut seconds_accum: f64 = 0.0;
    let mut last_mpqn: u32 = DEFAULT_MPQN;
    let mut tempo_segments: Vec<TempoSegment> = Vec::new();

    // stable, so a file tempo at tick 0 lands after our default
    tempo_changes.sort_by_key(|(tick, _)| *tick);

    for (tick, mpqn) in tempo_changes.into_iter() {
        if tick > last_tick {
            let delta_ticks = (tick - last_tick) as f64;
            seconds_accum += delta_ticks * (last_mpqn as f64) / (ticks_per_quarter as f64) / 1_000_000.0;
        }

        match tempo_segments.last_mut() {
            Some(previous) if previous.start_tick == tick => previous.mpqn = mpqn,
            _ => tempo_segments.push(TempoSegment {
                start_tick: tick,
                mpqn,
                seconds_at_start: seconds_accum,
            }),
        }

        last_tick = tick;
        last_mpqn = mpqn;
    }

    let ticks_to_seconds = |tick: u64| -> f64 {
        let segment = match tempo_segments.iter().rfind(|seg| seg.start_tick <= tick) {
            Some(s) => s,
            None => &tempo_segments[0],
        };

        let delta_ticks = tick.saturating_sub(segment.start_tick) as f64;
        segment.seconds_at_start
            + delta_ticks * (segment.mpqn as f64) / (ticks_per_quarter as f64) / 1_000_000.0
    };

    let mut score = Score {
        resolution: ticks_per_quarter.clamp(1, i16::MAX as u64) as u16,
        tempo_changes: tempo_segments
            .iter()
            .map(|seg| TempoChange {
                time: seg.seconds_at_start,
                bpm: MICROSECONDS_PER_MINUTE / (seg.mpqn.max(1) as f64),
            })
            .collect(),
        instruments: Vec::new(),
        meta_events: metas
            .into_iter()
            .map(|(tick, kind)| MetaEvent {
                time: ticks_to_seconds(tick),
                kind,
            })
            .collect(),
    };

    let mut index_of: HashMap<InstrumentKey, usize> = HashMap::new();
    for key in instrument_order.into_iter() {
        let (track_idx, ch, program) = key;
        let mut instrument = Instrument::new(program)?;
        instrument.is_drum = ch == DRUM_CHANNEL;
        if let Some(name) = track_names.get(&track_idx).filter(|n| !n.is_empty()) {
            instrument.name = name.clone();
        }

        index_of.insert(key, score.instruments.len());
        score.instruments.push(instrument);
    }

    intervals.sort_by_key(|interval| (interval.start_tick, interval.pitch));
    for interval in intervals.into_iter() {
        let start = ticks_to_seconds(interval.start_tick);
        let end = ticks_to_seconds(interval.end_tick);

        if end < start {
            debug!(
                "Skipping negative duration midi note {}, start: {} end: {}..!",
                interval.pitch, start, end
            );
            continue;
        }

        let Some(&idx) = index_of.get(&interval.key) else {
            continue;
        };
        score.instruments[idx]
            .notes
            .push(Note::new(interval.pitch, interval.velocity, start, end));
    }

    for control in controls.into_iter() {
        if let Some(&idx) = index_of.get(&control.key) {
            score.instruments[idx].control_events.push(ControlEvent {
                number: control.number,
                value: control.value,
                time: ticks_to_seconds(control.tick),
            });
        }
    }

    debug!(
        "Imported {} instrument(s) with {} note(s), ending at {:.3}s..!",
        score.instruments.len(),
        score.note_count(),
        score.end_time()
    );

    // program numbers come from 7-bit data bytes, so this only guards hand-built keys
    for instrument in score.instruments.iter() {
        program_name(instrument.program)?;
    }

    Ok(score)
}

fn register(order: &mut Vec<InstrumentKey>, key: InstrumentKey) {
    if !order.contains(&key) {
        order.push(key);
    }
}

fn close_note(
    open_notes: &mut HashMap<(usize, u8, u8), Vec<(u64, u8, u8)>>,
    intervals: &mut Vec<NoteInterval>,
    (track_idx, ch, pitch): (usize, u8, u8),
    abs_tick: u64,
) {
    let opened = open_notes
        .get_mut(&(track_idx, ch, pitch))
        .and_then(|stack| stack.pop());

    if let Some((start_tick, start_vel, program)) = opened {
        intervals.push(NoteInterval {
            key: (track_idx, ch, program),
            pitch,
            start_tick,
            end_tick: abs_tick,
            velocity: start_vel,
        });
    } else {
        debug!(
            "Orphaned NoteOff for {} ch{} at tick {}..!",
            pitch, ch, abs_tick
        );
    }
}

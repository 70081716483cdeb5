//! In-place mutators over a [`Score`]. Each one validates its arguments before touching any note,
//! so a rejected call leaves the score exactly as it was.

use crate::error::{Result, StudioError};
use crate::model::instruments::program_name;
use crate::model::scale::{PITCH_CLASS_NAMES, ScaleKind, ScaleSpec};
use crate::model::score::{ControlEvent, Note, Score, VOLUME_CONTROLLER};
use crate::model::style::MAX_TRANSPOSE;
use log::{debug, warn};
use rand::Rng;
use std::collections::BTreeMap;

pub const DEFAULT_SWING: f64 = 0.2;
pub const MAX_SWING: f64 = 0.5;
pub const DEFAULT_ARPEGGIO_INTERVAL: f64 = 0.1;
pub const DEFAULT_HARMONY_INTERVAL: i32 = 7;
pub const DEFAULT_TIMING_VARIATION: f64 = 0.05;
pub const DEFAULT_VELOCITY_VARIATION: i32 = 10;

/// Notes whose starts differ by less than this are treated as one chord.
const CHORD_EPSILON: f64 = 1e-6;

/// Moves every note to the nearest pitch class of `scale` inside its own octave.
///
/// Distance is measured linearly within `0..12` (no wrap-around). When two members are
/// equally close the lower one wins. A result above 127 is folded down an octave.
pub fn quantize_to_scale(score: &mut Score, scale: &ScaleSpec) {
    let members = scale.pitch_classes();

    for note in score.notes_mut() {
        let pitch_class = note.pitch % 12;
        let nearest = members
            .iter()
            .copied()
            .min_by_key(|&member| ((member as i16 - pitch_class as i16).abs(), member))
            .unwrap_or(pitch_class);

        let mut pitch = (note.pitch - pitch_class) as u16 + nearest as u16;
        if pitch > 127 {
            pitch -= 12;
        }
        note.pitch = pitch as u8;
    }
}

/// Retimes the score so its mean tempo becomes `target_bpm`.
///
/// Every time field is multiplied by `mean / target` and every tempo-map value is
/// multiplied by `target / mean`, so the written file keeps the same tick positions.
pub fn rescale_tempo(score: &mut Score, target_bpm: f64) -> Result<()> {
    if !(target_bpm.is_finite() && target_bpm > 0.0) {
        return Err(StudioError::InvalidParameter(format!(
            "target tempo must be positive, got {}",
            target_bpm
        )));
    }

    let original = score.mean_tempo();
    let ratio = original / target_bpm;
    debug!(
        "Rescaling tempo from {:.3} to {:.3} BPM (time ratio {:.5})..!",
        original, target_bpm, ratio
    );

    score.scale_times(ratio)?;
    for tempo in score.tempo_changes.iter_mut() {
        tempo.bpm /= ratio;
    }

    Ok(())
}

pub fn transpose(score: &mut Score, semitones: i32) -> Result<()> {
    if !(-MAX_TRANSPOSE..=MAX_TRANSPOSE).contains(&semitones) {
        return Err(StudioError::OutOfRange(format!(
            "transpose must be within -{0}..={0} semitones, got {1}",
            MAX_TRANSPOSE, semitones
        )));
    }

    let mut clamped = 0;
    for note in score.notes_mut() {
        let pitch = note.pitch as i32 + semitones;
        if !(0..=127).contains(&pitch) {
            clamped += 1;
        }
        note.pitch = pitch.clamp(0, 127) as u8;
    }

    if clamped > 0 {
        warn!("Clamped {} note(s) into the MIDI range while transposing..!", clamped);
    }

    Ok(())
}

pub fn scale_durations(score: &mut Score, factor: f64) -> Result<()> {
    if !(factor.is_finite() && factor > 0.0) {
        return Err(StudioError::InvalidParameter(format!(
            "duration factor must be positive, got {}",
            factor
        )));
    }

    for note in score.notes_mut() {
        note.end = note.start + note.duration() * factor;
    }

    Ok(())
}

/// Delays every second note of each instrument (odd index, original order) by a share of its length.
pub fn apply_swing(score: &mut Score, swing_factor: f64) -> Result<()> {
    if !(0.0..=MAX_SWING).contains(&swing_factor) {
        return Err(StudioError::OutOfRange(format!(
            "swing factor must be within 0.0..={}, got {}",
            MAX_SWING, swing_factor
        )));
    }

    for instrument in score.instruments.iter_mut() {
        for note in instrument.notes.iter_mut().skip(1).step_by(2) {
            let delay = note.duration() * swing_factor;
            note.start += delay;
            note.end += delay;
        }
    }

    Ok(())
}

pub fn scale_velocity(score: &mut Score, factor: f64) -> Result<()> {
    if !(factor.is_finite() && factor > 0.0) {
        return Err(StudioError::InvalidParameter(format!(
            "velocity factor must be positive, got {}",
            factor
        )));
    }

    for note in score.notes_mut() {
        note.velocity = (note.velocity as f64 * factor).round().clamp(0.0, 127.0) as u8;
    }

    Ok(())
}

/// Turns chords into rising runs.
///
/// Notes sharing a start time form a chord; its tones are ordered by pitch and the k-th tone
/// starts `k * interval` seconds later. End times are kept, and a start never moves past its end.
/// The instrument's notes are rebuilt in time order.
pub fn arpeggiate(score: &mut Score, interval: f64) -> Result<()> {
    if !(interval.is_finite() && interval >= 0.0) {
        return Err(StudioError::InvalidParameter(format!(
            "arpeggio interval must be non-negative, got {}",
            interval
        )));
    }

    for instrument in score.instruments.iter_mut() {
        let mut ordered = instrument.notes.clone();
        ordered.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.pitch.cmp(&b.pitch)));

        let mut arpeggiated: Vec<Note> = Vec::with_capacity(ordered.len());
        let mut chord_start = f64::NEG_INFINITY;
        let mut position = 0;

        for note in ordered.into_iter() {
            if (note.start - chord_start).abs() > CHORD_EPSILON {
                chord_start = note.start;
                position = 0;
            }

            let staggered = (note.start + position as f64 * interval).min(note.end);
            arpeggiated.push(Note::new(note.pitch, note.velocity, staggered, note.end));
            position += 1;
        }

        instrument.notes = arpeggiated;
    }

    Ok(())
}

/// Appends a copy of every note shifted by `interval` semitones, skipping copies that leave 0..=127.
pub fn add_harmony(score: &mut Score, interval: i32) {
    for instrument in score.instruments.iter_mut() {
        let harmony = instrument
            .notes
            .iter()
            .filter_map(|note| {
                let pitch = note.pitch as i32 + interval;
                (0..=127)
                    .contains(&pitch)
                    .then(|| Note::new(pitch as u8, note.velocity, note.start, note.end))
            })
            .collect::<Vec<_>>();

        instrument.notes.extend(harmony);
    }
}

/// Jitters start, end and velocity of every note with uniform noise from `rng`.
///
/// Starts are kept at or after zero and ends at or after their start.
pub fn humanize<R: Rng>(
    score: &mut Score,
    timing_variation: f64,
    velocity_variation: i32,
    rng: &mut R,
) -> Result<()> {
    // the sampled range spans twice the bound and must stay finite
    if !(timing_variation >= 0.0 && (2.0 * timing_variation).is_finite()) {
        return Err(StudioError::InvalidParameter(format!(
            "timing variation must be a non-negative finite number of seconds, got {}",
            timing_variation
        )));
    }
    if velocity_variation < 0 {
        return Err(StudioError::InvalidParameter(format!(
            "velocity variation must be non-negative, got {}",
            velocity_variation
        )));
    }

    for note in score.notes_mut() {
        let start = note.start + rng.gen_range(-timing_variation..=timing_variation);
        let end = note.end + rng.gen_range(-timing_variation..=timing_variation);
        let velocity = note.velocity as i32 + rng.gen_range(-velocity_variation..=velocity_variation);

        note.start = start.max(0.0);
        note.end = end.max(note.start);
        note.velocity = velocity.clamp(0, 127) as u8;
    }

    Ok(())
}

/// Adds a controller-7 event to every instrument.
pub fn add_volume_event(score: &mut Score, value: i32, time: f64) -> Result<()> {
    if !(0..=127).contains(&value) {
        return Err(StudioError::OutOfRange(format!(
            "volume must be within 0..=127, got {}",
            value
        )));
    }

    let end = score.end_time();
    if !(time.is_finite() && (0.0..=end).contains(&time)) {
        return Err(StudioError::OutOfRange(format!(
            "volume event time must be within 0..={:.3}s, got {}",
            end, time
        )));
    }

    for instrument in score.instruments.iter_mut() {
        instrument.control_events.push(ControlEvent {
            number: VOLUME_CONTROLLER,
            value: value as u8,
            time,
        });
    }

    Ok(())
}

/// Sets program and name of the instruments named by index.
///
/// Every program is checked before anything changes. Indices past the instrument list are
/// skipped with a warning.
pub fn remap_instruments(score: &mut Score, mapping: &BTreeMap<usize, u8>) -> Result<()> {
    for program in mapping.values() {
        program_name(*program)?;
    }

    for (&index, &program) in mapping.iter() {
        match score.instruments.get_mut(index) {
            Some(instrument) => instrument.set_program(program)?,
            None => warn!(
                "Skipping instrument remap for index {} as the score only has {} instrument(s)..!",
                index,
                score.instruments.len()
            ),
        }
    }

    Ok(())
}

/// Guesses the major or minor scale that covers the most notes.
pub fn detect_scale(score: &Score) -> Option<ScaleSpec> {
    let mut histogram = [0usize; 12];
    for note in score.notes() {
        histogram[(note.pitch % 12) as usize] += 1;
    }

    let mut best: Option<ScaleSpec> = None;
    let mut best_count = 0;
    for root in 0..12u8 {
        for kind in [ScaleKind::Major, ScaleKind::Minor] {
            let candidate = ScaleSpec::new(root, kind);
            let count = candidate
                .pitch_classes()
                .iter()
                .map(|&pc| histogram[pc as usize])
                .sum::<usize>();

            if count > best_count {
                best_count = count;
                best = Some(candidate);
            }
        }
    }

    if let Some(scale) = &best {
        debug!(
            "Detected {} ({} of {} notes in scale, root {})..!",
            scale,
            best_count,
            score.note_count(),
            PITCH_CLASS_NAMES[scale.root as usize]
        );
    }

    best
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::score::{Instrument, MetaEvent, MetaKind, TempoChange};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const TIME_EPSILON: f64 = 1e-9;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() <= TIME_EPSILON
    }

    fn two_note_score() -> Score {
        let mut score = Score::new();
        let mut piano = Instrument::new(0).unwrap();
        piano.notes.push(Note::new(60, 100, 0.0, 1.0));
        piano.notes.push(Note::new(64, 100, 1.0, 2.0));
        score.instruments.push(piano);
        score
    }

    fn pitches(score: &Score) -> Vec<u8> {
        score.notes().map(|n| n.pitch).collect()
    }

    fn chromatic_score() -> Score {
        let mut score = Score::new();
        let mut piano = Instrument::new(0).unwrap();
        for (i, pitch) in (48..=84u8).enumerate() {
            piano.notes.push(Note::new(pitch, 80, i as f64 * 0.5, i as f64 * 0.5 + 0.4));
        }
        score.instruments.push(piano);
        score
    }

    #[test]
    fn transpose_two_semitones() {
        env_logger::try_init().unwrap_or(());

        let mut score = two_note_score();
        transpose(&mut score, 2).unwrap();
        assert_eq!(pitches(&score), vec![62, 66]);
    }

    #[test]
    fn transpose_inverse_restores_pitches() {
        env_logger::try_init().unwrap_or(());

        let original = chromatic_score();
        for semitones in [-48, -7, -1, 0, 1, 12, 43] {
            let mut score = original.clone();
            // 48..=84 shifted by -48..=43 stays inside the MIDI range
            transpose(&mut score, semitones).unwrap();
            transpose(&mut score, -semitones).unwrap();
            assert_eq!(pitches(&score), pitches(&original));
        }
    }

    #[test]
    fn transpose_clamps_and_rejects_large_shifts() {
        env_logger::try_init().unwrap_or(());

        let mut score = two_note_score();
        transpose(&mut score, 48).unwrap();
        transpose(&mut score, 48).unwrap();
        assert_eq!(pitches(&score), vec![127, 127]);

        let mut score = two_note_score();
        assert!(matches!(transpose(&mut score, 49), Err(StudioError::OutOfRange(_))));
        assert!(matches!(transpose(&mut score, -49), Err(StudioError::OutOfRange(_))));
        assert_eq!(pitches(&score), vec![60, 64]);
    }

    #[test]
    fn harmony_doubles_notes() {
        env_logger::try_init().unwrap_or(());

        let mut score = two_note_score();
        add_harmony(&mut score, DEFAULT_HARMONY_INTERVAL);

        let notes = &score.instruments[0].notes;
        assert_eq!(notes.len(), 4);
        assert_eq!(notes[2], Note::new(67, 100, 0.0, 1.0));
        assert_eq!(notes[3], Note::new(71, 100, 1.0, 2.0));
        assert_eq!(notes[0].pitch, 60);
        assert_eq!(notes[1].pitch, 64);
    }

    #[test]
    fn harmony_skips_out_of_range_copies() {
        env_logger::try_init().unwrap_or(());

        let mut score = Score::new();
        let mut piano = Instrument::new(0).unwrap();
        piano.notes.push(Note::new(125, 90, 0.0, 1.0));
        piano.notes.push(Note::new(100, 90, 1.0, 2.0));
        score.instruments.push(piano);

        add_harmony(&mut score, 7);
        assert_eq!(pitches(&score), vec![125, 100, 107]);
    }

    #[test]
    fn quantize_to_c_major_lands_on_white_keys() {
        env_logger::try_init().unwrap_or(());

        let mut score = chromatic_score();
        let scale = ScaleSpec::parse("C_major").unwrap();
        quantize_to_scale(&mut score, &scale);

        for note in score.notes() {
            assert!([0, 2, 4, 5, 7, 9, 11].contains(&(note.pitch % 12)), "{}", note.pitch);
        }
    }

    #[test]
    fn quantize_breaks_ties_downwards_and_keeps_octave() {
        env_logger::try_init().unwrap_or(());

        let mut score = Score::new();
        let mut piano = Instrument::new(0).unwrap();
        // C#4, D#4, F#4, G#4, A#4 each sit exactly between two C major members
        for pitch in [61u8, 63, 66, 68, 70] {
            piano.notes.push(Note::new(pitch, 90, 0.0, 1.0));
        }
        score.instruments.push(piano);

        quantize_to_scale(&mut score, &ScaleSpec::parse("C_major").unwrap());
        assert_eq!(pitches(&score), vec![60, 62, 65, 67, 69]);
    }

    #[test]
    fn quantize_uses_linear_distance_inside_the_octave() {
        env_logger::try_init().unwrap_or(());

        let mut score = Score::new();
        let mut piano = Instrument::new(0).unwrap();
        // D major members are {1, 2, 4, 6, 7, 9, 11}; C (0) has C# (1) as nearest
        piano.notes.push(Note::new(60, 90, 0.0, 1.0));
        // F (5): E (4) and F# (6) tie, lower wins
        piano.notes.push(Note::new(65, 90, 0.0, 1.0));
        score.instruments.push(piano);

        quantize_to_scale(&mut score, &ScaleSpec::parse("D_major").unwrap());
        assert_eq!(pitches(&score), vec![61, 64]);
    }

    #[test]
    fn quantize_keeps_top_notes_in_range() {
        env_logger::try_init().unwrap_or(());

        let mut score = Score::new();
        let mut piano = Instrument::new(0).unwrap();
        piano.notes.push(Note::new(127, 90, 0.0, 1.0));
        score.instruments.push(piano);

        // B major = {1, 3, 4, 6, 8, 10, 11}; G (7) ties between F# and G#, lower wins
        quantize_to_scale(&mut score, &ScaleSpec::parse("B_major").unwrap());
        assert_eq!(pitches(&score), vec![126]);
    }

    #[test]
    fn rescale_to_current_tempo_is_neutral() {
        env_logger::try_init().unwrap_or(());

        let mut score = two_note_score();
        let original = score.clone();
        rescale_tempo(&mut score, original.mean_tempo()).unwrap();
        assert_eq!(score, original);
    }

    #[test]
    fn rescale_scales_every_time_field() {
        env_logger::try_init().unwrap_or(());

        let mut score = two_note_score();
        score.tempo_changes = vec![
            TempoChange { time: 0.0, bpm: 100.0 },
            TempoChange { time: 1.0, bpm: 140.0 },
        ];
        score.instruments[0].control_events.push(ControlEvent {
            number: VOLUME_CONTROLLER,
            value: 100,
            time: 1.5,
        });
        score.meta_events.push(MetaEvent {
            time: 1.0,
            kind: MetaKind::Lyric("la".into()),
        });

        // mean 120 -> 60 doubles every time
        rescale_tempo(&mut score, 60.0).unwrap();

        let notes = &score.instruments[0].notes;
        assert!(approx_eq(notes[1].start, 2.0) && approx_eq(notes[1].end, 4.0));
        assert!(approx_eq(score.instruments[0].control_events[0].time, 3.0));
        assert!(approx_eq(score.meta_events[0].time, 2.0));
        assert!(approx_eq(score.tempo_changes[1].time, 2.0));
        assert!(approx_eq(score.tempo_changes[0].bpm, 50.0));
        assert!(approx_eq(score.mean_tempo(), 60.0));
    }

    #[test]
    fn rescale_rejects_non_positive_targets() {
        env_logger::try_init().unwrap_or(());

        let mut score = two_note_score();
        assert!(matches!(rescale_tempo(&mut score, 0.0), Err(StudioError::InvalidParameter(_))));
        assert!(matches!(rescale_tempo(&mut score, -90.0), Err(StudioError::InvalidParameter(_))));
    }

    #[test]
    fn duration_scaling_inverts() {
        env_logger::try_init().unwrap_or(());

        let original = chromatic_score();
        for factor in [0.25, 0.5, 1.0, 1.7, 3.0] {
            let mut score = original.clone();
            scale_durations(&mut score, factor).unwrap();
            scale_durations(&mut score, 1.0 / factor).unwrap();
            for (a, b) in score.notes().zip(original.notes()) {
                assert!(approx_eq(a.end, b.end));
                assert_eq!(a.start, b.start);
            }
        }

        let mut score = original.clone();
        assert!(scale_durations(&mut score, 0.0).is_err());
        assert_eq!(score, original);
    }

    #[test]
    fn swing_delays_odd_notes_only() {
        env_logger::try_init().unwrap_or(());

        let mut score = two_note_score();
        apply_swing(&mut score, DEFAULT_SWING).unwrap();

        let notes = &score.instruments[0].notes;
        assert_eq!((notes[0].start, notes[0].end), (0.0, 1.0));
        assert!(approx_eq(notes[1].start, 1.2));
        assert!(approx_eq(notes[1].end, 2.2));

        assert!(matches!(apply_swing(&mut score, 0.6), Err(StudioError::OutOfRange(_))));
        assert!(matches!(apply_swing(&mut score, -0.1), Err(StudioError::OutOfRange(_))));
    }

    #[test]
    fn velocity_scaling_rounds_and_clamps() {
        env_logger::try_init().unwrap_or(());

        let mut score = two_note_score();
        scale_velocity(&mut score, 1.006).unwrap();
        assert!(score.notes().all(|n| n.velocity == 101));

        scale_velocity(&mut score, 2.0).unwrap();
        assert!(score.notes().all(|n| n.velocity == 127));

        assert!(scale_velocity(&mut score, 0.0).is_err());
    }

    #[test]
    fn arpeggiate_spreads_chords_and_keeps_ends() {
        env_logger::try_init().unwrap_or(());

        let mut score = Score::new();
        let mut piano = Instrument::new(0).unwrap();
        piano.notes.push(Note::new(67, 90, 0.0, 1.0));
        piano.notes.push(Note::new(60, 90, 0.0, 1.0));
        piano.notes.push(Note::new(64, 90, 0.0, 1.0));
        piano.notes.push(Note::new(72, 90, 2.0, 2.05));
        piano.notes.push(Note::new(76, 90, 2.0, 2.05));
        score.instruments.push(piano);

        arpeggiate(&mut score, DEFAULT_ARPEGGIO_INTERVAL).unwrap();

        let notes = &score.instruments[0].notes;
        assert_eq!(notes.iter().map(|n| n.pitch).collect::<Vec<_>>(), vec![60, 64, 67, 72, 76]);
        assert!(approx_eq(notes[0].start, 0.0));
        assert!(approx_eq(notes[1].start, 0.1));
        assert!(approx_eq(notes[2].start, 0.2));
        assert!(notes[..3].iter().all(|n| n.end == 1.0));
        // second tone of a short chord cannot start after it ends
        assert!(approx_eq(notes[3].start, 2.0));
        assert!(approx_eq(notes[4].start, 2.05));

        assert!(arpeggiate(&mut score, -0.1).is_err());
    }

    #[test]
    fn arpeggiate_with_zero_interval_keeps_times() {
        env_logger::try_init().unwrap_or(());

        let mut score = two_note_score();
        let original = score.clone();
        arpeggiate(&mut score, 0.0).unwrap();
        assert_eq!(score, original);
    }

    #[test]
    fn humanize_is_bounded_and_seedable() {
        env_logger::try_init().unwrap_or(());

        let original = chromatic_score();

        let mut first = original.clone();
        humanize(&mut first, 0.05, 10, &mut StdRng::seed_from_u64(7)).unwrap();
        let mut second = original.clone();
        humanize(&mut second, 0.05, 10, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(first, second);

        for (after, before) in first.notes().zip(original.notes()) {
            assert!((after.start - before.start).abs() <= 0.05 + TIME_EPSILON);
            assert!((after.end - before.end).abs() <= 0.05 + TIME_EPSILON);
            assert!(after.end >= after.start);
            assert!((after.velocity as i32 - before.velocity as i32).abs() <= 10);
        }

        let mut score = original.clone();
        assert!(humanize(&mut score, -0.1, 10, &mut StdRng::seed_from_u64(1)).is_err());
        assert!(humanize(&mut score, 0.1, -1, &mut StdRng::seed_from_u64(1)).is_err());
        assert!(humanize(&mut score, f64::MAX, 10, &mut StdRng::seed_from_u64(1)).is_err());
        assert!(humanize(&mut score, f64::NAN, 10, &mut StdRng::seed_from_u64(1)).is_err());
        assert_eq!(score, original);
    }

    #[test]
    fn humanize_clamps_velocity_at_the_midi_limits() {
        env_logger::try_init().unwrap_or(());

        let mut score = Score::new();
        let mut loud = Instrument::new(0).unwrap();
        let mut silent = Instrument::new(1).unwrap();
        for i in 0..40 {
            let start = i as f64;
            loud.notes.push(Note::new(72, 127, start, start + 0.5));
            silent.notes.push(Note::new(48, 0, start, start + 0.5));
        }
        score.instruments.push(loud);
        score.instruments.push(silent);

        humanize(&mut score, 0.0, 100, &mut StdRng::seed_from_u64(42)).unwrap();

        let loud = &score.instruments[0].notes;
        let silent = &score.instruments[1].notes;
        assert!(loud.iter().all(|n| n.velocity <= 127 && n.velocity >= 27));
        assert!(loud.iter().any(|n| n.velocity == 127));
        assert!(silent.iter().all(|n| n.velocity <= 100));
        assert!(silent.iter().any(|n| n.velocity == 0));
        // no timing jitter requested
        assert!(loud.iter().enumerate().all(|(i, n)| n.start == i as f64 && n.end == i as f64 + 0.5));
    }

    #[test]
    fn humanize_with_zero_variation_is_identity() {
        env_logger::try_init().unwrap_or(());

        let mut score = chromatic_score();
        let original = score.clone();
        humanize(&mut score, 0.0, 0, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(score, original);
    }

    #[test]
    fn volume_event_reaches_every_instrument() {
        env_logger::try_init().unwrap_or(());

        let mut score = two_note_score();
        score.instruments.push(Instrument::new(33).unwrap());

        add_volume_event(&mut score, 64, 1.5).unwrap();
        for instrument in score.instruments.iter() {
            assert_eq!(
                instrument.control_events,
                vec![ControlEvent {
                    number: VOLUME_CONTROLLER,
                    value: 64,
                    time: 1.5
                }]
            );
        }

        assert!(matches!(add_volume_event(&mut score, 128, 1.0), Err(StudioError::OutOfRange(_))));
        assert!(matches!(add_volume_event(&mut score, 10, 2.5), Err(StudioError::OutOfRange(_))));
        assert!(matches!(add_volume_event(&mut score, 10, -0.5), Err(StudioError::OutOfRange(_))));
    }

    #[test]
    fn remap_validates_programs_and_skips_missing_indices() {
        env_logger::try_init().unwrap_or(());

        let mut score = two_note_score();
        let mapping = BTreeMap::from([(0usize, 40u8), (5usize, 41u8)]);
        remap_instruments(&mut score, &mapping).unwrap();
        assert_eq!(score.instruments[0].program, 40);
        assert_eq!(score.instruments[0].name, "Violin");

        let mapping = BTreeMap::from([(0usize, 0u8), (1usize, 200u8)]);
        assert!(matches!(
            remap_instruments(&mut score, &mapping),
            Err(StudioError::InvalidInstrument(_))
        ));
        assert_eq!(score.instruments[0].program, 40);
    }

    #[test]
    fn detects_the_dominant_scale() {
        env_logger::try_init().unwrap_or(());

        let mut score = Score::new();
        let mut piano = Instrument::new(0).unwrap();
        // G major scale, twice
        for (i, pitch) in [67u8, 69, 71, 72, 74, 76, 78, 79, 67, 71, 74, 78].iter().enumerate() {
            piano.notes.push(Note::new(*pitch, 90, i as f64, i as f64 + 0.5));
        }
        score.instruments.push(piano);

        // E minor shares G major's pitch set and is reached first
        let scale = detect_scale(&score).unwrap();
        assert_eq!(scale, ScaleSpec::new(4, ScaleKind::Minor));
        assert_eq!(scale.pitch_classes(), ScaleSpec::new(7, ScaleKind::Major).pitch_classes());

        assert_eq!(detect_scale(&Score::new()), None);
    }
}

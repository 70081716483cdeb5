use crate::error::{Result, StudioError};

/// The 128 general-MIDI program names, indexed by program number.
pub const GENERAL_MIDI_PROGRAMS: [&str; 128] = [
    "Acoustic Grand Piano",
    "Bright Acoustic Piano",
    "Electric Grand Piano",
    "Honky-tonk Piano",
    "Electric Piano 1",
    "Electric Piano 2",
    "Harpsichord",
    "Clavinet",
    "Celesta",
    "Glockenspiel",
    "Music Box",
    "Vibraphone",
    "Marimba",
    "Xylophone",
    "Tubular Bells",
    "Dulcimer",
    "Drawbar Organ",
    "Percussive Organ",
    "Rock Organ",
    "Church Organ",
    "Reed Organ",
    "Accordion",
    "Harmonica",
    "Tango Accordion",
    "Acoustic Guitar (nylon)",
    "Acoustic Guitar (steel)",
    "Electric Guitar (jazz)",
    "Electric Guitar (clean)",
    "Electric Guitar (muted)",
    "Overdriven Guitar",
    "Distortion Guitar",
    "Guitar Harmonics",
    "Acoustic Bass",
    "Electric Bass (finger)",
    "Electric Bass (pick)",
    "Fretless Bass",
    "Slap Bass 1",
    "Slap Bass 2",
    "Synth Bass 1",
    "Synth Bass 2",
    "Violin",
    "Viola",
    "Cello",
    "Contrabass",
    "Tremolo Strings",
    "Pizzicato Strings",
    "Orchestral Harp",
    "Timpani",
    "String Ensemble 1",
    "String Ensemble 2",
    "Synth Strings 1",
    "Synth Strings 2",
    "Choir Aahs",
    "Voice Oohs",
    "Synth Choir",
    "Orchestra Hit",
    "Trumpet",
    "Trombone",
    "Tuba",
    "Muted Trumpet",
    "French Horn",
    "Brass Section",
    "Synth Brass 1",
    "Synth Brass 2",
    "Soprano Sax",
    "Alto Sax",
    "Tenor Sax",
    "Baritone Sax",
    "Oboe",
    "English Horn",
    "Bassoon",
    "Clarinet",
    "Piccolo",
    "Flute",
    "Recorder",
    "Pan Flute",
    "Blown bottle",
    "Shakuhachi",
    "Whistle",
    "Ocarina",
    "Lead 1 (square)",
    "Lead 2 (sawtooth)",
    "Lead 3 (calliope)",
    "Lead 4 (chiff)",
    "Lead 5 (charang)",
    "Lead 6 (voice)",
    "Lead 7 (fifths)",
    "Lead 8 (bass + lead)",
    "Pad 1 (new age)",
    "Pad 2 (warm)",
    "Pad 3 (polysynth)",
    "Pad 4 (choir)",
    "Pad 5 (bowed)",
    "Pad 6 (metallic)",
    "Pad 7 (halo)",
    "Pad 8 (sweep)",
    "FX 1 (rain)",
    "FX 2 (soundtrack)",
    "FX 3 (crystal)",
    "FX 4 (atmosphere)",
    "FX 5 (brightness)",
    "FX 6 (goblins)",
    "FX 7 (echoes)",
    "FX 8 (sci-fi)",
    "Sitar",
    "Banjo",
    "Shamisen",
    "Koto",
    "Kalimba",
    "Bag pipe",
    "Fiddle",
    "Shanai",
    "Tinkle Bell",
    "Agogo",
    "Steel Drums",
    "Woodblock",
    "Taiko Drum",
    "Melodic Tom",
    "Synth Drum",
    "Reverse Cymbal",
    "Guitar Fret Noise",
    "Breath Noise",
    "Seashore",
    "Bird Tweet",
    "Telephone Ring",
    "Helicopter",
    "Applause",
    "Gunshot",
];

pub fn program_name(program: u8) -> Result<&'static str> {
    GENERAL_MIDI_PROGRAMS
        .get(program as usize)
        .copied()
        .ok_or_else(|| {
            StudioError::InvalidInstrument(format!(
                "program {} is not a general-MIDI program (0-127)",
                program
            ))
        })
}

/// Validates a program number arriving as an arbitrary integer.
pub fn checked_program(program: i64) -> Result<u8> {
    if !(0..=127).contains(&program) {
        return Err(StudioError::InvalidInstrument(format!(
            "program {} is not a general-MIDI program (0-127)",
            program
        )));
    }

    Ok(program as u8)
}

/// Case-insensitive lookup of a general-MIDI program by name.
pub fn program_for_name(name: &str) -> Result<u8> {
    let wanted = name.trim();
    GENERAL_MIDI_PROGRAMS
        .iter()
        .position(|candidate| candidate.eq_ignore_ascii_case(wanted))
        .map(|idx| idx as u8)
        .ok_or_else(|| {
            StudioError::InvalidInstrument(format!("'{}' is not a general-MIDI instrument name", name))
        })
}

/// Renders the table as `{"Acoustic Grand Piano": 0, ...}` for collaborator prompts.
pub fn program_table_text() -> String {
    let entries = GENERAL_MIDI_PROGRAMS
        .iter()
        .enumerate()
        .map(|(program, name)| format!("\"{}\": {}", name, program))
        .collect::<Vec<_>>();

    format!("{{{}}}", entries.join(", "))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn table_round_trips_names_and_programs() {
        env_logger::try_init().unwrap_or(());

        for program in 0..=127u8 {
            let name = program_name(program).unwrap();
            assert_eq!(program_for_name(name).unwrap(), program);
        }
    }

    #[test]
    fn name_lookup_ignores_case_and_padding() {
        env_logger::try_init().unwrap_or(());

        assert_eq!(program_for_name("  violin ").unwrap(), 40);
        assert_eq!(program_for_name("ELECTRIC PIANO 1").unwrap(), 4);
        assert!(matches!(
            program_for_name("Kazoo"),
            Err(StudioError::InvalidInstrument(_))
        ));
    }

    #[test]
    fn checked_program_bounds() {
        env_logger::try_init().unwrap_or(());

        assert_eq!(checked_program(127).unwrap(), 127);
        assert!(checked_program(128).is_err());
        assert!(checked_program(200).is_err());
        assert!(checked_program(-1).is_err());
    }

    #[test]
    fn prompt_table_lists_every_program() {
        env_logger::try_init().unwrap_or(());

        let text = program_table_text();
        assert!(text.starts_with("{\"Acoustic Grand Piano\": 0"));
        assert!(text.ends_with("\"Gunshot\": 127}"));
    }
}

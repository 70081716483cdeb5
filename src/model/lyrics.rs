use crate::error::{Result, StudioError};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One word as reported by a transcription collaborator.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TranscribedWord {
    #[serde(alias = "word")]
    pub text: String,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(alias = "confidence", default = "full_confidence")]
    pub probability: f64,
}

fn full_confidence() -> f64 {
    1.0
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Word {
    /// 1-based, restarts in every verse.
    pub word_number: usize,
    pub word: String,
    pub start: f64,
    pub end: f64,
    pub probability: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Verse {
    /// 1-based.
    pub verse_number: usize,
    pub start: f64,
    pub end: f64,
    pub words: Vec<Word>,
}

impl Verse {
    pub fn text(&self) -> String {
        self.words
            .iter()
            .map(|w| w.word.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A text-only correction from a human reviewer. Timings are never edited.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WordEdit {
    pub verse_number: usize,
    pub word_number: usize,
    pub word: String,
}

/// A flattened review row: (verse, word number, text, start, end, probability).
pub type WordRow = (usize, usize, String, f64, f64, f64);

pub fn load_verses<P: AsRef<Path>>(path: P) -> Result<Vec<Verse>> {
    let text = fs::read_to_string(path.as_ref()).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StudioError::MissingInput(format!("lyrics file {} does not exist", path.as_ref().display()))
        } else {
            StudioError::IoFailure(format!(
                "Failed to read lyrics file {}: {}",
                path.as_ref().display(),
                e
            ))
        }
    })?;

    Ok(serde_json::from_str(&text)?)
}

pub fn save_verses<P: AsRef<Path>>(verses: &[Verse], path: P) -> Result<()> {
    let json = serde_json::to_string_pretty(verses)?;
    fs::write(path.as_ref(), json).map_err(|e| {
        StudioError::IoFailure(format!(
            "Failed to write lyrics file {}: {}",
            path.as_ref().display(),
            e
        ))
    })?;

    info!("Saved {} verse(s) to {}..!", verses.len(), path.as_ref().display());
    Ok(())
}

pub fn word_table(verses: &[Verse]) -> Vec<WordRow> {
    verses
        .iter()
        .flat_map(|verse| {
            verse.words.iter().map(move |w| {
                (
                    verse.verse_number,
                    w.word_number,
                    w.word.clone(),
                    w.start,
                    w.end,
                    w.probability,
                )
            })
        })
        .collect()
}

/// Replaces word texts in place. Every edit must name an existing word; nothing changes otherwise.
pub fn apply_word_edits(verses: &mut [Verse], edits: &[WordEdit]) -> Result<usize> {
    let mut targets = Vec::with_capacity(edits.len());
    for edit in edits.iter() {
        let position = verses
            .iter()
            .position(|v| v.verse_number == edit.verse_number)
            .and_then(|vi| {
                verses[vi]
                    .words
                    .iter()
                    .position(|w| w.word_number == edit.word_number)
                    .map(|wi| (vi, wi))
            })
            .ok_or_else(|| {
                StudioError::InvalidParameter(format!(
                    "no word {} in verse {}",
                    edit.word_number, edit.verse_number
                ))
            })?;
        targets.push(position);
    }

    for ((vi, wi), edit) in targets.into_iter().zip(edits.iter()) {
        verses[vi].words[wi].word = edit.word.clone();
    }

    Ok(edits.len())
}

#[cfg(test)]
mod test {
    use super::*;

    fn verse(number: usize, words: &[(&str, f64, f64)]) -> Verse {
        let words = words
            .iter()
            .enumerate()
            .map(|(i, &(text, start, end))| Word {
                word_number: i + 1,
                word: text.to_string(),
                start,
                end,
                probability: 0.9,
            })
            .collect::<Vec<Word>>();

        Verse {
            verse_number: number,
            start: words.first().map(|w| w.start).unwrap_or(0.0),
            end: words.last().map(|w| w.end).unwrap_or(0.0),
            words,
        }
    }

    #[test]
    fn persisted_document_round_trips() {
        env_logger::try_init().unwrap_or(());

        let verses = vec![
            verse(1, &[("Hello", 0.0, 0.5), ("world", 0.6, 1.0)]),
            verse(2, &[("again", 3.0, 3.4)]),
        ];

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lyrics.json");
        save_verses(&verses, &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"verse_number\""));
        assert!(text.contains("\"word_number\""));
        assert!(text.contains("\"probability\""));

        assert_eq!(load_verses(&path).unwrap(), verses);
    }

    #[test]
    fn missing_document_is_reported_as_missing_input() {
        env_logger::try_init().unwrap_or(());

        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_verses(dir.path().join("nope.json")),
            Err(StudioError::MissingInput(_))
        ));
    }

    #[test]
    fn edits_change_text_only() {
        env_logger::try_init().unwrap_or(());

        let mut verses = vec![verse(1, &[("Helo", 0.0, 0.5), ("wrld", 0.6, 1.0)])];
        let before = word_table(&verses);

        let edits = vec![
            WordEdit {
                verse_number: 1,
                word_number: 1,
                word: "Hello".into(),
            },
            WordEdit {
                verse_number: 1,
                word_number: 2,
                word: "world".into(),
            },
        ];
        assert_eq!(apply_word_edits(&mut verses, &edits).unwrap(), 2);

        let after = word_table(&verses);
        assert_eq!(after[0].2, "Hello");
        assert_eq!(after[1].2, "world");
        for (old, new) in before.iter().zip(after.iter()) {
            assert_eq!((old.0, old.1, old.3, old.4, old.5), (new.0, new.1, new.3, new.4, new.5));
        }
        assert_eq!(verses[0].text(), "Hello world");
    }

    #[test]
    fn unknown_edit_target_changes_nothing() {
        env_logger::try_init().unwrap_or(());

        let mut verses = vec![verse(1, &[("one", 0.0, 0.5)])];
        let edits = vec![
            WordEdit {
                verse_number: 1,
                word_number: 1,
                word: "uno".into(),
            },
            WordEdit {
                verse_number: 4,
                word_number: 1,
                word: "cuatro".into(),
            },
        ];

        assert!(matches!(
            apply_word_edits(&mut verses, &edits),
            Err(StudioError::InvalidParameter(_))
        ));
        assert_eq!(verses[0].words[0].word, "one");
    }

    #[test]
    fn transcribed_word_accepts_collaborator_aliases() {
        env_logger::try_init().unwrap_or(());

        let word: TranscribedWord =
            serde_json::from_str(r#"{"word": " hi", "start": 1.0, "end": 1.2, "confidence": 0.5}"#).unwrap();
        assert_eq!(word.text, " hi");
        assert_eq!(word.probability, 0.5);
        assert_eq!(word.language, None);

        let word: TranscribedWord =
            serde_json::from_str(r#"{"text": "yo", "start": 0.0, "end": 0.1, "language": "en"}"#).unwrap();
        assert_eq!(word.probability, 1.0);
        assert_eq!(word.language.as_deref(), Some("en"));
    }
}

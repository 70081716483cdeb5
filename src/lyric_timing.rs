use crate::engine::{Transcriber, Translator};
use crate::error::{Result, StudioError};
use crate::model::config::SegmentationConfig;
use crate::model::lyrics::{TranscribedWord, Verse, Word, save_verses};
use crate::util::{CancelFlag, validate_audio_input};
use log::{debug, info, warn};
use std::path::Path;

/// Groups time-ordered words into verses.
///
/// A word opens a new verse when the silence before it exceeds `gap_threshold`, when the
/// current verse already holds `max_words`, or when adding it would stretch the verse past
/// `max_verse_duration`. Blank words are dropped.
pub fn segment_verses(words: &[TranscribedWord], config: &SegmentationConfig) -> Result<Vec<Verse>> {
    if !(config.gap_threshold.is_finite() && config.gap_threshold >= 0.0) {
        return Err(StudioError::InvalidParameter(format!(
            "verse gap threshold must be non-negative, got {}",
            config.gap_threshold
        )));
    }
    if config.max_words == 0 {
        return Err(StudioError::InvalidParameter("verses need room for at least one word".into()));
    }
    if !(config.max_verse_duration.is_finite() && config.max_verse_duration > 0.0) {
        return Err(StudioError::InvalidParameter(format!(
            "maximum verse duration must be positive, got {}",
            config.max_verse_duration
        )));
    }

    let mut verses: Vec<Verse> = Vec::new();
    let mut current: Vec<Word> = Vec::new();
    let mut previous_start = f64::NEG_INFINITY;

    for word in words.iter() {
        if !(word.start.is_finite() && word.end.is_finite()) || word.start > word.end {
            return Err(StudioError::CollaboratorFailure(format!(
                "transcribed word '{}' has invalid timing {}..{}",
                word.text, word.start, word.end
            )));
        }
        if word.start < previous_start {
            return Err(StudioError::CollaboratorFailure(format!(
                "transcribed word '{}' at {:.2}s is out of order",
                word.text, word.start
            )));
        }
        previous_start = word.start;

        let text = word.text.trim();
        if text.is_empty() {
            debug!("Dropping blank word at {:.2}s", word.start);
            continue;
        }

        if let (Some(first), Some(last)) = (current.first(), current.last()) {
            let gap = word.start - last.end;
            let span = word.end - first.start;

            if gap > config.gap_threshold || current.len() >= config.max_words || span > config.max_verse_duration {
                close_verse(&mut verses, std::mem::take(&mut current));
            }
        }

        current.push(Word {
            word_number: current.len() + 1,
            word: text.to_string(),
            start: word.start,
            end: word.end,
            probability: word.probability.clamp(0.0, 1.0),
        });
    }

    if !current.is_empty() {
        close_verse(&mut verses, current);
    }

    Ok(verses)
}

fn close_verse(verses: &mut Vec<Verse>, words: Vec<Word>) {
    let (Some(start), Some(end)) = (words.first().map(|w| w.start), words.last().map(|w| w.end)) else {
        return;
    };

    verses.push(Verse {
        verse_number: verses.len() + 1,
        start,
        end,
        words,
    });
}

/// Translates every word's text one-to-one. Timings and numbering are carried over unchanged.
pub fn translate_verses<T: Translator>(verses: &[Verse], translator: &T, target_language: &str) -> Result<Vec<Verse>> {
    let target = target_language.trim();
    let supported = translator.supported_languages()?;
    if !supported.iter().any(|code| code.eq_ignore_ascii_case(target)) {
        return Err(StudioError::InvalidParameter(format!(
            "translation to '{}' is not supported",
            target
        )));
    }

    let texts = verses
        .iter()
        .flat_map(|v| v.words.iter().map(|w| w.word.clone()))
        .collect::<Vec<String>>();
    if texts.is_empty() {
        return Ok(verses.to_vec());
    }

    info!("Translating {} word(s) to '{}'..!", texts.len(), target);
    let translated = translator.translate(&texts, target)?;
    if translated.len() != texts.len() {
        return Err(StudioError::CollaboratorFailure(format!(
            "translator returned {} string(s) for {} word(s)",
            translated.len(),
            texts.len()
        )));
    }

    let mut translated = translated.into_iter();
    let result = verses
        .iter()
        .map(|verse| Verse {
            words: verse
                .words
                .iter()
                .map(|word| Word {
                    word: translated.next().unwrap_or_else(|| word.word.clone()),
                    ..word.clone()
                })
                .collect(),
            ..verse.clone()
        })
        .collect();

    Ok(result)
}

/// Transcribes a vocal stem and groups the words into verses.
pub struct LyricTimingExtractor<T: Transcriber> {
    transcriber: T,
    segmentation: SegmentationConfig,
    cancel: CancelFlag,
}

impl<T: Transcriber> LyricTimingExtractor<T> {
    pub fn new(transcriber: T, segmentation: SegmentationConfig, cancel: CancelFlag) -> Self {
        Self {
            transcriber,
            segmentation,
            cancel,
        }
    }

    pub fn extract(&self, audio: &Path) -> Result<Vec<Verse>> {
        validate_audio_input(audio)?;
        self.cancel.check("transcription")?;

        info!("Transcribing {}..!", audio.display());
        let words = self.transcriber.transcribe(audio)?;
        if words.is_empty() {
            warn!("Transcriber found no words in {}..!", audio.display());
        }

        if let Some(language) = words.iter().find_map(|w| w.language.as_deref()) {
            info!("Detected language: {}", language);
        }

        let verses = segment_verses(&words, &self.segmentation)?;
        info!(
            "Grouped {} word(s) into {} verse(s)..!",
            verses.iter().map(|v| v.words.len()).sum::<usize>(),
            verses.len()
        );
        Ok(verses)
    }

    pub fn extract_to_file(&self, audio: &Path, output: &Path) -> Result<Vec<Verse>> {
        let verses = self.extract(audio)?;
        save_verses(&verses, output)?;
        Ok(verses)
    }
}

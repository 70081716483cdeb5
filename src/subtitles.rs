use crate::error::{Result, StudioError};
use crate::model::config::SubtitleStyle;
use crate::model::lyrics::Verse;
use log::{debug, info};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

pub const LOADER_SEGMENTS: usize = 30;
pub const VERSE_SPACING: &str = "\\N\\N\\N\\N";
const TITLE_SHARE: f64 = 0.25;
const TITLE_MARGIN: f64 = 0.4;
const LOADER_MARGIN: f64 = 0.8;

const STYLE_FORMAT: &str = "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, \
Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, \
Alignment, MarginL, MarginR, MarginV, Encoding";
const EVENT_FORMAT: &str = "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text";

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Title,
    LoaderBorder,
    LoaderSegment,
    Lyric,
    Blank,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleEvent {
    pub kind: EventKind,
    pub start: f64,
    pub end: f64,
    pub margin_v: u32,
    pub text: String,
}

/// A complete, time-sorted ASS script ready to be rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleScript {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub font: String,
    pub font_size: u32,
    pub primary_color: String,
    pub highlight_color: String,
    pub events: Vec<SubtitleEvent>,
}

/// `1280x720` -> (1280, 720).
pub fn parse_resolution(resolution: &str) -> Result<(u32, u32)> {
    let invalid = || {
        StudioError::InvalidParameter(format!(
            "resolution must look like WIDTHxHEIGHT, got '{}'",
            resolution
        ))
    };

    let (width, height) = resolution.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
    let width = width.trim().parse::<u32>().map_err(|_| invalid())?;
    let height = height.trim().parse::<u32>().map_err(|_| invalid())?;
    if width == 0 || height == 0 {
        return Err(invalid());
    }

    Ok((width, height))
}

/// ASS colours are `&H` followed by eight hex digits (alpha, blue, green, red).
pub fn validate_color(color: &str) -> Result<()> {
    let valid = color
        .strip_prefix("&H")
        .is_some_and(|hex| hex.len() == 8 && hex.chars().all(|c| c.is_ascii_hexdigit()));

    if valid {
        Ok(())
    } else {
        Err(StudioError::InvalidParameter(format!(
            "'{}' is not an ASS colour like &H00FFFFFF",
            color
        )))
    }
}

/// `H:MM:SS.CC`, rounded to the nearest centisecond.
pub fn format_timestamp(seconds: f64) -> String {
    let centis = (seconds.max(0.0) * 100.0).round() as u64;
    format!(
        "{}:{:02}:{:02}.{:02}",
        centis / 360_000,
        (centis / 6_000) % 60,
        (centis / 100) % 60,
        centis % 100
    )
}

fn highlighted(word: &str, highlight: &str, primary: &str) -> String {
    format!("{{\\c{}}}{}{{\\c{}}}", highlight, word, primary)
}

fn lyric_events(verses: &[Verse], offset: f64, style: &SubtitleStyle) -> Vec<SubtitleEvent> {
    let (primary, highlight) = (&style.primary_color, &style.highlight_color);
    let mut events = Vec::new();

    for (i, verse) in verses.iter().enumerate() {
        let previous_text = match i.checked_sub(1).and_then(|p| verses.get(p)) {
            Some(previous) => previous
                .words
                .iter()
                .map(|w| highlighted(&w.word, highlight, primary))
                .collect::<Vec<_>>()
                .join(" "),
            None => String::new(),
        };

        let next_text = verses.get(i + 1).map(Verse::text).unwrap_or_default();

        for word in verse.words.iter() {
            let current_text = verse
                .words
                .iter()
                .map(|w| {
                    if w.start < word.start {
                        highlighted(&w.word, highlight, primary)
                    } else {
                        w.word.clone()
                    }
                })
                .collect::<Vec<_>>()
                .join(" ");

            events.push(SubtitleEvent {
                kind: EventKind::Lyric,
                start: word.start + offset,
                end: word.end + offset,
                margin_v: 0,
                text: format!(
                    "{}{}{}{}{}",
                    previous_text, VERSE_SPACING, current_text, VERSE_SPACING, next_text
                ),
            });
        }
    }

    events
}

fn intro_events(t0: f64, height: u32, style: &SubtitleStyle) -> Vec<SubtitleEvent> {
    let title_end = t0 * TITLE_SHARE;
    let loader_duration = t0 - title_end;
    let segment_duration = loader_duration / LOADER_SEGMENTS as f64;
    let loader_margin = (height as f64 * LOADER_MARGIN) as u32;

    let mut events = vec![
        SubtitleEvent {
            kind: EventKind::Title,
            start: 0.0,
            end: title_end,
            margin_v: (height as f64 * TITLE_MARGIN) as u32,
            text: format!("{{\\fs{}}}{}", style.title_font_size, style.title),
        },
        SubtitleEvent {
            kind: EventKind::LoaderBorder,
            start: title_end,
            end: t0,
            margin_v: loader_margin,
            text: format!("{{\\c{}}}", style.border_color),
        },
    ];

    for filled in 1..=LOADER_SEGMENTS {
        let bar = format!(
            "|{}{}|",
            "█".repeat(filled),
            " ".repeat(LOADER_SEGMENTS - filled)
        );
        events.push(SubtitleEvent {
            kind: EventKind::LoaderSegment,
            start: title_end + (filled - 1) as f64 * segment_duration,
            end: title_end + filled as f64 * segment_duration,
            margin_v: loader_margin,
            text: format!("{{\\c{}}}{}", style.loader_color, bar),
        });
    }

    events
}

/// Builds the full event stream for `verses` over `[0, duration]`.
///
/// The intro (title then loader) fills the time before the first word. Lyric events highlight
/// every word of the current verse that starts before the word being sung. A blank event pads
/// the stream to `duration`, and every event is clipped into `[0, duration]`.
pub fn synthesize_subtitles(verses: &[Verse], duration: f64, style: &SubtitleStyle) -> Result<SubtitleScript> {
    if !(duration.is_finite() && duration >= 0.0) {
        return Err(StudioError::InvalidParameter(format!(
            "audio duration must be a non-negative number of seconds, got {}",
            duration
        )));
    }

    for color in [
        &style.primary_color,
        &style.highlight_color,
        &style.loader_color,
        &style.border_color,
    ] {
        validate_color(color)?;
    }
    if style.font_size == 0 || style.title_font_size == 0 {
        return Err(StudioError::InvalidParameter("font sizes must be positive".into()));
    }
    let (width, height) = parse_resolution(&style.resolution)?;

    let verses = verses
        .iter()
        .filter(|v| !v.words.is_empty())
        .cloned()
        .collect::<Vec<Verse>>();

    let mut events: Vec<SubtitleEvent> = Vec::new();

    match verses.first().and_then(|v| v.words.first()) {
        None => {
            debug!("No lyrics, showing the title for the whole {:.2}s", duration);
            events.push(SubtitleEvent {
                kind: EventKind::Title,
                start: 0.0,
                end: duration,
                margin_v: (height as f64 * TITLE_MARGIN) as u32,
                text: format!("{{\\fs{}}}{}", style.title_font_size, style.title),
            });
        }
        Some(first_word) => {
            let t0 = first_word.start.max(0.0);
            let offset = if style.shift_lyrics_after_intro { t0 } else { 0.0 };

            events.extend(intro_events(t0, height, style));
            events.extend(lyric_events(&verses, offset, style));

            let last_end = verses.last().map(|v| v.end + offset).unwrap_or(t0);
            if last_end < duration {
                events.push(SubtitleEvent {
                    kind: EventKind::Blank,
                    start: last_end,
                    end: duration,
                    margin_v: 0,
                    text: String::new(),
                });
            }
        }
    }

    for event in events.iter_mut() {
        event.start = event.start.clamp(0.0, duration);
        event.end = event.end.clamp(event.start, duration);
    }
    events.sort_by(|a, b| a.start.total_cmp(&b.start));

    Ok(SubtitleScript {
        title: style.title.clone(),
        width,
        height,
        font: style.font.clone(),
        font_size: style.font_size,
        primary_color: style.primary_color.clone(),
        highlight_color: style.highlight_color.clone(),
        events,
    })
}

impl SubtitleScript {
    pub fn render(&self) -> String {
        let mut out = String::new();

        // writing into a String never fails
        let _ = write!(
            out,
            "[Script Info]\nTitle: {}\nScriptType: v4.00+\nPlayDepth: 0\nPlayResX: {}\nPlayResY: {}\n\n",
            self.title, self.width, self.height
        );
        let _ = write!(
            out,
            "[V4+ Styles]\n{}\nStyle: Default,{},{},{},{},&H00000000,&H00000000,0,0,0,0,100,100,0,0,1,3,0,5,0,0,0,1\n\n",
            STYLE_FORMAT, self.font, self.font_size, self.primary_color, self.highlight_color
        );
        let _ = write!(out, "[Events]\n{}\n", EVENT_FORMAT);

        for event in self.events.iter() {
            let _ = writeln!(
                out,
                "Dialogue: 0,{},{},Default,,0,0,{},,{}",
                format_timestamp(event.start),
                format_timestamp(event.end),
                event.margin_v,
                event.text
            );
        }

        out
    }

    pub fn end_time(&self) -> f64 {
        self.events.iter().map(|e| e.end).fold(0.0, f64::max)
    }
}

pub fn write_subtitles(script: &SubtitleScript, path: &Path) -> Result<()> {
    fs::write(path, script.render()).map_err(|e| {
        StudioError::IoFailure(format!("Failed to write subtitles {}: {}", path.display(), e))
    })?;

    info!(
        "Wrote {} subtitle event(s) to {}..!",
        script.events.len(),
        path.display()
    );
    Ok(())
}

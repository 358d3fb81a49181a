//! Song markup.
//!
//! Songs are stored in a ChordPro-like line format. Metadata lives in
//! directive lines such as `{title: Imagine}`; every other line is body
//! text in which chords are written inline as `[Am]`.

mod html;
mod id;

pub use html::{escape_html, render_html};
pub use id::{is_valid_id, song_id};

use crate::error::{Error, Result};

/// Directive keys recognised as the song title.
const TITLE_KEYS: &[&str] = &["title", "t"];
/// Directive keys recognised as the song artist.
const ARTIST_KEYS: &[&str] = &["artist", "a", "subtitle", "st"];
const ALBUM_KEYS: &[&str] = &["album"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Directive { name: String, value: String },
    Text(String),
    Blank,
}

/// A parsed song. Only derived from content, never persisted on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Song {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub lines: Vec<Line>,
}

impl Song {
    /// Parses song markup. Parsing never fails; missing metadata is left
    /// empty and reported by [`Song::validate`].
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let mut song = Song::default();

        for raw in content.lines() {
            let line = raw.trim_end();
            if line.trim().is_empty() {
                song.lines.push(Line::Blank);
                continue;
            }

            match parse_directive(line) {
                Some((name, value)) => {
                    if TITLE_KEYS.contains(&name.as_str()) && song.title.is_empty() {
                        song.title = value;
                    } else if ARTIST_KEYS.contains(&name.as_str()) && song.artist.is_empty() {
                        song.artist = value;
                    } else if ALBUM_KEYS.contains(&name.as_str()) && song.album.is_empty() {
                        song.album = value;
                    } else {
                        song.lines.push(Line::Directive { name, value });
                    }
                }
                None => song.lines.push(Line::Text(line.to_string())),
            }
        }

        song
    }

    /// A song needs both a title and an artist to be stored.
    pub fn validate(&self) -> Result<()> {
        if self.title.is_empty() {
            return Err(Error::Validation(
                "You must provide a title and an artist information".to_string(),
            ));
        }
        if self.artist.is_empty() {
            return Err(Error::Validation(
                "You must provide a title and an artist information".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn id(&self) -> String {
        song_id(&self.title, &self.artist)
    }

    /// Body text with chords removed, one line per lyric line.
    #[must_use]
    pub fn lyrics(&self) -> String {
        self.lines
            .iter()
            .filter_map(|line| match line {
                Line::Text(text) => Some(strip_chords(text)),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Markup served by the editor when creating a new song.
#[must_use]
pub fn new_song_template() -> &'static str {
    "{title: }\n{artist: }\n{album: }\n\n[C]Write the [G]first line [Am]here\n"
}

fn parse_directive(line: &str) -> Option<(String, String)> {
    let inner = line.trim().strip_prefix('{')?.strip_suffix('}')?;
    let (name, value) = match inner.split_once(':') {
        Some((name, value)) => (name, value.trim()),
        None => (inner, ""),
    };
    let name = name.trim().to_ascii_lowercase();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }
    Some((name, value.to_string()))
}

pub(crate) fn strip_chords(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_chord = false;
    for c in line.chars() {
        match c {
            '[' => in_chord = true,
            ']' if in_chord => in_chord = false,
            _ if !in_chord => out.push(c),
            _ => {}
        }
    }
    out
}

use serde::Serialize;
use tantivy::schema::{Field, STORED, STRING, Schema, TEXT};

use crate::song::Song;

/// Handles to every field of the song index.
#[derive(Debug, Clone, Copy)]
pub struct SongFields {
    /// Raw, stored, unique per document.
    pub id: Field,
    /// Tokenized text of the whole song, metadata included. The default
    /// search field. Not stored.
    pub lyrics: Field,
    pub title: Field,
    pub author: Field,
    pub album: Field,
}

pub fn build_schema() -> (Schema, SongFields) {
    let mut builder = Schema::builder();
    let fields = SongFields {
        id: builder.add_text_field("id", STRING | STORED),
        lyrics: builder.add_text_field("lyrics", TEXT),
        title: builder.add_text_field("title", TEXT | STORED),
        author: builder.add_text_field("author", TEXT | STORED),
        album: builder.add_text_field("album", TEXT | STORED),
    };
    (builder.build(), fields)
}

/// The projection of a song that goes into the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDocument {
    pub id: String,
    pub title: String,
    pub author: String,
    pub album: String,
    pub lyrics: String,
}

impl IndexDocument {
    #[must_use]
    pub fn from_song(id: &str, song: &Song) -> Self {
        Self {
            id: id.to_string(),
            title: song.title.clone(),
            author: song.artist.clone(),
            album: song.album.clone(),
            lyrics: searchable_text(song),
        }
    }
}

/// Title, artist and album followed by the chord-free body, so unqualified
/// queries find a song by its metadata too.
fn searchable_text(song: &Song) -> String {
    let body = song.lyrics();
    [&song.title, &song.artist, &song.album, &body]
        .into_iter()
        .filter(|part| !part.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n")
}

/// A search result built from stored fields only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SongHit {
    pub id: String,
    pub title: String,
    pub author: String,
    pub album: String,
    pub score: f32,
}

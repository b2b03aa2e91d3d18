//! Per-song aggregation of extracted references

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::schema::{ExtractedReference, Song};

/// References collected for one song
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SongReferences {
    pub extracted: Vec<ExtractedReference>,
    /// The song's `lyrics_source`
    pub source: String,
}

/// Batch output keyed by song name, in corpus order
///
/// Serializes as `{song_name: {extracted: [...], source: ...}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct BatchResult {
    songs: IndexMap<String, SongReferences>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty entry for every song so that songs without any
    /// references still appear in the output
    pub fn for_songs(songs: &[Song]) -> Self {
        let mut result = Self::new();
        for song in songs {
            result.register(song);
        }
        result
    }

    /// Ensure an entry exists for `song`
    ///
    /// Corpora with duplicate song names share one entry; the first
    /// registered `lyrics_source` is kept.
    pub fn register(&mut self, song: &Song) {
        self.songs
            .entry(song.name.clone())
            .or_insert_with(|| SongReferences {
                extracted: Vec::new(),
                source: song.lyrics_source.clone(),
            });
    }

    /// Append one annotation's references to a registered song
    ///
    /// Returns `false` if no entry exists for `song_name`.
    pub fn append(&mut self, song_name: &str, references: Vec<ExtractedReference>) -> bool {
        match self.songs.get_mut(song_name) {
            Some(entry) => {
                entry.extracted.extend(references);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, song_name: &str) -> Option<&SongReferences> {
        self.songs.get(song_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SongReferences)> {
        self.songs.iter()
    }

    pub fn song_names(&self) -> impl Iterator<Item = &str> {
        self.songs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    /// Total references across all songs
    pub fn reference_count(&self) -> usize {
        self.songs.values().map(|s| s.extracted.len()).sum()
    }
}

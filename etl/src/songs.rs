//! Song Dimension Extractor: `Songs` and `Artists` projected from the catalog.

use arrow::array::{Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use records::SongRecord;
use std::collections::HashMap;
use std::sync::Arc;

use crate::columns::utf8;
use crate::source::Collection;

#[derive(Debug, Clone, PartialEq)]
pub struct SongRow {
    pub song_id: Option<String>,
    pub title: Option<String>,
    pub artist_id: Option<String>,
    pub year: Option<i64>,
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtistRow {
    pub artist_id: Option<String>,
    pub artist_name: Option<String>,
    pub artist_location: Option<String>,
    pub artist_latitude: Option<f64>,
    pub artist_longitude: Option<f64>,
}

impl From<&SongRecord> for SongRow {
    fn from(r: &SongRecord) -> Self {
        SongRow {
            song_id: r.song_id.clone(),
            title: r.title.clone(),
            artist_id: r.artist_id.clone(),
            year: r.year,
            duration: r.duration,
        }
    }
}

impl From<&SongRecord> for ArtistRow {
    fn from(r: &SongRecord) -> Self {
        ArtistRow {
            artist_id: r.artist_id.clone(),
            artist_name: r.artist_name.clone(),
            artist_location: r.artist_location.clone(),
            artist_latitude: r.artist_latitude,
            artist_longitude: r.artist_longitude,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SongDimensions {
    pub songs: Vec<SongRow>,
    pub artists: Vec<ArtistRow>,
}

/// One projection per input record, in input order. No rows are filtered or
/// deduplicated; the catalog dump is trusted to be unique per song and artist.
pub fn extract_dimensions(records: &Collection<SongRecord>) -> SongDimensions {
    SongDimensions {
        songs: records.iter().map(SongRow::from).collect(),
        artists: records.iter().map(ArtistRow::from).collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
}

/// The `Songs` relation indexed by exact title, the right-hand side of the
/// songplay join. Songs without a title can never match.
#[derive(Debug, Clone, Default)]
pub struct SongCatalog {
    by_title: HashMap<String, Vec<CatalogEntry>>,
    songs: usize,
}

impl SongCatalog {
    pub fn from_songs(songs: &[SongRow]) -> Self {
        let mut by_title: HashMap<String, Vec<CatalogEntry>> = HashMap::new();
        for song in songs {
            if let Some(title) = &song.title {
                by_title.entry(title.clone()).or_default().push(CatalogEntry {
                    song_id: song.song_id.clone(),
                    artist_id: song.artist_id.clone(),
                });
            }
        }
        SongCatalog {
            by_title,
            songs: songs.len(),
        }
    }

    /// Case-sensitive exact match.
    pub fn lookup(&self, title: &str) -> &[CatalogEntry] {
        self.by_title.get(title).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.songs
    }

    pub fn is_empty(&self) -> bool {
        self.songs == 0
    }
}

pub fn songs_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("song_id", DataType::Utf8, true),
        Field::new("title", DataType::Utf8, true),
        Field::new("artist_id", DataType::Utf8, true),
        Field::new("year", DataType::Int64, true),
        Field::new("duration", DataType::Float64, true),
    ]))
}

pub fn artists_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("artist_id", DataType::Utf8, true),
        Field::new("artist_name", DataType::Utf8, true),
        Field::new("artist_location", DataType::Utf8, true),
        Field::new("artist_latitude", DataType::Float64, true),
        Field::new("artist_longitude", DataType::Float64, true),
    ]))
}

pub fn songs_to_batch(rows: &[SongRow]) -> Result<RecordBatch, ArrowError> {
    RecordBatch::try_new(
        songs_schema(),
        vec![
            utf8(rows, |r| r.song_id.as_deref()),
            utf8(rows, |r| r.title.as_deref()),
            utf8(rows, |r| r.artist_id.as_deref()),
            Arc::new(rows.iter().map(|r| r.year).collect::<Int64Array>()),
            Arc::new(rows.iter().map(|r| r.duration).collect::<Float64Array>()),
        ],
    )
}

pub fn artists_to_batch(rows: &[ArtistRow]) -> Result<RecordBatch, ArrowError> {
    RecordBatch::try_new(
        artists_schema(),
        vec![
            utf8(rows, |r| r.artist_id.as_deref()),
            utf8(rows, |r| r.artist_name.as_deref()),
            utf8(rows, |r| r.artist_location.as_deref()),
            Arc::new(rows.iter().map(|r| r.artist_latitude).collect::<Float64Array>()),
            Arc::new(rows.iter().map(|r| r.artist_longitude).collect::<Float64Array>()),
        ],
    )
}

//! Fact Table Builder: song plays joined to the catalog by title.

use arrow::array::{ArrayRef, Int64Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

use crate::columns::utf8;
use crate::error::{EtlError, Result};
use crate::songs::SongCatalog;
use crate::source::Collection;
use crate::timetable::PlayEvent;

const PARTITION_SHIFT: u32 = 33;

/// Surrogate ids for one input partition: the partition index sits in the
/// high bits, the row index in the low 33 bits. Ids increase strictly within
/// a partition and across partitions in partition order, with gaps between
/// partitions.
#[derive(Debug, Clone)]
pub struct MonotonicIds {
    base: i64,
    next_row: i64,
}

impl MonotonicIds {
    pub fn for_partition(partition: usize) -> Self {
        MonotonicIds {
            base: (partition as i64) << PARTITION_SHIFT,
            next_row: 0,
        }
    }
}

impl Iterator for MonotonicIds {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        let id = self.base + self.next_row;
        self.next_row += 1;
        Some(id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SongplayRow {
    pub songplay_id: i64,
    pub ts: i64,
    pub user_id: Option<String>,
    pub level: Option<String>,
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
    pub item_in_session: Option<i64>,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}

/// Number each event, then inner-join on `song == title`.
///
/// Ids are handed out before the join, so unmatched events leave gaps and an
/// event matching several catalog songs emits one row per match under the
/// same id. Fails with `MissingRelation` when the catalog was never built.
pub fn build_songplays(
    events: &Collection<PlayEvent>,
    catalog: Option<&SongCatalog>,
) -> Result<Vec<SongplayRow>> {
    let catalog = catalog.ok_or_else(|| EtlError::MissingRelation("songs".to_string()))?;

    let mut rows = Vec::new();
    let mut unmatched = 0usize;
    for (index, partition) in events.partitions.iter().enumerate() {
        for (event, songplay_id) in partition.rows.iter().zip(MonotonicIds::for_partition(index)) {
            let matches = event
                .record
                .song
                .as_deref()
                .map(|title| catalog.lookup(title))
                .unwrap_or_default();
            if matches.is_empty() {
                unmatched += 1;
                continue;
            }

            let record = &event.record;
            rows.extend(matches.iter().map(|entry| SongplayRow {
                songplay_id,
                ts: event.ts,
                user_id: record.user_id.clone(),
                level: record.level.clone(),
                song_id: entry.song_id.clone(),
                artist_id: entry.artist_id.clone(),
                item_in_session: record.item_in_session,
                location: record.location.clone(),
                user_agent: record.user_agent.clone(),
            }));
        }
    }

    if unmatched > 0 {
        tracing::info!(
            "{} of {} plays have no exact title match in the song catalog and were dropped",
            unmatched,
            events.len()
        );
    }
    Ok(rows)
}

pub fn songplays_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("songplay_id", DataType::Int64, false),
        Field::new("ts", DataType::Int64, false),
        Field::new("userId", DataType::Utf8, true),
        Field::new("level", DataType::Utf8, true),
        Field::new("song_id", DataType::Utf8, true),
        Field::new("artist_id", DataType::Utf8, true),
        Field::new("itemInSession", DataType::Int64, true),
        Field::new("location", DataType::Utf8, true),
        Field::new("userAgent", DataType::Utf8, true),
    ]))
}

pub fn songplays_to_batch(rows: &[SongplayRow]) -> std::result::Result<RecordBatch, ArrowError> {
    RecordBatch::try_new(
        songplays_schema(),
        vec![
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.songplay_id))) as ArrayRef,
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.ts))),
            utf8(rows, |r| r.user_id.as_deref()),
            utf8(rows, |r| r.level.as_deref()),
            utf8(rows, |r| r.song_id.as_deref()),
            utf8(rows, |r| r.artist_id.as_deref()),
            Arc::new(rows.iter().map(|r| r.item_in_session).collect::<Int64Array>()),
            utf8(rows, |r| r.location.as_deref()),
            utf8(rows, |r| r.user_agent.as_deref()),
        ],
    )
}

//! Activity Filter & User Dimension Extractor.

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use records::ActivityRecord;
use std::collections::HashSet;
use std::sync::Arc;

use crate::columns::utf8;
use crate::source::{Collection, Partition};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserRow {
    pub user_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: Option<String>,
}

impl From<&ActivityRecord> for UserRow {
    fn from(r: &ActivityRecord) -> Self {
        UserRow {
            user_id: r.user_id.clone(),
            first_name: r.first_name.clone(),
            last_name: r.last_name.clone(),
            gender: r.gender.clone(),
            level: r.level.clone(),
        }
    }
}

/// Keep only `page == "NextSong"` events, partition boundaries intact.
pub fn filter_song_plays(logs: Collection<ActivityRecord>) -> Collection<ActivityRecord> {
    Collection {
        partitions: logs
            .partitions
            .into_iter()
            .map(|p| Partition {
                source: p.source,
                rows: p.rows.into_iter().filter(ActivityRecord::is_song_play).collect(),
            })
            .collect(),
    }
}

/// Distinct user tuples in first-seen order. A level change yields a second
/// row for the same user.
pub fn distinct_users(plays: &Collection<ActivityRecord>) -> Vec<UserRow> {
    let mut seen = HashSet::new();
    plays
        .iter()
        .map(UserRow::from)
        .filter(|user| seen.insert(user.clone()))
        .collect()
}

pub fn users_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("userId", DataType::Utf8, true),
        Field::new("firstName", DataType::Utf8, true),
        Field::new("lastName", DataType::Utf8, true),
        Field::new("gender", DataType::Utf8, true),
        Field::new("level", DataType::Utf8, true),
    ]))
}

pub fn users_to_batch(rows: &[UserRow]) -> Result<RecordBatch, ArrowError> {
    RecordBatch::try_new(
        users_schema(),
        vec![
            utf8(rows, |r| r.user_id.as_deref()),
            utf8(rows, |r| r.first_name.as_deref()),
            utf8(rows, |r| r.last_name.as_deref()),
            utf8(rows, |r| r.gender.as_deref()),
            utf8(rows, |r| r.level.as_deref()),
        ],
    )
}

//! Time Dimension Derivation.
//!
//! Calendar fields are computed in UTC. `week` is the ISO-8601 week number
//! while `year` stays the calendar year, so 2018-12-31 lands in week 1 of
//! year 2018. `weekday` counts from Sunday = 1 to Saturday = 7.

use arrow::array::{ArrayRef, Int32Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use records::ActivityRecord;
use std::sync::Arc;

use crate::error::{EtlError, Result};
use crate::source::Collection;

/// A song play with its timestamp resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayEvent {
    pub record: ActivityRecord,
    pub ts: i64,
    pub start_time: DateTime<Utc>,
    pub date: NaiveDate,
}

impl PlayEvent {
    /// `None` when the record carries no timestamp.
    pub fn from_record(record: ActivityRecord) -> Result<Option<Self>> {
        let Some(ts) = record.ts else {
            return Ok(None);
        };
        let start_time = DateTime::from_timestamp_millis(ts).ok_or_else(|| {
            EtlError::data_read("log_data", format!("timestamp {} is out of range", ts))
        })?;

        Ok(Some(PlayEvent {
            date: start_time.date_naive(),
            start_time,
            ts,
            record,
        }))
    }

    /// Seconds since the epoch.
    pub fn epoch_seconds(&self) -> i64 {
        self.ts.div_euclid(1000)
    }
}

/// Drop plays without a timestamp and resolve the rest.
pub fn derive_timestamps(plays: Collection<ActivityRecord>) -> Result<Collection<PlayEvent>> {
    plays.map_partitions(|rows| {
        let mut events = Vec::with_capacity(rows.len());
        for record in rows {
            if let Some(event) = PlayEvent::from_record(record)? {
                events.push(event);
            }
        }
        Ok(events)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRow {
    pub ts: i64,
    pub day: i32,
    pub week: i32,
    pub month: i32,
    pub year: i32,
    pub weekday: i32,
}

impl TimeRow {
    pub fn from_event(event: &PlayEvent) -> Self {
        let date = event.date;
        TimeRow {
            ts: event.ts,
            day: date.day() as i32,
            week: date.iso_week().week() as i32,
            month: date.month() as i32,
            year: date.year(),
            weekday: date.weekday().number_from_sunday() as i32,
        }
    }
}

/// One row per event; events sharing a `ts` give identical rows.
pub fn time_rows(events: &Collection<PlayEvent>) -> Vec<TimeRow> {
    events.iter().map(TimeRow::from_event).collect()
}

pub fn time_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("ts", DataType::Int64, false),
        Field::new("day", DataType::Int32, false),
        Field::new("week", DataType::Int32, false),
        Field::new("month", DataType::Int32, false),
        Field::new("year", DataType::Int32, false),
        Field::new("weekday", DataType::Int32, false),
    ]))
}

pub fn time_to_batch(rows: &[TimeRow]) -> std::result::Result<RecordBatch, ArrowError> {
    let int32 = |f: fn(&TimeRow) -> i32| -> ArrayRef {
        Arc::new(Int32Array::from_iter_values(rows.iter().map(f)))
    };

    RecordBatch::try_new(
        time_schema(),
        vec![
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.ts))) as ArrayRef,
            int32(|r| r.day),
            int32(|r| r.week),
            int32(|r| r.month),
            int32(|r| r.year),
            int32(|r| r.weekday),
        ],
    )
}

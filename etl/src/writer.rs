//! Table Writer: Hive-partitioned Parquet datasets with overwrite semantics.

use arrow::array::{Array, UInt32Array};
use arrow::compute::take_record_batch;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{EtlError, Result};

pub const HIVE_DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";
pub const SUCCESS_MARKER: &str = "_SUCCESS";
const PART_FILE: &str = "part-00000.parquet";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutputTable {
    Songs,
    Artists,
    Users,
    Time,
    Songplays,
}

impl OutputTable {
    pub const ALL: [OutputTable; 5] = [
        OutputTable::Songs,
        OutputTable::Artists,
        OutputTable::Users,
        OutputTable::Time,
        OutputTable::Songplays,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OutputTable::Songs => "songs",
            OutputTable::Artists => "artists",
            OutputTable::Users => "users",
            OutputTable::Time => "timetable",
            OutputTable::Songplays => "songplays",
        }
    }

    /// Dataset directory relative to the output root.
    pub fn location(&self) -> &'static str {
        match self {
            OutputTable::Songs => "songs/song_table.pq",
            OutputTable::Artists => "artists/artist_table.pq",
            OutputTable::Users => "users/user_data.pq",
            OutputTable::Time => "timetable/time_table.pq",
            OutputTable::Songplays => "songplays/songplays_table.pq",
        }
    }

    pub fn partition_columns(&self) -> &'static [&'static str] {
        match self {
            OutputTable::Songs => &["year", "artist_id"],
            OutputTable::Time => &["year", "month"],
            _ => &[],
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }
}

impl std::fmt::Display for OutputTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub table: OutputTable,
    pub rows: usize,
    pub files: Vec<String>,
}

pub struct TableWriter {
    store: Arc<dyn ObjectStore>,
}

impl TableWriter {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Replace everything under the table's location with `batch`.
    ///
    /// Existing objects are removed before the new files land, so a failure
    /// part way through leaves the table incomplete.
    pub async fn overwrite(&self, table: OutputTable, batch: RecordBatch) -> Result<WriteSummary> {
        let rows = batch.num_rows();
        let groups = split_partitions(&batch, table.partition_columns())
            .map_err(|e| EtlError::write(table.name(), e))?;

        let root = ObjectPath::from(table.location());
        let removed = self.clear(table, &root).await?;
        if removed > 0 {
            tracing::debug!("removed {} existing objects from {}", removed, root);
        }

        let mut files = Vec::with_capacity(groups.len());
        for (segments, part) in groups {
            let path = segments
                .iter()
                .fold(root.clone(), |path, segment| path.child(segment.as_str()))
                .child(PART_FILE);
            let bytes =
                serialize_to_parquet(&part).map_err(|e| EtlError::write(table.name(), e))?;

            tracing::debug!("writing {} rows to {}", part.num_rows(), path);
            self.store
                .put(&path, bytes.into())
                .await
                .map_err(|e| EtlError::write(table.name(), e))?;
            files.push(path.to_string());
        }

        self.store
            .put(&root.child(SUCCESS_MARKER), Bytes::new().into())
            .await
            .map_err(|e| EtlError::write(table.name(), e))?;

        tracing::info!(
            "wrote {} rows to {} ({} files)",
            rows,
            table.location(),
            files.len()
        );
        Ok(WriteSummary { table, rows, files })
    }

    async fn clear(&self, table: OutputTable, root: &ObjectPath) -> Result<usize> {
        let existing = self
            .store
            .list(Some(root))
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| EtlError::write(table.name(), e))?;

        for meta in &existing {
            self.store
                .delete(&meta.location)
                .await
                .map_err(|e| EtlError::write(table.name(), e))?;
        }
        Ok(existing.len())
    }
}

/// Split `batch` into one batch per distinct combination of `columns`,
/// keyed by the `column=value` path segments. Partition columns are dropped
/// from the returned batches. Groups come back in sorted key order.
pub fn split_partitions(
    batch: &RecordBatch,
    columns: &[&str],
) -> std::result::Result<Vec<(Vec<String>, RecordBatch)>, ArrowError> {
    if columns.is_empty() {
        return Ok(vec![(Vec::new(), batch.clone())]);
    }

    let schema = batch.schema();
    let key_indices = columns
        .iter()
        .map(|c| schema.index_of(c))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let data_indices: Vec<usize> = (0..schema.fields().len())
        .filter(|i| !key_indices.contains(i))
        .collect();

    let mut groups: BTreeMap<Vec<String>, Vec<u32>> = BTreeMap::new();
    for row in 0..batch.num_rows() {
        let mut key = Vec::with_capacity(columns.len());
        for (name, &idx) in columns.iter().zip(&key_indices) {
            let array = batch.column(idx);
            let value = if array.is_null(row) {
                HIVE_DEFAULT_PARTITION.to_string()
            } else {
                array_value_to_string(array.as_ref(), row)?
            };
            key.push(format!("{}={}", name, value));
        }
        groups.entry(key).or_default().push(row as u32);
    }

    groups
        .into_iter()
        .map(|(key, rows)| {
            let taken = take_record_batch(batch, &UInt32Array::from(rows))?;
            Ok((key, taken.project(&data_indices)?))
        })
        .collect()
}

pub(crate) fn serialize_to_parquet(
    batch: &RecordBatch,
) -> std::result::Result<Bytes, parquet::errors::ParquetError> {
    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::try_new(1).unwrap_or_default()))
        .build();

    let mut buffer = Vec::with_capacity(64 * 1024);
    {
        let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props))?;
        writer.write(batch)?;
        writer.close()?;
    }
    Ok(Bytes::from(buffer))
}

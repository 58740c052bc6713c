//! Reads written tables back from the output root.

use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::errors::ParquetError;
use std::sync::Arc;

use crate::error::{EtlError, Result};
use crate::writer::{OutputTable, SUCCESS_MARKER};

#[derive(Debug, Clone)]
pub struct TableFile {
    pub path: String,
    /// `(column, value)` pairs taken from the Hive directory names.
    pub partition: Vec<(String, String)>,
    pub batches: Vec<RecordBatch>,
}

impl TableFile {
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }
}

#[derive(Debug, Clone)]
pub struct TableContents {
    pub table: OutputTable,
    /// Whether the `_SUCCESS` marker is present.
    pub complete: bool,
    pub files: Vec<TableFile>,
}

impl TableContents {
    pub fn num_rows(&self) -> usize {
        self.files.iter().map(TableFile::num_rows).sum()
    }

    pub fn partition_dirs(&self) -> Vec<String> {
        self.files
            .iter()
            .filter(|f| !f.partition.is_empty())
            .map(|f| {
                f.partition
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .collect()
    }
}

pub struct TableReader {
    store: Arc<dyn ObjectStore>,
}

impl TableReader {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub async fn read(&self, table: OutputTable) -> Result<TableContents> {
        let root = ObjectPath::from(table.location());
        let mut objects = self
            .store
            .list(Some(&root))
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| EtlError::data_read(table.name(), e))?;
        objects.sort_by(|a, b| a.location.cmp(&b.location));

        let mut complete = false;
        let mut files = Vec::new();
        for meta in objects {
            let Some(relative) = meta.location.prefix_match(&root) else {
                continue;
            };
            let parts: Vec<String> = relative.map(|p| p.as_ref().to_string()).collect();
            let Some((file_name, dirs)) = parts.split_last() else {
                continue;
            };

            if file_name == SUCCESS_MARKER && dirs.is_empty() {
                complete = true;
                continue;
            }
            if !file_name.ends_with(".parquet") {
                continue;
            }

            let bytes = self
                .store
                .get(&meta.location)
                .await
                .map_err(|e| EtlError::data_read(table.name(), e))?
                .bytes()
                .await
                .map_err(|e| EtlError::data_read(table.name(), e))?;

            let batches = read_parquet(bytes).map_err(|e| {
                EtlError::data_read(table.name(), format!("{}: {}", meta.location, e))
            })?;

            let partition = dirs
                .iter()
                .filter_map(|d| d.split_once('='))
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();

            files.push(TableFile {
                path: meta.location.to_string(),
                partition,
                batches,
            });
        }

        Ok(TableContents {
            table,
            complete,
            files,
        })
    }
}

fn read_parquet(bytes: Bytes) -> std::result::Result<Vec<RecordBatch>, ParquetError> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(bytes)?.build()?;
    reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(ParquetError::from)
}

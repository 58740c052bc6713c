//! Record Source: newline-delimited JSON collections addressed by glob.

use futures::TryStreamExt;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::error::{EtlError, Result};

pub const SONG_DATA_GLOB: &str = "song_data/*/*/*";
pub const LOG_DATA_GLOB: &str = "log_data/*.json";

/// Rows grouped by the input file they came from. Partition order is the
/// lexicographic order of the source keys.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection<T> {
    pub partitions: Vec<Partition<T>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Partition<T> {
    pub source: String,
    pub rows: Vec<T>,
}

impl<T> Collection<T> {
    pub fn from_rows(source: impl Into<String>, rows: Vec<T>) -> Self {
        Collection {
            partitions: vec![Partition {
                source: source.into(),
                rows,
            }],
        }
    }

    pub fn len(&self) -> usize {
        self.partitions.iter().map(|p| p.rows.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.partitions.iter().flat_map(|p| p.rows.iter())
    }

    /// Map every partition's rows, keeping partition boundaries.
    pub fn map_partitions<U, F>(self, mut f: F) -> Result<Collection<U>>
    where
        F: FnMut(Vec<T>) -> Result<Vec<U>>,
    {
        let partitions = self
            .partitions
            .into_iter()
            .map(|p| {
                Ok(Partition {
                    source: p.source,
                    rows: f(p.rows)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Collection { partitions })
    }
}

/// Hadoop-style path glob. `*` and `?` match within a single segment.
#[derive(Debug, Clone)]
pub struct Glob {
    segments: Vec<String>,
}

impl Glob {
    pub fn new(pattern: &str) -> Self {
        Glob {
            segments: pattern
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Leading segments without wildcards, used as the listing prefix.
    pub fn literal_prefix(&self) -> Vec<&str> {
        self.segments
            .iter()
            .take_while(|s| !s.contains(['*', '?']))
            .map(String::as_str)
            .collect()
    }

    /// A key matches when it names a file matched by the pattern, or a file
    /// directly inside a directory matched by the pattern.
    pub fn matches(&self, key: &str) -> bool {
        let parts: Vec<&str> = key.split('/').filter(|s| !s.is_empty()).collect();
        if parts.len() != self.segments.len() && parts.len() != self.segments.len() + 1 {
            return false;
        }

        let literal = self.literal_prefix().len();
        if parts[literal..]
            .iter()
            .any(|p| p.starts_with('_') || p.starts_with('.'))
        {
            return false;
        }

        self.segments
            .iter()
            .zip(parts.iter())
            .all(|(pattern, part)| segment_matches(pattern, part))
    }
}

fn segment_matches(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

pub struct RecordSource {
    store: Arc<dyn ObjectStore>,
}

impl RecordSource {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Keys matching `glob`, sorted.
    pub async fn list_matching(&self, collection: &str, glob: &Glob) -> Result<Vec<ObjectPath>> {
        let prefix = ObjectPath::from_iter(glob.literal_prefix());
        let prefix = if prefix.as_ref().is_empty() {
            None
        } else {
            Some(prefix)
        };

        let objects: Vec<_> = self
            .store
            .list(prefix.as_ref())
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| EtlError::data_read(collection, e))?;

        let mut keys: Vec<ObjectPath> = objects
            .into_iter()
            .map(|meta| meta.location)
            .filter(|location| glob.matches(location.as_ref()))
            .collect();
        keys.sort();
        Ok(keys)
    }

    /// Read every file matching `pattern`, one JSON object per line.
    ///
    /// An empty match or a collection without records is an error.
    pub async fn read_json<T: DeserializeOwned>(
        &self,
        collection: &str,
        pattern: &str,
    ) -> Result<Collection<T>> {
        let glob = Glob::new(pattern);
        let keys = self.list_matching(collection, &glob).await?;
        if keys.is_empty() {
            return Err(EtlError::data_read(
                collection,
                format!("no input files match {:?}", pattern),
            ));
        }
        tracing::debug!("{} files match {} for {}", keys.len(), pattern, collection);

        let mut partitions = Vec::with_capacity(keys.len());
        for key in keys {
            let bytes = self
                .store
                .get(&key)
                .await
                .map_err(|e| EtlError::data_read(collection, e))?
                .bytes()
                .await
                .map_err(|e| EtlError::data_read(collection, e))?;

            let text = std::str::from_utf8(&bytes)
                .map_err(|e| EtlError::data_read(collection, format!("{}: {}", key, e)))?;

            let rows = parse_lines(text).map_err(|(line, e)| {
                EtlError::data_read(collection, format!("{}:{}: {}", key, line, e))
            })?;

            partitions.push(Partition {
                source: key.to_string(),
                rows,
            });
        }

        let collection_rows = Collection { partitions };
        if collection_rows.is_empty() {
            return Err(EtlError::data_read(
                collection,
                format!("files matching {:?} contain no records", pattern),
            ));
        }

        tracing::info!(
            "read {} {} records from {} files",
            collection_rows.len(),
            collection,
            collection_rows.partitions.len()
        );
        Ok(collection_rows)
    }
}

fn parse_lines<T: DeserializeOwned>(
    text: &str,
) -> std::result::Result<Vec<T>, (usize, serde_json::Error)> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| serde_json::from_str(line).map_err(|e| (i + 1, e)))
        .collect()
}

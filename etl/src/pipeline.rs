use records::{ActivityRecord, SongRecord};

use crate::activity::{distinct_users, filter_song_plays, users_to_batch};
use crate::config::Config;
use crate::error::{EtlError, Result};
use crate::songplays::{build_songplays, songplays_to_batch};
use crate::songs::{artists_to_batch, extract_dimensions, songs_to_batch, SongCatalog};
use crate::source::{RecordSource, LOG_DATA_GLOB, SONG_DATA_GLOB};
use crate::storage::build_object_store;
use crate::timetable::{derive_timestamps, time_rows, time_to_batch};
use crate::writer::{OutputTable, TableWriter, WriteSummary};

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub tables: Vec<WriteSummary>,
}

pub struct Pipeline {
    source: RecordSource,
    writer: TableWriter,
}

impl Pipeline {
    pub fn new(source: RecordSource, writer: TableWriter) -> Self {
        Self { source, writer }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let input = build_object_store(&config.input_data, &config.credentials, false)
            .map_err(|e| {
                EtlError::Configuration(format!("input_data {}: {}", config.input_data, e))
            })?;
        let output = build_object_store(&config.output_data, &config.credentials, true)
            .map_err(|e| {
                EtlError::Configuration(format!("output_data {}: {}", config.output_data, e))
            })?;

        Ok(Self::new(RecordSource::new(input), TableWriter::new(output)))
    }

    /// Project the song catalog into `Songs` and `Artists` and write both.
    /// Returns the catalog the songplay join is built against.
    pub async fn process_song_data(&self) -> Result<(SongCatalog, Vec<WriteSummary>)> {
        tracing::info!("processing song data");
        let records = self
            .source
            .read_json::<SongRecord>("song_data", SONG_DATA_GLOB)
            .await?;

        let dims = extract_dimensions(&records);
        let songs = songs_to_batch(&dims.songs)
            .map_err(|e| EtlError::write(OutputTable::Songs.name(), e))?;
        let artists = artists_to_batch(&dims.artists)
            .map_err(|e| EtlError::write(OutputTable::Artists.name(), e))?;

        let written = vec![
            self.writer.overwrite(OutputTable::Songs, songs).await?,
            self.writer.overwrite(OutputTable::Artists, artists).await?,
        ];

        Ok((SongCatalog::from_songs(&dims.songs), written))
    }

    /// Filter the activity log to plays and write `Users`, `Time` and
    /// `Songplays`. `Users` and `Time` are written even without a catalog;
    /// `Songplays` then fails with `MissingRelation`.
    pub async fn process_log_data(
        &self,
        catalog: Option<&SongCatalog>,
    ) -> Result<Vec<WriteSummary>> {
        tracing::info!("processing log data");
        let logs = self
            .source
            .read_json::<ActivityRecord>("log_data", LOG_DATA_GLOB)
            .await?;

        let total = logs.len();
        let plays = filter_song_plays(logs);
        tracing::info!(
            "kept {} song plays, dropped {} other events",
            plays.len(),
            total - plays.len()
        );

        let mut written = Vec::with_capacity(3);

        let users = distinct_users(&plays);
        let batch =
            users_to_batch(&users).map_err(|e| EtlError::write(OutputTable::Users.name(), e))?;
        written.push(self.writer.overwrite(OutputTable::Users, batch).await?);

        let play_count = plays.len();
        let events = derive_timestamps(plays)?;
        if events.len() < play_count {
            tracing::info!(
                "dropped {} plays without a timestamp",
                play_count - events.len()
            );
        }

        let batch = time_to_batch(&time_rows(&events))
            .map_err(|e| EtlError::write(OutputTable::Time.name(), e))?;
        written.push(self.writer.overwrite(OutputTable::Time, batch).await?);

        let songplays = build_songplays(&events, catalog)?;
        let batch = songplays_to_batch(&songplays)
            .map_err(|e| EtlError::write(OutputTable::Songplays.name(), e))?;
        written.push(self.writer.overwrite(OutputTable::Songplays, batch).await?);

        Ok(written)
    }

    /// Run both phases. A song phase failure does not stop the log phase
    /// from being attempted, but the run still reports the song failure.
    pub async fn run(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        let (catalog, song_error) = match self.process_song_data().await {
            Ok((catalog, written)) => {
                summary.tables.extend(written);
                (Some(catalog), None)
            }
            Err(e) => {
                tracing::error!("song data phase failed: {}", e);
                (None, Some(e))
            }
        };

        let logs = self.process_log_data(catalog.as_ref()).await;

        match (song_error, logs) {
            (None, Ok(written)) => {
                summary.tables.extend(written);
                tracing::info!("wrote {} tables", summary.tables.len());
                Ok(summary)
            }
            (None, Err(e)) => Err(e),
            (Some(song_error), logs) => {
                if let Err(e) = logs {
                    tracing::error!("log data phase failed: {}", e);
                }
                Err(song_error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::TryStreamExt;
    use object_store::memory::InMemory;
    use object_store::path::Path as ObjectPath;
    use object_store::ObjectStore;
    use std::sync::Arc;

    async fn put(store: &InMemory, key: &str, lines: &[&str]) {
        let body = lines.join("\n");
        store
            .put(&ObjectPath::from(key), Bytes::from(body).into())
            .await
            .unwrap();
    }

    async fn keys(store: &InMemory) -> Vec<String> {
        let mut keys: Vec<String> = store
            .list(None)
            .try_collect::<Vec<_>>()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.location.to_string())
            .collect();
        keys.sort();
        keys
    }

    const SONG: &str = r#"{"song_id":"S1","title":"Test Song","artist_id":"A1","year":2000,"duration":200.0,"artist_name":"Tester","artist_location":null,"artist_latitude":null,"artist_longitude":null,"num_songs":1}"#;
    const PLAY: &str = r#"{"page":"NextSong","ts":1542069000000,"userId":"42","firstName":"Ada","lastName":"L","gender":"F","level":"free","song":"Test Song","itemInSession":0,"location":"X","userAgent":"UA"}"#;
    const PAGE_VIEW: &str = r#"{"page":"PageView","ts":1542069000001,"userId":"43","firstName":"Bo","lastName":"M","gender":"M","level":"paid","song":null,"itemInSession":1,"location":"Y","userAgent":"UA"}"#;

    fn pipeline(input: Arc<InMemory>, output: Arc<InMemory>) -> Pipeline {
        Pipeline::new(RecordSource::new(input), TableWriter::new(output))
    }

    #[tokio::test]
    async fn full_run_writes_five_tables() {
        let input = Arc::new(InMemory::new());
        put(&input, "song_data/A/B/C/TRA.json", &[SONG]).await;
        put(&input, "log_data/2018-11-13-events.json", &[PLAY, PAGE_VIEW]).await;
        let output = Arc::new(InMemory::new());

        let summary = pipeline(input, output.clone()).run().await.unwrap();
        let rows: Vec<(OutputTable, usize)> =
            summary.tables.iter().map(|t| (t.table, t.rows)).collect();
        assert_eq!(
            rows,
            vec![
                (OutputTable::Songs, 1),
                (OutputTable::Artists, 1),
                (OutputTable::Users, 1),
                (OutputTable::Time, 1),
                (OutputTable::Songplays, 1),
            ]
        );

        let keys = keys(&output).await;
        assert!(keys.contains(
            &"songs/song_table.pq/year=2000/artist_id=A1/part-00000.parquet".to_string()
        ));
        assert!(keys.contains(
            &"timetable/time_table.pq/year=2018/month=11/part-00000.parquet".to_string()
        ));
        assert!(keys.contains(&"songplays/songplays_table.pq/_SUCCESS".to_string()));
    }

    #[tokio::test]
    async fn song_failure_still_writes_users_and_time() {
        let input = Arc::new(InMemory::new());
        put(&input, "log_data/2018-11-13-events.json", &[PLAY]).await;
        let output = Arc::new(InMemory::new());

        let err = pipeline(input, output.clone()).run().await.unwrap_err();
        assert!(matches!(err, EtlError::DataRead { ref collection, .. } if collection == "song_data"));

        let keys = keys(&output).await;
        assert!(keys.iter().any(|k| k.starts_with("users/user_data.pq/")));
        assert!(keys.iter().any(|k| k.starts_with("timetable/time_table.pq/")));
        assert!(!keys.iter().any(|k| k.starts_with("songplays/")));
        assert!(!keys.iter().any(|k| k.starts_with("songs/")));
    }

    #[tokio::test]
    async fn log_phase_without_catalog_is_missing_relation() {
        let input = Arc::new(InMemory::new());
        put(&input, "log_data/2018-11-13-events.json", &[PLAY]).await;

        let err = pipeline(input, Arc::new(InMemory::new()))
            .process_log_data(None)
            .await
            .unwrap_err();
        assert!(matches!(err, EtlError::MissingRelation(_)));
    }

    #[tokio::test]
    async fn log_failure_is_reported_when_songs_succeed() {
        let input = Arc::new(InMemory::new());
        put(&input, "song_data/A/B/C/TRA.json", &[SONG]).await;
        let output = Arc::new(InMemory::new());

        let err = pipeline(input, output.clone()).run().await.unwrap_err();
        assert!(matches!(err, EtlError::DataRead { ref collection, .. } if collection == "log_data"));
        // Songs were already written and are left in place.
        assert!(keys(&output).await.iter().any(|k| k.starts_with("songs/")));
    }
}

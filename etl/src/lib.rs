//! Builds the Sparkify star schema from the raw song catalog and activity log.
//!
//! `song_data` becomes the `songs` and `artists` dimensions, `log_data` is
//! filtered to song plays and becomes `users`, `timetable` and the
//! `songplays` fact table. Every table is rewritten in full on each run.

mod columns;

pub mod activity;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod readback;
pub mod songplays;
pub mod songs;
pub mod source;
pub mod storage;
pub mod timetable;
pub mod writer;

pub use config::Config;
pub use error::{EtlError, Result};
pub use pipeline::{Pipeline, RunSummary};

pub async fn run(config: &Config) -> Result<RunSummary> {
    tracing::info!(
        "reading from {}, writing to {}",
        config.input_data,
        config.output_data
    );
    if config.input_data.is_remote() || config.output_data.is_remote() {
        tracing::debug!("using s3 credentials in {}", config.credentials.region);
    }

    Pipeline::from_config(config)?.run().await
}

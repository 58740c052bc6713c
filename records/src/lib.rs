//! Record types for the two raw input collections of the data lake.
//!
//! `song_data` holds one JSON object per catalog song, `log_data` one JSON
//! object per user action. Every field is optional because the source files
//! are schemaless and the pipeline only checks what it needs to derive columns.

pub mod de;
pub mod log_data;
pub mod song_data;

pub use log_data::ActivityRecord;
pub use song_data::SongRecord;

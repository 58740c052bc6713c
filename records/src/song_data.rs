use serde::{Deserialize, Serialize};

/// One song from the catalog dump, artist fields inlined.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SongRecord {
    pub song_id: Option<String>,
    pub title: Option<String>,
    pub artist_id: Option<String>,
    /// 0 means the release year is unknown.
    pub year: Option<i64>,
    /// Seconds.
    pub duration: Option<f64>,
    pub artist_name: Option<String>,
    pub artist_location: Option<String>,
    pub artist_latitude: Option<f64>,
    pub artist_longitude: Option<f64>,
    pub num_songs: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_catalog_line() {
        let line = r#"{"num_songs": 1, "artist_id": "ARJIE2Y1187B994AB7", "artist_latitude": null, "artist_longitude": null, "artist_location": "", "artist_name": "Line Renaud", "song_id": "SOUPIRU12A6D4FA1E1", "title": "Der Kleine Dompfaff", "duration": 152.92036, "year": 0}"#;
        let record: SongRecord = serde_json::from_str(line).unwrap();

        assert_eq!(record.song_id.as_deref(), Some("SOUPIRU12A6D4FA1E1"));
        assert_eq!(record.artist_id.as_deref(), Some("ARJIE2Y1187B994AB7"));
        assert_eq!(record.year, Some(0));
        assert_eq!(record.artist_latitude, None);
        assert_eq!(record.artist_location.as_deref(), Some(""));
    }

    #[test]
    fn missing_fields_are_none() {
        let record: SongRecord = serde_json::from_str(r#"{"title": "Only A Title"}"#).unwrap();
        assert_eq!(record.title.as_deref(), Some("Only A Title"));
        assert!(record.song_id.is_none());
        assert!(record.duration.is_none());
    }
}

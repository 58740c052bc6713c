use serde::{Deserialize, Serialize};

use crate::de;

/// `page` value that marks a song play.
pub const NEXT_SONG: &str = "NextSong";

/// One user action from the activity log. Field names follow the log's
/// camelCase keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub artist: Option<String>,
    pub auth: Option<String>,
    pub first_name: Option<String>,
    pub gender: Option<String>,
    pub item_in_session: Option<i64>,
    pub last_name: Option<String>,
    pub length: Option<f64>,
    pub level: Option<String>,
    pub location: Option<String>,
    pub method: Option<String>,
    pub page: Option<String>,
    pub session_id: Option<i64>,
    pub song: Option<String>,
    pub status: Option<i64>,
    /// Epoch milliseconds.
    #[serde(default, deserialize_with = "de::opt_millis")]
    pub ts: Option<i64>,
    pub user_agent: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string_or_number")]
    pub user_id: Option<String>,
}

impl ActivityRecord {
    pub fn is_song_play(&self) -> bool {
        self.page.as_deref() == Some(NEXT_SONG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_log_line() {
        let line = r#"{"artist":"Frumpies","auth":"Logged In","firstName":"Anabelle","gender":"F","itemInSession":0,"lastName":"Simpson","length":134.47791,"level":"free","location":"Philadelphia-Camden-Wilmington, PA-NJ-DE-MD","method":"PUT","page":"NextSong","registration":1541044398796.0,"sessionId":455,"song":"Fuck Kitty","status":200,"ts":1541903636796,"userAgent":"Mozilla\/5.0","userId":"69"}"#;
        let record: ActivityRecord = serde_json::from_str(line).unwrap();

        assert!(record.is_song_play());
        assert_eq!(record.ts, Some(1541903636796));
        assert_eq!(record.user_id.as_deref(), Some("69"));
        assert_eq!(record.item_in_session, Some(0));
        assert_eq!(record.user_agent.as_deref(), Some("Mozilla/5.0"));
    }

    #[test]
    fn numeric_user_id_is_rendered_as_string() {
        let record: ActivityRecord =
            serde_json::from_str(r#"{"page":"NextSong","userId":26,"ts":1}"#).unwrap();
        assert_eq!(record.user_id.as_deref(), Some("26"));
    }

    #[test]
    fn other_pages_are_not_plays() {
        let record: ActivityRecord =
            serde_json::from_str(r#"{"page":"Home","userId":"","ts":null}"#).unwrap();
        assert!(!record.is_song_play());
        assert_eq!(record.user_id.as_deref(), Some(""));
        assert_eq!(record.ts, None);
    }
}

//! Process configuration, read once at startup from an INI key-value file.
//!
//! ```ini
//! [DEFAULT]
//! AWS_ACCESS_KEY_ID=...
//! AWS_SECRET_ACCESS_KEY=...
//!
//! [paths]
//! input_data=s3a://udacity-dend/
//! output_data=s3a://sparkify-datalake/
//! ```
//!
//! Keys match case-insensitively. A value may be wrapped in one pair of quotes.

use ini::{Ini, ParseOption, Properties};
use std::fmt;
use std::path::Path;

use crate::error::{EtlError, Result};
use crate::storage::StorageLocation;

pub const DEFAULT_CONFIG_PATH: &str = "dl.cfg";
pub const DEFAULT_INPUT_DATA: &str = "s3a://udacity-dend/";
pub const DEFAULT_OUTPUT_DATA: &str = "s3a://sparkify-datalake/";
pub const DEFAULT_REGION: &str = "us-west-2";

const DEFAULT_SECTION: &str = "DEFAULT";
const PATHS_SECTION: &str = "paths";

/// Storage credentials handed to the source and writer builders.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &"<redacted>")
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub input_data: StorageLocation,
    pub output_data: StorageLocation,
    pub credentials: Credentials,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EtlError::Configuration(format!("failed to read config file {:?}: {}", path, e))
        })?;
        Self::parse(&content).map_err(|e| match e {
            EtlError::Configuration(reason) => {
                EtlError::Configuration(format!("{:?}: {}", path, reason))
            }
            other => other,
        })
    }

    pub fn parse(content: &str) -> Result<Self> {
        // secrets may carry backslashes, so nothing is unescaped
        let options = ParseOption {
            enabled_quote: false,
            enabled_escape: false,
            ..ParseOption::default()
        };
        let file = Ini::load_from_str_opt(content, options)
            .map_err(|e| EtlError::Configuration(format!("failed to parse config: {}", e)))?;

        let section = file.section(Some(DEFAULT_SECTION)).ok_or_else(|| {
            EtlError::Configuration("missing [DEFAULT] section".to_string())
        })?;
        let paths = file.section(Some(PATHS_SECTION));

        let credentials = Credentials {
            access_key_id: required(section, "AWS_ACCESS_KEY_ID")?,
            secret_access_key: required(section, "AWS_SECRET_ACCESS_KEY")?,
            region: lookup(section, "AWS_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
        };

        // [paths] keys fall back to [DEFAULT]
        let location = |key: &str, default: &str| {
            paths
                .and_then(|p| lookup(p, key))
                .or_else(|| lookup(section, key))
                .unwrap_or_else(|| default.to_string())
        };

        let input_data = StorageLocation::parse(&location("input_data", DEFAULT_INPUT_DATA))?;
        let output_data =
            StorageLocation::parse(&location("output_data", DEFAULT_OUTPUT_DATA))?;

        Ok(Config {
            input_data,
            output_data,
            credentials,
        })
    }
}

fn lookup(section: &Properties, key: &str) -> Option<String> {
    section
        .iter()
        .find(|(k, _)| k.trim().eq_ignore_ascii_case(key))
        .map(|(_, v)| unquote(v.trim()).trim().to_string())
        .filter(|v| !v.is_empty())
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

fn required(section: &Properties, key: &str) -> Result<String> {
    lookup(section, key).ok_or_else(|| {
        EtlError::Configuration(format!("{} is missing or empty in [DEFAULT]", key))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[DEFAULT]
AWS_ACCESS_KEY_ID=AKIAEXAMPLE
AWS_SECRET_ACCESS_KEY=very-secret

[paths]
input_data=/data/in/
output_data=s3://lake/out/
"#;

    #[test]
    fn parses_credentials_and_paths() {
        let config = Config::parse(FULL).unwrap();
        assert_eq!(config.credentials.access_key_id, "AKIAEXAMPLE");
        assert_eq!(config.credentials.secret_access_key, "very-secret");
        assert_eq!(config.credentials.region, DEFAULT_REGION);
        assert!(matches!(config.input_data, StorageLocation::Local { .. }));
        assert_eq!(
            config.output_data,
            StorageLocation::S3 {
                bucket: "lake".to_string(),
                prefix: "out".to_string()
            }
        );
    }

    #[test]
    fn reads_unquoted_values_verbatim() {
        let config = Config::parse(
            "[DEFAULT]\nAWS_ACCESS_KEY_ID=AKIAEXAMPLE\nAWS_SECRET_ACCESS_KEY=abc/def+ghi\\jk\n",
        )
        .unwrap();
        assert_eq!(config.credentials.access_key_id, "AKIAEXAMPLE");
        assert_eq!(config.credentials.secret_access_key, "abc/def+ghi\\jk");
    }

    #[test]
    fn accepts_quoted_values_and_any_key_case() {
        let config = Config::parse(
            "[DEFAULT]\naws_access_key_id = \"k\"\nAWS_SECRET_ACCESS_KEY = 's'\n\n[paths]\ninput_data = \"/tmp/in\"\n",
        )
        .unwrap();
        assert_eq!(config.credentials.access_key_id, "k");
        assert_eq!(config.credentials.secret_access_key, "s");
        assert_eq!(
            config.input_data,
            StorageLocation::Local {
                root: "/tmp/in".into()
            }
        );
    }

    #[test]
    fn paths_default_to_the_public_buckets() {
        let config = Config::parse(
            "[DEFAULT]\nAWS_ACCESS_KEY_ID=k\nAWS_SECRET_ACCESS_KEY=s\nAWS_REGION=eu-west-1\n",
        )
        .unwrap();
        assert_eq!(config.credentials.region, "eu-west-1");
        assert_eq!(
            config.input_data,
            StorageLocation::S3 {
                bucket: "udacity-dend".to_string(),
                prefix: String::new()
            }
        );
    }

    #[test]
    fn paths_fall_back_to_the_default_section() {
        let config = Config::parse(
            "[DEFAULT]\nAWS_ACCESS_KEY_ID=k\nAWS_SECRET_ACCESS_KEY=s\noutput_data=/tmp/out\n",
        )
        .unwrap();
        assert_eq!(
            config.output_data,
            StorageLocation::Local {
                root: "/tmp/out".into()
            }
        );
    }

    #[test]
    fn missing_secret_is_a_configuration_error() {
        let err = Config::parse("[DEFAULT]\nAWS_ACCESS_KEY_ID=k\n").unwrap_err();
        assert!(matches!(err, EtlError::Configuration(ref m) if m.contains("AWS_SECRET_ACCESS_KEY")));

        let err = Config::parse("[DEFAULT]\nAWS_ACCESS_KEY_ID=k\nAWS_SECRET_ACCESS_KEY=  \n")
            .unwrap_err();
        assert!(matches!(err, EtlError::Configuration(_)));
    }

    #[test]
    fn missing_section_is_rejected() {
        assert!(matches!(
            Config::parse("[paths]\ninput_data=/tmp\n"),
            Err(EtlError::Configuration(_))
        ));
        assert!(matches!(
            Config::parse("AWS_ACCESS_KEY_ID=outside-any-section"),
            Err(EtlError::Configuration(_))
        ));
    }

    #[test]
    fn missing_file_is_a_configuration_error() {
        let err = Config::load(Path::new("/definitely/not/here/dl.cfg")).unwrap_err();
        assert!(matches!(err, EtlError::Configuration(_)));
    }

    #[test]
    fn debug_output_redacts_the_key_pair() {
        let config = Config::parse(FULL).unwrap();
        let rendered = format!("{:?}", config.credentials);
        assert!(!rendered.contains("AKIAEXAMPLE"));
        assert!(!rendered.contains("very-secret"));
        assert!(rendered.contains(DEFAULT_REGION));
    }
}

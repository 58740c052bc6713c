//! Storage locations and the `ObjectStore` handles built from them.
//!
//! Local paths and S3 buckets are both served through `object_store`, rooted
//! at the configured location so callers only ever deal in relative keys.

use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::prefix::PrefixStore;
use object_store::ObjectStore;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Credentials;
use crate::error::{EtlError, Result};

const S3_SCHEMES: &[&str] = &["s3://", "s3a://", "s3n://"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    Local { root: PathBuf },
    S3 { bucket: String, prefix: String },
}

impl StorageLocation {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(EtlError::Configuration(
                "storage location is empty".to_string(),
            ));
        }

        for scheme in S3_SCHEMES {
            if let Some(rest) = raw.strip_prefix(scheme) {
                let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
                if bucket.is_empty() {
                    return Err(EtlError::Configuration(format!(
                        "storage location {:?} has no bucket",
                        raw
                    )));
                }
                return Ok(StorageLocation::S3 {
                    bucket: bucket.to_string(),
                    prefix: prefix.trim_matches('/').to_string(),
                });
            }
        }

        if let Some(path) = raw.strip_prefix("file://") {
            return Ok(StorageLocation::Local {
                root: PathBuf::from(path),
            });
        }

        if let Some((scheme, _)) = raw.split_once("://") {
            return Err(EtlError::Configuration(format!(
                "unsupported storage scheme {:?} in {:?}",
                scheme, raw
            )));
        }

        Ok(StorageLocation::Local {
            root: PathBuf::from(raw),
        })
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, StorageLocation::S3 { .. })
    }
}

impl std::fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageLocation::Local { root } => write!(f, "{}", root.display()),
            StorageLocation::S3 { bucket, prefix } if prefix.is_empty() => {
                write!(f, "s3://{}/", bucket)
            }
            StorageLocation::S3 { bucket, prefix } => write!(f, "s3://{}/{}/", bucket, prefix),
        }
    }
}

/// Build a store rooted at `location`.
///
/// Local roots must exist unless `create_root` is set, in which case the
/// directory is created first.
pub fn build_object_store(
    location: &StorageLocation,
    credentials: &Credentials,
    create_root: bool,
) -> object_store::Result<Arc<dyn ObjectStore>> {
    match location {
        StorageLocation::Local { root } => {
            if create_root {
                std::fs::create_dir_all(root).map_err(|e| object_store::Error::Generic {
                    store: "LocalFileSystem",
                    source: Box::new(e),
                })?;
            }
            Ok(Arc::new(LocalFileSystem::new_with_prefix(root)?))
        }
        StorageLocation::S3 { bucket, prefix } => {
            let s3 = AmazonS3Builder::new()
                .with_bucket_name(bucket)
                .with_region(&credentials.region)
                .with_access_key_id(&credentials.access_key_id)
                .with_secret_access_key(&credentials.secret_access_key)
                .build()?;

            if prefix.is_empty() {
                Ok(Arc::new(s3))
            } else {
                Ok(Arc::new(PrefixStore::new(s3, prefix.as_str())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_s3_variants() {
        for raw in ["s3a://udacity-dend/", "s3://udacity-dend", "s3n://udacity-dend/"] {
            assert_eq!(
                StorageLocation::parse(raw).unwrap(),
                StorageLocation::S3 {
                    bucket: "udacity-dend".to_string(),
                    prefix: String::new()
                },
                "{}",
                raw
            );
        }

        assert_eq!(
            StorageLocation::parse("s3a://lake/sparkify/output/").unwrap(),
            StorageLocation::S3 {
                bucket: "lake".to_string(),
                prefix: "sparkify/output".to_string()
            }
        );
    }

    #[test]
    fn parses_local_paths() {
        assert_eq!(
            StorageLocation::parse("file:///tmp/lake").unwrap(),
            StorageLocation::Local {
                root: PathBuf::from("/tmp/lake")
            }
        );
        assert_eq!(
            StorageLocation::parse("data/").unwrap(),
            StorageLocation::Local {
                root: PathBuf::from("data/")
            }
        );
    }

    #[test]
    fn rejects_bad_locations() {
        assert!(StorageLocation::parse("").is_err());
        assert!(StorageLocation::parse("s3a:///no-bucket").is_err());
        assert!(StorageLocation::parse("gs://bucket/").is_err());
    }

    #[test]
    fn display_is_s3_style() {
        let location = StorageLocation::parse("s3a://lake/out").unwrap();
        assert_eq!(location.to_string(), "s3://lake/out/");
        assert!(location.is_remote());
    }
}

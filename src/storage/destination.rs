use std::fmt;

use percent_encoding::percent_decode_str;
use url::Url;

use crate::errors::{BackupError, Result};

/// Bucket and key prefix that backups of one job are written under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub bucket: String,
    pub prefix: String,
}

impl Destination {
    /// Parses either `bucket/prefix` or `s3://bucket/prefix`.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(BackupError::config("destination cannot be empty"));
        }

        let (bucket, prefix) = if raw.contains("://") {
            let url = Url::parse(raw)
                .map_err(|e| BackupError::config(format!("invalid destination URL {raw}: {e}")))?;
            if url.scheme() != "s3" {
                return Err(BackupError::config(format!(
                    "destination URL must use the s3:// scheme, got {}://",
                    url.scheme()
                )));
            }
            let bucket = url.host_str().unwrap_or_default().to_string();
            // `Url` keeps the path percent-encoded; keys use the raw text.
            let prefix = percent_decode_str(url.path()).decode_utf8().map_err(|e| {
                BackupError::config(format!("destination {raw} has an invalid prefix: {e}"))
            })?;
            (bucket, prefix.trim_start_matches('/').to_string())
        } else {
            match raw.split_once('/') {
                Some((bucket, prefix)) => (bucket.to_string(), prefix.to_string()),
                None => (raw.to_string(), String::new()),
            }
        };

        if bucket.is_empty() {
            return Err(BackupError::config(format!(
                "destination {raw} does not name a bucket"
            )));
        }
        Ok(Destination { bucket, prefix })
    }

    /// Key an artifact file is stored under.
    pub fn object_key(&self, file_name: &str) -> String {
        if self.prefix.is_empty() {
            file_name.to_string()
        } else if self.prefix.ends_with('/') {
            format!("{}{}", self.prefix, file_name)
        } else {
            format!("{}/{}", self.prefix, file_name)
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.prefix)
    }
}

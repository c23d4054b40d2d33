mod destination;
mod s3;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::Result;

pub use destination::Destination;
pub use s3::{S3ObjectStore, StorageSettings};

/// Snapshot of one object under a destination prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub key: String,
    pub last_modified: DateTime<Utc>,
}

/// Operations the pipeline needs from an S3-compatible object store.
///
/// `upload` failures surface as [`BackupError::Upload`](crate::errors::BackupError::Upload);
/// `list` and `delete` failures as `BackupError::Rotation`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<()>;

    /// Every object whose key starts with `prefix`. An empty vector is a
    /// valid answer, not an error.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<RemoteObject>>;

    async fn delete(&self, bucket: &str, key: &str) -> Result<()>;
}

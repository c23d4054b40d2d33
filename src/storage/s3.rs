use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3 as s3;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use s3::config::Region;
use s3::error::DisplayErrorContext;
use s3::primitives::ByteStream;

use super::{ObjectStore, RemoteObject};
use crate::config::Credentials;
use crate::errors::{BackupError, Result};

/// Connection settings for the object store, resolved once per job.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub credentials: Credentials,
    pub region: String,
    /// Custom endpoint for S3-compatible, non-AWS stores.
    pub endpoint: Option<String>,
}

/// [`ObjectStore`] backed by `aws-sdk-s3`.
pub struct S3ObjectStore {
    client: s3::Client,
}

impl S3ObjectStore {
    pub async fn connect(settings: &StorageSettings) -> Self {
        let mut loader = aws_config::defaults(s3::config::BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(s3::config::Credentials::new(
                &settings.credentials.access_key_id,
                &settings.credentials.secret_access_key,
                None, // session_token
                None, // expiry
                "Static",
            ));
        if let Some(endpoint) = &settings.endpoint {
            info!("Using custom S3 endpoint: {endpoint}");
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        // Most S3-compatible stores only serve path-style requests.
        let mut s3_config = s3::config::Builder::from(&sdk_config);
        if settings.endpoint.is_some() {
            s3_config = s3_config.force_path_style(true);
        }

        S3ObjectStore {
            client: s3::Client::from_conf(s3_config.build()),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<()> {
        let upload_error = |message: String| BackupError::Upload {
            path: local_path.to_path_buf(),
            bucket: bucket.to_string(),
            key: key.to_string(),
            message,
        };

        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| upload_error(format!("failed to read local artifact: {e}")))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| upload_error(DisplayErrorContext(&e).to_string()))?;

        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<RemoteObject>> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(|e| {
                    BackupError::Rotation(format!(
                        "failed to list s3://{bucket}/{prefix}: {}",
                        DisplayErrorContext(&e)
                    ))
                })?;

            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                let last_modified = object
                    .last_modified()
                    .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()));
                match last_modified {
                    Some(last_modified) => objects.push(RemoteObject {
                        key: key.to_string(),
                        last_modified,
                    }),
                    None => {
                        warn!("⚠️ Skipping {key}: listing carries no usable last-modified time")
                    }
                }
            }

            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or(false) => {
                    debug!("Listing of s3://{bucket}/{prefix} continues on another page");
                    continuation_token = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(objects)
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                BackupError::Rotation(format!(
                    "failed to delete s3://{bucket}/{key}: {}",
                    DisplayErrorContext(&e)
                ))
            })?;
        Ok(())
    }
}

use std::fmt;
use std::path::Path;

use aws_config::profile::ProfileFileCredentialsProvider;
use aws_config::profile::profile_file::{ProfileFileKind, ProfileFiles};
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_s3::error::DisplayErrorContext;

use crate::errors::{BackupError, Result};

pub const DEFAULT_PROFILE: &str = "default";

/// Static key pair used to sign object-store requests.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"****")
            .finish()
    }
}

/// Reads `profile` from a shared credentials file, or from the SDK's default
/// location (`~/.aws/credentials`) when `path` is `None`.
pub async fn load_profile(path: Option<&Path>, profile: &str) -> Result<Credentials> {
    let (files, source) = match path {
        Some(path) => (
            ProfileFiles::builder().with_file(ProfileFileKind::Credentials, path),
            path.display().to_string(),
        ),
        None => (
            ProfileFiles::builder().include_default_credentials_file(true),
            "the default credentials file".to_string(),
        ),
    };
    let provider = ProfileFileCredentialsProvider::builder()
        .profile_files(files.build())
        .profile_name(profile)
        .build();

    let credentials = provider.provide_credentials().await.map_err(|e| {
        BackupError::config(format!(
            "cannot load the '{profile}' profile from {source}: {}",
            DisplayErrorContext(&e)
        ))
    })?;
    Ok(Credentials {
        access_key_id: credentials.access_key_id().to_string(),
        secret_access_key: credentials.secret_access_key().to_string(),
    })
}

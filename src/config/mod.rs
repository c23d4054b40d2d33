// dbbackup/src/config/mod.rs
mod credentials;

use anyhow::{Context, Result};
use chrono::Duration;
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::backup::retention::RetentionPolicy;
use crate::errors::BackupError;
use crate::storage::{Destination, StorageSettings};

pub use credentials::{Credentials, DEFAULT_PROFILE, load_profile};

const DEFAULT_TEMP_DIR: &str = "/tmp";
const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_CONTAINER_RUNTIME: &str = "docker";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    #[value(alias = "postgresql")]
    #[serde(alias = "postgresql")]
    Postgres,
    Mysql,
    #[value(alias = "mongodb")]
    #[serde(alias = "mongodb")]
    Mongo,
}

impl DatabaseType {
    pub fn default_port(self) -> u16 {
        match self {
            DatabaseType::Postgres => 5432,
            DatabaseType::Mysql => 3306,
            DatabaseType::Mongo => 27017,
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DatabaseType::Postgres => "PostgreSQL",
            DatabaseType::Mysql => "MySQL",
            DatabaseType::Mongo => "MongoDB",
        })
    }
}

/// Whether rotation still runs after the dump, compression or upload failed.
///
/// `Always` keeps the historical behaviour: the retention policy is applied
/// to the destination on every run, which can prune the last good backup
/// right after a failed attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PostFailureRotation {
    #[default]
    Always,
    SkipOnFailure,
}

/// Job settings as given on the command line or in a JSON job file.
/// Every field is optional here; [`BackupJob::from_raw`] validates them.
#[derive(Debug, Clone, Default, Parser, Deserialize)]
#[command(
    name = "dbbackup",
    version,
    about = "Dump a database, compress it, upload it to S3 and rotate old backups"
)]
#[serde(default, deny_unknown_fields)]
pub struct RawJobConfig {
    /// JSON job file. Command-line flags override its values.
    #[arg(long, env = "DBBACKUP_CONFIG")]
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Type of the database
    #[arg(short = 't', long, env = "DBBACKUP_DATABASE_TYPE", value_enum)]
    pub database_type: Option<DatabaseType>,

    /// Name of the backup, used as the artifact file name stem
    #[arg(short = 'n', long, alias = "name-backup", env = "DBBACKUP_NAME")]
    #[serde(alias = "name_backup")]
    pub name: Option<String>,

    /// Destination as `bucket/prefix` or `s3://bucket/prefix`
    #[arg(short = 'd', long, alias = "aws-dest", env = "DBBACKUP_DESTINATION")]
    #[serde(alias = "aws_dest")]
    pub destination: Option<String>,

    #[arg(short = 'u', long, env = "DBBACKUP_DATABASE_USER")]
    pub database_user: Option<String>,

    #[arg(short = 'p', long, env = "DBBACKUP_DATABASE_PASSWORD", hide_env_values = true)]
    pub database_password: Option<String>,

    #[arg(short = 'H', long, env = "DBBACKUP_DATABASE_HOST")]
    pub database_host: Option<String>,

    /// Defaults to the engine's standard port
    #[arg(short = 'P', long, env = "DBBACKUP_DATABASE_PORT")]
    pub database_port: Option<u16>,

    #[arg(long, env = "DBBACKUP_DATABASE_NAME")]
    pub database_name: Option<String>,

    /// Number of most recent backups to keep
    #[arg(short = 'r', long, env = "DBBACKUP_RETAIN_COUNT")]
    pub retain_count: Option<usize>,

    /// Delete backups older than this many seconds
    #[arg(short = 'e', long, alias = "exp-date", env = "DBBACKUP_MAX_AGE")]
    #[serde(alias = "exp_date")]
    pub max_age: Option<u64>,

    /// Run the dump tool inside this container
    #[arg(long, env = "DBBACKUP_CONTAINER_NAME")]
    pub container_name: Option<String>,

    /// Container runtime binary used in containerized mode
    #[arg(long, env = "DBBACKUP_CONTAINER_RUNTIME")]
    pub container_runtime: Option<String>,

    /// Custom endpoint for S3-compatible storage
    #[arg(long, alias = "aws-endpoint", env = "DBBACKUP_ENDPOINT")]
    #[serde(alias = "aws_endpoint")]
    pub endpoint: Option<String>,

    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Directory for the dump and its compressed artifact
    #[arg(long, env = "DBBACKUP_TMP_DIR")]
    pub tmp_dir: Option<PathBuf>,

    /// Access key; takes precedence over the credentials file
    #[arg(long, alias = "aws-access-key", env = "AWS_ACCESS_KEY_ID")]
    #[serde(alias = "aws_access_key")]
    pub access_key: Option<String>,

    #[arg(long, alias = "aws-secret-key", env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    #[serde(alias = "aws_secret_key")]
    pub secret_key: Option<String>,

    /// Shared credentials file holding a `[default]` profile
    #[arg(long, env = "AWS_SHARED_CREDENTIALS_FILE")]
    pub credentials_file: Option<PathBuf>,

    /// Apprise configuration; notifications are skipped without it
    #[arg(long, env = "DBBACKUP_APPRISE_CONFIG")]
    pub apprise_config: Option<PathBuf>,

    /// Whether to rotate remote backups after a failed backup attempt
    #[arg(long, env = "DBBACKUP_POST_FAILURE_ROTATION", value_enum)]
    pub post_failure_rotation: Option<PostFailureRotation>,
}

impl RawJobConfig {
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read job file at {}", config_path.display()))?;
        serde_json::from_str(&config_content).with_context(|| {
            format!(
                "Failed to parse JSON from job file at {}",
                config_path.display()
            )
        })
    }

    /// Fills every field unset in `self` from `base`.
    pub fn overlay(self, base: RawJobConfig) -> RawJobConfig {
        RawJobConfig {
            config: self.config.or(base.config),
            database_type: self.database_type.or(base.database_type),
            name: self.name.or(base.name),
            destination: self.destination.or(base.destination),
            database_user: self.database_user.or(base.database_user),
            database_password: self.database_password.or(base.database_password),
            database_host: self.database_host.or(base.database_host),
            database_port: self.database_port.or(base.database_port),
            database_name: self.database_name.or(base.database_name),
            retain_count: self.retain_count.or(base.retain_count),
            max_age: self.max_age.or(base.max_age),
            container_name: self.container_name.or(base.container_name),
            container_runtime: self.container_runtime.or(base.container_runtime),
            endpoint: self.endpoint.or(base.endpoint),
            region: self.region.or(base.region),
            tmp_dir: self.tmp_dir.or(base.tmp_dir),
            access_key: self.access_key.or(base.access_key),
            secret_key: self.secret_key.or(base.secret_key),
            credentials_file: self.credentials_file.or(base.credentials_file),
            apprise_config: self.apprise_config.or(base.apprise_config),
            post_failure_rotation: self.post_failure_rotation.or(base.post_failure_rotation),
        }
    }
}

#[derive(Clone)]
pub struct DatabaseConnection {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl fmt::Debug for DatabaseConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConnection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"****")
            .field("database", &self.database)
            .finish()
    }
}

/// One fully validated backup job. Built once per invocation.
#[derive(Debug, Clone)]
pub struct BackupJob {
    pub database_type: DatabaseType,
    pub name: String,
    pub connection: DatabaseConnection,
    pub container_name: Option<String>,
    pub container_runtime: String,
    pub destination: Destination,
    pub temp_dir: PathBuf,
    pub retention: RetentionPolicy,
    pub post_failure_rotation: PostFailureRotation,
    pub storage: StorageSettings,
    pub apprise_config: Option<PathBuf>,
}

impl BackupJob {
    /// Validates raw settings, resolving credentials and preparing the temp
    /// directory, so configuration problems surface before any dump work.
    pub async fn from_raw(raw: RawJobConfig) -> std::result::Result<Self, BackupError> {
        let database_type = raw
            .database_type
            .ok_or_else(|| BackupError::config("database_type must be set"))?;
        let name = required(raw.name, "name")?;
        if name.contains('/') || name.contains('\\') {
            return Err(BackupError::config(format!(
                "backup name {name:?} must not contain path separators"
            )));
        }
        let destination = Destination::parse(&required(raw.destination, "destination")?)?;

        let user = raw.database_user.unwrap_or_default();
        if user.is_empty() && database_type != DatabaseType::Mongo {
            return Err(BackupError::config(format!(
                "database_user must be set for {database_type}"
            )));
        }
        let connection = DatabaseConnection {
            host: raw
                .database_host
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| "localhost".to_string()),
            port: raw
                .database_port
                .unwrap_or_else(|| database_type.default_port()),
            user,
            password: raw.database_password.unwrap_or_default(),
            database: required(raw.database_name, "database_name")?,
        };

        let retention = RetentionPolicy {
            retain_count: match raw.retain_count {
                Some(0) => return Err(BackupError::config("retain_count must be positive")),
                other => other,
            },
            max_age: match raw.max_age {
                Some(0) => return Err(BackupError::config("max_age must be positive")),
                Some(secs) => Some(
                    i64::try_from(secs)
                        .ok()
                        .and_then(Duration::try_seconds)
                        .ok_or_else(|| {
                            BackupError::config(format!("max_age {secs} is out of range"))
                        })?,
                ),
                None => None,
            },
        };

        let temp_dir = raw.tmp_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_TEMP_DIR));
        fs::create_dir_all(&temp_dir).map_err(|e| {
            BackupError::config(format!(
                "temporary directory {} is not usable: {e}",
                temp_dir.display()
            ))
        })?;

        let credentials =
            resolve_credentials(raw.access_key, raw.secret_key, raw.credentials_file).await?;

        Ok(BackupJob {
            database_type,
            name,
            connection,
            container_name: raw.container_name.filter(|c| !c.is_empty()),
            container_runtime: raw
                .container_runtime
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| DEFAULT_CONTAINER_RUNTIME.to_string()),
            destination,
            temp_dir,
            retention,
            post_failure_rotation: raw.post_failure_rotation.unwrap_or_default(),
            storage: StorageSettings {
                credentials,
                region: raw
                    .region
                    .filter(|r| !r.is_empty())
                    .unwrap_or_else(|| DEFAULT_REGION.to_string()),
                endpoint: raw.endpoint.filter(|e| !e.is_empty()),
            },
            apprise_config: raw.apprise_config,
        })
    }
}

fn required(value: Option<String>, field: &str) -> std::result::Result<String, BackupError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| BackupError::config(format!("{field} must be set")))
}

async fn resolve_credentials(
    access_key: Option<String>,
    secret_key: Option<String>,
    credentials_file: Option<PathBuf>,
) -> std::result::Result<Credentials, BackupError> {
    match (access_key, secret_key) {
        (Some(access_key_id), Some(secret_access_key)) => Ok(Credentials {
            access_key_id,
            secret_access_key,
        }),
        (Some(_), None) | (None, Some(_)) => Err(BackupError::config(
            "access key and secret key must be given together",
        )),
        (None, None) => load_profile(credentials_file.as_deref(), DEFAULT_PROFILE).await,
    }
}

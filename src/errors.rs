use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Pipeline stage a job is in, or failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Dumping,
    Compressing,
    Uploading,
    Rotating,
    Notifying,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Dumping => "dumping",
            Stage::Compressing => "compressing",
            Stage::Uploading => "uploading",
            Stage::Rotating => "rotating",
            Stage::Notifying => "notifying",
        };
        f.write_str(name)
    }
}

/// Step of the dump protocol that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpStep {
    Invoke,
    Verify,
    CopyOut,
    Cleanup,
}

impl fmt::Display for DumpStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DumpStep::Invoke => "dump tool invocation",
            DumpStep::Verify => "dump file verification",
            DumpStep::CopyOut => "copy out of container",
            DumpStep::Cleanup => "container cleanup",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Dump failed ({step}): {message}")]
    Dump { step: DumpStep, message: String },

    #[error("Compression of {} failed: {source}", .path.display())]
    Compression {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Upload of {} to s3://{bucket}/{key} failed: {message}", .path.display())]
    Upload {
        path: PathBuf,
        bucket: String,
        key: String,
        message: String,
    },

    #[error("Rotation error: {0}")]
    Rotation(String),
}

impl BackupError {
    pub fn config(message: impl Into<String>) -> Self {
        BackupError::Configuration(message.into())
    }

    pub fn dump(step: DumpStep, message: impl Into<String>) -> Self {
        BackupError::Dump {
            step,
            message: message.into(),
        }
    }

    /// The stage this error moves the job into `Failed` from.
    pub fn stage(&self) -> Stage {
        match self {
            // Configuration errors abort before any stage runs; report them
            // against the first one.
            BackupError::Configuration(_) | BackupError::Dump { .. } => Stage::Dumping,
            BackupError::Compression { .. } => Stage::Compressing,
            BackupError::Upload { .. } => Stage::Uploading,
            BackupError::Rotation(_) => Stage::Rotating,
        }
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;

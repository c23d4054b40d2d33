use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::fs;
use std::path::PathBuf;

use super::archive;
use super::db_dump::DumpExecutor;
use super::naming::ArtifactNames;
use super::retention::{self, RotationSummary};
use crate::config::{BackupJob, PostFailureRotation};
use crate::errors::{BackupError, Result, Stage};
use crate::notify::Notifier;
use crate::storage::ObjectStore;
use crate::utils::CommandRunner;

/// The compressed dump of one run. Local until the upload succeeds, after
/// which `local_path` no longer exists and only the remote copy counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub local_path: PathBuf,
    pub remote_key: String,
    pub created_at: DateTime<Utc>,
}

/// What happened during one run.
#[derive(Debug)]
pub struct JobReport {
    pub backup: Result<Artifact>,
    /// `None` when rotation was skipped after a failed backup.
    pub rotation: Option<Result<RotationSummary>>,
}

impl JobReport {
    pub fn succeeded(&self) -> bool {
        self.backup.is_ok()
    }
}

/// Runs one job: dump, compress, upload, rotate, notify.
///
/// A failed dump, compression or upload does not stop the run. Rotation
/// still happens unless the job's [`PostFailureRotation`] says otherwise,
/// and the operator is always notified. Nothing is retried.
pub struct BackupPipeline<'a> {
    job: &'a BackupJob,
    runner: &'a dyn CommandRunner,
    store: &'a dyn ObjectStore,
    notifier: &'a dyn Notifier,
}

impl<'a> BackupPipeline<'a> {
    pub fn new(
        job: &'a BackupJob,
        runner: &'a dyn CommandRunner,
        store: &'a dyn ObjectStore,
        notifier: &'a dyn Notifier,
    ) -> Self {
        BackupPipeline {
            job,
            runner,
            store,
            notifier,
        }
    }

    pub async fn run(&self) -> JobReport {
        self.run_at(Utc::now()).await
    }

    /// Runs the job as if started at `started_at`, which also serves as
    /// "now" for the retention age cutoff.
    pub async fn run_at(&self, started_at: DateTime<Utc>) -> JobReport {
        info!(
            "🚀 Starting {} backup '{}' to {}",
            self.job.database_type, self.job.name, self.job.destination
        );

        let backup = self.back_up(started_at).await;
        if let Err(e) = &backup {
            error!("❌ Backup {} failed while {}: {e}", self.job.name, e.stage());
        }

        let rotation = match (&backup, self.job.post_failure_rotation) {
            (Err(_), PostFailureRotation::SkipOnFailure) => {
                warn!("Skipping rotation because the backup failed");
                None
            }
            _ => {
                enter(Stage::Rotating);
                let rotated = retention::rotate(
                    self.store,
                    &self.job.destination,
                    &self.job.retention,
                    started_at,
                )
                .await;
                if let Err(e) = &rotated {
                    error!("❌ {e}");
                }
                Some(rotated)
            }
        };

        enter(Stage::Notifying);
        self.report(&backup, rotation.as_ref());

        JobReport { backup, rotation }
    }

    async fn back_up(&self, started_at: DateTime<Utc>) -> Result<Artifact> {
        let job = self.job;
        let names = ArtifactNames::new(&job.name, job.database_type, started_at);
        let dump_path = job.temp_dir.join(&names.dump_file);
        debug!("Artifact base name: {}", names.base);

        enter(Stage::Dumping);
        DumpExecutor::for_job(job).extract(self.runner, &job.connection, &dump_path)?;

        enter(Stage::Compressing);
        let artifact = Artifact {
            local_path: archive::gzip_file(&dump_path)?,
            remote_key: job.destination.object_key(&names.archive_file),
            created_at: started_at,
        };

        enter(Stage::Uploading);
        info!(
            "Uploading {} to s3://{}/{}",
            artifact.local_path.display(),
            job.destination.bucket,
            artifact.remote_key
        );
        if let Err(e) = self
            .store
            .upload(&artifact.local_path, &job.destination.bucket, &artifact.remote_key)
            .await
        {
            warn!(
                "Local artifact kept for manual recovery: {}",
                artifact.local_path.display()
            );
            return Err(e);
        }
        info!("✅ File uploaded: {}", artifact.remote_key);

        if let Err(e) = fs::remove_file(&artifact.local_path) {
            warn!(
                "⚠️ Uploaded, but could not remove {}: {e}",
                artifact.local_path.display()
            );
        }
        Ok(artifact)
    }

    fn report(&self, backup: &Result<Artifact>, rotation: Option<&Result<RotationSummary>>) {
        let job = self.job;
        match backup {
            Ok(artifact) => self.notifier.notify(
                "Backup Completed",
                &format!(
                    "Backup {} completed successfully: s3://{}/{} ({}).",
                    job.name,
                    job.destination.bucket,
                    artifact.remote_key,
                    artifact.created_at.format("%Y-%m-%d %H:%M UTC")
                ),
            ),
            Err(e) => {
                let title = match e {
                    BackupError::Upload { .. } => "Upload Failed",
                    _ => "Backup Failed",
                };
                self.notifier.notify(
                    title,
                    &format!(
                        "{} backup {} failed while {}: {e}",
                        job.database_type,
                        job.name,
                        e.stage()
                    ),
                );
            }
        }

        if let Some(Err(e)) = rotation {
            self.notifier.notify(
                "Rotation Failed",
                &format!("Rotation of {} for backup {} failed: {e}", job.destination, job.name),
            );
        }
    }
}

fn enter(stage: Stage) {
    debug!("➡ {stage}");
}

pub(crate) mod archive;
pub(crate) mod db_dump;
mod logic;
pub(crate) mod naming;
pub(crate) mod retention;

pub use logic::{BackupPipeline, JobReport};

use crate::config::BackupJob;
use crate::notify::Notifier;
use crate::storage::ObjectStore;
use crate::utils::CommandRunner;

/// Public entry point for the backup process: runs `job` once, start to finish.
pub async fn run_backup_flow(
    job: &BackupJob,
    runner: &dyn CommandRunner,
    store: &dyn ObjectStore,
    notifier: &dyn Notifier,
) -> JobReport {
    BackupPipeline::new(job, runner, store, notifier).run().await
}

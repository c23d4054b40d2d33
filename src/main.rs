//! Database Backup Tool
//!
//! Dumps a PostgreSQL, MySQL or MongoDB database, gzips the dump, uploads it
//! to S3-compatible storage, rotates old backups and notifies through Apprise.

// dbbackup/src/main.rs
mod backup;
mod config;
mod errors;
mod notify;
mod storage;
mod utils;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use env_logger::Env;
use log::{error, info};
use std::process::ExitCode;

use config::{BackupJob, RawJobConfig};
use notify::AppriseNotifier;
use storage::S3ObjectStore;
use utils::SystemRunner;

/// Main entry point for the backup tool
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    match run_app().await {
        Ok(true) => {
            info!("✅ Backup completed successfully.");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            error!("❌ Backup failed.");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("❌ Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

/// Runs one job. `Ok(false)` means the job ran but produced no backup.
async fn run_app() -> Result<bool> {
    let job = load_job().await?;

    let store = S3ObjectStore::connect(&job.storage).await;
    let notifier = AppriseNotifier::new(job.apprise_config.clone());
    let report = backup::run_backup_flow(&job, &SystemRunner, &store, &notifier).await;

    if let Some(Ok(summary)) = &report.rotation {
        info!(
            "Rotation removed {} of {} remote backups",
            summary.deleted, summary.listed
        );
    }
    if let Ok(artifact) = &report.backup {
        info!(
            "Stored s3://{}/{}",
            job.destination.bucket, artifact.remote_key
        );
    }
    Ok(report.succeeded())
}

/// Command-line flags and environment first, then the JSON job file.
async fn load_job() -> Result<BackupJob> {
    let mut raw = RawJobConfig::parse();
    if let Some(config_path) = raw.config.clone() {
        let file_config = RawJobConfig::load_from_json(&config_path)?;
        raw = raw.overlay(file_config);
    }
    BackupJob::from_raw(raw)
        .await
        .context("Invalid backup configuration")
}

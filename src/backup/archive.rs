// dbbackup/src/backup/archive.rs
use flate2::Compression;
use flate2::write::GzEncoder;
use log::{info, warn};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use crate::errors::{BackupError, Result};

/// Gzips `dump_path` into a sibling `<dump_path>.gz` and removes the
/// uncompressed dump.
///
/// Either the compressed artifact exists afterwards or an error is returned
/// and no partial `.gz` is left behind.
///
/// # Returns
/// Path to the compressed artifact.
pub fn gzip_file(dump_path: &Path) -> Result<PathBuf> {
    let archive_path = gz_path(dump_path);
    info!(
        "🗜 Compressing {} to {}",
        dump_path.display(),
        archive_path.display()
    );

    if let Err(source) = write_gzip(dump_path, &archive_path) {
        if archive_path.exists() {
            if let Err(e) = fs::remove_file(&archive_path) {
                warn!("⚠️ Could not remove partial archive {}: {e}", archive_path.display());
            }
        }
        return Err(BackupError::Compression {
            path: dump_path.to_path_buf(),
            source,
        });
    }

    fs::remove_file(dump_path).map_err(|source| BackupError::Compression {
        path: dump_path.to_path_buf(),
        source,
    })?;

    info!("✓ Archive created at {}", archive_path.display());
    Ok(archive_path)
}

fn write_gzip(source: &Path, destination: &Path) -> io::Result<()> {
    let mut reader = BufReader::new(File::open(source)?);
    let mut encoder = GzEncoder::new(File::create(destination)?, Compression::default());
    io::copy(&mut reader, &mut encoder)?;
    encoder.finish()?.sync_all()
}

fn gz_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".gz");
    PathBuf::from(name)
}

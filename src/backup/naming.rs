use chrono::{DateTime, Utc};

use crate::config::DatabaseType;

/// Minute resolution: two runs of the same job within one minute share names.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M";

/// File names derived from one backup run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNames {
    /// `<name>_<YYYY-MM-DD_HH-MM>`
    pub base: String,
    /// Uncompressed dump, e.g. `<base>.sql`
    pub dump_file: String,
    /// Compressed artifact uploaded to the object store
    pub archive_file: String,
}

impl ArtifactNames {
    pub fn new(name: &str, database_type: DatabaseType, started_at: DateTime<Utc>) -> Self {
        let base = base_name(name, started_at);
        let dump_file = format!("{base}.{}", dump_extension(database_type));
        let archive_file = format!("{dump_file}.gz");
        ArtifactNames {
            base,
            dump_file,
            archive_file,
        }
    }
}

pub fn base_name(name: &str, started_at: DateTime<Utc>) -> String {
    format!("{name}_{}", started_at.format(TIMESTAMP_FORMAT))
}

fn dump_extension(database_type: DatabaseType) -> &'static str {
    match database_type {
        DatabaseType::Postgres | DatabaseType::Mysql => "sql",
        DatabaseType::Mongo => "archive",
    }
}

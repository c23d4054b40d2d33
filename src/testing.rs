//! In-memory stand-ins for the process, object-store and notification seams.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::backup::retention::RetentionPolicy;
use crate::config::{BackupJob, Credentials, DatabaseConnection, DatabaseType, PostFailureRotation};
use crate::errors::{BackupError, Result};
use crate::notify::Notifier;
use crate::storage::{Destination, ObjectStore, RemoteObject, StorageSettings};
use crate::utils::{CommandOutput, CommandRunner, CommandSpec};

const FAKE_DUMP: &str = "-- dump\nCREATE TABLE accounts (id int);\n";

struct Rule {
    fragment: String,
    code: i32,
    stderr: String,
}

/// Answers commands from a list of rules matched against the rendered
/// command line. Unmatched commands succeed silently.
///
/// By default it also fakes the files the real tools would write, so the
/// dump protocol sees what it expects on disk.
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    side_effects: bool,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        ScriptedRunner {
            rules: Vec::new(),
            side_effects: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_when(mut self, fragment: &str, code: i32, stderr: &str) -> Self {
        self.rules.push(Rule {
            fragment: fragment.to_string(),
            code,
            stderr: stderr.to_string(),
        });
        self
    }

    /// Succeeds but writes `stderr`, like a tool that warns and exits 0.
    pub fn stderr_when(self, fragment: &str, stderr: &str) -> Self {
        self.fail_when(fragment, 0, stderr)
    }

    pub fn without_side_effects(mut self) -> Self {
        self.side_effects = false;
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    fn write_outputs(&self, command: &CommandSpec, success: bool) -> io::Result<()> {
        if let Some(path) = &command.stdout_to {
            fs::write(path, if success { FAKE_DUMP } else { "" })?;
        }
        if !success {
            return Ok(());
        }
        if command.args.first().map(String::as_str) == Some("cp") {
            if let Some(target) = command.args.get(2) {
                fs::write(target, FAKE_DUMP)?;
            }
        }
        if command.program == "mongodump" {
            for path in command.args.iter().filter_map(|a| a.strip_prefix("--archive=")) {
                fs::write(path, FAKE_DUMP)?;
            }
        }
        Ok(())
    }
}

impl Default for ScriptedRunner {
    fn default() -> Self {
        ScriptedRunner::new()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, command: &CommandSpec) -> io::Result<CommandOutput> {
        self.calls.lock().unwrap().push(command.clone());

        let rendered = command.to_string();
        let output = match self.rules.iter().find(|r| rendered.contains(&r.fragment)) {
            Some(rule) => CommandOutput {
                code: Some(rule.code),
                stderr: rule.stderr.clone(),
            },
            None => CommandOutput {
                code: Some(0),
                stderr: String::new(),
            },
        };
        if self.side_effects {
            self.write_outputs(command, output.success())?;
        }
        Ok(output)
    }
}

/// Object store kept in memory. Uploaded objects are stamped with `now`.
pub struct MemoryStore {
    now: DateTime<Utc>,
    objects: Mutex<Vec<RemoteObject>>,
    deleted: Mutex<Vec<String>>,
    uploads: Mutex<Vec<String>>,
    list_calls: AtomicUsize,
    failing_deletes: HashSet<String>,
    fail_uploads: bool,
    fail_listing: bool,
}

impl MemoryStore {
    pub fn new(now: DateTime<Utc>) -> Self {
        MemoryStore {
            now,
            objects: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            list_calls: AtomicUsize::new(0),
            failing_deletes: HashSet::new(),
            fail_uploads: false,
            fail_listing: false,
        }
    }

    pub fn with_objects(self, objects: Vec<RemoteObject>) -> Self {
        self.objects.lock().unwrap().extend(objects);
        self
    }

    pub fn failing_delete(mut self, key: &str) -> Self {
        self.failing_deletes.insert(key.to_string());
        self
    }

    pub fn failing_uploads(mut self) -> Self {
        self.fail_uploads = true;
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Keys deleted so far, in deletion order.
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    /// Keys currently stored, in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .map(|o| o.key.clone())
            .collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<()> {
        let failure = |message: &str| BackupError::Upload {
            path: local_path.to_path_buf(),
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: message.to_string(),
        };
        if self.fail_uploads {
            return Err(failure("service unavailable"));
        }
        if !local_path.is_file() {
            return Err(failure("local file does not exist"));
        }

        let mut objects = self.objects.lock().unwrap();
        objects.retain(|o| o.key != key);
        objects.push(RemoteObject {
            key: key.to_string(),
            last_modified: self.now,
        });
        self.uploads.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<RemoteObject>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing {
            return Err(BackupError::Rotation(format!(
                "listing s3://{bucket}/{prefix} failed: access denied"
            )));
        }
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        if self.failing_deletes.contains(key) {
            return Err(BackupError::Rotation(format!(
                "deleting s3://{bucket}/{key} failed: access denied"
            )));
        }
        self.objects.lock().unwrap().retain(|o| o.key != key);
        self.deleted.lock().unwrap().push(key.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    /// `(title, body)` pairs in the order they were sent.
    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
    }
}

pub fn connection() -> DatabaseConnection {
    DatabaseConnection {
        host: "db.internal".to_string(),
        port: 5432,
        user: "app".to_string(),
        password: "s3cret".to_string(),
        database: "appdb".to_string(),
    }
}

/// A local, rotation-free job named `nightly` writing to `backups/nightly`.
pub fn job(database_type: DatabaseType, temp_dir: &Path) -> BackupJob {
    BackupJob {
        database_type,
        name: "nightly".to_string(),
        connection: connection(),
        container_name: None,
        container_runtime: "docker".to_string(),
        destination: Destination::parse("backups/nightly").unwrap(),
        temp_dir: temp_dir.to_path_buf(),
        retention: RetentionPolicy::default(),
        post_failure_rotation: PostFailureRotation::Always,
        storage: StorageSettings {
            credentials: Credentials {
                access_key_id: "AKIATESTKEY".to_string(),
                secret_access_key: "test-secret".to_string(),
            },
            region: "us-east-1".to_string(),
            endpoint: None,
        },
        apprise_config: None,
    }
}

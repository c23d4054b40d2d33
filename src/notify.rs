use log::{debug, info, warn};
use std::io;
use std::path::PathBuf;
use which::which;

use crate::utils::{CommandRunner, CommandSpec, SystemRunner};

/// Where apprise is installed when it is not on `PATH`.
const APPRISE_FALLBACK: &str = "/usr/local/bin/apprise";

/// Best-effort operator notification. Never fails the caller.
pub trait Notifier {
    fn notify(&self, title: &str, message: &str);
}

/// Sends notifications through the `apprise` CLI.
pub struct AppriseNotifier<R: CommandRunner = SystemRunner> {
    runner: R,
    binary: String,
    config: Option<PathBuf>,
}

impl AppriseNotifier {
    pub fn new(config: Option<PathBuf>) -> Self {
        let binary = match which("apprise") {
            Ok(_) => "apprise".to_string(),
            Err(_) => APPRISE_FALLBACK.to_string(),
        };
        AppriseNotifier::with_runner(SystemRunner, binary, config)
    }
}

impl<R: CommandRunner> AppriseNotifier<R> {
    pub fn with_runner(runner: R, binary: impl Into<String>, config: Option<PathBuf>) -> Self {
        AppriseNotifier {
            runner,
            binary: binary.into(),
            config,
        }
    }
}

impl<R: CommandRunner> Notifier for AppriseNotifier<R> {
    fn notify(&self, title: &str, message: &str) {
        let Some(config) = self.config.as_ref().filter(|c| c.is_file()) else {
            info!("Notification skipped: Apprise config not provided or not found.");
            return;
        };

        let command = CommandSpec::new(self.binary.as_str())
            .args(["-t", title, "-b", message, "--config"])
            .arg(config.to_string_lossy());
        match self.runner.run(&command) {
            Ok(output) if output.success() => debug!("Notification sent: {title}"),
            Ok(output) => warn!(
                "⚠️ apprise failed with {}: {}",
                output.status_text(),
                output.stderr.trim()
            ),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("Notification skipped: apprise executable not found.")
            }
            Err(e) => warn!("⚠️ Failed to run apprise: {e}"),
        }
    }
}

// dbbackup/src/utils/process.rs
use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::debug;
use which::which;

/// An external command to launch, with optional stdout redirection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// File that receives the command's standard output.
    pub stdout_to: Option<PathBuf>,
    /// Values masked when the command is displayed.
    secrets: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        CommandSpec {
            program: program.into(),
            ..CommandSpec::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdout_to(mut self, path: &Path) -> Self {
        self.stdout_to = Some(path.to_path_buf());
        self
    }

    /// Marks `value` as sensitive so it never shows up in logs or errors.
    pub fn secret(mut self, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() && !self.secrets.contains(&value) {
            self.secrets.push(value);
        }
        self
    }

    /// Runs this command as the trailing arguments of `program`, e.g. under
    /// `docker exec <container>`.
    pub fn wrapped_in(self, program: impl Into<String>, prefix: &[&str]) -> Self {
        CommandSpec {
            program: program.into(),
            args: prefix
                .iter()
                .map(|p| p.to_string())
                .chain(std::iter::once(self.program))
                .chain(self.args)
                .collect(),
            stdout_to: self.stdout_to,
            secrets: self.secrets,
        }
    }

    /// Masks every secret occurring in `text`.
    pub fn redact(&self, text: &str) -> String {
        self.secrets
            .iter()
            .fold(text.to_string(), |acc, secret| acc.replace(secret.as_str(), "****"))
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        f.write_str(&self.redact(&line))?;
        if let Some(path) = &self.stdout_to {
            write!(f, " > {}", path.display())?;
        }
        Ok(())
    }
}

/// Exit code and captured standard error of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn status_text(&self) -> String {
        match self.code {
            Some(code) => format!("exit code {code}"),
            None => "termination by signal".to_string(),
        }
    }
}

/// Launches external processes. Blocks until the process exits.
pub trait CommandRunner {
    fn run(&self, command: &CommandSpec) -> io::Result<CommandOutput>;
}

/// Runs commands on the host, resolving programs through `PATH`.
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &CommandSpec) -> io::Result<CommandOutput> {
        let program = which(&command.program).map_err(|_| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!(
                    "{} executable not found in PATH. Please ensure it is installed.",
                    command.program
                ),
            )
        })?;
        debug!("Resolved {} to {}", command.program, program.display());

        let stdout = match &command.stdout_to {
            Some(path) => Stdio::from(File::create(path)?),
            None => Stdio::null(),
        };
        let output = Command::new(program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::piped())
            .output()?;

        Ok(CommandOutput {
            code: output.status.code(),
            stderr: command.redact(&String::from_utf8_lossy(&output.stderr)),
        })
    }
}

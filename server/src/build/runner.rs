//! External command execution
//!
//! Build and vendoring tools are run through [`CommandRunner`] so the
//! pipeline can be exercised without Docker or pip.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// A program invocation. Arguments are passed as-is, never through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
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

    /// Rendered for logs
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion, capturing stdout, stderr and the exit code.
    /// `Err` means the program could not be started at all.
    async fn run(&self, command: &CommandSpec) -> std::io::Result<CommandOutput>;
}

/// Runs commands as child processes.
///
/// Children are killed when the returned future is dropped, so a pipeline
/// timeout or an abandoned request does not leave builds running.
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &CommandSpec) -> std::io::Result<CommandOutput> {
        debug!(command = %command.display(), cwd = %command.cwd.display(), "running command");

        let output = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&command.cwd)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(CommandOutput {
            // None when terminated by a signal
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// In-process runner that records commands and replays scripted results.
///
/// A command matches a rule when any of its arguments contains the rule's
/// pattern. Unmatched commands succeed with empty output.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    failures: Mutex<HashMap<String, CommandOutput>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_when(&self, pattern: &str, exit_code: i32, stderr: &str) -> &Self {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(
                pattern.to_string(),
                CommandOutput {
                    exit_code,
                    stdout: String::new(),
                    stderr: stderr.to_string(),
                },
            );
        }
        self
    }

    pub fn delay_when(&self, pattern: &str, delay: Duration) -> &Self {
        if let Ok(mut delays) = self.delays.lock() {
            delays.insert(pattern.to_string(), delay);
        }
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn matching<T: Clone>(rules: &Mutex<HashMap<String, T>>, command: &CommandSpec) -> Option<T> {
        let rules = rules.lock().ok()?;
        let found = rules
            .iter()
            .find(|(pattern, _)| command.args.iter().any(|a| a.contains(pattern.as_str())))
            .map(|(_, value)| value.clone());
        found
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &CommandSpec) -> std::io::Result<CommandOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(command.clone());
        }
        if let Some(delay) = Self::matching(&self.delays, command) {
            tokio::time::sleep(delay).await;
        }
        Ok(Self::matching(&self.failures, command).unwrap_or_default())
    }
}

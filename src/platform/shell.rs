//! Shell command execution.
//!
//! Mutations the platform CLI performs better than the API (access grants,
//! add-on provisioning, domains, stack changes) are run as external
//! commands through a [`CommandRunner`].

use async_trait::async_trait;
use std::fmt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{CommandError, FleetError, Result};

/// Program used for every platform command.
pub const PLATFORM_CLI: &str = "heroku";

/// One external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    /// Program to run.
    pub program: String,
    /// Arguments, unquoted.
    pub args: Vec<String>,
}

impl ShellCommand {
    /// Creates a command for an arbitrary program.
    #[must_use]
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a platform CLI command scoped to `app`.
    #[must_use]
    pub fn platform<I, S>(args: I, app: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut command = Self::new(PLATFORM_CLI, args);
        command.args.push(String::from("--app"));
        command.args.push(app.to_string());
        command
    }
}

/// Renders the command quoted so the printed line can be re-run as is.
impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words = std::iter::once(&self.program).chain(&self.args);
        f.write_str(&shell_words::join(words))
    }
}

/// Executes external commands.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs one command to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be started or fails, unless
    /// the runner is configured to tolerate failures.
    async fn run(&self, command: &ShellCommand) -> Result<()>;
}

/// Runs commands as child processes, echoing each line before it runs.
#[derive(Debug, Clone, Copy)]
pub struct ShellRunner {
    strict: bool,
}

impl ShellRunner {
    /// Creates a runner. With `strict` off, failures are logged and swallowed.
    #[must_use]
    pub const fn new(strict: bool) -> Self {
        Self { strict }
    }

    /// Returns true if failures abort the run.
    #[must_use]
    pub const fn is_strict(&self) -> bool {
        self.strict
    }

    fn fail(&self, error: CommandError) -> Result<()> {
        if self.strict {
            Err(FleetError::Command(error))
        } else {
            warn!("{error} (ignored, strict mode is off)");
            Ok(())
        }
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &ShellCommand) -> Result<()> {
        let line = command.to_string();
        eprintln!("{line}");

        let status = match Command::new(&command.program)
            .args(&command.args)
            .status()
            .await
        {
            Ok(status) => status,
            Err(e) => {
                return self.fail(CommandError::Spawn {
                    command: line,
                    message: e.to_string(),
                });
            }
        };

        if status.success() {
            debug!("Command succeeded: {line}");
            Ok(())
        } else {
            self.fail(CommandError::Failed {
                command: line,
                status: status.to_string(),
            })
        }
    }
}

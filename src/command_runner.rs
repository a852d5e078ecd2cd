//! External command execution
//!
//! Every shell-out the installer performs goes through a [`CommandRunner`].
//! The production implementation is [`SystemRunner`]; tests substitute spy
//! runners that record invocations instead of executing them.
//!
//! # Contract
//!
//! - A non-zero exit is NOT an error at this layer. It is reported in
//!   [`CommandOutput::success`] and classified by the caller.
//! - `Err` is returned only when the program could not be started.
//! - Read-only queries (`rpm -q`, `systemctl is-active`) go through
//!   [`CommandRunner::query`] so they still execute in dry-run mode and the
//!   preview reflects the real host state.

use crate::error::{InstallerError, Result};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Output from an external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output from the command.
    pub stdout: String,
    /// Standard error from the command.
    pub stderr: String,
    /// Exit code (None if terminated by signal).
    pub exit_code: Option<i32>,
    /// Whether the command exited successfully (exit code 0).
    pub success: bool,
}

impl CommandOutput {
    /// A successful, empty result. Returned for skipped dry-run commands.
    pub fn empty_success() -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: Some(0),
            success: true,
        }
    }

    /// Text explaining a failure: stderr, or stdout when stderr is empty.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }

    /// Check if the command succeeded and return an error if not.
    pub fn ensure_success(&self, program: &str) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(InstallerError::Command {
                program: program.to_string(),
                code: self.exit_code.unwrap_or(-1),
                diagnostic: self.diagnostic(),
            })
        }
    }
}

/// Executes external programs on behalf of steps.
pub trait CommandRunner {
    /// Run a command that may change host state.
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;

    /// Run a read-only command. Defaults to [`CommandRunner::run`].
    fn query(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        self.run(program, args)
    }

    /// Whether mutating operations are being skipped.
    fn is_dry_run(&self) -> bool {
        false
    }
}

/// Runs commands on the local host with `std::process::Command`.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    dry_run: bool,
}

impl SystemRunner {
    /// Runner that executes everything.
    pub fn new() -> Self {
        Self { dry_run: false }
    }

    /// Runner that logs mutating commands instead of executing them.
    pub fn dry_run() -> Self {
        Self { dry_run: true }
    }

    fn execute(program: &str, args: &[String]) -> Result<CommandOutput> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| InstallerError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
            success: output.status.success(),
        };

        if !result.stdout.trim().is_empty() {
            debug!("{} stdout: {}", program, result.stdout.trim_end());
        }
        if !result.success {
            debug!(
                "{} exited with {:?}: {}",
                program,
                result.exit_code,
                result.stderr.trim_end()
            );
        }

        Ok(result)
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        let line = format_command(program, args);
        if self.dry_run {
            info!("[DRY RUN] Would execute: {}", line);
            return Ok(CommandOutput::empty_success());
        }
        debug!("Executing: {}", line);
        Self::execute(program, args)
    }

    fn query(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        debug!("Querying: {}", format_command(program, args));
        Self::execute(program, args)
    }

    fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

/// Run a command and turn a non-zero exit into [`InstallerError::Command`].
pub fn run_checked(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[String],
) -> Result<CommandOutput> {
    let output = runner.run(program, args)?;
    output.ensure_success(program)?;
    Ok(output)
}

/// Render a command line for logs.
pub fn format_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build an owned argument vector from string slices.
pub fn args<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

/// Recording runner for unit tests.
#[cfg(test)]
pub(crate) mod spy {
    use super::*;
    use std::cell::RefCell;

    /// Records every command line; answers with scripted failures.
    #[derive(Default)]
    pub struct SpyRunner {
        pub calls: RefCell<Vec<String>>,
        /// Command-line prefixes that exit 1.
        pub failing: Vec<String>,
        pub dry_run: bool,
    }

    impl SpyRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_on(prefixes: &[&str]) -> Self {
            Self {
                failing: prefixes.iter().map(|p| p.to_string()).collect(),
                ..Self::default()
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn answer(&self, line: &str) -> CommandOutput {
            if self.failing.iter().any(|p| line.starts_with(p.as_str())) {
                CommandOutput {
                    stdout: String::new(),
                    stderr: format!("{} failed", line),
                    exit_code: Some(1),
                    success: false,
                }
            } else {
                CommandOutput::empty_success()
            }
        }
    }

    impl CommandRunner for SpyRunner {
        fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
            let line = format_command(program, args);
            self.calls.borrow_mut().push(line.clone());
            Ok(self.answer(&line))
        }

        fn is_dry_run(&self) -> bool {
            self.dry_run
        }
    }
}

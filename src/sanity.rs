//! Pre-flight sanity checks for runtime environment
//!
//! This module verifies the host before any sequence runs:
//! - Binaries the selected modules shell out to are on `PATH`
//! - Running with root privileges (EUID 0)
//!
//! If any check fails, the installer exits with a clear error message
//! before touching the system.

use crate::error::{InstallerError, Result};
use std::process::{Command, Stdio};

/// Result of environment verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanityCheckResult {
    pub missing_binaries: Vec<String>,
    pub is_root: bool,
}

impl SanityCheckResult {
    /// Returns true if all checks passed
    pub fn is_ok(&self) -> bool {
        self.missing_binaries.is_empty() && self.is_root
    }

    /// Convert into a precondition error listing every problem found.
    pub fn into_result(self) -> Result<()> {
        if self.is_ok() {
            return Ok(());
        }
        let mut problems = Vec::new();
        if !self.is_root {
            problems.push("must be run as root".to_string());
        }
        if !self.missing_binaries.is_empty() {
            problems.push(format!(
                "missing required binaries: {}",
                self.missing_binaries.join(", ")
            ));
        }
        Err(InstallerError::precondition(problems.join("; ")))
    }
}

/// Check if a binary is available in PATH
fn binary_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Check if running as root (EUID 0)
fn is_running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Perform all sanity checks and return the result
pub fn verify_environment(binaries: &[&str]) -> SanityCheckResult {
    let missing_binaries = binaries
        .iter()
        .filter(|b| !binary_exists(b))
        .map(|b| b.to_string())
        .collect();

    SanityCheckResult {
        missing_binaries,
        is_root: is_running_as_root(),
    }
}

//! Package installation steps
//!
//! System packages come from `dnf`, with `rpm -q` deciding which are
//! missing. Python packages go into the NetBox virtualenv through its own
//! `pip`.

use crate::command_runner::{args, run_checked};
use crate::error::{InstallerError, Result};
use crate::sequence::{Step, StepContext};
use std::path::PathBuf;
use tracing::info;

/// Install RPM packages that are not installed yet.
#[derive(Debug, Clone)]
pub struct RpmInstallStep {
    label: String,
    packages: Vec<String>,
}

impl RpmInstallStep {
    pub fn new(packages: &[String]) -> Self {
        Self {
            label: format!("Install packages: {}", packages.join(", ")),
            packages: packages.to_vec(),
        }
    }

    /// Packages `rpm -q` does not report as installed, in declared order.
    pub fn missing(&self, ctx: &StepContext<'_>) -> Result<Vec<String>> {
        let mut missing = Vec::new();
        for package in &self.packages {
            let out = ctx.runner.query("rpm", &args(["-q", package.as_str()]))?;
            if !out.success {
                missing.push(package.clone());
            }
        }
        Ok(missing)
    }
}

impl Step for RpmInstallStep {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_satisfied(&self, ctx: &StepContext<'_>) -> Result<bool> {
        Ok(self.missing(ctx)?.is_empty())
    }

    fn apply(&self, ctx: &StepContext<'_>) -> Result<()> {
        let missing = self.missing(ctx)?;
        if missing.is_empty() {
            return Ok(());
        }
        info!("Installing missing packages: {}", missing.join(" "));

        let mut dnf = args(["install", "-y"]);
        dnf.extend(missing);
        run_checked(ctx.runner, "dnf", &dnf)?;
        Ok(())
    }
}

/// `pip install <packages...>` with the virtualenv's pip.
#[derive(Debug, Clone)]
pub struct PipInstallStep {
    label: String,
    pip: PathBuf,
    packages: Vec<String>,
}

impl PipInstallStep {
    pub fn new(pip: impl Into<PathBuf>, packages: &[String]) -> Self {
        Self {
            label: format!("Install {} Python package(s)", packages.len()),
            pip: pip.into(),
            packages: packages.to_vec(),
        }
    }
}

impl Step for PipInstallStep {
    fn label(&self) -> &str {
        &self.label
    }

    fn apply(&self, ctx: &StepContext<'_>) -> Result<()> {
        if !self.pip.is_file() {
            return Err(InstallerError::precondition(format!(
                "pip not found at {}; is the NetBox virtualenv installed?",
                self.pip.display()
            )));
        }

        let mut pip_args = args(["install"]);
        pip_args.extend(self.packages.iter().cloned());
        run_checked(ctx.runner, &self.pip.display().to_string(), &pip_args)?;
        Ok(())
    }
}

//! Installers: turn selected modules into sequences and run them.
//!
//! # Modules
//!
//! - `pip`: Python packages into the NetBox virtualenv
//! - `bind`: chroot BIND as primary or secondary
//! - `octodns`: OctoDNS configuration
//! - `ipdns`: netbox-ipdns plugin
//!
//! Requested modules run in [`InstallModule`] order. A failing module does
//! not stop the ones after it; the summary reports each separately.

pub mod bind;
pub mod ipdns;
pub mod octodns;
pub mod pip;

use crate::command_runner::CommandRunner;
use crate::config::InstallerConfig;
use crate::error::{InstallerError, Result};
use crate::sequence::{Sequence, SequenceOutcome, StepContext};
use crate::types::{DnsRole, InstallModule};
use std::fmt;
use tracing::{error, info};

// ============================================================================
// Run Plan
// ============================================================================

/// Validated operator selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    /// Modules to run, sorted and deduplicated.
    pub modules: Vec<InstallModule>,
    /// Present whenever `modules` contains [`InstallModule::Dns`].
    pub role: Option<DnsRole>,
}

impl RunPlan {
    pub fn new(mut modules: Vec<InstallModule>, role: Option<DnsRole>) -> Result<Self> {
        modules.sort();
        modules.dedup();
        if modules.is_empty() {
            return Err(InstallerError::precondition("no installation mode selected"));
        }
        if modules.contains(&InstallModule::Dns) && role.is_none() {
            return Err(InstallerError::precondition(
                "DNS installation requires --primary-ip or --secondary-ip",
            ));
        }
        Ok(Self { modules, role })
    }

    /// External programs the selected modules invoke.
    pub fn required_binaries(&self) -> Vec<&'static str> {
        let mut bins = Vec::new();
        for module in &self.modules {
            let needed: &[&'static str] = match module {
                InstallModule::PipPackages => &[],
                InstallModule::Dns => &["rpm", "dnf", "chown", "usermod", "id", "systemctl"],
                InstallModule::Octodns => &["chown"],
                InstallModule::Ipdns => &["git", "systemctl"],
            };
            bins.extend_from_slice(needed);
        }
        bins.sort_unstable();
        bins.dedup();
        bins
    }
}

/// Build the sequence for one module.
pub fn build_sequence(
    module: InstallModule,
    config: &InstallerConfig,
    role: Option<&DnsRole>,
) -> Result<Sequence> {
    match module {
        InstallModule::PipPackages => Ok(pip::sequence(config)),
        InstallModule::Dns => {
            let role = role.ok_or_else(|| {
                InstallerError::precondition("DNS installation requires a role")
            })?;
            bind::sequence(config, role)
        }
        InstallModule::Octodns => Ok(octodns::sequence(config)),
        InstallModule::Ipdns => ipdns::sequence(config),
    }
}

// ============================================================================
// Run Summary
// ============================================================================

/// What happened to one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleResult {
    /// The sequence could not be built; no step ran.
    NotStarted(String),
    Ran(SequenceOutcome),
}

impl ModuleResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ran(outcome) if outcome.is_success())
    }
}

/// Per-module results in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub results: Vec<(InstallModule, ModuleResult)>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.results.iter().all(|(_, r)| r.is_success())
    }

    pub fn failed_modules(&self) -> Vec<InstallModule> {
        self.results
            .iter()
            .filter(|(_, r)| !r.is_success())
            .map(|(m, _)| *m)
            .collect()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (module, result) in &self.results {
            let mark = if result.is_success() { "OK  " } else { "FAIL" };
            match result {
                ModuleResult::NotStarted(reason) => {
                    writeln!(f, "[{}] {}: not started: {}", mark, module, reason)?
                }
                ModuleResult::Ran(outcome) => writeln!(f, "[{}] {}", mark, outcome)?,
            }
        }
        Ok(())
    }
}

/// Run every module of `plan` in order.
pub fn run_plan(plan: &RunPlan, config: &InstallerConfig, runner: &dyn CommandRunner) -> RunSummary {
    let ctx = StepContext::new(runner);
    let mut summary = RunSummary::default();

    for &module in &plan.modules {
        let result = match build_sequence(module, config, plan.role.as_ref()) {
            Ok(seq) => {
                let outcome = seq.run(&ctx);
                ModuleResult::Ran(outcome)
            }
            Err(e) => {
                error!("{} not started: {}", module.title(), e);
                ModuleResult::NotStarted(e.to_string())
            }
        };
        summary.results.push((module, result));
    }

    if summary.is_success() {
        info!("All {} module(s) completed", summary.results.len());
    } else {
        error!(
            "Failed module(s): {}",
            summary
                .failed_modules()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    summary
}

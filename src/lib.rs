//! NetBox DNS Installer Library
//!
//! Provisions the NetBox DNS stack on an RPM-based host: Python packages in
//! the NetBox virtualenv, a chroot BIND server, OctoDNS configuration and the
//! netbox-ipdns plugin. Every installation is an ordered [`Sequence`] of
//! idempotent [`Step`]s; external programs run through a [`CommandRunner`].

pub mod cli;
pub mod command_runner;
pub mod config;
pub mod error;
pub mod installers;
pub mod sanity;
pub mod sequence;
pub mod settings;
pub mod steps;
pub mod template;
pub mod types;

// Re-export main types for convenience
pub use command_runner::{CommandOutput, CommandRunner, SystemRunner};
pub use config::InstallerConfig;
pub use error::{InstallerError, Result};
pub use installers::{ModuleResult, RunPlan, RunSummary, run_plan};
pub use sequence::{
    BestEffort, FailurePolicy, FnStep, Sequence, SequenceOutcome, Step, StepContext, StepStatus,
};
pub use settings::{Literal, SettingsDocument};
pub use template::Template;
pub use types::{DnsRole, InstallModule, RoleKind, ServiceAction};

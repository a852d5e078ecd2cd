use crate::error::{InstallerError, Result};
use crate::installers::RunPlan;
use crate::types::{DnsRole, InstallModule};
use clap::{Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;
use strum::IntoEnumIterator;

/// NetBox DNS installer - provisions BIND, OctoDNS and the netbox-ipdns plugin
#[derive(Parser, Debug)]
#[command(name = "nbdns-install")]
#[command(about = "Installs the NetBox DNS stack: pip dependencies, chroot BIND, OctoDNS and netbox-ipdns")]
#[command(version)]
#[command(after_help = "\
Examples:
  nbdns-install --pip-packages
  nbdns-install --dns-install --primary-ip 10.1.2.3
  nbdns-install --dns-install --secondary-ip 9.11.227.25
  nbdns-install --all --primary-ip 10.1.2.3 --config site.json")]
pub struct Cli {
    /// Dry-run mode: show what would be executed without making changes.
    ///
    /// Mutating commands and filesystem writes are logged and skipped.
    /// Read-only queries (rpm -q, systemctl is-active) still execute so the
    /// preview reflects the host.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Skip the root and required-binary checks
    #[arg(long, global = true)]
    pub skip_preflight: bool,

    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON configuration file (defaults are used when omitted)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Install Python dependencies into the NetBox virtualenv
    #[arg(long)]
    pub pip_packages: bool,

    /// Install and configure BIND in a chroot
    #[arg(long)]
    pub dns_install: bool,

    /// Install the OctoDNS configuration
    #[arg(long)]
    pub octodns_install: bool,

    /// Install the netbox-ipdns plugin
    #[arg(long)]
    pub ipdns_install: bool,

    /// Run every installation module
    #[arg(long)]
    pub all: bool,

    /// Configure BIND as primary; the address is written into the ACL file
    #[arg(long, value_name = "IP")]
    pub primary_ip: Option<IpAddr>,

    /// Configure BIND as secondary using the configuration directory named after this address
    #[arg(long, value_name = "IP")]
    pub secondary_ip: Option<IpAddr>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Print the effective configuration as JSON
    PrintConfig,
    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        file: PathBuf,
    },
}

impl Cli {
    /// Modules selected by the mode flags, in execution order.
    pub fn selected_modules(&self) -> Vec<InstallModule> {
        if self.all {
            return InstallModule::iter().collect();
        }
        [
            (self.pip_packages, InstallModule::PipPackages),
            (self.dns_install, InstallModule::Dns),
            (self.octodns_install, InstallModule::Octodns),
            (self.ipdns_install, InstallModule::Ipdns),
        ]
        .into_iter()
        .filter_map(|(selected, module)| selected.then_some(module))
        .collect()
    }

    /// The DNS role given on the command line, if exactly one was given.
    pub fn role(&self) -> Result<Option<DnsRole>> {
        match (self.primary_ip, self.secondary_ip) {
            (Some(_), Some(_)) => Err(InstallerError::precondition(
                "cannot specify both --primary-ip and --secondary-ip",
            )),
            (Some(ip), None) => Ok(Some(DnsRole::primary(ip))),
            (None, Some(ip)) => Ok(Some(DnsRole::secondary(ip))),
            (None, None) => Ok(None),
        }
    }

    /// Validate flag combinations and produce the run plan.
    pub fn plan(&self) -> Result<RunPlan> {
        let role = self.role()?;
        RunPlan::new(self.selected_modules(), role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("nbdns-install").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_both_roles_rejected() {
        let cli = parse(&["--dns-install", "--primary-ip", "10.0.0.1", "--secondary-ip", "10.0.0.2"]);
        let err = cli.plan().unwrap_err();
        assert!(err.is_precondition());
        assert!(err.to_string().contains("both"));
    }

    #[test]
    fn test_dns_without_role_rejected() {
        let err = parse(&["--dns-install"]).plan().unwrap_err();
        assert!(err.to_string().contains("--primary-ip"));
        assert!(parse(&["--all"]).plan().is_err());
    }

    #[test]
    fn test_nothing_selected_rejected() {
        assert!(parse(&[]).plan().is_err());
    }

    #[test]
    fn test_secondary_plan() {
        let plan = parse(&["--pip-packages", "--dns-install", "--secondary-ip", "9.11.227.25"])
            .plan()
            .unwrap();
        assert_eq!(plan.modules, vec![InstallModule::PipPackages, InstallModule::Dns]);
        assert_eq!(plan.role, Some(DnsRole::secondary("9.11.227.25".parse().unwrap())));
    }

    #[test]
    fn test_all_selects_every_module() {
        let cli = parse(&["--all", "--primary-ip", "10.1.2.3"]);
        assert_eq!(cli.selected_modules().len(), 4);
        assert!(cli.plan().is_ok());
    }

    #[test]
    fn test_invalid_ip_rejected_by_parser() {
        let result = Cli::try_parse_from(["nbdns-install", "--dns-install", "--primary-ip", "not-an-ip"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_subcommands() {
        let cli = parse(&["--config", "site.json", "print-config"]);
        assert_eq!(cli.command, Some(Commands::PrintConfig));
        assert_eq!(cli.config, Some(PathBuf::from("site.json")));

        let cli = parse(&["validate", "site.json"]);
        assert_eq!(
            cli.command,
            Some(Commands::Validate {
                file: PathBuf::from("site.json")
            })
        );
    }
}

//! Type-safe selection types for the installer
//!
//! Installation modes, DNS roles and service actions are enums rather than
//! strings so that typos are caught at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use strum::{Display, EnumIter, EnumString};

/// An installation sequence the operator can select.
///
/// Variants are declared in the order sequences run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "kebab-case")]
pub enum InstallModule {
    /// Python dependencies inside the NetBox virtualenv
    #[strum(serialize = "pip-packages")]
    PipPackages,
    /// Chroot BIND name server
    #[strum(serialize = "dns")]
    Dns,
    /// OctoDNS sync tool configuration
    #[strum(serialize = "octodns")]
    Octodns,
    /// netbox-ipdns plugin
    #[strum(serialize = "ipdns")]
    Ipdns,
}

impl InstallModule {
    /// Title used in banners and summaries.
    pub fn title(self) -> &'static str {
        match self {
            Self::PipPackages => "Pip Packages Installation",
            Self::Dns => "BIND DNS Installation",
            Self::Octodns => "OctoDNS Installation",
            Self::Ipdns => "netbox-ipdns Plugin Installation",
        }
    }
}

/// Whether this host serves zones as primary or secondary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RoleKind {
    #[default]
    Primary,
    Secondary,
}

/// DNS role plus the address that selects its configuration.
///
/// For a primary the address is substituted into the ACL file; for a
/// secondary it names the configuration directory to install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsRole {
    pub kind: RoleKind,
    pub ip: IpAddr,
}

impl DnsRole {
    pub fn primary(ip: IpAddr) -> Self {
        Self {
            kind: RoleKind::Primary,
            ip,
        }
    }

    pub fn secondary(ip: IpAddr) -> Self {
        Self {
            kind: RoleKind::Secondary,
            ip,
        }
    }
}

impl fmt::Display for DnsRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind, self.ip)
    }
}

/// systemctl verbs used by the installer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum ServiceAction {
    Enable,
    Start,
    Restart,
    Reload,
}

impl ServiceAction {
    /// The `systemctl` query that tells whether this action is already in effect.
    pub fn state_query(self) -> Option<&'static str> {
        match self {
            Self::Enable => Some("is-enabled"),
            Self::Start => Some("is-active"),
            Self::Restart | Self::Reload => None,
        }
    }
}

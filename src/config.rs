//! Installer configuration
//!
//! A single [`InstallerConfig`] is built once per process (defaults, or a
//! JSON file passed with `--config`) and handed by reference to every
//! sequence constructor. Nothing reads configuration from global state.

use crate::error::{InstallerError, Result};
use crate::types::InstallModule;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default OctoDNS `config.yaml` template.
///
/// Placeholders: `$server_url`, `$server_api_key`, `$server_ip`.
pub const DEFAULT_OCTODNS_TEMPLATE: &str = r#"---
manager:
  max_workers: 2

providers:
  netbox:
    class: octodns_netbox_dns.NetBoxDNSProvider
    url: $server_url
    token: $server_api_key
    view: false
    replace_duplicates: true
    make_absolute: true

  bind:
    class: octodns_bind.Rfc2136Provider
    host: $server_ip
    port: 53

zones:
  '*':
    sources:
      - netbox
    targets:
      - bind
"#;

/// Complete installer configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    pub netbox: NetboxConfig,
    pub pip: PipConfig,
    pub bind: BindConfig,
    pub octodns: OctodnsConfig,
    pub ipdns: IpdnsConfig,
    pub environment: EnvironmentConfig,
}

/// Paths and services of the NetBox deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetboxConfig {
    /// Python virtualenv used by NetBox
    pub venv_path: PathBuf,
    /// NetBox plugins directory
    pub plugins_path: PathBuf,
    /// Django `manage.py`
    pub manage_py: PathBuf,
    /// NetBox `configuration.py`
    pub configuration_file: PathBuf,
    /// System user NetBox runs as
    pub user: String,
    /// Units restarted after the plugin is installed
    pub services: Vec<String>,
}

impl Default for NetboxConfig {
    fn default() -> Self {
        Self {
            venv_path: PathBuf::from("/opt/netbox/current/venv-py3/"),
            plugins_path: PathBuf::from("/opt/netbox/current/netbox/plugins/"),
            manage_py: PathBuf::from("/opt/netbox/current/netbox/manage.py"),
            configuration_file: PathBuf::from(
                "/opt/netbox/current/netbox/netbox/configuration.py",
            ),
            user: "netbox".to_string(),
            services: vec!["netbox".to_string(), "netbox-rq".to_string()],
        }
    }
}

impl NetboxConfig {
    pub fn pip(&self) -> PathBuf {
        self.venv_path.join("bin").join("pip")
    }

    pub fn python(&self) -> PathBuf {
        self.venv_path.join("bin").join("python")
    }
}

/// Python packages installed into the NetBox virtualenv.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipConfig {
    pub packages: Vec<String>,
}

impl Default for PipConfig {
    fn default() -> Self {
        Self {
            packages: [
                "octodns",
                "mysql-connector-python>=8.0.0",
                "netaddr",
                "octodns-bind",
                "octodns-ddns",
                "octodns-netbox-dns",
                "PyYAML>=6.0",
                "pynetbox>=7.0.0",
                "requests>=2.31.0",
                "urllib3>=2.0.0",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Chroot BIND layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindConfig {
    /// RPM packages to install
    pub packages: Vec<String>,
    /// Checkout holding one config tree per server
    pub configs_path: PathBuf,
    /// Directory under `configs_path` used by primaries
    pub primary_config_dir: String,
    /// File inside the primary tree rendered with `$ip`
    pub acl_file: String,
    /// `etc` inside the chroot
    pub chroot_etc: PathBuf,
    /// Log directory inside the chroot
    pub chroot_log: PathBuf,
    /// Directories created under `chroot_etc`
    pub etc_directories: Vec<PathBuf>,
    /// Directories receiving ownership, mode and set-group-ID
    pub managed_directories: Vec<PathBuf>,
    #[serde(with = "octal_mode")]
    pub dir_mode: u32,
    pub user: String,
    pub group: String,
    pub service: String,
    /// Where the distribution ships `named.*` hint files
    pub named_source: PathBuf,
    /// Chroot copy of `named_source`
    pub named_dest: PathBuf,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            packages: vec![
                "bind".to_string(),
                "bind-chroot".to_string(),
                "bind-utils".to_string(),
            ],
            configs_path: PathBuf::from("/opt/bind-environment-configs"),
            primary_config_dir: "netbox-primary".to_string(),
            acl_file: "named.conf.acl".to_string(),
            chroot_etc: PathBuf::from("/var/named/chroot/etc"),
            chroot_log: PathBuf::from("/var/named/chroot/var/log"),
            etc_directories: vec![PathBuf::from("named"), PathBuf::from("named/zones")],
            managed_directories: vec![
                PathBuf::from("/var/named/chroot/etc/named"),
                PathBuf::from("/var/named/chroot/var/named"),
                PathBuf::from("/var/named/chroot/var/log"),
            ],
            dir_mode: 0o770,
            user: "named".to_string(),
            group: "named".to_string(),
            service: "named-chroot".to_string(),
            named_source: PathBuf::from("/var/named"),
            named_dest: PathBuf::from("/var/named/chroot/var/named"),
        }
    }
}

impl BindConfig {
    /// Where overwritten files are backed up.
    pub fn backup_dir(&self) -> PathBuf {
        self.chroot_etc.join("backups")
    }

    /// DNSSEC key directory inside the chroot.
    pub fn dynamic_dir(&self) -> PathBuf {
        self.named_dest.join("dynamic")
    }
}

/// OctoDNS configuration directory and file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OctodnsConfig {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    #[serde(with = "octal_mode")]
    pub dir_mode: u32,
    pub user: String,
    pub group: String,
    pub template: String,
}

impl Default for OctodnsConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("/etc/octodns"),
            config_file: PathBuf::from("/etc/octodns/config.yaml"),
            dir_mode: 0o775,
            user: "netbox".to_string(),
            group: "named".to_string(),
            template: DEFAULT_OCTODNS_TEMPLATE.to_string(),
        }
    }
}

/// netbox-ipdns plugin settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpdnsConfig {
    /// Git URL of the plugin repository
    pub repo_url: String,
    /// Python package name registered in NetBox `PLUGINS`
    pub plugin_module: String,
    pub netbox_path: String,
    pub python_path: String,
    pub default_soa_rname: String,
    pub tenant_group_prefix: String,
    pub protected_zones: Vec<String>,
    pub default_mname: String,
    pub default_nameservers: Vec<String>,
}

impl Default for IpdnsConfig {
    fn default() -> Self {
        Self {
            repo_url: String::new(),
            plugin_module: "netbox_ipdns".to_string(),
            netbox_path: "/opt/netbox/current/netbox".to_string(),
            python_path: "/opt/netbox/current/venv-py3/bin/python".to_string(),
            default_soa_rname: String::new(),
            tenant_group_prefix: String::new(),
            protected_zones: Vec::new(),
            default_mname: String::new(),
            default_nameservers: Vec::new(),
        }
    }
}

impl IpdnsConfig {
    /// Directory name `git clone` creates: last URL segment without `.git`.
    pub fn repo_name(&self) -> Option<&str> {
        let last = self
            .repo_url
            .trim_end_matches('/')
            .rsplit(['/', ':'])
            .next()?;
        let name = last.strip_suffix(".git").unwrap_or(last);
        (!name.is_empty()).then_some(name)
    }
}

/// Site-specific values substituted into generated files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub server_ip: String,
    pub server_url: String,
    pub server_api_key: String,
}

impl InstallerConfig {
    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json).map_err(|e| InstallerError::fs(&path, e))
    }

    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).map_err(|e| InstallerError::fs(&path, e))?;
        serde_json::from_str(&content).map_err(|e| {
            InstallerError::config(format!(
                "failed to parse {}: {}",
                path.as_ref().display(),
                e
            ))
        })
    }

    /// Validate the fields the selected modules depend on.
    pub fn validate(&self, modules: &[InstallModule]) -> Result<()> {
        for module in modules {
            match module {
                InstallModule::PipPackages => self.validate_pip()?,
                InstallModule::Dns => self.validate_bind()?,
                InstallModule::Octodns => self.validate_octodns()?,
                InstallModule::Ipdns => self.validate_ipdns()?,
            }
        }
        Ok(())
    }

    fn validate_pip(&self) -> Result<()> {
        require_path("netbox.venv_path", &self.netbox.venv_path)?;
        if self.pip.packages.iter().all(|p| p.trim().is_empty()) {
            return Err(InstallerError::config("pip.packages must not be empty"));
        }
        Ok(())
    }

    fn validate_bind(&self) -> Result<()> {
        let bind = &self.bind;
        if bind.packages.is_empty() {
            return Err(InstallerError::config("bind.packages must not be empty"));
        }
        require_path("bind.configs_path", &bind.configs_path)?;
        require_path("bind.chroot_etc", &bind.chroot_etc)?;
        require_path("bind.chroot_log", &bind.chroot_log)?;
        require_path("bind.named_dest", &bind.named_dest)?;
        require_text("bind.primary_config_dir", &bind.primary_config_dir)?;
        require_text("bind.user", &bind.user)?;
        require_text("bind.group", &bind.group)?;
        require_text("bind.service", &bind.service)?;
        require_mode("bind.dir_mode", bind.dir_mode)?;
        if let Some(abs) = bind.etc_directories.iter().find(|d| d.is_absolute()) {
            return Err(InstallerError::config(format!(
                "bind.etc_directories must be relative to chroot_etc: {}",
                abs.display()
            )));
        }
        Ok(())
    }

    fn validate_octodns(&self) -> Result<()> {
        let octodns = &self.octodns;
        require_path("octodns.config_dir", &octodns.config_dir)?;
        require_path("octodns.config_file", &octodns.config_file)?;
        require_text("octodns.user", &octodns.user)?;
        require_text("octodns.group", &octodns.group)?;
        require_mode("octodns.dir_mode", octodns.dir_mode)?;
        require_text("environment.server_ip", &self.environment.server_ip)?;
        require_url("environment.server_url", &self.environment.server_url)?;
        require_text("environment.server_api_key", &self.environment.server_api_key)
    }

    fn validate_ipdns(&self) -> Result<()> {
        let url = self.ipdns.repo_url.trim();
        if !["http://", "https://", "git://", "ssh://", "git@"]
            .iter()
            .any(|scheme| url.starts_with(scheme))
        {
            return Err(InstallerError::config(
                "ipdns.repo_url must start with http://, https://, git://, ssh:// or git@",
            ));
        }
        if self.ipdns.repo_name().is_none() {
            return Err(InstallerError::config("ipdns.repo_url has no repository name"));
        }
        require_path("netbox.plugins_path", &self.netbox.plugins_path)?;
        require_path("netbox.configuration_file", &self.netbox.configuration_file)?;
        require_text("ipdns.plugin_module", &self.ipdns.plugin_module)?;
        require_text("environment.server_api_key", &self.environment.server_api_key)
    }
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(InstallerError::config(format!("{} must be specified", field)))
    } else {
        Ok(())
    }
}

fn require_path(field: &str, value: &Path) -> Result<()> {
    if value.as_os_str().is_empty() {
        Err(InstallerError::config(format!("{} must be specified", field)))
    } else {
        Ok(())
    }
}

fn require_url(field: &str, value: &str) -> Result<()> {
    let value = value.trim();
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(InstallerError::config(format!(
            "{} must start with http:// or https://",
            field
        )))
    }
}

fn require_mode(field: &str, mode: u32) -> Result<()> {
    if mode > 0o777 {
        Err(InstallerError::config(format!(
            "{} must be a permission mode between 0000 and 0777, got {:o}",
            field, mode
        )))
    } else {
        Ok(())
    }
}

/// Serialize permission modes as octal strings (`"0770"`).
mod octal_mode {
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(mode: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:04o}", mode))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let text = String::deserialize(deserializer)?;
        let digits = text.trim().trim_start_matches("0o");
        u32::from_str_radix(digits, 8)
            .map_err(|_| de::Error::custom(format!("invalid octal mode: {}", text)))
    }
}

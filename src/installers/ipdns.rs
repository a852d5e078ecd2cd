//! netbox-ipdns plugin
//!
//! Clones the plugin into the NetBox plugins directory, materializes and
//! fills in its `global_variables.py`, registers it with NetBox, then runs
//! migrations and restarts NetBox.

use crate::config::InstallerConfig;
use crate::error::{InstallerError, Result};
use crate::sequence::{FnStep, Sequence};
use crate::settings::Literal;
use crate::steps::{
    CommandStep, CopyFileStep, GitCloneStep, ServiceStep, SettingsEdit, SettingsFileStep,
};
use crate::types::InstallModule;
use std::path::{Path, PathBuf};

const EXAMPLE_SETTINGS: &str = "global_variables.example.py";
const SETTINGS: &str = "global_variables.py";

/// Lookup in `get_default_mname()` whose argument is the default MNAME.
pub const MNAME_CALL: &str = "NameServer.objects.get(name=";
/// Lookup in `get_default_nameservers()` whose argument lists the default nameservers.
pub const NAMESERVERS_CALL: &str = "NameServer.objects.filter(name__in=";

/// Checkout directory of the plugin repository.
pub fn checkout_dir(config: &InstallerConfig) -> Result<PathBuf> {
    let name = config
        .ipdns
        .repo_name()
        .ok_or_else(|| InstallerError::config("ipdns.repo_url has no repository name"))?;
    Ok(config.netbox.plugins_path.join(name))
}

/// Edits applied to the plugin's `global_variables.py`.
///
/// Optional values left empty in the configuration keep the plugin's defaults.
pub fn settings_edits(config: &InstallerConfig) -> Vec<SettingsEdit> {
    let ipdns = &config.ipdns;
    let mut edits = vec![
        SettingsEdit::set("NETBOX_PATH", Literal::str(&ipdns.netbox_path)),
        SettingsEdit::set("PYTHON_PATH", Literal::str(&ipdns.python_path)),
        SettingsEdit::set("NETBOX_TOKEN", Literal::str(&config.environment.server_api_key)),
        SettingsEdit::set("PREFIX_SIGNALS_ENABLED", Literal::Bool(false)),
        SettingsEdit::set("ZONE_SIGNALS_ENABLED", Literal::Bool(false)),
    ];
    if !ipdns.default_soa_rname.is_empty() {
        edits.push(SettingsEdit::set("DEFAULT_SOA_RNAME", Literal::str(&ipdns.default_soa_rname)));
    }
    if !ipdns.tenant_group_prefix.is_empty() {
        edits.push(SettingsEdit::set(
            "TENANT_GROUP_PREFIX",
            Literal::str(&ipdns.tenant_group_prefix),
        ));
    }
    if !ipdns.protected_zones.is_empty() {
        edits.push(SettingsEdit::set_path(
            ["PROTECTED_ZONE_CONFIG", "protected_zones"],
            Literal::str_list(ipdns.protected_zones.iter().cloned()),
        ));
    }
    if !ipdns.default_mname.is_empty() {
        edits.push(SettingsEdit::call_argument(
            MNAME_CALL,
            Literal::str(&ipdns.default_mname),
        ));
    }
    if !ipdns.default_nameservers.is_empty() {
        edits.push(SettingsEdit::call_argument(
            NAMESERVERS_CALL,
            Literal::str_list(ipdns.default_nameservers.iter().cloned()),
        ));
    }
    edits
}

fn manage_py(config: &InstallerConfig, label: &str, subcommand: &[&str]) -> CommandStep {
    let mut argv = vec![config.netbox.manage_py.display().to_string()];
    argv.extend(subcommand.iter().map(|s| s.to_string()));
    CommandStep::new(label, config.netbox.python().display().to_string(), argv)
}

fn require_dir(label: &str, path: &Path) -> FnStep {
    let path = path.to_path_buf();
    FnStep::new(label, move |_| {
        if path.is_dir() {
            Ok(())
        } else {
            Err(InstallerError::precondition(format!(
                "plugins directory does not exist: {}",
                path.display()
            )))
        }
    })
}

pub fn sequence(config: &InstallerConfig) -> Result<Sequence> {
    let checkout = checkout_dir(config)?;
    let package_dir = checkout.join(&config.ipdns.plugin_module);
    let settings_path = package_dir.join(SETTINGS);
    let netbox_conf = &config.netbox.configuration_file;
    let conf_backups = netbox_conf
        .parent()
        .map(|p| p.join("backups"))
        .unwrap_or_else(|| PathBuf::from("backups"));

    let mut seq = Sequence::new(InstallModule::Ipdns.title())
        .with_step(require_dir("Verify plugins directory", &config.netbox.plugins_path))
        .with_step(GitCloneStep::new(config.ipdns.repo_url.clone(), &checkout))
        .with_step(
            CopyFileStep::new(
                format!("Create {}", SETTINGS),
                package_dir.join(EXAMPLE_SETTINGS),
                &settings_path,
            )
            .keep_existing(),
        );

    let mut globals = SettingsFileStep::new(format!("Configure {}", SETTINGS), &settings_path);
    for edit in settings_edits(config) {
        globals = globals.edit(edit);
    }
    seq.push(globals);

    seq.push(
        SettingsFileStep::new(
            format!("Register {} in NetBox PLUGINS", config.ipdns.plugin_module),
            netbox_conf,
        )
        .edit(SettingsEdit::list_add_unique(
            "PLUGINS",
            Literal::str(&config.ipdns.plugin_module),
        ))
        .backup_to(conf_backups),
    );
    seq.push(manage_py(config, "Run NetBox migrations", &["migrate"]));
    seq.push(manage_py(
        config,
        "Collect NetBox static files",
        &["collectstatic", "--no-input"],
    ));
    for service in &config.netbox.services {
        seq.push(ServiceStep::restart(service.clone()));
    }

    Ok(seq)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> InstallerConfig {
        let mut config = InstallerConfig::default();
        config.ipdns.repo_url = "git@github.com:example/netbox-ipdns.git".to_string();
        config.environment.server_api_key = "token".to_string();
        config
    }

    #[test]
    fn test_checkout_dir_from_repo_url() {
        assert_eq!(
            checkout_dir(&config()).unwrap(),
            PathBuf::from("/opt/netbox/current/netbox/plugins/netbox-ipdns")
        );
        assert!(checkout_dir(&InstallerConfig::default()).is_err());
    }

    #[test]
    fn test_optional_edits_are_skipped_when_empty() {
        let mut cfg = config();
        assert_eq!(settings_edits(&cfg).len(), 5);

        cfg.ipdns.default_mname = "ns1.example.com.".to_string();
        cfg.ipdns.protected_zones = vec!["example.com".to_string()];
        let edits = settings_edits(&cfg);
        assert_eq!(edits.len(), 7);
        assert!(edits.contains(&SettingsEdit::call_argument(
            MNAME_CALL,
            Literal::str("ns1.example.com.")
        )));
    }

    #[test]
    fn test_step_order() {
        let seq = sequence(&config()).unwrap();
        assert_eq!(
            seq.labels(),
            vec![
                "Verify plugins directory",
                "Clone git@github.com:example/netbox-ipdns.git",
                "Create global_variables.py",
                "Configure global_variables.py",
                "Register netbox_ipdns in NetBox PLUGINS",
                "Run NetBox migrations",
                "Collect NetBox static files",
                "systemctl restart netbox",
                "systemctl restart netbox-rq",
            ]
        );
    }
}

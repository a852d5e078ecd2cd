//! OctoDNS configuration directory and `config.yaml`.

use crate::config::InstallerConfig;
use crate::sequence::Sequence;
use crate::steps::{DirectoryStep, Ownership, TemplateFileStep};
use crate::types::InstallModule;
use std::collections::HashMap;

/// Values substituted into the OctoDNS template.
pub fn template_values(config: &InstallerConfig) -> HashMap<String, String> {
    let env = &config.environment;
    HashMap::from([
        ("server_url".to_string(), env.server_url.clone()),
        ("server_api_key".to_string(), env.server_api_key.clone()),
        ("server_ip".to_string(), env.server_ip.clone()),
    ])
}

pub fn sequence(config: &InstallerConfig) -> Sequence {
    let octodns = &config.octodns;
    let backups = octodns.config_dir.join("backups");

    Sequence::new(InstallModule::Octodns.title())
        .with_step(
            DirectoryStep::new(
                format!("Provision {}", octodns.config_dir.display()),
                [&octodns.config_dir],
            )
            .owned_by(Ownership::new(octodns.user.clone(), octodns.group.clone()))
            .mode(octodns.dir_mode)
            .setgid(),
        )
        .with_step(
            TemplateFileStep::new(
                format!("Write {}", octodns.config_file.display()),
                &octodns.config_file,
                octodns.template.clone(),
                template_values(config),
            )
            .backup_to(backups),
        )
}

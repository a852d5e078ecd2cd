//! Chroot BIND name server
//!
//! Step order:
//!
//! 1. Install missing RPM packages
//! 2. Create the chroot `etc` subdirectories, log directory and DNSSEC key directory
//! 3. Copy the distribution's `named.*` files into the chroot
//! 4. Copy the role's configuration tree into chroot `etc`
//! 5. Add the NetBox user to the BIND group (best effort)
//! 6. Ownership, mode and set-group-ID on the managed directories
//! 7. Reload systemd units, enable and start the service
//! 8. Reload the service so a running server picks up the copied configuration

use crate::config::InstallerConfig;
use crate::error::{InstallerError, Result};
use crate::sequence::Sequence;
use crate::steps::{
    CopyMatchingStep, CopyTreeStep, DirectoryStep, Ownership, RenderRule, RpmInstallStep,
    ServiceStep, add_user_to_group, daemon_reload,
};
use crate::types::{DnsRole, InstallModule, RoleKind};
use std::collections::HashMap;
use std::path::PathBuf;

/// Prefix of the hint and zone files shipped with the bind package.
const NAMED_FILE_PREFIX: &str = "named.";

/// Directory holding the configuration tree for `role`.
///
/// A secondary's tree is named after its address and must already exist.
pub fn config_source(config: &InstallerConfig, role: &DnsRole) -> Result<PathBuf> {
    let bind = &config.bind;
    match role.kind {
        RoleKind::Primary => Ok(bind.configs_path.join(&bind.primary_config_dir)),
        RoleKind::Secondary => {
            let dir = bind.configs_path.join(role.ip.to_string());
            if dir.is_dir() {
                Ok(dir)
            } else {
                Err(InstallerError::precondition(format!(
                    "no configuration for secondary {} at {}",
                    role.ip,
                    dir.display()
                )))
            }
        }
    }
}

pub fn sequence(config: &InstallerConfig, role: &DnsRole) -> Result<Sequence> {
    let bind = &config.bind;
    let source = config_source(config, role)?;

    let mut tree = CopyTreeStep::new(
        format!("Copy {} configuration from {}", role.kind, source.display()),
        &source,
        &bind.chroot_etc,
    )
    .backup_to(bind.backup_dir());
    if role.kind == RoleKind::Primary {
        let values = HashMap::from([("ip".to_string(), role.ip.to_string())]);
        tree = tree.render(RenderRule::new(bind.acl_file.clone(), values));
    }

    let etc_dirs: Vec<PathBuf> = bind
        .etc_directories
        .iter()
        .map(|d| bind.chroot_etc.join(d))
        .collect();
    let owner = Ownership::new(bind.user.clone(), bind.group.clone());

    let seq = Sequence::new(format!("{} ({})", InstallModule::Dns.title(), role))
        .with_step(RpmInstallStep::new(&bind.packages))
        .with_step(DirectoryStep::new("Create chroot etc directories", etc_dirs))
        .with_step(DirectoryStep::new("Create chroot log directory", [&bind.chroot_log]))
        .with_step(DirectoryStep::new("Create DNSSEC key directory", [bind.dynamic_dir()]))
        .with_step(
            CopyMatchingStep::new(
                "Copy named.* files into chroot",
                &bind.named_source,
                NAMED_FILE_PREFIX,
                &bind.named_dest,
            )
            .backup_to(bind.backup_dir()),
        )
        .with_step(tree)
        .with_step(add_user_to_group(&config.netbox.user, &bind.group))
        .with_step(
            DirectoryStep::new("Set ownership on BIND directories", &bind.managed_directories)
                .owned_by(owner)
                .recursive(),
        )
        .with_step(
            DirectoryStep::new("Set mode on BIND directories", &bind.managed_directories)
                .mode(bind.dir_mode),
        )
        .with_step(
            DirectoryStep::new("Set group-ID bit on BIND directories", &bind.managed_directories)
                .setgid(),
        )
        .with_step(daemon_reload())
        .with_step(ServiceStep::enable(bind.service.clone()))
        .with_step(ServiceStep::start(bind.service.clone()))
        .with_step(ServiceStep::reload(bind.service.clone()));

    Ok(seq)
}

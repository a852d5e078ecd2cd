//! Python dependencies inside the NetBox virtualenv.

use crate::config::InstallerConfig;
use crate::sequence::Sequence;
use crate::steps::PipInstallStep;
use crate::types::InstallModule;

pub fn sequence(config: &InstallerConfig) -> Sequence {
    Sequence::new(InstallModule::PipPackages.title())
        .with_step(PipInstallStep::new(config.netbox.pip(), &config.pip.packages))
}

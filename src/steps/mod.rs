//! Reusable step kinds.
//!
//! Each type here implements [`crate::sequence::Step`] for one recurring
//! pattern of the installer. Installers in [`crate::installers`] assemble
//! them into sequences; nothing in this module decides *what* to install.

pub mod command;
pub mod copy;
pub mod directory;
pub mod files;
pub mod git;
pub mod packages;
pub mod service;
pub mod settings_file;
pub mod template_file;

pub use command::{CommandStep, SatisfiedWhen, add_user_to_group};
pub use copy::{CopyFileStep, CopyMatchingStep, CopyTreeStep, RenderRule};
pub use directory::{DirectoryStep, Ownership};
pub use files::{
    BACKUP_TIMESTAMP_FORMAT, DEFAULT_FILE_MODE, backup_file, backup_name, write_atomic,
    write_atomic_with_mode,
};
pub use git::GitCloneStep;
pub use packages::{PipInstallStep, RpmInstallStep};
pub use service::{ServiceStep, daemon_reload};
pub use settings_file::{SettingsEdit, SettingsFileStep};
pub use template_file::TemplateFileStep;

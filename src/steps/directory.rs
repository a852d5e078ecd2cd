//! Directory provisioning
//!
//! Ensures a batch of directories exists with the requested owner, group and
//! mode. Every directory is created before ownership or permissions are
//! touched. The first failing directory aborts the whole batch.

use crate::command_runner::{args, run_checked};
use crate::error::{InstallerError, IoResultExt, Result};
use crate::sequence::{Step, StepContext};
use nix::unistd::{Group, User};
use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Set-group-ID bit for directories.
pub const SETGID_BIT: u32 = 0o2000;

/// Owner and group names, resolved on the target host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ownership {
    pub user: String,
    pub group: String,
}

impl Ownership {
    pub fn new(user: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            group: group.into(),
        }
    }

    /// `user:group` as accepted by chown.
    pub fn spec(&self) -> String {
        format!("{}:{}", self.user, self.group)
    }

    /// Numeric ids, or `None` when either name is unknown on this host.
    fn resolve(&self) -> Result<Option<(u32, u32)>> {
        let user = User::from_name(&self.user)
            .map_err(|e| InstallerError::precondition(format!("lookup of user {}: {}", self.user, e)))?;
        let group = Group::from_name(&self.group)
            .map_err(|e| InstallerError::precondition(format!("lookup of group {}: {}", self.group, e)))?;
        Ok(match (user, group) {
            (Some(u), Some(g)) => Some((u.uid.as_raw(), g.gid.as_raw())),
            _ => None,
        })
    }
}

/// Create directories and apply ownership and mode.
#[derive(Debug, Clone)]
pub struct DirectoryStep {
    label: String,
    paths: Vec<PathBuf>,
    ownership: Option<Ownership>,
    recursive: bool,
    mode: Option<u32>,
    setgid: bool,
}

impl DirectoryStep {
    pub fn new<I, P>(label: impl Into<String>, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            label: label.into(),
            paths: paths.into_iter().map(Into::into).collect(),
            ownership: None,
            recursive: false,
            mode: None,
            setgid: false,
        }
    }

    pub fn owned_by(mut self, ownership: Ownership) -> Self {
        self.ownership = Some(ownership);
        self
    }

    /// Apply ownership to everything below each directory too.
    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    /// New files inherit the directory's group.
    pub fn setgid(mut self) -> Self {
        self.setgid = true;
        self
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Permission bits the directory should end up with, given its current mode.
    pub fn target_mode(&self, current: u32) -> Option<u32> {
        match (self.mode, self.setgid) {
            (Some(mode), true) => Some(mode | SETGID_BIT),
            (Some(mode), false) => Some(mode),
            (None, true) => Some((current & 0o7777) | SETGID_BIT),
            (None, false) => None,
        }
    }

    fn is_dir_satisfied(&self, path: &Path, ids: Option<(u32, u32)>) -> Result<bool> {
        let meta = match fs::metadata(path) {
            Ok(m) if m.is_dir() => m,
            _ => return Ok(false),
        };

        let current = meta.permissions().mode() & 0o7777;
        if let Some(target) = self.target_mode(current) {
            if current != target {
                return Ok(false);
            }
        }

        if self.ownership.is_some() {
            match ids {
                Some((uid, gid)) => Ok(meta.uid() == uid && meta.gid() == gid),
                None => Ok(false),
            }
        } else {
            Ok(true)
        }
    }

    fn provision(&self, path: &Path, ctx: &StepContext<'_>) -> Result<()> {
        if ctx.dry_run() {
            info!("[DRY RUN] Would create directory: {}", path.display());
        } else {
            fs::create_dir_all(path).at_path(path)?;
            if !path.is_dir() {
                return Err(InstallerError::precondition(format!(
                    "{} exists and is not a directory",
                    path.display()
                )));
            }
            debug!("Directory ready: {}", path.display());
        }

        if let Some(owner) = &self.ownership {
            run_checked(ctx.runner, "chown", &chown_args(owner, path, self.recursive))?;
        }

        let current = fs::metadata(path)
            .map(|m| m.permissions().mode())
            .unwrap_or(0);
        if let Some(target) = self.target_mode(current) {
            if ctx.dry_run() {
                info!("[DRY RUN] Would chmod {:o} {}", target, path.display());
            } else {
                fs::set_permissions(path, fs::Permissions::from_mode(target)).at_path(path)?;
                debug!("Mode {:o} applied to {}", target, path.display());
            }
        }

        Ok(())
    }
}

impl Step for DirectoryStep {
    fn label(&self) -> &str {
        &self.label
    }

    /// Recursive ownership cannot be verified from the top directory alone,
    /// so such steps always run.
    fn is_satisfied(&self, _ctx: &StepContext<'_>) -> Result<bool> {
        if self.recursive {
            return Ok(false);
        }
        let ids = match &self.ownership {
            Some(owner) => owner.resolve()?,
            None => None,
        };
        for path in &self.paths {
            if !self.is_dir_satisfied(path, ids)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn apply(&self, ctx: &StepContext<'_>) -> Result<()> {
        for path in &self.paths {
            self.provision(path, ctx)?;
        }
        Ok(())
    }
}

/// Argument vector for `chown [-R] user:group path`.
pub fn chown_args(owner: &Ownership, path: &Path, recursive: bool) -> Vec<String> {
    let mut out = if recursive { args(["-R"]) } else { Vec::new() };
    out.push(owner.spec());
    out.push(path.display().to_string());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::spy::SpyRunner;
    use tempfile::TempDir;

    fn mode_of(path: &Path) -> u32 {
        fs::metadata(path).unwrap().permissions().mode() & 0o7777
    }

    #[test]
    fn test_target_mode() {
        let step = DirectoryStep::new("d", ["/x"]).mode(0o770).setgid();
        assert_eq!(step.target_mode(0o755), Some(0o2770));

        let step = DirectoryStep::new("d", ["/x"]).setgid();
        assert_eq!(step.target_mode(0o40750), Some(0o2750));

        let step = DirectoryStep::new("d", ["/x"]);
        assert_eq!(step.target_mode(0o755), None);
    }

    #[test]
    fn test_creates_nested_directories_with_mode() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("etc/named/zones");
        let b = dir.path().join("var/log");
        let step = DirectoryStep::new("dirs", [&a, &b]).mode(0o750).setgid();

        let runner = SpyRunner::new();
        let ctx = StepContext::new(&runner);
        assert!(!step.is_satisfied(&ctx).unwrap());
        step.apply(&ctx).unwrap();

        assert!(a.is_dir() && b.is_dir());
        assert_eq!(mode_of(&a), 0o2750);
        assert!(step.is_satisfied(&ctx).unwrap());
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_apply_twice_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("octodns");
        let step = DirectoryStep::new("octodns", [&path]).mode(0o775);
        let runner = SpyRunner::new();
        let ctx = StepContext::new(&runner);

        step.apply(&ctx).unwrap();
        fs::write(path.join("keep"), "x").unwrap();
        step.apply(&ctx).unwrap();

        assert_eq!(mode_of(&path), 0o775);
        assert_eq!(fs::read_to_string(path.join("keep")).unwrap(), "x");
    }

    #[test]
    fn test_ownership_goes_through_runner() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("zones");
        let step = DirectoryStep::new("zones", [&path])
            .owned_by(Ownership::new("named", "named"))
            .recursive();

        let runner = SpyRunner::new();
        step.apply(&StepContext::new(&runner)).unwrap();
        assert_eq!(
            runner.calls(),
            vec![format!("chown -R named:named {}", path.display())]
        );
    }

    #[test]
    fn test_chown_failure_aborts_batch() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        let step = DirectoryStep::new("batch", [&first, &second])
            .owned_by(Ownership::new("nobody-here", "nogroup-here"));

        let runner = SpyRunner::failing_on(&["chown"]);
        let err = step.apply(&StepContext::new(&runner)).unwrap_err();
        assert!(err.to_string().contains("chown"));
        assert!(first.is_dir());
        assert!(!second.exists());
    }

    #[test]
    fn test_file_in_the_way_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("not-a-dir");
        fs::write(&path, "").unwrap();
        let runner = SpyRunner::new();
        let step = DirectoryStep::new("d", [&path]);
        assert!(step.apply(&StepContext::new(&runner)).is_err());
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("new");
        let runner = SpyRunner {
            dry_run: true,
            ..SpyRunner::new()
        };
        DirectoryStep::new("d", [&path])
            .mode(0o700)
            .apply(&StepContext::new(&runner))
            .unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_chown_args() {
        let owner = Ownership::new("netbox", "named");
        assert_eq!(
            chown_args(&owner, Path::new("/etc/octodns"), false),
            vec!["netbox:named", "/etc/octodns"]
        );
    }
}

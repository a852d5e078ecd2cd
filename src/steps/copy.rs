//! File and tree copies with backups.
//!
//! Every destination file that already exists is backed up before it is
//! replaced. Destinations whose content already matches are left alone, so
//! re-running a copy produces no new backups. Tree copies keep each file's
//! relative path under the backup directory.

use super::files::{copy_with_backup, file_mode, write_with_backup};
use crate::error::{InstallerError, IoResultExt, Result};
use crate::sequence::{Step, StepContext};
use crate::template;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Render one file of a copied tree as a template instead of copying it verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRule {
    /// Bare file name to match, at any depth.
    pub file_name: String,
    pub values: HashMap<String, String>,
}

impl RenderRule {
    pub fn new(file_name: impl Into<String>, values: HashMap<String, String>) -> Self {
        Self {
            file_name: file_name.into(),
            values,
        }
    }

    fn matches(&self, path: &Path) -> bool {
        path.file_name().is_some_and(|n| n == self.file_name.as_str())
    }
}

/// Every regular file under `root`, depth first, in name order.
pub fn walk_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries: Vec<PathBuf> = fs::read_dir(&dir)
            .at_path(&dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<_>>()
            .at_path(&dir)?;
        entries.sort();

        for path in entries.into_iter().rev() {
            if path.is_dir() {
                pending.push(path);
            } else {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Copy the contents of one directory tree into another.
#[derive(Debug, Clone)]
pub struct CopyTreeStep {
    label: String,
    source: PathBuf,
    dest: PathBuf,
    backup_dir: Option<PathBuf>,
    render: Option<RenderRule>,
}

impl CopyTreeStep {
    pub fn new(label: impl Into<String>, source: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            source: source.into(),
            dest: dest.into(),
            backup_dir: None,
            render: None,
        }
    }

    pub fn backup_to(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = Some(dir.into());
        self
    }

    pub fn render(mut self, rule: RenderRule) -> Self {
        self.render = Some(rule);
        self
    }

    fn relative<'a>(&self, file: &'a Path) -> Result<&'a Path> {
        file.strip_prefix(&self.source).map_err(|_| {
            InstallerError::precondition(format!(
                "{} is outside {}",
                file.display(),
                self.source.display()
            ))
        })
    }

    /// Backup directory for `relative`, mirroring its parent directories.
    fn backup_dir_for(&self, relative: &Path) -> Option<PathBuf> {
        let dir = self.backup_dir.as_ref()?;
        Some(match relative.parent() {
            Some(parent) => dir.join(parent),
            None => dir.clone(),
        })
    }
}

impl Step for CopyTreeStep {
    fn label(&self) -> &str {
        &self.label
    }

    fn apply(&self, ctx: &StepContext<'_>) -> Result<()> {
        if !self.source.is_dir() {
            return Err(InstallerError::precondition(format!(
                "configuration directory {} does not exist",
                self.source.display()
            )));
        }

        let files = walk_files(&self.source)?;
        let mut changed = 0usize;

        for file in &files {
            let relative = self.relative(file)?;
            let dest = self.dest.join(relative);
            let backup_dir = self.backup_dir_for(relative);
            let rule = self.render.as_ref().filter(|r| r.matches(file));

            if ctx.dry_run() {
                info!("[DRY RUN] Would copy {} -> {}", file.display(), dest.display());
                continue;
            }

            let wrote = match rule {
                Some(rule) => {
                    let source = fs::read_to_string(file).at_path(file)?;
                    let rendered = template::render(&source, &rule.values)?;
                    write_with_backup(
                        &dest,
                        rendered.as_bytes(),
                        backup_dir.as_deref(),
                        file_mode(file)?,
                    )?
                }
                None => copy_with_backup(file, &dest, backup_dir.as_deref())?,
            };
            if wrote {
                changed += 1;
            }
        }

        info!(
            "Copied {} of {} file(s) from {} to {}",
            changed,
            files.len(),
            self.source.display(),
            self.dest.display()
        );
        Ok(())
    }
}

/// Copy the files of one directory whose names start with a prefix.
///
/// Finding no matching files is not an error.
#[derive(Debug, Clone)]
pub struct CopyMatchingStep {
    label: String,
    source_dir: PathBuf,
    prefix: String,
    dest_dir: PathBuf,
    backup_dir: Option<PathBuf>,
}

impl CopyMatchingStep {
    pub fn new(
        label: impl Into<String>,
        source_dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        dest_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            label: label.into(),
            source_dir: source_dir.into(),
            prefix: prefix.into(),
            dest_dir: dest_dir.into(),
            backup_dir: None,
        }
    }

    pub fn backup_to(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = Some(dir.into());
        self
    }

    fn matching_files(&self) -> Result<Vec<PathBuf>> {
        if !self.source_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.source_dir).at_path(&self.source_dir)? {
            let path = entry.at_path(&self.source_dir)?.path();
            let matches = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&self.prefix));
            if matches && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

impl Step for CopyMatchingStep {
    fn label(&self) -> &str {
        &self.label
    }

    fn apply(&self, ctx: &StepContext<'_>) -> Result<()> {
        let files = self.matching_files()?;
        if files.is_empty() {
            warn!(
                "No {}* files found in {}",
                self.prefix,
                self.source_dir.display()
            );
            return Ok(());
        }

        for file in files {
            let Some(name) = file.file_name() else {
                continue;
            };
            let dest = self.dest_dir.join(name);
            if ctx.dry_run() {
                info!("[DRY RUN] Would copy {} -> {}", file.display(), dest.display());
                continue;
            }
            if copy_with_backup(&file, &dest, self.backup_dir.as_deref())? {
                info!("Copied {} -> {}", file.display(), dest.display());
            }
        }
        Ok(())
    }
}

/// Copy a single file.
#[derive(Debug, Clone)]
pub struct CopyFileStep {
    label: String,
    source: PathBuf,
    dest: PathBuf,
    keep_existing: bool,
    backup_dir: Option<PathBuf>,
}

impl CopyFileStep {
    pub fn new(label: impl Into<String>, source: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            source: source.into(),
            dest: dest.into(),
            keep_existing: false,
            backup_dir: None,
        }
    }

    /// Treat an existing destination as already satisfied.
    pub fn keep_existing(mut self) -> Self {
        self.keep_existing = true;
        self
    }

    pub fn backup_to(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = Some(dir.into());
        self
    }
}

impl Step for CopyFileStep {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_satisfied(&self, _ctx: &StepContext<'_>) -> Result<bool> {
        Ok(self.keep_existing && self.dest.exists())
    }

    fn apply(&self, ctx: &StepContext<'_>) -> Result<()> {
        if !self.source.is_file() {
            if ctx.dry_run() {
                info!(
                    "[DRY RUN] Would copy {} -> {} (source not present yet)",
                    self.source.display(),
                    self.dest.display()
                );
                return Ok(());
            }
            return Err(InstallerError::precondition(format!(
                "{} does not exist",
                self.source.display()
            )));
        }
        if ctx.dry_run() {
            info!(
                "[DRY RUN] Would copy {} -> {}",
                self.source.display(),
                self.dest.display()
            );
            return Ok(());
        }
        copy_with_backup(&self.source, &self.dest, self.backup_dir.as_deref())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::spy::SpyRunner;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_walk_files_is_recursive_and_sorted() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("b.conf"), "");
        write(&dir.path().join("a/zones/db.example"), "");
        write(&dir.path().join("a/named.conf"), "");

        let files: Vec<_> = walk_files(dir.path())
            .unwrap()
            .into_iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            files,
            vec![
                PathBuf::from("a/named.conf"),
                PathBuf::from("a/zones/db.example"),
                PathBuf::from("b.conf"),
            ]
        );
    }

    #[test]
    fn test_tree_copy_renders_acl_and_backs_up() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("netbox-primary");
        let dest = dir.path().join("etc");
        let backups = dir.path().join("etc/backups");
        write(&src.join("named/named.conf.acl"), "acl trusted { $ip; };\n");
        write(&src.join("named/named.conf.options"), "options {};\n");
        write(&dest.join("named/named.conf.options"), "old options\n");

        let values = HashMap::from([("ip".to_string(), "10.1.2.3".to_string())]);
        let step = CopyTreeStep::new("tree", &src, &dest)
            .backup_to(&backups)
            .render(RenderRule::new("named.conf.acl", values));

        let runner = SpyRunner::new();
        step.apply(&StepContext::new(&runner)).unwrap();

        assert_eq!(
            fs::read_to_string(dest.join("named/named.conf.acl")).unwrap(),
            "acl trusted { 10.1.2.3; };\n"
        );
        assert_eq!(
            fs::read_to_string(dest.join("named/named.conf.options")).unwrap(),
            "options {};\n"
        );
        let backed_up: Vec<_> = fs::read_dir(&backups).unwrap().collect();
        assert_eq!(backed_up.len(), 1);

        // second run changes nothing
        step.apply(&StepContext::new(&runner)).unwrap();
        assert_eq!(fs::read_dir(&backups).unwrap().count(), 1);
    }

    #[test]
    fn test_rendered_file_takes_source_mode() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("etc");
        let acl = src.join("named/named.conf.acl");
        write(&acl, "acl trusted { $ip; };\n");
        fs::set_permissions(&acl, fs::Permissions::from_mode(0o644)).unwrap();

        let values = HashMap::from([("ip".to_string(), "10.1.2.3".to_string())]);
        let runner = SpyRunner::new();
        CopyTreeStep::new("tree", &src, &dest)
            .render(RenderRule::new("named.conf.acl", values))
            .apply(&StepContext::new(&runner))
            .unwrap();

        let mode = fs::metadata(dest.join("named/named.conf.acl"))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn test_tree_copy_backups_keep_relative_paths() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("etc");
        let backups = dir.path().join("backups");
        write(&src.join("x"), "new top\n");
        write(&src.join("named/zones/x"), "new zone\n");
        write(&dest.join("x"), "old top\n");
        write(&dest.join("named/zones/x"), "old zone\n");

        let runner = SpyRunner::new();
        CopyTreeStep::new("tree", &src, &dest)
            .backup_to(&backups)
            .apply(&StepContext::new(&runner))
            .unwrap();

        let only_entry = |dir: PathBuf| {
            let entries: Vec<_> = fs::read_dir(dir).unwrap().map(|e| e.unwrap().path()).collect();
            assert_eq!(entries.len(), 1);
            fs::read_to_string(&entries[0]).unwrap()
        };
        assert_eq!(only_entry(backups.join("named/zones")), "old zone\n");
        let top: Vec<_> = fs::read_dir(&backups)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.is_file())
            .collect();
        assert_eq!(top.len(), 1);
        assert_eq!(fs::read_to_string(&top[0]).unwrap(), "old top\n");
    }

    #[test]
    fn test_tree_copy_missing_source_is_precondition() {
        let dir = TempDir::new().unwrap();
        let step = CopyTreeStep::new("tree", dir.path().join("9.9.9.9"), dir.path().join("etc"));
        let runner = SpyRunner::new();
        let err = step.apply(&StepContext::new(&runner)).unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn test_render_failure_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("dest");
        write(&src.join("named.conf.acl"), "acl { $ip; $other; };\n");

        let values = HashMap::from([("ip".to_string(), "10.0.0.1".to_string())]);
        let step = CopyTreeStep::new("tree", &src, &dest).render(RenderRule::new("named.conf.acl", values));
        let runner = SpyRunner::new();
        assert!(step.apply(&StepContext::new(&runner)).is_err());
        assert!(!dest.join("named.conf.acl").exists());
    }

    #[test]
    fn test_matching_copy_filters_prefix() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("var-named");
        let dest = dir.path().join("chroot");
        write(&src.join("named.ca"), "roots");
        write(&src.join("named.localhost"), "local");
        write(&src.join("data/cache"), "x");
        write(&src.join("other.zone"), "zone");

        let runner = SpyRunner::new();
        CopyMatchingStep::new("named files", &src, "named.", &dest)
            .apply(&StepContext::new(&runner))
            .unwrap();

        let mut names: Vec<_> = fs::read_dir(&dest)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, vec!["named.ca", "named.localhost"]);
    }

    #[test]
    fn test_matching_copy_with_no_files_is_ok() {
        let dir = TempDir::new().unwrap();
        let runner = SpyRunner::new();
        let step = CopyMatchingStep::new("named files", dir.path().join("missing"), "named.", dir.path());
        assert!(step.apply(&StepContext::new(&runner)).is_ok());
    }

    #[test]
    fn test_copy_file_missing_source_in_dry_run_is_ok() {
        let dir = TempDir::new().unwrap();
        let step = CopyFileStep::new(
            "copy",
            dir.path().join("global_variables.example.py"),
            dir.path().join("global_variables.py"),
        );
        let runner = SpyRunner {
            dry_run: true,
            ..SpyRunner::new()
        };
        assert!(step.apply(&StepContext::new(&runner)).is_ok());
        assert!(!dir.path().join("global_variables.py").exists());

        let live = SpyRunner::new();
        assert!(step.apply(&StepContext::new(&live)).unwrap_err().is_precondition());
    }

    #[test]
    fn test_copy_file_keep_existing() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("global_variables.example.py");
        let dest = dir.path().join("global_variables.py");
        write(&src, "NETBOX_TOKEN = ''\n");

        let step = CopyFileStep::new("copy", &src, &dest).keep_existing();
        let runner = SpyRunner::new();
        let ctx = StepContext::new(&runner);
        assert!(!step.is_satisfied(&ctx).unwrap());
        step.apply(&ctx).unwrap();
        assert!(step.is_satisfied(&ctx).unwrap());
    }
}

//! Render a template to a file.

use super::files::{DEFAULT_FILE_MODE, write_with_backup};
use crate::error::Result;
use crate::sequence::{Step, StepContext};
use crate::template::Template;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// Render `template` with `values` and write it to `dest`.
///
/// Rendering happens before anything is touched; a missing placeholder
/// value leaves `dest` as it was. A destination that already holds the
/// rendered text counts as satisfied.
#[derive(Debug, Clone)]
pub struct TemplateFileStep {
    label: String,
    dest: PathBuf,
    template: String,
    values: HashMap<String, String>,
    backup_dir: Option<PathBuf>,
}

impl TemplateFileStep {
    pub fn new(
        label: impl Into<String>,
        dest: impl Into<PathBuf>,
        template: impl Into<String>,
        values: HashMap<String, String>,
    ) -> Self {
        Self {
            label: label.into(),
            dest: dest.into(),
            template: template.into(),
            values,
            backup_dir: None,
        }
    }

    pub fn backup_to(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = Some(dir.into());
        self
    }

    pub fn rendered(&self) -> Result<String> {
        Template::parse(&self.template)?.render(&self.values)
    }
}

impl Step for TemplateFileStep {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_satisfied(&self, _ctx: &StepContext<'_>) -> Result<bool> {
        let rendered = self.rendered()?;
        Ok(fs::read_to_string(&self.dest).is_ok_and(|current| current == rendered))
    }

    fn apply(&self, ctx: &StepContext<'_>) -> Result<()> {
        let rendered = self.rendered()?;
        if ctx.dry_run() {
            info!("[DRY RUN] Would write {}", self.dest.display());
            return Ok(());
        }
        if write_with_backup(
            &self.dest,
            rendered.as_bytes(),
            self.backup_dir.as_deref(),
            DEFAULT_FILE_MODE,
        )? {
            info!("Wrote {}", self.dest.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::spy::SpyRunner;
    use tempfile::TempDir;

    fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_writes_rendered_template() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("octodns/config.yaml");
        let step = TemplateFileStep::new(
            "config",
            &dest,
            "url: $server_url\nhost: ${server_ip}\n",
            values(&[("server_url", "https://netbox"), ("server_ip", "10.0.0.1")]),
        );
        let runner = SpyRunner::new();
        let ctx = StepContext::new(&runner);

        assert!(!step.is_satisfied(&ctx).unwrap());
        step.apply(&ctx).unwrap();
        assert_eq!(
            fs::read_to_string(&dest).unwrap(),
            "url: https://netbox\nhost: 10.0.0.1\n"
        );
        assert!(step.is_satisfied(&ctx).unwrap());
    }

    #[test]
    fn test_missing_value_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("config.yaml");
        fs::write(&dest, "previous\n").unwrap();

        let step = TemplateFileStep::new(
            "config",
            &dest,
            "token: $server_api_key\n",
            values(&[("server_url", "https://netbox")]),
        );
        let runner = SpyRunner::new();
        let err = step.apply(&StepContext::new(&runner)).unwrap_err();
        assert!(err.to_string().contains("server_api_key"));
        assert_eq!(fs::read_to_string(&dest).unwrap(), "previous\n");
    }

    #[test]
    fn test_existing_file_is_backed_up() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("config.yaml");
        let backups = dir.path().join("backups");
        fs::write(&dest, "old\n").unwrap();

        let runner = SpyRunner::new();
        TemplateFileStep::new("config", &dest, "new\n", HashMap::new())
            .backup_to(&backups)
            .apply(&StepContext::new(&runner))
            .unwrap();

        let saved: Vec<_> = fs::read_dir(&backups)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(saved.len(), 1);
        assert_eq!(fs::read_to_string(&saved[0]).unwrap(), "old\n");
        let name = saved[0].file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("config.yaml."));
    }
}

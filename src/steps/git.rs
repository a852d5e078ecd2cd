//! Repository checkout

use crate::command_runner::{args, run_checked};
use crate::error::{InstallerError, Result};
use crate::sequence::{Step, StepContext};
use std::path::PathBuf;

/// `git clone <url> <target>`, skipped when `target` already exists.
///
/// An existing checkout is never pulled or reset.
#[derive(Debug, Clone)]
pub struct GitCloneStep {
    label: String,
    url: String,
    target: PathBuf,
}

impl GitCloneStep {
    pub fn new(url: impl Into<String>, target: impl Into<PathBuf>) -> Self {
        let url = url.into();
        Self {
            label: format!("Clone {}", url),
            url,
            target: target.into(),
        }
    }

    pub fn target(&self) -> &PathBuf {
        &self.target
    }
}

impl Step for GitCloneStep {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_satisfied(&self, _ctx: &StepContext<'_>) -> Result<bool> {
        Ok(self.target.exists())
    }

    fn apply(&self, ctx: &StepContext<'_>) -> Result<()> {
        let parent = self.target.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(parent) = parent {
            if !parent.is_dir() {
                return Err(InstallerError::precondition(format!(
                    "{} does not exist",
                    parent.display()
                )));
            }
        }
        let clone = args(["clone".to_string(), self.url.clone(), self.target.display().to_string()]);
        run_checked(ctx.runner, "git", &clone)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::spy::SpyRunner;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_clone_when_missing() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("netbox-ipdns");
        let step = GitCloneStep::new("https://example.com/netbox-ipdns.git", &target);
        let runner = SpyRunner::new();
        let ctx = StepContext::new(&runner);

        assert!(!step.is_satisfied(&ctx).unwrap());
        step.apply(&ctx).unwrap();
        assert_eq!(
            runner.calls(),
            vec![format!(
                "git clone https://example.com/netbox-ipdns.git {}",
                target.display()
            )]
        );
    }

    #[test]
    fn test_existing_checkout_is_satisfied() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("netbox-ipdns");
        fs::create_dir(&target).unwrap();
        let runner = SpyRunner::new();
        let step = GitCloneStep::new("https://example.com/netbox-ipdns.git", &target);
        assert!(step.is_satisfied(&StepContext::new(&runner)).unwrap());
    }

    #[test]
    fn test_missing_parent_is_precondition() {
        let dir = TempDir::new().unwrap();
        let runner = SpyRunner::new();
        let step = GitCloneStep::new("https://example.com/x.git", dir.path().join("no/such/x"));
        let err = step.apply(&StepContext::new(&runner)).unwrap_err();
        assert!(err.is_precondition());
        assert!(runner.calls().is_empty());
    }
}

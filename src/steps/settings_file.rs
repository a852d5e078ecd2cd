//! Structured edits of Python settings modules.
//!
//! The file is parsed into a [`SettingsDocument`], every edit is applied in
//! memory, and the result is written back only if it differs from what is
//! on disk. A failing edit leaves the file untouched.

use super::files::{DEFAULT_FILE_MODE, write_with_backup};
use crate::error::{InstallerError, IoResultExt, Result};
use crate::sequence::{Step, StepContext};
use crate::settings::{Literal, SettingsDocument};
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// One change to a settings document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsEdit {
    /// Replace an existing top-level assignment; missing names are an error.
    Set { name: String, value: Literal },
    /// Replace or append a top-level assignment.
    Upsert { name: String, value: Literal },
    /// Replace a value nested inside dict literals.
    SetPath { path: Vec<String>, value: Literal },
    /// Add an item to a list assignment if not already present.
    ListAddUnique { name: String, item: Literal },
    /// Replace the literal argument of a call inside a function body.
    CallArgument { call: String, value: Literal },
}

impl SettingsEdit {
    pub fn set(name: impl Into<String>, value: Literal) -> Self {
        Self::Set {
            name: name.into(),
            value,
        }
    }

    pub fn upsert(name: impl Into<String>, value: Literal) -> Self {
        Self::Upsert {
            name: name.into(),
            value,
        }
    }

    pub fn set_path<I, S>(path: I, value: Literal) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::SetPath {
            path: path.into_iter().map(Into::into).collect(),
            value,
        }
    }

    pub fn list_add_unique(name: impl Into<String>, item: Literal) -> Self {
        Self::ListAddUnique {
            name: name.into(),
            item,
        }
    }

    /// `call` is the source text just before the argument, e.g. `f(name=`.
    pub fn call_argument(call: impl Into<String>, value: Literal) -> Self {
        Self::CallArgument {
            call: call.into(),
            value,
        }
    }

    pub fn apply(&self, doc: &mut SettingsDocument) -> Result<()> {
        match self {
            Self::Set { name, value } => doc.set(name, value.clone()),
            Self::Upsert { name, value } => {
                doc.upsert(name, value.clone());
                Ok(())
            }
            Self::SetPath { path, value } => {
                let keys: Vec<&str> = path.iter().map(String::as_str).collect();
                doc.set_path(&keys, value.clone())
            }
            Self::ListAddUnique { name, item } => doc.list_add_unique(name, item.clone()).map(|_| ()),
            Self::CallArgument { call, value } => {
                doc.set_call_argument(call, value.clone()).map(|_| ())
            }
        }
    }
}

/// Apply a list of [`SettingsEdit`]s to one file.
#[derive(Debug, Clone)]
pub struct SettingsFileStep {
    label: String,
    path: PathBuf,
    edits: Vec<SettingsEdit>,
    backup_dir: Option<PathBuf>,
}

impl SettingsFileStep {
    pub fn new(label: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            path: path.into(),
            edits: Vec::new(),
            backup_dir: None,
        }
    }

    pub fn edit(mut self, edit: SettingsEdit) -> Self {
        self.edits.push(edit);
        self
    }

    pub fn backup_to(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = Some(dir.into());
        self
    }

    pub fn edits(&self) -> &[SettingsEdit] {
        &self.edits
    }

    /// Current file text and the text after all edits.
    fn rewrite(&self) -> Result<(String, String)> {
        if !self.path.is_file() {
            return Err(InstallerError::precondition(format!(
                "{} does not exist",
                self.path.display()
            )));
        }
        let original = fs::read_to_string(&self.path).at_path(&self.path)?;
        let mut doc = SettingsDocument::parse(&original)?;
        for edit in &self.edits {
            edit.apply(&mut doc).map_err(|e| {
                InstallerError::settings(format!("{}: {}", self.path.display(), e))
            })?;
        }
        Ok((original, doc.render()))
    }
}

impl Step for SettingsFileStep {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_satisfied(&self, _ctx: &StepContext<'_>) -> Result<bool> {
        if !self.path.is_file() {
            return Ok(false);
        }
        let (original, updated) = self.rewrite()?;
        Ok(original == updated)
    }

    fn apply(&self, ctx: &StepContext<'_>) -> Result<()> {
        if ctx.dry_run() && !self.path.is_file() {
            info!(
                "[DRY RUN] Would apply {} edit(s) to {} (not present yet)",
                self.edits.len(),
                self.path.display()
            );
            return Ok(());
        }
        let (original, updated) = self.rewrite()?;
        if original == updated {
            return Ok(());
        }
        if ctx.dry_run() {
            info!(
                "[DRY RUN] Would apply {} edit(s) to {}",
                self.edits.len(),
                self.path.display()
            );
            return Ok(());
        }
        write_with_backup(
            &self.path,
            updated.as_bytes(),
            self.backup_dir.as_deref(),
            DEFAULT_FILE_MODE,
        )?;
        info!("Updated {}", self.path.display());
        Ok(())
    }
}

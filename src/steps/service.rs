//! systemd unit control

use super::command::CommandStep;
use crate::command_runner::{args, run_checked};
use crate::error::Result;
use crate::sequence::{Step, StepContext};
use crate::types::ServiceAction;

/// `systemctl <action> <unit>`.
///
/// Enable and start are skipped when `is-enabled` / `is-active` already
/// succeed; restart and reload always run.
#[derive(Debug, Clone)]
pub struct ServiceStep {
    label: String,
    unit: String,
    action: ServiceAction,
}

impl ServiceStep {
    pub fn new(action: ServiceAction, unit: impl Into<String>) -> Self {
        let unit = unit.into();
        Self {
            label: format!("systemctl {} {}", action, unit),
            unit,
            action,
        }
    }

    pub fn enable(unit: impl Into<String>) -> Self {
        Self::new(ServiceAction::Enable, unit)
    }

    pub fn start(unit: impl Into<String>) -> Self {
        Self::new(ServiceAction::Start, unit)
    }

    pub fn restart(unit: impl Into<String>) -> Self {
        Self::new(ServiceAction::Restart, unit)
    }

    pub fn reload(unit: impl Into<String>) -> Self {
        Self::new(ServiceAction::Reload, unit)
    }
}

impl Step for ServiceStep {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_satisfied(&self, ctx: &StepContext<'_>) -> Result<bool> {
        match self.action.state_query() {
            Some(query) => Ok(ctx
                .runner
                .query("systemctl", &args([query, "--quiet", self.unit.as_str()]))?
                .success),
            None => Ok(false),
        }
    }

    fn apply(&self, ctx: &StepContext<'_>) -> Result<()> {
        let action = self.action.to_string();
        run_checked(ctx.runner, "systemctl", &args([action.as_str(), self.unit.as_str()]))?;
        Ok(())
    }
}

/// `systemctl daemon-reload`
pub fn daemon_reload() -> CommandStep {
    CommandStep::new("systemctl daemon-reload", "systemctl", ["daemon-reload"])
}

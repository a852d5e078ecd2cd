//! Steps that run a single external command.

use crate::command_runner::{CommandRunner, args, format_command, run_checked};
use crate::error::Result;
use crate::sequence::{FailurePolicy, Step, StepContext};

/// How a [`CommandStep`] decides its work is already done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SatisfiedWhen {
    /// Never; the command always runs.
    Never,
    /// The query command exits 0.
    Succeeds { program: String, args: Vec<String> },
    /// The query command exits 0 and one whitespace-separated word of its
    /// stdout equals `word`.
    OutputHasWord {
        program: String,
        args: Vec<String>,
        word: String,
    },
}

impl SatisfiedWhen {
    fn evaluate(&self, runner: &dyn CommandRunner) -> Result<bool> {
        match self {
            Self::Never => Ok(false),
            Self::Succeeds { program, args } => Ok(runner.query(program, args)?.success),
            Self::OutputHasWord {
                program,
                args,
                word,
            } => {
                let out = runner.query(program, args)?;
                Ok(out.success && out.stdout.split_whitespace().any(|w| w == word))
            }
        }
    }
}

/// Runs `program args...`; a non-zero exit fails the step.
#[derive(Debug, Clone)]
pub struct CommandStep {
    label: String,
    program: String,
    args: Vec<String>,
    satisfied: SatisfiedWhen,
    policy: FailurePolicy,
}

impl CommandStep {
    pub fn new<I, S>(label: impl Into<String>, program: impl Into<String>, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            label: label.into(),
            program: program.into(),
            args: args(arguments),
            satisfied: SatisfiedWhen::Never,
            policy: FailurePolicy::Abort,
        }
    }

    pub fn satisfied_when(mut self, check: SatisfiedWhen) -> Self {
        self.satisfied = check;
        self
    }

    pub fn best_effort(mut self) -> Self {
        self.policy = FailurePolicy::BestEffort;
        self
    }

    pub fn command_line(&self) -> String {
        format_command(&self.program, &self.args)
    }
}

impl Step for CommandStep {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_satisfied(&self, ctx: &StepContext<'_>) -> Result<bool> {
        self.satisfied.evaluate(ctx.runner)
    }

    fn apply(&self, ctx: &StepContext<'_>) -> Result<()> {
        run_checked(ctx.runner, &self.program, &self.args)?;
        Ok(())
    }

    fn policy(&self) -> FailurePolicy {
        self.policy
    }
}

/// `usermod -a -G <group> <user>`, skipped when `id -nG <user>` lists the group.
///
/// Best effort: a missing user only produces a warning.
pub fn add_user_to_group(user: &str, group: &str) -> CommandStep {
    CommandStep::new(
        format!("Add user {} to group {}", user, group),
        "usermod",
        ["-a", "-G", group, user],
    )
    .satisfied_when(SatisfiedWhen::OutputHasWord {
        program: "id".to_string(),
        args: args(["-nG", user]),
        word: group.to_string(),
    })
    .best_effort()
}

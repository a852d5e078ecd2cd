//! Installation Sequencer
//!
//! A [`Sequence`] is an ordered list of [`Step`]s. Running it is the only way
//! the installer mutates the host.
//!
//! # Rules
//!
//! - **Declared order**: steps run exactly in the order they were added
//! - **Idempotency first**: a step whose check reports "already satisfied"
//!   is recorded as such and its action never runs
//! - **Short-circuit**: the first failing step stops the sequence; later
//!   steps are reported as not run
//! - **No retries**: a transient failure is handled by re-running the whole
//!   sequence
//! - **Best effort**: steps with [`FailurePolicy::BestEffort`] log a warning
//!   on failure and the sequence continues
//!
//! # Step Flow
//!
//! ```text
//! is_satisfied? ──yes──▶ AlreadySatisfied ──▶ next step
//!      │ no
//!      ▼
//!    apply ──ok──▶ Completed ──▶ next step
//!      │ err
//!      ▼
//!  policy == BestEffort ──▶ Warned ──▶ next step
//!      │ Abort
//!      ▼
//!   Failed (stop)
//! ```

use crate::command_runner::CommandRunner;
use crate::error::Result;
use std::fmt;
use tracing::{error, info, warn};

const BANNER: &str = "============================================================";

/// Everything a step may touch while running.
pub struct StepContext<'a> {
    /// Executes external programs.
    pub runner: &'a dyn CommandRunner,
}

impl<'a> StepContext<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Whether filesystem mutations should be logged instead of performed.
    pub fn dry_run(&self) -> bool {
        self.runner.is_dry_run()
    }
}

/// What happens to the sequence when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop the sequence and report failure.
    #[default]
    Abort,
    /// Log a warning and continue with the next step.
    BestEffort,
}

/// A single unit of installation work.
pub trait Step {
    /// Human-readable label used in logs and outcomes.
    fn label(&self) -> &str;

    /// Returns `Ok(true)` when the step's effect is already in place.
    fn is_satisfied(&self, _ctx: &StepContext<'_>) -> Result<bool> {
        Ok(false)
    }

    /// Perform the step.
    fn apply(&self, ctx: &StepContext<'_>) -> Result<()>;

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::Abort
    }
}

type CheckFn = Box<dyn Fn(&StepContext<'_>) -> Result<bool>>;
type ActionFn = Box<dyn Fn(&StepContext<'_>) -> Result<()>>;

/// A step assembled from closures.
pub struct FnStep {
    label: String,
    check: Option<CheckFn>,
    action: ActionFn,
    policy: FailurePolicy,
}

impl FnStep {
    pub fn new<F>(label: impl Into<String>, action: F) -> Self
    where
        F: Fn(&StepContext<'_>) -> Result<()> + 'static,
    {
        Self {
            label: label.into(),
            check: None,
            action: Box::new(action),
            policy: FailurePolicy::Abort,
        }
    }

    /// Attach an idempotency check.
    pub fn with_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&StepContext<'_>) -> Result<bool> + 'static,
    {
        self.check = Some(Box::new(check));
        self
    }

    pub fn best_effort(mut self) -> Self {
        self.policy = FailurePolicy::BestEffort;
        self
    }
}

impl Step for FnStep {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_satisfied(&self, ctx: &StepContext<'_>) -> Result<bool> {
        match &self.check {
            Some(check) => check(ctx),
            None => Ok(false),
        }
    }

    fn apply(&self, ctx: &StepContext<'_>) -> Result<()> {
        (self.action)(ctx)
    }

    fn policy(&self) -> FailurePolicy {
        self.policy
    }
}

/// Wraps any step so its failure only produces a warning.
pub struct BestEffort<S>(pub S);

impl<S: Step> Step for BestEffort<S> {
    fn label(&self) -> &str {
        self.0.label()
    }

    fn is_satisfied(&self, ctx: &StepContext<'_>) -> Result<bool> {
        self.0.is_satisfied(ctx)
    }

    fn apply(&self, ctx: &StepContext<'_>) -> Result<()> {
        self.0.apply(ctx)
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::BestEffort
    }
}

/// Result of one executed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    /// The action ran and succeeded.
    Completed,
    /// The idempotency check reported the work as already done.
    AlreadySatisfied,
    /// A best-effort step failed; the diagnostic was logged as a warning.
    Warned(String),
    /// The step failed and stopped the sequence.
    Failed(String),
}

impl StepStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// A step label paired with its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub label: String,
    pub status: StepStatus,
}

/// The step that stopped a sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    /// Zero-based position of the step in the sequence.
    pub index: usize,
    pub label: String,
    pub diagnostic: String,
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} ({}) failed: {}", self.index + 1, self.label, self.diagnostic)
    }
}

/// Aggregate outcome of running a sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceOutcome {
    pub name: String,
    /// Records for every step that ran, in order.
    pub records: Vec<StepRecord>,
    /// Labels of steps that never ran because an earlier step failed.
    pub not_run: Vec<String>,
    pub failure: Option<StepFailure>,
}

impl SequenceOutcome {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Warnings raised by best-effort steps.
    pub fn warnings(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter_map(|r| match &r.status {
                StepStatus::Warned(msg) => Some(msg.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn status_of(&self, label: &str) -> Option<&StepStatus> {
        self.records
            .iter()
            .find(|r| r.label == label)
            .map(|r| &r.status)
    }
}

impl fmt::Display for SequenceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.failure {
            None => write!(
                f,
                "{}: {} step(s) succeeded ({} already satisfied, {} warning(s))",
                self.name,
                self.records.len(),
                self.records
                    .iter()
                    .filter(|r| r.status == StepStatus::AlreadySatisfied)
                    .count(),
                self.warnings().len()
            ),
            Some(failure) => write!(
                f,
                "{}: {} ({} step(s) not run)",
                self.name,
                failure,
                self.not_run.len()
            ),
        }
    }
}

/// An ordered list of steps run with short-circuit semantics.
pub struct Sequence {
    name: String,
    steps: Vec<Box<dyn Step>>,
}

impl Sequence {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a step.
    pub fn push<S: Step + 'static>(&mut self, step: S) {
        self.steps.push(Box::new(step));
    }

    /// Builder form of [`Sequence::push`].
    pub fn with_step<S: Step + 'static>(mut self, step: S) -> Self {
        self.push(step);
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.label()).collect()
    }

    /// Run every step in order, stopping at the first failure.
    pub fn run(&self, ctx: &StepContext<'_>) -> SequenceOutcome {
        info!("{}", BANNER);
        info!("Starting {}", self.name);
        info!("{}", BANNER);

        let mut records = Vec::with_capacity(self.steps.len());
        let total = self.steps.len();

        for (index, step) in self.steps.iter().enumerate() {
            let label = step.label().to_string();
            info!("[{}/{}] {}", index + 1, total, label);

            let status = match step.is_satisfied(ctx) {
                Ok(true) => {
                    info!("{}: already satisfied, skipping", label);
                    StepStatus::AlreadySatisfied
                }
                Ok(false) => match step.apply(ctx) {
                    Ok(()) => StepStatus::Completed,
                    Err(e) => Self::classify_failure(step.as_ref(), &label, e.to_string()),
                },
                Err(e) => Self::classify_failure(step.as_ref(), &label, e.to_string()),
            };

            let failed = match &status {
                StepStatus::Failed(diagnostic) => Some(StepFailure {
                    index,
                    label: label.clone(),
                    diagnostic: diagnostic.clone(),
                }),
                _ => None,
            };
            records.push(StepRecord { label, status });

            if let Some(failure) = failed {
                let not_run: Vec<String> = self.steps[index + 1..]
                    .iter()
                    .map(|s| s.label().to_string())
                    .collect();
                error!("{} aborted: {}", self.name, failure);
                return SequenceOutcome {
                    name: self.name.clone(),
                    records,
                    not_run,
                    failure: Some(failure),
                };
            }
        }

        info!("{}", BANNER);
        info!("{} completed successfully", self.name);
        info!("{}", BANNER);

        SequenceOutcome {
            name: self.name.clone(),
            records,
            not_run: Vec::new(),
            failure: None,
        }
    }

    fn classify_failure(step: &dyn Step, label: &str, diagnostic: String) -> StepStatus {
        match step.policy() {
            FailurePolicy::BestEffort => {
                warn!("{} failed (continuing): {}", label, diagnostic);
                StepStatus::Warned(diagnostic)
            }
            FailurePolicy::Abort => {
                error!("{} failed: {}", label, diagnostic);
                StepStatus::Failed(diagnostic)
            }
        }
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("name", &self.name)
            .field("steps", &self.labels())
            .finish()
    }
}

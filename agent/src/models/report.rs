//! Per-step results of best-effort command sequences

use serde::Serialize;

/// Outcome of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "outcome", content = "message")]
pub enum StepOutcome {
    Ok,
    Failed(String),
}

/// A named step and how it went
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepResult {
    pub step: String,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Ordered record of a sequence whose steps run even when earlier ones fail
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StepReport {
    steps: Vec<StepResult>,
}

impl StepReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the result of `step`
    pub fn record<E: std::fmt::Display>(&mut self, step: impl Into<String>, result: Result<(), E>) {
        let outcome = match result {
            Ok(()) => StepOutcome::Ok,
            Err(e) => StepOutcome::Failed(e.to_string()),
        };
        self.steps.push(StepResult {
            step: step.into(),
            outcome,
        });
    }

    pub fn steps(&self) -> &[StepResult] {
        &self.steps
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepResult> {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Failed(_)))
    }

    /// Outcome of the first step named `step`
    pub fn outcome_of(&self, step: &str) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.step == step).map(|s| &s.outcome)
    }
}

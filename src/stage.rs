use std::fmt;

use crate::error::ProvisionError;

/// Named units of the provisioning sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Prober,
    Bundle,
    Env,
    Update,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Prober => "prober",
            Stage::Bundle => "bundle",
            Stage::Env => "env",
            Stage::Update => "update",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome recorded for a single unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Skipped,
    Installed,
    Updated,
    Failed,
}

impl StageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StageStatus::Skipped => "skipped",
            StageStatus::Installed => "installed",
            StageStatus::Updated => "updated",
            StageStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one stage step. Produced per run and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResult {
    pub stage: Stage,
    pub status: StageStatus,
    pub detail: String,
}

impl StageResult {
    pub fn new(stage: Stage, status: StageStatus, detail: impl Into<String>) -> Self {
        Self {
            stage,
            status,
            detail: detail.into(),
        }
    }

    pub fn skipped(stage: Stage, detail: impl Into<String>) -> Self {
        Self::new(stage, StageStatus::Skipped, detail)
    }

    pub fn installed(stage: Stage, detail: impl Into<String>) -> Self {
        Self::new(stage, StageStatus::Installed, detail)
    }

    pub fn updated(stage: Stage, detail: impl Into<String>) -> Self {
        Self::new(stage, StageStatus::Updated, detail)
    }

    pub fn failed(stage: Stage, detail: impl Into<String>) -> Self {
        Self::new(stage, StageStatus::Failed, detail)
    }

    /// Map a provisioning error onto a result; best-effort skips never fail.
    pub fn from_error(stage: Stage, error: &ProvisionError) -> Self {
        if error.is_soft() {
            Self::skipped(stage, error.to_string())
        } else {
            Self::failed(stage, error.to_string())
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status == StageStatus::Failed
    }
}

/// True when any result in the run reported a failure.
pub fn any_failed(results: &[StageResult]) -> bool {
    results.iter().any(StageResult::is_failure)
}

/// Lifecycle of a single stage. `Skipped`, `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    NotStarted,
    Running,
    Skipped,
    Succeeded,
    Failed,
}

impl StageState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StageState::Skipped | StageState::Succeeded | StageState::Failed
        )
    }

    fn can_transition_to(self, next: StageState) -> bool {
        match self {
            StageState::NotStarted => next == StageState::Running,
            StageState::Running => next.is_terminal(),
            _ => false,
        }
    }
}

/// Tracks one stage through its state machine and records its results.
#[derive(Debug)]
pub struct StageRun {
    stage: Stage,
    label: String,
    state: StageState,
}

impl StageRun {
    pub fn new(stage: Stage, label: impl Into<String>) -> Self {
        Self {
            stage,
            label: label.into(),
            state: StageState::NotStarted,
        }
    }

    fn transition(&mut self, next: StageState) -> anyhow::Result<()> {
        if !self.state.can_transition_to(next) {
            anyhow::bail!(
                "stage '{}' cannot move from {:?} to {:?}",
                self.label,
                self.state,
                next
            );
        }
        tracing::debug!(stage = %self.stage, label = %self.label, from = ?self.state, to = ?next, "stage transition");
        self.state = next;
        Ok(())
    }

    pub fn start(&mut self) -> anyhow::Result<()> {
        self.transition(StageState::Running)
    }

    /// Close the stage with the given result, picking the terminal state from its status.
    pub fn finish(&mut self, result: StageResult) -> anyhow::Result<StageResult> {
        let next = match result.status {
            StageStatus::Skipped => StageState::Skipped,
            StageStatus::Installed | StageStatus::Updated => StageState::Succeeded,
            StageStatus::Failed => StageState::Failed,
        };
        self.transition(next)?;
        Ok(result)
    }

    /// Run `body` as this stage. Errors from the body become failed results.
    pub fn run<F>(mut self, body: F) -> StageResult
    where
        F: FnOnce() -> Result<StageResult, ProvisionError>,
    {
        let stage = self.stage;
        if let Err(err) = self.start() {
            return StageResult::failed(stage, err.to_string());
        }
        let result = match body() {
            Ok(result) => result,
            Err(err) => StageResult::from_error(stage, &err),
        };
        match self.finish(result) {
            Ok(result) => result,
            Err(err) => StageResult::failed(stage, err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_machine_allows_only_forward_transitions() {
        let mut run = StageRun::new(Stage::Update, "refresh");
        assert!(run.finish(StageResult::skipped(Stage::Update, "x")).is_err());
        run.start().unwrap();
        assert_eq!(run.state, StageState::Running);
        assert!(run.start().is_err());
        run.finish(StageResult::updated(Stage::Update, "ok")).unwrap();
        assert_eq!(run.state, StageState::Succeeded);
        assert!(run.state.is_terminal());
        assert!(run.finish(StageResult::failed(Stage::Update, "again")).is_err());
    }

    #[test]
    fn run_maps_errors_to_results() {
        let failed = StageRun::new(Stage::Bundle, "fd")
            .run(|| Err(ProvisionError::install("fd", "exit status 1")));
        assert_eq!(failed.status, StageStatus::Failed);
        assert!(failed.detail.contains("fd"));

        let soft = StageRun::new(Stage::Update, "casks").run(|| {
            Err(ProvisionError::BestEffortSkipped {
                what: "cask upgrades".into(),
            })
        });
        assert_eq!(soft.status, StageStatus::Skipped);
    }

    #[test]
    fn any_failed_detects_a_single_failure() {
        let results = vec![
            StageResult::skipped(Stage::Bundle, "a"),
            StageResult::installed(Stage::Bundle, "b"),
        ];
        assert!(!any_failed(&results));

        let mut results = results;
        results.push(StageResult::failed(Stage::Env, "c"));
        assert!(any_failed(&results));
    }
}

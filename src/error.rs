use thiserror::Error;

/// Failures a provisioning stage can report.
///
/// None of these abort a run. The sequencer turns each one into a
/// [`StageResult`](crate::stage::StageResult) and moves on to the next stage.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("{tool} is not available; {remedy}")]
    PrerequisiteMissing { tool: String, remedy: String },

    #[error("failed to install {package}: {reason}")]
    InstallFailed { package: String, reason: String },

    #[error("failed to synchronize environment '{environment}': {reason}")]
    SyncFailed { environment: String, reason: String },

    #[error("skipped {what}")]
    BestEffortSkipped { what: String },
}

impl ProvisionError {
    pub fn prerequisite(tool: impl Into<String>, remedy: impl Into<String>) -> Self {
        Self::PrerequisiteMissing {
            tool: tool.into(),
            remedy: remedy.into(),
        }
    }

    pub fn install(package: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::InstallFailed {
            package: package.into(),
            reason: format!("{reason:#}"),
        }
    }

    pub fn sync(environment: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::SyncFailed {
            environment: environment.into(),
            reason: format!("{reason:#}"),
        }
    }

    /// Whether this error should fail the run or only be reported.
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::BestEffortSkipped { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_include_remediation() {
        let err = ProvisionError::prerequisite("brew", "run `macstrap probe` first");
        assert_eq!(
            err.to_string(),
            "brew is not available; run `macstrap probe` first"
        );
    }

    #[test]
    fn only_best_effort_is_soft() {
        assert!(ProvisionError::BestEffortSkipped {
            what: "cask upgrades".into()
        }
        .is_soft());
        assert!(!ProvisionError::install("fd", "exit status 1").is_soft());
    }
}

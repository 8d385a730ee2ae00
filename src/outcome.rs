//! Step and run outcomes.

use serde::{Deserialize, Serialize};

/// Terminal state of one step.
///
/// Every step starts pending and ends in exactly one of these within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum Outcome {
    /// The action ran and succeeded.
    Performed,
    /// The precondition already held.
    Skipped,
    /// The action failed, or a dependency failed.
    Failed,
    /// Dry run: the action would have been performed.
    Planned,
}

/// Recorded result of one step. Never mutated after being appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallResult {
    /// Step name.
    pub step: String,

    /// Terminal state.
    pub outcome: Outcome,

    /// Diagnostic for failures, or the planned commands for dry runs.
    pub message: Option<String>,
}

impl InstallResult {
    pub fn new(step: impl Into<String>, outcome: Outcome, message: Option<String>) -> Self {
        Self {
            step: step.into(),
            outcome,
            message,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.outcome == Outcome::Failed
    }
}

/// Terminal state of the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum RunOutcome {
    /// Every selected step reached a terminal state. Some may have failed.
    Completed,
    /// A prerequisite step failed; the remainder of the run was abandoned.
    Aborted,
}

/// Everything a run produced, in registry order.
///
/// # Example
///
/// ```rust
/// use workstation_provision::{InstallResult, Outcome, RunOutcome, RunReport};
///
/// let report = RunReport {
///     results: vec![InstallResult::new("nvm", Outcome::Failed, Some("exit 1".into()))],
///     outcome: RunOutcome::Completed,
///     aborted_by: None,
///     not_reached: vec![],
/// };
/// assert_eq!(report.failed().count(), 1);
/// assert!(report.exit_code() == 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub results: Vec<InstallResult>,
    pub outcome: RunOutcome,
    /// The prerequisite whose failure aborted the run.
    pub aborted_by: Option<String>,
    /// Steps abandoned after an abort that did not depend on the failed
    /// prerequisite. They stay pending and get no result.
    pub not_reached: Vec<String>,
}

impl RunReport {
    pub fn outcomes(&self) -> Vec<Outcome> {
        self.results.iter().map(|r| r.outcome).collect()
    }

    pub fn get(&self, step: &str) -> Option<&InstallResult> {
        self.results.iter().find(|r| r.step == step)
    }

    pub fn failed(&self) -> impl Iterator<Item = &InstallResult> {
        self.results.iter().filter(|r| r.is_failed())
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }

    /// Process exit code: only an abort is non-zero.
    pub fn exit_code(&self) -> i32 {
        match self.outcome {
            RunOutcome::Completed => 0,
            RunOutcome::Aborted => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcome: RunOutcome) -> RunReport {
        RunReport {
            results: vec![
                InstallResult::new("a", Outcome::Performed, None),
                InstallResult::new("b", Outcome::Skipped, None),
                InstallResult::new("c", Outcome::Failed, Some("boom".to_string())),
            ],
            outcome,
            aborted_by: None,
            not_reached: vec![],
        }
    }

    #[test]
    fn test_outcomes_in_order() {
        assert_eq!(
            report(RunOutcome::Completed).outcomes(),
            vec![Outcome::Performed, Outcome::Skipped, Outcome::Failed]
        );
    }

    #[test]
    fn test_exit_code_ignores_step_failures() {
        assert_eq!(report(RunOutcome::Completed).exit_code(), 0);
        assert_eq!(report(RunOutcome::Aborted).exit_code(), 1);
    }

    #[test]
    fn test_lookup_and_counts() {
        let r = report(RunOutcome::Completed);
        assert_eq!(r.get("c").unwrap().message.as_deref(), Some("boom"));
        assert!(r.get("zzz").is_none());
        assert_eq!(r.count(Outcome::Skipped), 1);
        assert_eq!(r.failed().count(), 1);
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(Outcome::Performed.to_string(), "Performed");
        assert_eq!(RunOutcome::Aborted.to_string(), "Aborted");
    }

    #[test]
    fn test_result_serialization() {
        let result = InstallResult::new("nvm", Outcome::Skipped, None);
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(json, r#"{"step":"nvm","outcome":"Skipped","message":null}"#);
        let back: InstallResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}

//! Progress reporting for provisioning runs.
//!
//! The run loop emits a [`StepProgress`] at each step transition so the
//! caller can print failures inline as they happen.

use crate::step::FailurePolicy;

/// Progress events during a run.
///
/// # Example
///
/// ```rust
/// use workstation_provision::StepProgress;
///
/// fn on_progress(progress: StepProgress) {
///     match &progress {
///         StepProgress::Checking { step } => println!("checking {}", step),
///         StepProgress::Skipped { step } => println!("{}: already done", step),
///         StepProgress::Running { step, .. } => println!("{}: installing...", step),
///         StepProgress::Planned { step, commands } => {
///             println!("{}: would run {:?}", step, commands)
///         }
///         StepProgress::Performed { step } => println!("{}: done", step),
///         StepProgress::Failed { step, error, fix, .. } => {
///             eprintln!("{}: {} ({})", step, error, fix)
///         }
///         StepProgress::Aborted { step } => eprintln!("aborting after {}", step),
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepProgress {
    /// The guard is evaluating the precondition.
    Checking { step: String },

    /// The precondition held; nothing to do.
    Skipped { step: String },

    /// The action is being performed.
    Running { step: String, description: String },

    /// Dry run: these commands would be performed.
    Planned { step: String, commands: Vec<String> },

    /// The action succeeded.
    Performed { step: String },

    /// The step failed (its own action, or a dependency).
    Failed {
        step: String,
        error: String,
        fix: String,
        policy: FailurePolicy,
    },

    /// A prerequisite failed; the remainder of the run is abandoned.
    Aborted { step: String },
}

impl StepProgress {
    /// Name of the step this event concerns.
    pub fn step(&self) -> &str {
        match self {
            Self::Checking { step }
            | Self::Skipped { step }
            | Self::Running { step, .. }
            | Self::Planned { step, .. }
            | Self::Performed { step }
            | Self::Failed { step, .. }
            | Self::Aborted { step } => step,
        }
    }

    /// Get a human-readable description of the current stage.
    ///
    /// # Example
    ///
    /// ```rust
    /// use workstation_provision::StepProgress;
    ///
    /// let progress = StepProgress::Skipped { step: "nvm".to_string() };
    /// assert_eq!(progress.description(), "Already satisfied");
    /// ```
    pub fn description(&self) -> &'static str {
        match self {
            Self::Checking { .. } => "Checking precondition",
            Self::Skipped { .. } => "Already satisfied",
            Self::Running { .. } => "Running",
            Self::Planned { .. } => "Would run",
            Self::Performed { .. } => "Done",
            Self::Failed { .. } => "Failed",
            Self::Aborted { .. } => "Run aborted",
        }
    }

    /// Whether the event puts the step in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Skipped { .. } | Self::Planned { .. } | Self::Performed { .. } | Self::Failed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_accessor() {
        let progress = StepProgress::Failed {
            step: "yay".to_string(),
            error: "exit 1".to_string(),
            fix: "retry".to_string(),
            policy: FailurePolicy::Prerequisite,
        };
        assert_eq!(progress.step(), "yay");
        assert_eq!(progress.description(), "Failed");
    }

    #[test]
    fn test_terminal_states() {
        assert!(StepProgress::Performed { step: "a".into() }.is_terminal());
        assert!(StepProgress::Skipped { step: "a".into() }.is_terminal());
        assert!(!StepProgress::Checking { step: "a".into() }.is_terminal());
        assert!(!StepProgress::Running {
            step: "a".into(),
            description: "A".into()
        }
        .is_terminal());
        assert!(!StepProgress::Aborted { step: "a".into() }.is_terminal());
    }
}

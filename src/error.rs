//! Error types for provisioning operations.
//!
//! Every [`ProvisionError`] variant carries enough context to be printed
//! inline when a step fails, plus an actionable fix suggestion.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while provisioning a workstation.
///
/// Almost all of these are caught at the step boundary and downgraded to a
/// recorded [`Outcome::Failed`](crate::Outcome::Failed). Only prerequisite
/// failures and invocation errors reach the process exit code.
///
/// # Example
///
/// ```rust
/// use workstation_provision::ProvisionError;
///
/// fn handle_error(error: ProvisionError) {
///     eprintln!("Step failed: {}", error);
///     eprintln!("To fix: {}", error.fix_suggestion());
/// }
/// ```
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProvisionError {
    /// Probing host state failed.
    ///
    /// The guard treats this as "precondition false" and the step runs.
    #[error("Could not probe {subject}: {message}")]
    PreconditionProbe {
        /// What was being probed (a path, a binary, a package).
        subject: String,
        /// Description of the probe failure.
        message: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The host CPU architecture has no known download identifier.
    #[error("Unsupported architecture: {arch}")]
    UnsupportedArchitecture {
        /// Architecture string as reported by the host.
        arch: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// An external command exited unsuccessfully or could not be spawned.
    #[error("Command failed: {command}{}", exit_code.map(|c| format!(" (exit code {})", c)).unwrap_or_default())]
    ExternalCommandFailure {
        /// The command line that was executed.
        command: String,
        /// Exit code, if the process ran to completion.
        exit_code: Option<i32>,
        /// Standard error from the command, if captured.
        stderr: Option<String>,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// An external command did not finish within its timeout.
    #[error("Command timed out after {duration:?}: {command}")]
    Timeout {
        /// The command line that was executed.
        command: String,
        /// How long the command was allowed to run.
        duration: Duration,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// A remote fetch failed after all retries.
    #[error("Network fetch failed for {url} after {attempts} attempt(s): {message}")]
    NetworkFetchFailure {
        /// The URL being fetched.
        url: String,
        /// How many attempts were made.
        attempts: u32,
        /// Description of the last failure.
        message: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// A step was not run because a step it depends on failed.
    #[error("Dependency '{dependency}' failed")]
    DependencyFailed {
        /// Name of the failed dependency.
        dependency: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The configuration file is missing or malformed.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem.
        message: String,
        /// Path of the configuration file, if one was involved.
        path: Option<PathBuf>,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The command line names unknown steps or conflicting filters.
    #[error("Invalid invocation: {message}")]
    InvalidInvocation {
        /// Description of the problem.
        message: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The step registry is inconsistent (duplicate names, forward dependencies).
    #[error("Invalid step registry: {message}")]
    Registry {
        /// Description of the inconsistency.
        message: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// A local filesystem operation failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },
}

impl ProvisionError {
    /// Get an actionable suggestion for fixing this error.
    ///
    /// # Example
    ///
    /// ```rust
    /// use workstation_provision::ProvisionError;
    ///
    /// let error = ProvisionError::UnsupportedArchitecture {
    ///     arch: "mips".to_string(),
    ///     fix: "Install this tool manually for mips".to_string(),
    /// };
    /// assert!(error.fix_suggestion().contains("manually"));
    /// ```
    pub fn fix_suggestion(&self) -> &str {
        match self {
            Self::PreconditionProbe { fix, .. } => fix,
            Self::UnsupportedArchitecture { fix, .. } => fix,
            Self::ExternalCommandFailure { fix, .. } => fix,
            Self::Timeout { fix, .. } => fix,
            Self::NetworkFetchFailure { fix, .. } => fix,
            Self::DependencyFailed { fix, .. } => fix,
            Self::Config { fix, .. } => fix,
            Self::InvalidInvocation { fix, .. } => fix,
            Self::Registry { fix, .. } => fix,
            Self::Io { fix, .. } => fix,
        }
    }

    /// Wrap an I/O error with the path it happened on.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        let fix = if source.kind() == std::io::ErrorKind::PermissionDenied {
            format!("Check permissions on {}", path.display())
        } else {
            format!("Check that {} is accessible", path.display())
        };
        Self::Io { path, source, fix }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ProvisionError>;

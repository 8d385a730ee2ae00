//! Version queries with timeout.

use crate::invoke::CommandRunner;
use crate::step::CommandSpec;
use std::io;
use std::time::Duration;

/// Typed reasons a probe did not produce an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProbeError {
    /// Timed out while waiting for the probe.
    Timeout,

    /// Permission denied accessing the executable or path.
    PermissionDenied,

    /// The probe produced no usable version output.
    VersionParseFailed,

    /// I/O error (failed to execute, non-zero exit).
    IoError,
}

impl ProbeError {
    /// Human-readable description of the error.
    ///
    /// # Example
    ///
    /// ```rust
    /// use workstation_provision::probe::ProbeError;
    ///
    /// assert_eq!(ProbeError::Timeout.description(), "Probe timed out");
    /// ```
    pub fn description(&self) -> &'static str {
        match self {
            Self::Timeout => "Probe timed out",
            Self::PermissionDenied => "Permission denied",
            Self::VersionParseFailed => "No version in output",
            Self::IoError => "I/O error during probe",
        }
    }

    pub(crate) fn from_io(e: &io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut => Self::Timeout,
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            _ => Self::IoError,
        }
    }
}

impl std::fmt::Display for ProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Run a version command and return its output.
///
/// Stdout is preferred, stderr is the fallback (`java -version` prints to
/// stderr). A non-zero exit or empty output is an error.
pub async fn query_version(
    runner: &dyn CommandRunner,
    cmd: &CommandSpec,
    limit: Duration,
) -> Result<String, ProbeError> {
    let output = runner
        .run(cmd, limit)
        .await
        .map_err(|e| ProbeError::from_io(&e))?;

    if !output.success() {
        return Err(ProbeError::IoError);
    }

    let text = output.text().trim();
    if text.is_empty() {
        return Err(ProbeError::VersionParseFailed);
    }
    Ok(text.to_string())
}

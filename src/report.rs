//! End-of-run version report.
//!
//! Each tool is asked for its own version. A tool that is missing or errors
//! shows up as [`NOT_INSTALLED`]; the report itself never fails.

use crate::invoke::CommandRunner;
use crate::probe::{first_line, parse_version, query_version};
use crate::step::CommandSpec;
use futures::future::join_all;
use std::fmt;
use std::time::Duration;

/// Marker shown for tools whose version could not be queried.
pub const NOT_INSTALLED: &str = "Not installed";

/// A tool and the command that prints its version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolProbe {
    /// Name shown in the report.
    pub label: String,
    /// Version command, e.g. `git --version`.
    pub command: CommandSpec,
}

impl ToolProbe {
    /// Probe `program --version`.
    pub fn version_flag(label: impl Into<String>, program: &str) -> Self {
        Self {
            label: label.into(),
            command: CommandSpec::new(program, ["--version"]),
        }
    }

    pub fn new(label: impl Into<String>, command: CommandSpec) -> Self {
        Self {
            label: label.into(),
            command,
        }
    }
}

/// One line of the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub tool: String,
    /// Version string, or `None` when the query failed.
    pub version: Option<String>,
}

impl ReportLine {
    /// The version, or the literal `Not installed`.
    pub fn version_text(&self) -> &str {
        self.version.as_deref().unwrap_or(NOT_INSTALLED)
    }
}

/// The full version report, in probe order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionReport {
    pub lines: Vec<ReportLine>,
}

impl VersionReport {
    pub fn get(&self, tool: &str) -> Option<&ReportLine> {
        self.lines.iter().find(|l| l.tool == tool)
    }
}

impl fmt::Display for VersionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.lines.iter().map(|l| l.tool.len()).max().unwrap_or(0);
        for line in &self.lines {
            writeln!(f, "{:<width$}  {}", line.tool, line.version_text(), width = width)?;
        }
        Ok(())
    }
}

/// Query every tool's version.
///
/// Queries are read-only, so they run concurrently; the report keeps the
/// probe order.
pub async fn generate(
    runner: &dyn CommandRunner,
    probes: &[ToolProbe],
    limit: Duration,
) -> VersionReport {
    let queries = probes.iter().map(|probe| async move {
        let version = match query_version(runner, &probe.command, limit).await {
            Ok(output) => Some(summarize(&output)),
            Err(e) => {
                tracing::debug!("{}: {}", probe.label, e);
                None
            }
        };
        ReportLine {
            tool: probe.label.clone(),
            version,
        }
    });

    VersionReport {
        lines: join_all(queries).await,
    }
}

/// A parsed semantic version if one is present, else the first output line.
fn summarize(output: &str) -> String {
    match parse_version(output) {
        Some(version) => version.to_string(),
        None => first_line(output).unwrap_or(output).to_string(),
    }
}

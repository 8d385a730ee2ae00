//! Version output parsing with regex extraction.

use regex::Regex;
use semver::Version;
use std::sync::OnceLock;

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Semantic version pattern: major.minor.patch, embedded anywhere
    RE.get_or_init(|| Regex::new(r"(\d+)\.(\d+)\.(\d+)").expect("Invalid regex pattern"))
}

/// Parse a semantic version from CLI output.
///
/// Handles the formats tools actually print:
///
/// - `git version 2.43.0` -> 2.43.0
/// - `v20.11.1` -> 20.11.1
/// - `openjdk version "21.0.2" 2024-01-16` -> 21.0.2
///
/// Returns `None` when no `major.minor.patch` triple is present.
pub fn parse_version(output: &str) -> Option<Version> {
    let caps = version_regex().captures(output)?;
    Version::parse(caps.get(0)?.as_str()).ok()
}

/// First non-empty line, trimmed.
pub(crate) fn first_line(output: &str) -> Option<&str> {
    output.lines().map(str::trim).find(|l| !l.is_empty())
}

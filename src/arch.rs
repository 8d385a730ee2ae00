//! CPU architecture resolution.
//!
//! Vendors disagree on what to call the same CPU: Debian packages say
//! `amd64`, the kernel says `x86_64`, release archives often mix both.
//! [`CpuArch::resolve`] normalizes the host string to a canonical tag and
//! [`ArchNaming`] picks the vendor spelling when a URL is built.

use crate::error::ProvisionError;
use serde::{Deserialize, Serialize};

/// Canonical CPU architecture.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum CpuArch {
    /// 64-bit x86 (`amd64`, `x86_64`).
    Amd64,
    /// 64-bit ARM (`arm64`, `aarch64`).
    Arm64,
}

/// Vendor naming convention for architecture tokens in URLs and package names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchNaming {
    /// Debian / Go style: `amd64`, `arm64`.
    Debian,
    /// Kernel `uname -m` style: `x86_64`, `aarch64`.
    Uname,
    /// Release-archive style used by many GitHub projects: `x86_64`, `arm64`.
    Release,
}

impl CpuArch {
    /// Resolve a host-reported architecture string.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace, so
    /// raw `uname -m` output can be passed directly.
    ///
    /// # Example
    ///
    /// ```rust
    /// use workstation_provision::CpuArch;
    ///
    /// assert_eq!(CpuArch::resolve("x86_64").unwrap(), CpuArch::Amd64);
    /// assert_eq!(CpuArch::resolve("aarch64").unwrap(), CpuArch::Arm64);
    /// assert!(CpuArch::resolve("mips").is_err());
    /// ```
    pub fn resolve(raw: &str) -> Result<Self, ProvisionError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "amd64" | "x86_64" | "x86-64" | "x64" => Ok(Self::Amd64),
            "arm64" | "aarch64" | "armv8" => Ok(Self::Arm64),
            other => Err(ProvisionError::UnsupportedArchitecture {
                arch: other.to_string(),
                fix: format!(
                    "No prebuilt download is known for '{}'; install this tool from source or skip it with --skip",
                    other
                ),
            }),
        }
    }

    /// The token this architecture goes by under the given naming convention.
    pub fn token(&self, naming: ArchNaming) -> &'static str {
        match (self, naming) {
            (Self::Amd64, ArchNaming::Debian) => "amd64",
            (Self::Amd64, ArchNaming::Uname | ArchNaming::Release) => "x86_64",
            (Self::Arm64, ArchNaming::Debian | ArchNaming::Release) => "arm64",
            (Self::Arm64, ArchNaming::Uname) => "aarch64",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amd64_aliases_share_tag() {
        assert_eq!(CpuArch::resolve("amd64").unwrap(), CpuArch::Amd64);
        assert_eq!(CpuArch::resolve("x86_64").unwrap(), CpuArch::Amd64);
    }

    #[test]
    fn test_arm64_aliases_share_tag() {
        assert_eq!(CpuArch::resolve("arm64").unwrap(), CpuArch::Arm64);
        assert_eq!(CpuArch::resolve("aarch64").unwrap(), CpuArch::Arm64);
    }

    #[test]
    fn test_unknown_architecture_fails() {
        let result = CpuArch::resolve("mips");
        assert!(matches!(
            result,
            Err(ProvisionError::UnsupportedArchitecture { ref arch, .. }) if arch == "mips"
        ));
    }

    #[test]
    fn test_resolve_tolerates_uname_output() {
        assert_eq!(CpuArch::resolve("X86_64\n").unwrap(), CpuArch::Amd64);
    }

    #[test]
    fn test_tokens() {
        assert_eq!(CpuArch::Amd64.token(ArchNaming::Debian), "amd64");
        assert_eq!(CpuArch::Amd64.token(ArchNaming::Uname), "x86_64");
        assert_eq!(CpuArch::Amd64.token(ArchNaming::Release), "x86_64");
        assert_eq!(CpuArch::Arm64.token(ArchNaming::Debian), "arm64");
        assert_eq!(CpuArch::Arm64.token(ArchNaming::Uname), "aarch64");
        assert_eq!(CpuArch::Arm64.token(ArchNaming::Release), "arm64");
    }

    #[test]
    fn test_display_is_canonical_tag() {
        assert_eq!(CpuArch::Amd64.to_string(), "amd64");
        assert_eq!(CpuArch::Arm64.to_string(), "arm64");
    }
}

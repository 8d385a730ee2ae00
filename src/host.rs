//! Host facts gathered once at process start.

use crate::error::ProvisionError;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

const OS_RELEASE: &str = "/etc/os-release";
const UNAME_TIMEOUT: Duration = Duration::from_secs(2);

/// Linux distribution family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum OsFamily {
    /// Debian, Ubuntu and derivatives (apt, snap).
    Debian,
    /// Arch Linux and derivatives (pacman, AUR).
    Arch,
    /// Anything else.
    Unknown,
}

impl OsFamily {
    /// Classify the contents of an `os-release` file.
    ///
    /// `ID` is checked first, then each entry of `ID_LIKE`.
    pub fn from_os_release(content: &str) -> Self {
        let mut id = None;
        let mut id_like = None;
        for line in content.lines() {
            if let Some((key, value)) = line.split_once('=') {
                let value = value.trim().trim_matches('"').trim_matches('\'');
                match key.trim() {
                    "ID" => id = Some(value.to_ascii_lowercase()),
                    "ID_LIKE" => id_like = Some(value.to_ascii_lowercase()),
                    _ => {}
                }
            }
        }

        let candidates = id
            .iter()
            .map(String::as_str)
            .chain(id_like.iter().flat_map(|v| v.split_whitespace()));
        for candidate in candidates {
            match candidate {
                "debian" | "ubuntu" | "pop" | "linuxmint" | "elementary" => return Self::Debian,
                "arch" | "manjaro" | "endeavouros" | "garuda" => return Self::Arch,
                _ => {}
            }
        }
        Self::Unknown
    }
}

/// Immutable snapshot of the host, read once per run.
///
/// This is the only place the process environment is consulted. Step
/// construction and execution take everything they need from here.
#[derive(Debug, Clone)]
pub struct HostFacts {
    /// CPU architecture as reported by the host (raw, not normalized).
    pub arch: String,
    /// Distribution family.
    pub os: OsFamily,
    /// Home directory of the invoking user.
    pub home: PathBuf,
    /// Name of the invoking user.
    pub user: String,
    /// Effective uid is 0.
    pub root: bool,
    /// `PATH` at startup, used for binary lookups.
    pub path: Option<OsString>,
}

impl HostFacts {
    /// Gather facts from the running host.
    ///
    /// Fails only when `HOME` is unset, since nearly every step writes under it.
    pub async fn gather() -> Result<Self, ProvisionError> {
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or_else(|| ProvisionError::Config {
                message: "HOME environment variable not set".to_string(),
                path: None,
                fix: "Run provision from a login shell of the user being provisioned".to_string(),
            })?;
        let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
        let path = std::env::var_os("PATH");

        let os = match tokio::fs::read_to_string(OS_RELEASE).await {
            Ok(content) => OsFamily::from_os_release(&content),
            Err(e) => {
                tracing::warn!("Could not read {}: {}", OS_RELEASE, e);
                OsFamily::Unknown
            }
        };

        let arch = uname_machine()
            .await
            .unwrap_or_else(|| std::env::consts::ARCH.to_string());

        let facts = Self {
            arch,
            os,
            home,
            user,
            root: nix::unistd::geteuid().is_root(),
            path,
        };
        tracing::debug!(?facts, "Gathered host facts");
        Ok(facts)
    }

    /// Resolve a path relative to the home directory.
    pub fn home_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.home.join(relative)
    }

    /// Whether commands already run with root privileges.
    ///
    /// Taken from the effective uid, so `su` without a login shell and
    /// containers without `USER` are detected correctly.
    pub fn is_root(&self) -> bool {
        self.root
    }
}

/// Ask the kernel for the machine hardware name.
async fn uname_machine() -> Option<String> {
    let output = timeout(UNAME_TIMEOUT, Command::new("uname").arg("-m").output())
        .await
        .ok()?
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let machine = String::from_utf8(output.stdout).ok()?;
    let machine = machine.trim();
    (!machine.is_empty()).then(|| machine.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ubuntu_is_debian() {
        let content = "NAME=\"Ubuntu\"\nID=ubuntu\nID_LIKE=debian\nVERSION_ID=\"24.04\"\n";
        assert_eq!(OsFamily::from_os_release(content), OsFamily::Debian);
    }

    #[test]
    fn test_arch_linux() {
        let content = "NAME=\"Arch Linux\"\nID=arch\nBUILD_ID=rolling\n";
        assert_eq!(OsFamily::from_os_release(content), OsFamily::Arch);
    }

    #[test]
    fn test_derivative_through_id_like() {
        let content = "ID=cachyos\nID_LIKE=\"arch\"\n";
        assert_eq!(OsFamily::from_os_release(content), OsFamily::Arch);

        let content = "ID=zorin\nID_LIKE=\"ubuntu debian\"\n";
        assert_eq!(OsFamily::from_os_release(content), OsFamily::Debian);
    }

    #[test]
    fn test_unknown_distribution() {
        let content = "ID=fedora\nID_LIKE=\"rhel centos\"\n";
        assert_eq!(OsFamily::from_os_release(content), OsFamily::Unknown);
        assert_eq!(OsFamily::from_os_release(""), OsFamily::Unknown);
    }

    #[test]
    fn test_home_path() {
        let facts = HostFacts {
            arch: "x86_64".to_string(),
            os: OsFamily::Debian,
            home: PathBuf::from("/home/dev"),
            user: "dev".to_string(),
            root: false,
            path: None,
        };
        assert_eq!(facts.home_path(".bashrc"), PathBuf::from("/home/dev/.bashrc"));
        assert!(!facts.is_root());
    }

    #[tokio::test]
    async fn test_gather_reads_home() {
        if std::env::var_os("HOME").is_some() {
            let facts = HostFacts::gather().await.unwrap();
            assert!(!facts.arch.is_empty());
            assert_eq!(facts.is_root(), nix::unistd::geteuid().is_root());
        }
    }
}

//! Provisioning configuration.
//!
//! The configuration is loaded once, merged with command-line overrides and
//! then handed to the step catalog. Steps never read the environment.

use crate::error::ProvisionError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_TEMPLATE_REPO: &str = "https://github.com/nvim-lua/kickstart.nvim.git";

/// Top-level configuration, usually read from `~/.config/provision/config.toml`.
///
/// # Example
///
/// ```rust
/// use workstation_provision::ProvisionConfig;
///
/// let config: ProvisionConfig = toml::from_str(r#"
///     apps = ["code", "discord"]
///
///     [git]
///     name = "Ada Lovelace"
///     email = "ada@example.com"
/// "#).unwrap();
/// assert_eq!(config.apps, vec!["code", "discord"]);
/// assert!(config.remove_browser);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Git identity written to the global git config.
    pub git: GitIdentity,
    /// SSH keypair generation.
    pub ssh: SshConfig,
    /// Editor configuration template.
    pub editor: EditorConfig,
    /// Extra packages on top of the base set.
    pub packages: PackagesConfig,
    /// GUI applications to install (snap names on Debian, AUR names on Arch).
    pub apps: Vec<String>,
    /// Remove the distribution's default browser.
    pub remove_browser: bool,
    /// Make the function row send F1-F12 by default on Apple-style keyboards.
    pub remap_fn_keys: bool,
    /// Network retry policy.
    pub network: NetworkConfig,
    /// Command and probe timeouts.
    pub timeouts: TimeoutConfig,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            git: GitIdentity::default(),
            ssh: SshConfig::default(),
            editor: EditorConfig::default(),
            packages: PackagesConfig::default(),
            apps: vec!["code".to_string(), "slack".to_string(), "spotify".to_string()],
            remove_browser: true,
            remap_fn_keys: false,
            network: NetworkConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitIdentity {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// Key algorithm passed to `ssh-keygen -t`.
    pub key_type: String,
    /// Key comment; falls back to the git email.
    pub comment: Option<String>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            key_type: "ed25519".to_string(),
            comment: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Repository cloned into `~/.config/nvim` when that directory is absent.
    pub template_repo: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            template_repo: DEFAULT_TEMPLATE_REPO.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackagesConfig {
    pub extra: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Retries per idempotent GET after the first attempt fails.
    pub retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            retry_backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub command_secs: u64,
    pub probe_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            command_secs: 1800,
            probe_secs: 5,
        }
    }
}

impl ProvisionConfig {
    /// Default location of the configuration file.
    pub fn default_path(home: &Path) -> PathBuf {
        home.join(".config").join("provision").join("config.toml")
    }

    /// Load the configuration.
    ///
    /// An explicit path must exist. When no path is given the default
    /// location is tried and a missing file yields the defaults.
    pub fn load(explicit: Option<&Path>, home: &Path) -> Result<Self, ProvisionError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let path = Self::default_path(home);
                if !path.exists() {
                    tracing::debug!("No config at {}, using defaults", path.display());
                    return Ok(Self::default());
                }
                path
            }
        };

        let content = std::fs::read_to_string(&path).map_err(|e| ProvisionError::Config {
            message: format!("Cannot read {}: {}", path.display(), e),
            path: Some(path.clone()),
            fix: "Check the --config path".to_string(),
        })?;
        let config = Self::parse(&content).map_err(|e| match e {
            ProvisionError::Config { message, fix, .. } => ProvisionError::Config {
                message,
                path: Some(path.clone()),
                fix,
            },
            other => other,
        })?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ProvisionError> {
        toml::from_str(content).map_err(|e| ProvisionError::Config {
            message: format!("Invalid config: {}", e),
            path: None,
            fix: "Fix the TOML syntax or remove unknown values".to_string(),
        })
    }

    /// Apply command-line overrides for the git identity.
    pub fn with_git_overrides(mut self, name: Option<String>, email: Option<String>) -> Self {
        if name.is_some() {
            self.git.name = name;
        }
        if email.is_some() {
            self.git.email = email;
        }
        self
    }

    /// Comment embedded in the generated SSH key.
    pub fn ssh_comment(&self) -> Option<&str> {
        self.ssh.comment.as_deref().or(self.git.email.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProvisionConfig::default();
        assert_eq!(config.ssh.key_type, "ed25519");
        assert_eq!(config.editor.template_repo, DEFAULT_TEMPLATE_REPO);
        assert_eq!(config.network.retries, 3);
        assert!(config.remove_browser);
        assert!(!config.remap_fn_keys);
        assert!(config.git.name.is_none());
    }

    #[test]
    fn test_parse_partial_file_keeps_defaults() {
        let config = ProvisionConfig::parse(
            r#"
            remap_fn_keys = true

            [git]
            email = "dev@example.com"

            [network]
            retries = 5
            "#,
        )
        .unwrap();
        assert!(config.remap_fn_keys);
        assert_eq!(config.git.email.as_deref(), Some("dev@example.com"));
        assert_eq!(config.network.retries, 5);
        assert_eq!(config.network.retry_backoff_ms, 500);
        assert_eq!(config.apps.len(), 3);
    }

    #[test]
    fn test_parse_invalid_toml() {
        let result = ProvisionConfig::parse("apps = [");
        assert!(matches!(result, Err(ProvisionError::Config { .. })));
    }

    #[test]
    fn test_missing_default_file_yields_defaults() {
        let home = tempfile::tempdir().unwrap();
        let config = ProvisionConfig::load(None, home.path()).unwrap();
        assert_eq!(config, ProvisionConfig::default());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let home = tempfile::tempdir().unwrap();
        let missing = home.path().join("nope.toml");
        let result = ProvisionConfig::load(Some(&missing), home.path());
        assert!(matches!(result, Err(ProvisionError::Config { path: Some(_), .. })));
    }

    #[test]
    fn test_load_default_location() {
        let home = tempfile::tempdir().unwrap();
        let path = ProvisionConfig::default_path(home.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "apps = []\n").unwrap();

        let config = ProvisionConfig::load(None, home.path()).unwrap();
        assert!(config.apps.is_empty());
    }

    #[test]
    fn test_git_overrides_and_ssh_comment() {
        let config = ProvisionConfig::default()
            .with_git_overrides(Some("Dev".to_string()), Some("dev@example.com".to_string()));
        assert_eq!(config.git.name.as_deref(), Some("Dev"));
        assert_eq!(config.ssh_comment(), Some("dev@example.com"));

        let config = config.with_git_overrides(None, None);
        assert_eq!(config.git.name.as_deref(), Some("Dev"));
    }
}

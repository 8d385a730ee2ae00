//! External invoker: performs step actions against the host.
//!
//! This module turns an [`Action`] into processes, fetches and file edits.
//! Commands run through a [`CommandRunner`] and remote content comes from a
//! [`Fetcher`], so the whole invoker can be driven by fakes in tests.

mod fetch;
mod runner;

pub use fetch::{Fetcher, HttpFetcher, Release, ReleaseAsset, RetryPolicy};
pub use runner::{CommandOutput, CommandRunner, ProcessRunner};

use crate::error::ProvisionError;
use crate::step::{Action, CommandSpec};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Lines of stderr kept in a failure diagnostic.
const STDERR_TAIL_LINES: usize = 20;

/// Performs actions and reports failures as [`ProvisionError`]s.
#[derive(Clone)]
pub struct Invoker {
    runner: Arc<dyn CommandRunner>,
    fetcher: Arc<dyn Fetcher>,
    command_timeout: Duration,
    scratch: PathBuf,
}

impl Invoker {
    /// `scratch` is where release assets are downloaded and unpacked.
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        fetcher: Arc<dyn Fetcher>,
        command_timeout: Duration,
        scratch: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            fetcher,
            command_timeout,
            scratch: scratch.into(),
        }
    }

    pub fn runner(&self) -> &Arc<dyn CommandRunner> {
        &self.runner
    }

    /// Perform an action. Nothing is retried except idempotent fetches.
    pub fn perform<'a>(&'a self, action: &'a Action) -> BoxFuture<'a, Result<(), ProvisionError>> {
        async move {
            match action {
                Action::Command(cmd) => self.run_checked(cmd).await.map(|_| ()),
                Action::RemoteScript {
                    url,
                    interpreter,
                    args,
                    env_vars,
                } => {
                    let script = self.fetcher.get_text(url).await?;
                    let mut cmd = CommandSpec::new(interpreter.clone(), args.clone()).stdin(script);
                    cmd.env_vars = env_vars.clone();
                    self.run_checked(&cmd).await.map(|_| ())
                }
                Action::AppendLine { path, line } => append_line(path, line).await.map(|_| ()),
                Action::EnsureDir(path) => tokio::fs::create_dir_all(path)
                    .await
                    .map_err(|e| ProvisionError::io(path, e)),
                Action::GitClone { repo, dest } => self.git_clone(repo, dest).await,
                Action::LatestRelease {
                    repo,
                    asset,
                    install,
                } => self.latest_release(repo, asset, install).await,
                Action::Sequence(actions) => {
                    for inner in actions {
                        self.perform(inner).await?;
                    }
                    Ok(())
                }
            }
        }
        .boxed()
    }

    /// Run a command and turn a non-zero exit into `ExternalCommandFailure`.
    pub async fn run_checked(&self, cmd: &CommandSpec) -> Result<CommandOutput, ProvisionError> {
        tracing::info!("Running: {}", cmd.display());
        let output = self
            .runner
            .run(cmd, self.command_timeout)
            .await
            .map_err(|e| spawn_failure(cmd, e, self.command_timeout))?;

        if output.success() {
            return Ok(output);
        }

        let stderr = tail(&output.stderr, STDERR_TAIL_LINES);
        Err(ProvisionError::ExternalCommandFailure {
            command: cmd.display(),
            exit_code: output.code,
            fix: failure_fix(&stderr),
            stderr: (!stderr.is_empty()).then_some(stderr),
        })
    }

    async fn git_clone(&self, repo: &str, dest: &Path) -> Result<(), ProvisionError> {
        if dest.exists() {
            tracing::debug!("{} already exists, not cloning {}", dest.display(), repo);
            return Ok(());
        }
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ProvisionError::io(parent, e))?;
        }
        let cmd = CommandSpec::new(
            "git",
            [
                "clone".to_string(),
                "--depth".to_string(),
                "1".to_string(),
                repo.to_string(),
                dest.to_string_lossy().to_string(),
            ],
        );
        self.run_checked(&cmd).await.map(|_| ())
    }

    async fn latest_release(
        &self,
        repo: &str,
        asset: &str,
        install: &[CommandSpec],
    ) -> Result<(), ProvisionError> {
        let release = self.fetcher.latest_release(repo).await?;
        let version = release.version().to_string();
        let tag = release.tag_name.clone();
        let asset_name = asset.replace("{version}", &version).replace("{tag}", &tag);
        let url = match release.asset(&asset_name) {
            Some(found) => found.browser_download_url.clone(),
            None => format!(
                "https://github.com/{}/releases/download/{}/{}",
                repo, tag, asset_name
            ),
        };
        tracing::info!("Downloading {} {} ({})", repo, tag, asset_name);
        let bytes = self.fetcher.get_bytes(&url).await?;

        let dir = self
            .scratch
            .join(format!("{}-{}", repo.replace('/', "-"), version));
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ProvisionError::io(&dir, e))?;
        let file = dir.join(&asset_name);
        tokio::fs::write(&file, &bytes)
            .await
            .map_err(|e| ProvisionError::io(&file, e))?;

        let file_str = file.to_string_lossy().to_string();
        let dir_str = dir.to_string_lossy().to_string();
        let substitute = |s: &str| {
            s.replace("{file}", &file_str)
                .replace("{dir}", &dir_str)
                .replace("{version}", &version)
                .replace("{tag}", &tag)
        };

        let mut result = Ok(());
        for cmd in install {
            let mut cmd = cmd.map_strings(&substitute);
            if cmd.cwd.is_none() {
                cmd.cwd = Some(dir.clone());
            }
            if let Err(e) = self.run_checked(&cmd).await {
                result = Err(e);
                break;
            }
        }

        if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
            tracing::debug!("Could not remove {}: {}", dir.display(), e);
        }
        result
    }
}

/// Append `line` to `path` unless an identical line is already present.
///
/// Returns whether the file was changed. Comparison ignores surrounding
/// whitespace so re-runs never duplicate a line.
pub async fn append_line(path: &Path, line: &str) -> Result<bool, ProvisionError> {
    let existing = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(ProvisionError::io(path, e)),
    };
    if contains_line(&existing, line) {
        tracing::debug!("{} already contains '{}'", path.display(), line.trim());
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ProvisionError::io(parent, e))?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| ProvisionError::io(path, e))?;
    let mut text = String::new();
    if !existing.is_empty() && !existing.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(line.trim_end());
    text.push('\n');
    file.write_all(text.as_bytes())
        .await
        .map_err(|e| ProvisionError::io(path, e))?;
    tracing::info!("Appended '{}' to {}", line.trim(), path.display());
    Ok(true)
}

/// Whether `content` has a line equal to `line`, ignoring surrounding whitespace.
pub(crate) fn contains_line(content: &str, line: &str) -> bool {
    let wanted = line.trim();
    content.lines().any(|l| l.trim() == wanted)
}

fn spawn_failure(cmd: &CommandSpec, e: io::Error, limit: Duration) -> ProvisionError {
    match e.kind() {
        io::ErrorKind::TimedOut => ProvisionError::Timeout {
            command: cmd.display(),
            duration: limit,
            fix: "Raise timeouts.command_secs in the config or check for a stuck prompt"
                .to_string(),
        },
        io::ErrorKind::NotFound => ProvisionError::ExternalCommandFailure {
            command: cmd.display(),
            exit_code: None,
            stderr: Some(e.to_string()),
            fix: format!("'{}' is not installed or not on PATH", cmd.program),
        },
        io::ErrorKind::PermissionDenied => ProvisionError::ExternalCommandFailure {
            command: cmd.display(),
            exit_code: None,
            stderr: Some(e.to_string()),
            fix: "Try running with appropriate permissions".to_string(),
        },
        _ => ProvisionError::ExternalCommandFailure {
            command: cmd.display(),
            exit_code: None,
            stderr: Some(e.to_string()),
            fix: "Check the command and try again".to_string(),
        },
    }
}

fn failure_fix(stderr: &str) -> String {
    let lower = stderr.to_ascii_lowercase();
    let is_network = lower.contains("network")
        || lower.contains("connection")
        || lower.contains("could not resolve")
        || lower.contains("temporary failure")
        || lower.contains("timed out");
    let is_lock = lower.contains("could not get lock")
        || lower.contains("unable to lock database")
        || lower.contains("db.lck");

    if is_network {
        "Check your internet connection and re-run provision".to_string()
    } else if is_lock {
        "Another package manager is running; wait for it to finish and re-run provision".to_string()
    } else {
        "See the command output above, fix the cause and re-run provision".to_string()
    }
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.trim_end().lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

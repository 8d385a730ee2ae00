//! Idempotency guard.
//!
//! Decides from the live host whether a step's effect already holds. The
//! guard never mutates anything and never fails: a probe that errors counts
//! as "not satisfied", so the worst case is re-running an idempotent action.

use crate::error::ProvisionError;
use crate::host::HostFacts;
use crate::invoke::{contains_line, CommandRunner};
use crate::probe::find_executable;
use crate::step::{CommandSpec, Precondition};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::io;
use std::path::Path;
use std::time::Duration;

/// Result of evaluating a precondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum GuardDecision {
    /// The effect already holds.
    Skip,
    /// The action must be performed.
    Run,
}

/// What the guard needs to probe the host.
#[derive(Clone, Copy)]
pub struct GuardContext<'a> {
    pub facts: &'a HostFacts,
    pub runner: &'a dyn CommandRunner,
    pub probe_timeout: Duration,
}

/// Evaluate a precondition once.
///
/// # Example
///
/// ```rust,no_run
/// use workstation_provision::guard::{evaluate, GuardContext, GuardDecision};
/// use workstation_provision::{HostFacts, Precondition, ProcessRunner};
/// use std::time::Duration;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let facts = HostFacts::gather().await.unwrap();
///     let runner = ProcessRunner::new(facts.is_root());
///     let ctx = GuardContext { facts: &facts, runner: &runner, probe_timeout: Duration::from_secs(5) };
///
///     let pre = Precondition::PathExists(facts.home_path(".nvm"));
///     if evaluate(&pre, ctx).await == GuardDecision::Skip {
///         println!("nvm already installed");
///     }
/// }
/// ```
pub async fn evaluate(precondition: &Precondition, ctx: GuardContext<'_>) -> GuardDecision {
    if satisfied(precondition, ctx).await {
        GuardDecision::Skip
    } else {
        GuardDecision::Run
    }
}

fn satisfied<'a>(precondition: &'a Precondition, ctx: GuardContext<'a>) -> BoxFuture<'a, bool> {
    async move {
        match precondition {
            Precondition::AllOf(inner) => {
                for p in inner {
                    if !satisfied(p, ctx).await {
                        return false;
                    }
                }
                true
            }
            Precondition::AnyOf(inner) => {
                for p in inner {
                    if satisfied(p, ctx).await {
                        return true;
                    }
                }
                false
            }
            Precondition::Not(inner) => !satisfied(inner, ctx).await,
            leaf => match probe(leaf, ctx).await {
                Ok(holds) => holds,
                Err(e) => {
                    tracing::warn!("{}; treating as not satisfied", e);
                    false
                }
            },
        }
    }
    .boxed()
}

/// Probe a single (non-composite) precondition.
async fn probe(precondition: &Precondition, ctx: GuardContext<'_>) -> Result<bool, ProvisionError> {
    match precondition {
        Precondition::Never => Ok(false),
        Precondition::BinaryOnPath(name) => {
            Ok(find_executable(name, ctx.facts.path.as_deref(), &ctx.facts.home).is_some())
        }
        Precondition::PathExists(path) => tokio::fs::try_exists(path)
            .await
            .map_err(|e| probe_error(&path.display().to_string(), &e)),
        Precondition::FileContainsLine { path, line } => file_contains_line(path, line).await,
        Precondition::PackageInstalled { manager, package } => {
            command_succeeds(&manager.query(package), ctx).await
        }
        Precondition::CommandSucceeds(cmd) => command_succeeds(cmd, ctx).await,
        Precondition::AllOf(_) | Precondition::AnyOf(_) | Precondition::Not(_) => {
            Ok(satisfied(precondition, ctx).await)
        }
    }
}

async fn file_contains_line(path: &Path, line: &str) -> Result<bool, ProvisionError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(contains_line(&content, line)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(probe_error(&path.display().to_string(), &e)),
    }
}

async fn command_succeeds(cmd: &CommandSpec, ctx: GuardContext<'_>) -> Result<bool, ProvisionError> {
    match ctx.runner.run(cmd, ctx.probe_timeout).await {
        Ok(output) => Ok(output.success()),
        // The probing tool itself is absent (e.g. no snapd): nothing is installed through it.
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(probe_error(&cmd.display(), &e)),
    }
}

fn probe_error(subject: &str, e: &io::Error) -> ProvisionError {
    let fix = match e.kind() {
        io::ErrorKind::PermissionDenied => {
            "Run provision as the user whose workstation is being set up".to_string()
        }
        io::ErrorKind::TimedOut => "Raise timeouts.probe_secs in the config".to_string(),
        _ => "The step will run anyway; check the path manually if it fails".to_string(),
    };
    ProvisionError::PreconditionProbe {
        subject: subject.to_string(),
        message: e.to_string(),
        fix,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::OsFamily;
    use crate::invoke::ProcessRunner;
    use std::path::PathBuf;

    fn facts(home: &Path) -> HostFacts {
        HostFacts {
            arch: "x86_64".to_string(),
            os: OsFamily::Debian,
            home: home.to_path_buf(),
            user: "dev".to_string(),
            root: false,
            path: Some("/bin:/usr/bin".into()),
        }
    }

    async fn decide(pre: &Precondition, home: &Path) -> GuardDecision {
        let facts = facts(home);
        let runner = ProcessRunner::new(false);
        let ctx = GuardContext {
            facts: &facts,
            runner: &runner,
            probe_timeout: Duration::from_secs(2),
        };
        evaluate(pre, ctx).await
    }

    #[tokio::test]
    async fn test_never_always_runs() {
        let home = tempfile::tempdir().unwrap();
        assert_eq!(decide(&Precondition::Never, home.path()).await, GuardDecision::Run);
    }

    #[tokio::test]
    async fn test_path_exists() {
        let home = tempfile::tempdir().unwrap();
        let present = Precondition::PathExists(home.path().to_path_buf());
        let absent = Precondition::PathExists(home.path().join("missing"));
        assert_eq!(decide(&present, home.path()).await, GuardDecision::Skip);
        assert_eq!(decide(&absent, home.path()).await, GuardDecision::Run);
    }

    #[tokio::test]
    async fn test_binary_on_path() {
        let home = tempfile::tempdir().unwrap();
        let sh = Precondition::BinaryOnPath("sh".to_string());
        let missing = Precondition::BinaryOnPath("definitely_not_a_real_binary_xyz".to_string());
        assert_eq!(decide(&sh, home.path()).await, GuardDecision::Skip);
        assert_eq!(decide(&missing, home.path()).await, GuardDecision::Run);
    }

    #[tokio::test]
    async fn test_file_contains_line() {
        let home = tempfile::tempdir().unwrap();
        let rc = home.path().join(".bashrc");
        let pre = Precondition::FileContainsLine {
            path: rc.clone(),
            line: "export A=1".to_string(),
        };
        assert_eq!(decide(&pre, home.path()).await, GuardDecision::Run);
        std::fs::write(&rc, "export A=1\n").unwrap();
        assert_eq!(decide(&pre, home.path()).await, GuardDecision::Skip);
    }

    #[tokio::test]
    async fn test_command_succeeds_and_missing_tool() {
        let home = tempfile::tempdir().unwrap();
        let ok = Precondition::CommandSucceeds(CommandSpec::shell("exit 0"));
        let fails = Precondition::CommandSucceeds(CommandSpec::shell("exit 1"));
        let missing = Precondition::CommandSucceeds(CommandSpec::new(
            "definitely_not_a_real_binary_xyz",
            Vec::<String>::new(),
        ));
        assert_eq!(decide(&ok, home.path()).await, GuardDecision::Skip);
        assert_eq!(decide(&fails, home.path()).await, GuardDecision::Run);
        assert_eq!(decide(&missing, home.path()).await, GuardDecision::Run);
    }

    #[tokio::test]
    async fn test_composites() {
        let home = tempfile::tempdir().unwrap();
        let yes = Precondition::PathExists(home.path().to_path_buf());
        let no = Precondition::PathExists(PathBuf::from("/definitely/not/here"));

        let all = Precondition::AllOf(vec![yes.clone(), no.clone()]);
        let any = Precondition::AnyOf(vec![no.clone(), yes.clone()]);
        let not = Precondition::Not(Box::new(no.clone()));
        assert_eq!(decide(&all, home.path()).await, GuardDecision::Run);
        assert_eq!(decide(&any, home.path()).await, GuardDecision::Skip);
        assert_eq!(decide(&not, home.path()).await, GuardDecision::Skip);
        assert_eq!(decide(&Precondition::AllOf(vec![]), home.path()).await, GuardDecision::Skip);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_file_is_not_fatal() {
        use std::os::unix::fs::PermissionsExt;

        let home = tempfile::tempdir().unwrap();
        let locked = home.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        let pre = Precondition::FileContainsLine {
            path: locked.join("profile"),
            line: "x".to_string(),
        };
        // Root can read anything; either way the guard must not panic or error.
        assert_eq!(decide(&pre, home.path()).await, GuardDecision::Run);

        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
}

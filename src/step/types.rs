//! Type definitions for provisioning steps.
//!
//! A [`Step`] pairs a declarative [`Precondition`] (checked by the guard)
//! with an [`Action`] (performed by the invoker). Both are plain data so the
//! guard can be tested apart from the action and dry runs can print exactly
//! what would happen.

use crate::arch::ArchNaming;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A structured command for execution.
///
/// # Example
///
/// ```rust
/// use workstation_provision::CommandSpec;
///
/// let cmd = CommandSpec::new("apt-get", ["install", "-y", "git"]).sudo();
/// assert_eq!(cmd.display(), "sudo apt-get install -y git");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// The program to execute (e.g., "apt-get", "bash", "snap").
    pub program: String,

    /// Arguments to pass to the program.
    pub args: Vec<String>,

    /// Environment variables to set before execution (key, value pairs).
    pub env_vars: Vec<(String, String)>,

    /// Working directory, if not inherited.
    pub cwd: Option<PathBuf>,

    /// Bytes written to the process's standard input.
    #[serde(skip)]
    pub stdin: Option<Vec<u8>>,

    /// Run through `sudo` unless already root.
    pub sudo: bool,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            env_vars: Vec::new(),
            cwd: None,
            stdin: None,
            sudo: false,
        }
    }

    /// Shorthand for `bash -c <script>`.
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new("bash", ["-c".to_string(), script.into()])
    }

    pub fn sudo(mut self) -> Self {
        self.sudo = true;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Human-readable command line for logs and dry runs.
    pub fn display(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 2);
        if self.sudo {
            parts.push("sudo".to_string());
        }
        parts.push(self.program.clone());
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                parts.push(format!("'{}'", arg));
            } else {
                parts.push(arg.clone());
            }
        }
        parts.join(" ")
    }

    /// Apply a placeholder substitution to every string in the command.
    pub(crate) fn map_strings(&self, f: &impl Fn(&str) -> String) -> Self {
        Self {
            program: f(&self.program),
            args: self.args.iter().map(|a| f(a)).collect(),
            env_vars: self
                .env_vars
                .iter()
                .map(|(k, v)| (k.clone(), f(v)))
                .collect(),
            cwd: self
                .cwd
                .as_ref()
                .map(|p| PathBuf::from(f(&p.to_string_lossy()))),
            stdin: self.stdin.clone(),
            sudo: self.sudo,
        }
    }
}

/// Package managers the guard knows how to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum PackageManager {
    Dpkg,
    Pacman,
    Snap,
}

impl PackageManager {
    /// Command that exits zero iff `package` is installed.
    pub fn query(&self, package: &str) -> CommandSpec {
        match self {
            Self::Dpkg => CommandSpec::new("dpkg", ["-s", package]),
            Self::Pacman => CommandSpec::new("pacman", ["-Qi", package]),
            Self::Snap => CommandSpec::new("snap", ["list", package]),
        }
    }
}

/// A declarative check of whether a step's effect already holds.
///
/// Evaluated by [`evaluate`](crate::guard::evaluate). Probe errors count as
/// "not satisfied", never as failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Precondition {
    /// Never satisfied; the step always runs.
    Never,
    /// The binary resolves on `PATH` (or a common fallback location).
    BinaryOnPath(String),
    /// The path exists.
    PathExists(PathBuf),
    /// The file contains this exact line.
    FileContainsLine { path: PathBuf, line: String },
    /// The package manager reports the package installed.
    PackageInstalled {
        manager: PackageManager,
        package: String,
    },
    /// The command exits zero.
    CommandSucceeds(CommandSpec),
    /// Every inner precondition is satisfied.
    AllOf(Vec<Precondition>),
    /// At least one inner precondition is satisfied.
    AnyOf(Vec<Precondition>),
    /// The inner precondition is not satisfied.
    Not(Box<Precondition>),
}

/// An external side effect performed when the guard says Run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Run a single command.
    Command(CommandSpec),
    /// Fetch a remote install script and pipe it into an interpreter.
    RemoteScript {
        url: String,
        interpreter: String,
        args: Vec<String>,
        env_vars: Vec<(String, String)>,
    },
    /// Append a line to a file unless an identical line is already present.
    AppendLine { path: PathBuf, line: String },
    /// Create a directory (and parents) if absent.
    EnsureDir(PathBuf),
    /// Clone a repository unless the destination already exists.
    GitClone { repo: String, dest: PathBuf },
    /// Download an asset from a repository's latest GitHub release and run
    /// install commands over it.
    ///
    /// `asset` may use `{version}` (tag without leading `v`), `{tag}` and
    /// `{arch}`. Install commands may also use `{file}` (downloaded asset)
    /// and `{dir}` (scratch directory).
    LatestRelease {
        repo: String,
        asset: String,
        install: Vec<CommandSpec>,
    },
    /// Run actions in order, stopping at the first failure.
    Sequence(Vec<Action>),
}

impl Action {
    /// Apply a placeholder substitution to every string the action carries.
    pub(crate) fn map_strings(&self, f: &impl Fn(&str) -> String) -> Self {
        match self {
            Self::Command(cmd) => Self::Command(cmd.map_strings(f)),
            Self::RemoteScript {
                url,
                interpreter,
                args,
                env_vars,
            } => Self::RemoteScript {
                url: f(url),
                interpreter: interpreter.clone(),
                args: args.iter().map(|a| f(a)).collect(),
                env_vars: env_vars.iter().map(|(k, v)| (k.clone(), f(v))).collect(),
            },
            Self::AppendLine { path, line } => Self::AppendLine {
                path: path.clone(),
                line: f(line),
            },
            Self::EnsureDir(path) => Self::EnsureDir(path.clone()),
            Self::GitClone { repo, dest } => Self::GitClone {
                repo: f(repo),
                dest: dest.clone(),
            },
            Self::LatestRelease {
                repo,
                asset,
                install,
            } => Self::LatestRelease {
                repo: repo.clone(),
                asset: f(asset),
                install: install.iter().map(|c| c.map_strings(f)).collect(),
            },
            Self::Sequence(actions) => {
                Self::Sequence(actions.iter().map(|a| a.map_strings(f)).collect())
            }
        }
    }

    /// One line per external effect, for dry runs.
    pub fn describe(&self) -> Vec<String> {
        match self {
            Self::Command(cmd) => vec![cmd.display()],
            Self::RemoteScript {
                url,
                interpreter,
                args,
                ..
            } => {
                let mut line = format!("curl -fsSL {} | {}", url, interpreter);
                for arg in args {
                    line.push(' ');
                    line.push_str(arg);
                }
                vec![line]
            }
            Self::AppendLine { path, line } => {
                vec![format!("append '{}' to {}", line, path.display())]
            }
            Self::EnsureDir(path) => vec![format!("mkdir -p {}", path.display())],
            Self::GitClone { repo, dest } => {
                vec![format!("git clone {} {}", repo, dest.display())]
            }
            Self::LatestRelease {
                repo,
                asset,
                install,
            } => {
                let mut lines = vec![format!("download {} from latest {} release", asset, repo)];
                lines.extend(install.iter().map(CommandSpec::display));
                lines
            }
            Self::Sequence(actions) => actions.iter().flat_map(Action::describe).collect(),
        }
    }
}

/// What a failure of this step means for the rest of the run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
pub enum FailurePolicy {
    /// Best effort: record Failed, warn, continue (cleanup, optional apps).
    ContinueOnFailure,
    /// Record Failed, log an error, continue.
    Required,
    /// Later steps cannot work without this one; a failure aborts the run.
    Prerequisite,
}

/// One named unit of provisioning work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Unique identifier used by `--skip` / `--only`.
    pub name: String,

    /// Human-readable description.
    pub description: String,

    /// Skip the action when this already holds.
    pub precondition: Precondition,

    /// The side effect.
    pub action: Action,

    /// Failure handling.
    pub policy: FailurePolicy,

    /// Earlier steps whose failure makes this one Failed without running.
    pub depends_on: Vec<String>,

    /// When set, `{arch}` in the action is replaced by the host token in
    /// this naming; an unsupported host fails the step.
    pub arch: Option<ArchNaming>,
}

impl Step {
    /// Create a step with the default `Required` policy and no dependencies.
    ///
    /// # Example
    ///
    /// ```rust
    /// use workstation_provision::{Action, CommandSpec, FailurePolicy, Precondition, Step};
    ///
    /// let step = Step::new(
    ///     "slack",
    ///     "Slack desktop client",
    ///     Precondition::BinaryOnPath("slack".to_string()),
    ///     Action::Command(CommandSpec::new("snap", ["install", "slack"]).sudo()),
    /// )
    /// .continue_on_failure();
    /// assert_eq!(step.policy, FailurePolicy::ContinueOnFailure);
    /// ```
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        precondition: Precondition,
        action: Action,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            precondition,
            action,
            policy: FailurePolicy::Required,
            depends_on: Vec::new(),
            arch: None,
        }
    }

    pub fn continue_on_failure(mut self) -> Self {
        self.policy = FailurePolicy::ContinueOnFailure;
        self
    }

    pub fn prerequisite(mut self) -> Self {
        self.policy = FailurePolicy::Prerequisite;
        self
    }

    pub fn depends_on(mut self, step: impl Into<String>) -> Self {
        self.depends_on.push(step.into());
        self
    }

    pub fn arch_templated(mut self, naming: ArchNaming) -> Self {
        self.arch = Some(naming);
        self
    }

    pub fn is_prerequisite(&self) -> bool {
        self.policy == FailurePolicy::Prerequisite
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_display_quotes_whitespace() {
        let cmd = CommandSpec::new("git", ["config", "--global", "user.name", "Ada Lovelace"]);
        assert_eq!(cmd.display(), "git config --global user.name 'Ada Lovelace'");
    }

    #[test]
    fn test_shell_helper() {
        let cmd = CommandSpec::shell("nvm install --lts");
        assert_eq!(cmd.program, "bash");
        assert_eq!(cmd.args, vec!["-c", "nvm install --lts"]);
    }

    #[test]
    fn test_map_strings_reaches_nested_commands() {
        let action = Action::Sequence(vec![
            Action::Command(CommandSpec::new("echo", ["{arch}"])),
            Action::LatestRelease {
                repo: "jesseduffield/lazygit".to_string(),
                asset: "lazygit_{version}_Linux_{arch}.tar.gz".to_string(),
                install: vec![CommandSpec::new("tar", ["-xzf", "{file}"])],
            },
        ]);
        let mapped = action.map_strings(&|s| s.replace("{arch}", "x86_64"));
        let Action::Sequence(inner) = mapped else {
            panic!("expected sequence");
        };
        assert_eq!(inner[0], Action::Command(CommandSpec::new("echo", ["x86_64"])));
        match &inner[1] {
            Action::LatestRelease { asset, install, .. } => {
                assert_eq!(asset, "lazygit_{version}_Linux_x86_64.tar.gz");
                assert_eq!(install[0].args, vec!["-xzf", "{file}"]);
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_describe_remote_script() {
        let action = Action::RemoteScript {
            url: "https://sh.rustup.rs".to_string(),
            interpreter: "sh".to_string(),
            args: vec!["-s".to_string(), "--".to_string(), "-y".to_string()],
            env_vars: vec![],
        };
        assert_eq!(action.describe(), vec!["curl -fsSL https://sh.rustup.rs | sh -s -- -y"]);
    }

    #[test]
    fn test_package_manager_queries() {
        assert_eq!(PackageManager::Dpkg.query("git").display(), "dpkg -s git");
        assert_eq!(PackageManager::Pacman.query("git").display(), "pacman -Qi git");
        assert_eq!(PackageManager::Snap.query("slack").display(), "snap list slack");
    }

    #[test]
    fn test_step_builders() {
        let step = Step::new("yay", "AUR helper", Precondition::Never, Action::EnsureDir("/tmp".into()))
            .prerequisite()
            .depends_on("base-packages")
            .arch_templated(ArchNaming::Debian);
        assert!(step.is_prerequisite());
        assert_eq!(step.depends_on, vec!["base-packages"]);
        assert_eq!(step.arch, Some(ArchNaming::Debian));
    }

    #[test]
    fn test_failure_policy_display() {
        assert_eq!(FailurePolicy::ContinueOnFailure.to_string(), "continue-on-failure");
        assert_eq!(FailurePolicy::Prerequisite.to_string(), "prerequisite");
    }

    #[test]
    fn test_step_serialization_skips_stdin() {
        let step = Step::new(
            "fn-keys",
            "Remap function keys",
            Precondition::Not(Box::new(Precondition::Never)),
            Action::Command(CommandSpec::new("tee", ["/tmp/x"]).stdin("secret")),
        );
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["policy"], "Required");
        assert!(json["action"]["Command"].get("stdin").is_none());
    }
}


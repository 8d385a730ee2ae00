//! Steps shared by every distribution family.

use crate::arch::ArchNaming;
use crate::config::ProvisionConfig;
use crate::host::HostFacts;
use crate::step::{Action, CommandSpec, Precondition, Step};
use std::path::PathBuf;

const NVM_INSTALL_URL: &str = "https://raw.githubusercontent.com/nvm-sh/nvm/v0.40.1/install.sh";
const RUSTUP_URL: &str = "https://sh.rustup.rs";
const SDKMAN_URL: &str = "https://get.sdkman.io";
const LAZYGIT_REPO: &str = "jesseduffield/lazygit";
const HID_APPLE_CONF: &str = "/etc/modprobe.d/hid_apple.conf";
const HID_APPLE_OPTION: &str = "options hid_apple fnmode=2";

pub(crate) const LOCAL_BIN_EXPORT: &str = r#"export PATH="$HOME/.local/bin:$PATH""#;
pub(crate) const CARGO_ENV_SOURCE: &str = r#". "$HOME/.cargo/env""#;

/// Name of the step that installs git, curl and the build toolchain.
pub(crate) const BASE_PACKAGES: &str = "base-packages";

fn bashrc(facts: &HostFacts) -> PathBuf {
    facts.home_path(".bashrc")
}

pub(crate) fn nvm_dir(facts: &HostFacts) -> PathBuf {
    facts.home_path(".nvm")
}

pub(crate) fn sdkman_dir(facts: &HostFacts) -> PathBuf {
    facts.home_path(".sdkman")
}

/// Shell profile, identity and language toolchains, in run order.
pub(crate) fn toolchain(facts: &HostFacts, config: &ProvisionConfig) -> Vec<Step> {
    let mut steps = vec![profile_path(facts)];
    steps.extend(git_identity(config));
    steps.extend([
        ssh_key(facts, config),
        nvm(facts),
        node(facts),
        rustup(facts),
        cargo_env(facts),
        sdkman(facts),
        java(facts),
        editor_config(facts, config),
        lazygit(),
    ]);
    steps
}

pub(crate) fn profile_path(facts: &HostFacts) -> Step {
    let path = bashrc(facts);
    Step::new(
        "profile-path",
        "Put ~/.local/bin on PATH",
        Precondition::FileContainsLine {
            path: path.clone(),
            line: LOCAL_BIN_EXPORT.to_string(),
        },
        Action::AppendLine {
            path,
            line: LOCAL_BIN_EXPORT.to_string(),
        },
    )
}

/// Global git identity; `None` when no name or email is configured.
pub(crate) fn git_identity(config: &ProvisionConfig) -> Option<Step> {
    let name = config.git.name.as_deref()?;
    let email = config.git.email.as_deref()?;

    // `git config --get <key> <value-regex>` exits 1 when the value differs.
    let matches = |key: &str, value: &str| {
        Precondition::CommandSucceeds(CommandSpec::new(
            "git",
            [
                "config".to_string(),
                "--global".to_string(),
                "--get".to_string(),
                key.to_string(),
                format!("^{}$", regex::escape(value)),
            ],
        ))
    };
    let set = |key: &str, value: &str| {
        Action::Command(CommandSpec::new("git", ["config", "--global", key, value]))
    };

    Some(
        Step::new(
            "git-identity",
            "Configure git user name and email",
            Precondition::AllOf(vec![matches("user.name", name), matches("user.email", email)]),
            Action::Sequence(vec![set("user.name", name), set("user.email", email)]),
        )
        .depends_on(BASE_PACKAGES),
    )
}

pub(crate) fn ssh_key(facts: &HostFacts, config: &ProvisionConfig) -> Step {
    let ssh_dir = facts.home_path(".ssh");
    let key = ssh_dir.join(format!("id_{}", config.ssh.key_type));

    let mut args = vec![
        "-t".to_string(),
        config.ssh.key_type.clone(),
        "-f".to_string(),
        key.to_string_lossy().to_string(),
        "-N".to_string(),
        String::new(),
    ];
    if let Some(comment) = config.ssh_comment() {
        args.push("-C".to_string());
        args.push(comment.to_string());
    }

    Step::new(
        "ssh-key",
        "Generate an SSH keypair",
        Precondition::PathExists(key),
        Action::Sequence(vec![
            Action::EnsureDir(ssh_dir),
            Action::Command(CommandSpec::new("ssh-keygen", args)),
        ]),
    )
}

pub(crate) fn nvm(facts: &HostFacts) -> Step {
    let dir = nvm_dir(facts);
    Step::new(
        "nvm",
        "Install nvm (Node version manager)",
        Precondition::PathExists(dir.join("nvm.sh")),
        Action::RemoteScript {
            url: NVM_INSTALL_URL.to_string(),
            interpreter: "bash".to_string(),
            args: vec![],
            env_vars: vec![
                ("NVM_DIR".to_string(), dir.to_string_lossy().to_string()),
                ("PROFILE".to_string(), bashrc(facts).to_string_lossy().to_string()),
            ],
        },
    )
    .depends_on(BASE_PACKAGES)
}

pub(crate) fn node(facts: &HostFacts) -> Step {
    let dir = nvm_dir(facts);
    Step::new(
        "node",
        "Install the Node.js LTS release through nvm",
        Precondition::PathExists(dir.join("alias").join("default")),
        Action::Command(
            CommandSpec::shell(
                r#". "$NVM_DIR/nvm.sh" && nvm install --lts && nvm alias default 'lts/*'"#,
            )
            .env("NVM_DIR", dir.to_string_lossy()),
        ),
    )
    .depends_on("nvm")
}

pub(crate) fn rustup(facts: &HostFacts) -> Step {
    Step::new(
        "rustup",
        "Install the Rust toolchain with rustup",
        Precondition::AnyOf(vec![
            Precondition::BinaryOnPath("rustup".to_string()),
            Precondition::PathExists(facts.home_path(".cargo/bin/rustup")),
        ]),
        Action::RemoteScript {
            url: RUSTUP_URL.to_string(),
            interpreter: "sh".to_string(),
            args: ["-s", "--", "-y", "--no-modify-path"]
                .into_iter()
                .map(String::from)
                .collect(),
            env_vars: vec![],
        },
    )
    .depends_on(BASE_PACKAGES)
}

/// Only sources the env file rustup wrote; a system-wide rustup has none.
pub(crate) fn cargo_env(facts: &HostFacts) -> Step {
    let path = bashrc(facts);
    Step::new(
        "cargo-env",
        "Source ~/.cargo/env from ~/.bashrc",
        Precondition::AnyOf(vec![
            Precondition::FileContainsLine {
                path: path.clone(),
                line: CARGO_ENV_SOURCE.to_string(),
            },
            Precondition::Not(Box::new(Precondition::PathExists(
                facts.home_path(".cargo/env"),
            ))),
        ]),
        Action::AppendLine {
            path,
            line: CARGO_ENV_SOURCE.to_string(),
        },
    )
    .depends_on("rustup")
}

pub(crate) fn sdkman(facts: &HostFacts) -> Step {
    let dir = sdkman_dir(facts);
    Step::new(
        "sdkman",
        "Install SDKMAN!",
        Precondition::PathExists(dir.join("bin").join("sdkman-init.sh")),
        Action::RemoteScript {
            url: SDKMAN_URL.to_string(),
            interpreter: "bash".to_string(),
            args: vec![],
            env_vars: vec![("SDKMAN_DIR".to_string(), dir.to_string_lossy().to_string())],
        },
    )
    .depends_on(BASE_PACKAGES)
}

pub(crate) fn java(facts: &HostFacts) -> Step {
    let dir = sdkman_dir(facts);
    Step::new(
        "java",
        "Install the default Java JDK through SDKMAN!",
        Precondition::PathExists(dir.join("candidates").join("java").join("current")),
        Action::Command(
            CommandSpec::shell(r#"source "$SDKMAN_DIR/bin/sdkman-init.sh" && sdk install java"#)
                .env("SDKMAN_DIR", dir.to_string_lossy())
                .env("sdkman_auto_answer", "true"),
        ),
    )
    .depends_on("sdkman")
}

pub(crate) fn editor_config(facts: &HostFacts, config: &ProvisionConfig) -> Step {
    let dest = facts.home_path(".config/nvim");
    Step::new(
        "editor-config",
        "Clone the Neovim configuration template",
        Precondition::PathExists(dest.clone()),
        Action::GitClone {
            repo: config.editor.template_repo.clone(),
            dest,
        },
    )
    .continue_on_failure()
    .depends_on(BASE_PACKAGES)
}

pub(crate) fn lazygit() -> Step {
    Step::new(
        "lazygit",
        "Install lazygit from its latest GitHub release",
        Precondition::BinaryOnPath("lazygit".to_string()),
        Action::LatestRelease {
            repo: LAZYGIT_REPO.to_string(),
            asset: "lazygit_{version}_Linux_{arch}.tar.gz".to_string(),
            install: vec![
                CommandSpec::new("tar", ["-xzf", "{file}", "-C", "{dir}", "lazygit"]),
                CommandSpec::new(
                    "install",
                    ["-m", "755", "{dir}/lazygit", "/usr/local/bin/lazygit"],
                )
                .sudo(),
            ],
        },
    )
    .arch_templated(ArchNaming::Release)
    .continue_on_failure()
    .depends_on(BASE_PACKAGES)
}

/// Function row sends F1-F12 by default on Apple-style keyboards.
pub(crate) fn fn_keys() -> Step {
    Step::new(
        "fn-keys",
        "Remap function keys (hid_apple fnmode=2)",
        Precondition::FileContainsLine {
            path: PathBuf::from(HID_APPLE_CONF),
            line: HID_APPLE_OPTION.to_string(),
        },
        Action::Sequence(vec![
            Action::Command(
                CommandSpec::new("tee", ["-a", HID_APPLE_CONF])
                    .sudo()
                    .stdin(format!("{}\n", HID_APPLE_OPTION)),
            ),
            Action::Command(
                CommandSpec::shell(
                    "[ ! -w /sys/module/hid_apple/parameters/fnmode ] || echo 2 > /sys/module/hid_apple/parameters/fnmode",
                )
                .sudo(),
            ),
        ]),
    )
    .continue_on_failure()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::OsFamily;

    fn facts() -> HostFacts {
        HostFacts {
            arch: "x86_64".to_string(),
            os: OsFamily::Debian,
            home: PathBuf::from("/home/dev"),
            user: "dev".to_string(),
            root: false,
            path: None,
        }
    }

    #[test]
    fn test_git_identity_requires_name_and_email() {
        let mut config = ProvisionConfig::default();
        assert!(git_identity(&config).is_none());
        config.git.name = Some("Dev".to_string());
        assert!(git_identity(&config).is_none());
        config.git.email = Some("dev+ci@example.com".to_string());
        let step = git_identity(&config).unwrap();
        match &step.precondition {
            Precondition::AllOf(checks) => match &checks[1] {
                Precondition::CommandSucceeds(cmd) => {
                    assert_eq!(cmd.args.last().unwrap(), r"^dev\+ci@example\.com$");
                }
                other => panic!("unexpected check {:?}", other),
            },
            other => panic!("unexpected precondition {:?}", other),
        }
    }

    #[test]
    fn test_ssh_key_paths_and_comment() {
        let mut config = ProvisionConfig::default();
        config.git.email = Some("dev@example.com".to_string());
        let step = ssh_key(&facts(), &config);
        assert_eq!(
            step.precondition,
            Precondition::PathExists(PathBuf::from("/home/dev/.ssh/id_ed25519"))
        );
        let described = step.action.describe();
        assert_eq!(described[0], "mkdir -p /home/dev/.ssh");
        assert_eq!(
            described[1],
            "ssh-keygen -t ed25519 -f /home/dev/.ssh/id_ed25519 -N '' -C dev@example.com"
        );
    }

    #[test]
    fn test_profile_path_guard_matches_action() {
        let step = profile_path(&facts());
        match (&step.precondition, &step.action) {
            (
                Precondition::FileContainsLine { path: p1, line: l1 },
                Action::AppendLine { path: p2, line: l2 },
            ) => {
                assert_eq!(p1, p2);
                assert_eq!(l1, l2);
            }
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn test_lazygit_is_arch_templated() {
        let step = lazygit();
        assert_eq!(step.arch, Some(ArchNaming::Release));
        assert!(step.action.describe()[0].contains("{arch}"));
    }

    #[test]
    fn test_toolchain_dependencies() {
        let f = facts();
        assert_eq!(node(&f).depends_on, vec!["nvm"]);
        assert_eq!(java(&f).depends_on, vec!["sdkman"]);
        assert_eq!(cargo_env(&f).depends_on, vec!["rustup"]);
    }
}

//! Debian / Ubuntu: apt for system packages, snap for desktop apps.

use super::common::{self, BASE_PACKAGES};
use crate::config::ProvisionConfig;
use crate::host::HostFacts;
use crate::step::{Action, CommandSpec, PackageManager, Precondition, Step};

const BASE: &[&str] = &[
    "git",
    "curl",
    "wget",
    "ca-certificates",
    "build-essential",
    "zip",
    "unzip",
    "neovim",
    "snapd",
];

/// Snaps that need `--classic` confinement.
const CLASSIC_SNAPS: &[&str] = &[
    "code",
    "sublime-text",
    "intellij-idea-community",
    "pycharm-community",
    "android-studio",
];

pub(crate) fn steps(facts: &HostFacts, config: &ProvisionConfig) -> Vec<Step> {
    let mut steps = vec![
        Step::new(
            "apt-update",
            "Refresh apt package lists",
            Precondition::Never,
            Action::Command(apt(["update"])),
        )
        .prerequisite(),
        base_packages(config).depends_on("apt-update"),
    ];
    steps.extend(common::toolchain(facts, config));
    steps.extend(config.apps.iter().map(|app| snap_app(app)));
    if config.remove_browser {
        steps.push(remove_browser());
    }
    if config.remap_fn_keys {
        steps.push(common::fn_keys());
    }
    steps
}

fn apt<I, S>(args: I) -> CommandSpec
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    CommandSpec::new("apt-get", args)
        .sudo()
        .env("DEBIAN_FRONTEND", "noninteractive")
}

fn base_packages(config: &ProvisionConfig) -> Step {
    let packages: Vec<String> = BASE
        .iter()
        .map(|p| p.to_string())
        .chain(config.packages.extra.iter().cloned())
        .collect();

    let installed = packages
        .iter()
        .map(|p| Precondition::PackageInstalled {
            manager: PackageManager::Dpkg,
            package: p.clone(),
        })
        .collect();

    let mut args = vec!["install".to_string(), "-y".to_string()];
    args.extend(packages);

    Step::new(
        BASE_PACKAGES,
        "Install git, curl, compilers and Neovim with apt",
        Precondition::AllOf(installed),
        Action::Command(apt(args)),
    )
    .prerequisite()
}

fn snap_app(app: &str) -> Step {
    let mut args = vec!["install".to_string(), app.to_string()];
    if CLASSIC_SNAPS.contains(&app) {
        args.push("--classic".to_string());
    }
    Step::new(
        app,
        format!("Install {} from the Snap Store", app),
        Precondition::PackageInstalled {
            manager: PackageManager::Snap,
            package: app.to_string(),
        },
        Action::Command(CommandSpec::new("snap", args).sudo()),
    )
    .continue_on_failure()
    .depends_on(BASE_PACKAGES)
}

fn remove_browser() -> Step {
    let installed = |manager, package: &str| Precondition::PackageInstalled {
        manager,
        package: package.to_string(),
    };
    Step::new(
        "remove-browser",
        "Remove the preinstalled Firefox",
        Precondition::Not(Box::new(Precondition::AnyOf(vec![
            installed(PackageManager::Snap, "firefox"),
            installed(PackageManager::Dpkg, "firefox"),
            installed(PackageManager::Dpkg, "firefox-esr"),
        ]))),
        Action::Command(
            CommandSpec::shell(
                "if snap list firefox >/dev/null 2>&1; then snap remove --purge firefox; fi; \
                 if dpkg -s firefox >/dev/null 2>&1 || dpkg -s firefox-esr >/dev/null 2>&1; then \
                 apt-get purge -y 'firefox*'; fi",
            )
            .sudo()
            .env("DEBIAN_FRONTEND", "noninteractive"),
        ),
    )
    .continue_on_failure()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::OsFamily;
    use crate::step::FailurePolicy;
    use std::path::PathBuf;

    fn facts() -> HostFacts {
        HostFacts {
            arch: "aarch64".to_string(),
            os: OsFamily::Debian,
            home: PathBuf::from("/home/dev"),
            user: "dev".to_string(),
            root: false,
            path: None,
        }
    }

    #[test]
    fn test_bootstrap_steps_are_prerequisites() {
        let steps = steps(&facts(), &ProvisionConfig::default());
        assert_eq!(steps[0].name, "apt-update");
        assert_eq!(steps[1].name, BASE_PACKAGES);
        assert!(steps[0].is_prerequisite());
        assert!(steps[1].is_prerequisite());
        assert_eq!(
            steps[0].action.describe(),
            vec!["sudo apt-get update".to_string()]
        );
    }

    #[test]
    fn test_extra_packages_are_installed_and_checked() {
        let mut config = ProvisionConfig::default();
        config.packages.extra = vec!["ripgrep".to_string()];
        let step = base_packages(&config);
        assert!(step.action.describe()[0].ends_with("snapd ripgrep"));
        match &step.precondition {
            Precondition::AllOf(checks) => assert_eq!(checks.len(), BASE.len() + 1),
            other => panic!("unexpected precondition {:?}", other),
        }
    }

    #[test]
    fn test_snap_apps() {
        let code = snap_app("code");
        assert_eq!(code.action.describe(), vec!["sudo snap install code --classic"]);
        assert_eq!(code.policy, FailurePolicy::ContinueOnFailure);

        let slack = snap_app("slack");
        assert_eq!(slack.action.describe(), vec!["sudo snap install slack"]);
    }

    #[test]
    fn test_optional_steps_follow_config() {
        let mut config = ProvisionConfig::default();
        config.remove_browser = false;
        config.remap_fn_keys = true;
        let names: Vec<String> = steps(&facts(), &config)
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert!(!names.contains(&"remove-browser".to_string()));
        assert_eq!(names.last().map(String::as_str), Some("fn-keys"));
    }
}

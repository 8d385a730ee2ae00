//! Arch Linux: pacman for system packages, yay for AUR desktop apps.

use super::common::{self, BASE_PACKAGES};
use crate::config::ProvisionConfig;
use crate::host::HostFacts;
use crate::step::{Action, CommandSpec, PackageManager, Precondition, Step};

const BASE: &[&str] = &[
    "git", "curl", "wget", "base-devel", "zip", "unzip", "neovim",
];

const YAY: &str = "yay";
const YAY_AUR_REPO: &str = "https://aur.archlinux.org/yay-bin.git";

/// AUR package providing an app, when its name differs from the app's.
pub(crate) fn aur_package(app: &str) -> &str {
    match app {
        "code" => "visual-studio-code-bin",
        "slack" => "slack-desktop",
        "zoom" => "zoom",
        "sublime-text" => "sublime-text-4",
        other => other,
    }
}

pub(crate) fn steps(facts: &HostFacts, config: &ProvisionConfig) -> Vec<Step> {
    let mut steps = vec![
        Step::new(
            "pacman-sync",
            "Synchronize pacman databases and upgrade the system",
            Precondition::Never,
            Action::Command(pacman(["-Syu", "--noconfirm"])),
        )
        .prerequisite(),
        base_packages(config).depends_on("pacman-sync"),
        yay(facts),
    ];
    steps.extend(common::toolchain(facts, config));
    steps.extend(config.apps.iter().map(|app| aur_app(app)));
    if config.remove_browser {
        steps.push(remove_browser());
    }
    if config.remap_fn_keys {
        steps.push(common::fn_keys());
    }
    steps
}

fn pacman<I, S>(args: I) -> CommandSpec
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    CommandSpec::new("pacman", args).sudo()
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
            manager: PackageManager::Pacman,
            package: p.clone(),
        })
        .collect();

    let mut args = vec!["-S".to_string(), "--needed".to_string(), "--noconfirm".to_string()];
    args.extend(packages);

    Step::new(
        BASE_PACKAGES,
        "Install git, curl, base-devel and Neovim with pacman",
        Precondition::AllOf(installed),
        Action::Command(pacman(args)),
    )
    .prerequisite()
}

/// yay is built from the AUR with makepkg, which must not run as root.
fn yay(facts: &HostFacts) -> Step {
    let build_dir = facts.home_path(".cache/provision/yay-bin");
    Step::new(
        YAY,
        "Build and install the yay AUR helper",
        Precondition::BinaryOnPath(YAY.to_string()),
        Action::Sequence(vec![
            Action::GitClone {
                repo: YAY_AUR_REPO.to_string(),
                dest: build_dir.clone(),
            },
            Action::Command(
                CommandSpec::new("makepkg", ["-si", "--noconfirm"]).cwd(build_dir),
            ),
        ]),
    )
    .prerequisite()
    .depends_on(BASE_PACKAGES)
}

fn aur_app(app: &str) -> Step {
    let package = aur_package(app);
    Step::new(
        app,
        format!("Install {} from the AUR", app),
        Precondition::PackageInstalled {
            manager: PackageManager::Pacman,
            package: package.to_string(),
        },
        Action::Command(CommandSpec::new(
            YAY,
            ["-S", "--needed", "--noconfirm", package],
        )),
    )
    .continue_on_failure()
    .depends_on(YAY)
}

fn remove_browser() -> Step {
    Step::new(
        "remove-browser",
        "Remove the preinstalled Firefox",
        Precondition::Not(Box::new(Precondition::PackageInstalled {
            manager: PackageManager::Pacman,
            package: "firefox".to_string(),
        })),
        Action::Command(pacman(["-Rns", "--noconfirm", "firefox"])),
    )
    .continue_on_failure()
}

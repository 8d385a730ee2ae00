//! The concrete step catalog for each supported distribution family.
//!
//! Registration order is run order: bootstrap prerequisites first, then the
//! shell profile and language toolchains, then desktop apps and cleanup.

mod archlinux;
mod common;
mod debian;

use crate::config::ProvisionConfig;
use crate::error::ProvisionError;
use crate::host::{HostFacts, OsFamily};
use crate::probe::find_executable;
use crate::report::ToolProbe;
use crate::step::{CommandSpec, Registry};

/// Build the registry for this host.
///
/// # Example
///
/// ```rust
/// use std::path::PathBuf;
/// use workstation_provision::{catalog, HostFacts, OsFamily, ProvisionConfig};
///
/// let facts = HostFacts {
///     arch: "x86_64".to_string(),
///     os: OsFamily::Arch,
///     home: PathBuf::from("/home/dev"),
///     user: "dev".to_string(),
///     root: false,
///     path: None,
/// };
/// let registry = catalog::build(&facts, &ProvisionConfig::default()).unwrap();
/// assert_eq!(registry.steps()[0].name, "pacman-sync");
/// assert!(registry.get("yay").unwrap().is_prerequisite());
/// ```
pub fn build(facts: &HostFacts, config: &ProvisionConfig) -> Result<Registry, ProvisionError> {
    let steps = match facts.os {
        OsFamily::Debian => debian::steps(facts, config),
        OsFamily::Arch => archlinux::steps(facts, config),
        OsFamily::Unknown => {
            return Err(ProvisionError::Config {
                message: "unsupported Linux distribution".to_string(),
                path: None,
                fix: "provision supports Debian/Ubuntu and Arch based systems".to_string(),
            })
        }
    };
    Registry::new(steps)
}

/// Tools listed in the end-of-run version report.
///
/// Tools installed into the home directory are queried by absolute path or
/// through their init scripts, since this process's `PATH` predates them.
/// rustc and cargo fall back to a system-wide install when rustup has not
/// populated `~/.cargo/bin`.
pub fn report_probes(facts: &HostFacts, config: &ProvisionConfig) -> Vec<ToolProbe> {
    let nvm_sh = common::nvm_dir(facts).join("nvm.sh");
    let sdkman_init = common::sdkman_dir(facts).join("bin").join("sdkman-init.sh");
    // rustup-managed binaries win over a distribution toolchain.
    let rust_tool = |name: &str| {
        let own = facts.home_path(".cargo/bin").join(name);
        let program = if own.is_file() {
            own.to_string_lossy().into_owned()
        } else {
            find_executable(name, facts.path.as_deref(), &facts.home)
                .map(|found| found.to_string_lossy().into_owned())
                .unwrap_or_else(|| name.to_string())
        };
        CommandSpec::new(program, ["--version"])
    };
    let through_nvm = |cmd: &str| {
        CommandSpec::shell(format!(". '{}' && {}", nvm_sh.display(), cmd))
    };

    let mut probes = vec![
        ToolProbe::version_flag("git", "git"),
        ToolProbe::version_flag("curl", "curl"),
        ToolProbe::version_flag("nvim", "nvim"),
        ToolProbe::new("node", through_nvm("node --version")),
        ToolProbe::new("npm", through_nvm("npm --version")),
        ToolProbe::new("rustc", rust_tool("rustc")),
        ToolProbe::new("cargo", rust_tool("cargo")),
        ToolProbe::new(
            "java",
            CommandSpec::shell(format!(
                "source '{}' && java -version",
                sdkman_init.display()
            )),
        ),
        ToolProbe::version_flag("lazygit", "lazygit"),
    ];

    match facts.os {
        OsFamily::Arch => {
            probes.push(ToolProbe::version_flag("yay", "yay"));
            probes.extend(config.apps.iter().map(|app| {
                ToolProbe::new(
                    app.clone(),
                    CommandSpec::new("pacman", ["-Q", archlinux::aur_package(app)]),
                )
            }));
        }
        OsFamily::Debian | OsFamily::Unknown => {
            probes.extend(config.apps.iter().map(|app| {
                ToolProbe::new(app.clone(), CommandSpec::new("snap", ["list", app.as_str()]))
            }));
        }
    }
    probes
}

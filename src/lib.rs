//! # workstation-provision
//!
//! Idempotent provisioning of a developer workstation (Debian/Ubuntu or Arch).
//!
//! A run walks an ordered registry of [`Step`]s. Each step pairs a
//! declarative [`Precondition`] with an [`Action`]: the guard checks the live
//! host, and only steps whose effect is missing are performed. Running the
//! tool twice in a row performs nothing the second time.
//!
//! ## Features
//!
//! - `catalog::build()` registers the steps for the detected distribution
//! - [`Provisioner::run()`] executes them in order with per-step failure policy
//! - Prerequisite failures abort the run; optional steps fail in place
//! - `report::generate()` queries every installed tool's version concurrently
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use workstation_provision::{
//!     catalog, report, HostFacts, HttpFetcher, Invoker, ProcessRunner, ProvisionConfig,
//!     Provisioner, RunOptions,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), workstation_provision::ProvisionError> {
//!     let facts = HostFacts::gather().await?;
//!     let config = ProvisionConfig::load(None, &facts.home)?;
//!     let registry = catalog::build(&facts, &config)?;
//!     let options = RunOptions::from_config(&config);
//!     let invoker = Invoker::new(
//!         Arc::new(ProcessRunner::new(facts.is_root())),
//!         Arc::new(HttpFetcher::new(options.retry)?),
//!         options.command_timeout,
//!         facts.home_path(".cache/provision"),
//!     );
//!
//!     let run = Provisioner::new(&facts, &registry, &invoker, &options)
//!         .run(|_| {})
//!         .await;
//!     let versions = report::generate(
//!         invoker.runner().as_ref(),
//!         &catalog::report_probes(&facts, &config),
//!         options.probe_timeout,
//!     )
//!     .await;
//!     println!("{}\n{}", run.outcome, versions);
//!     Ok(())
//! }
//! ```

mod arch;
pub mod catalog;
pub mod cli;
mod config;
mod error;
pub mod guard;
mod host;
mod invoke;
mod options;
mod outcome;
pub mod probe;
mod progress;
mod provision;
pub mod report;
mod step;

pub use arch::{ArchNaming, CpuArch};
pub use config::{
    EditorConfig, GitIdentity, NetworkConfig, PackagesConfig, ProvisionConfig, SshConfig,
    TimeoutConfig,
};
pub use error::{ProvisionError, Result};
pub use host::{HostFacts, OsFamily};
pub use invoke::{
    append_line, CommandOutput, CommandRunner, Fetcher, HttpFetcher, Invoker, ProcessRunner,
    Release, ReleaseAsset, RetryPolicy,
};
pub use options::RunOptions;
pub use outcome::{InstallResult, Outcome, RunOutcome, RunReport};
pub use progress::StepProgress;
pub use provision::Provisioner;
pub use step::{Action, CommandSpec, FailurePolicy, PackageManager, Precondition, Registry, Step};

//! The provisioning run loop.
//!
//! Steps run strictly one at a time in registry order:
//!
//! 1. Steps left out by `--skip` / `--only` are not touched
//! 2. A step whose dependency failed is recorded Failed without running
//! 3. The guard decides Skip or Run
//! 4. Arch-templated actions get `{arch}` resolved
//! 5. The invoker performs the action
//!
//! Failures are recorded and the loop moves on, except when a prerequisite
//! fails: then every later step that depends on it is recorded Failed, the
//! rest are left pending, and the run ends Aborted.

use crate::arch::CpuArch;
use crate::error::ProvisionError;
use crate::guard::{self, GuardContext, GuardDecision};
use crate::host::HostFacts;
use crate::invoke::Invoker;
use crate::options::RunOptions;
use crate::outcome::{InstallResult, Outcome, RunOutcome, RunReport};
use crate::progress::StepProgress;
use crate::step::{Action, FailurePolicy, Registry, Step};
use std::collections::HashSet;

/// Runs a registry against a host.
pub struct Provisioner<'a> {
    facts: &'a HostFacts,
    registry: &'a Registry,
    invoker: &'a Invoker,
    options: &'a RunOptions,
}

impl<'a> Provisioner<'a> {
    pub fn new(
        facts: &'a HostFacts,
        registry: &'a Registry,
        invoker: &'a Invoker,
        options: &'a RunOptions,
    ) -> Self {
        Self {
            facts,
            registry,
            invoker,
            options,
        }
    }

    /// Run every selected step and return the ordered results.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use std::sync::Arc;
    /// use workstation_provision::{
    ///     catalog, HostFacts, HttpFetcher, Invoker, ProcessRunner, ProvisionConfig, Provisioner,
    ///     RunOptions,
    /// };
    ///
    /// #[tokio::main(flavor = "current_thread")]
    /// async fn main() {
    ///     let facts = HostFacts::gather().await.unwrap();
    ///     let config = ProvisionConfig::default();
    ///     let registry = catalog::build(&facts, &config).unwrap();
    ///     let options = RunOptions { dry_run: true, ..RunOptions::from_config(&config) };
    ///     let invoker = Invoker::new(
    ///         Arc::new(ProcessRunner::new(facts.is_root())),
    ///         Arc::new(HttpFetcher::new(options.retry).unwrap()),
    ///         options.command_timeout,
    ///         facts.home_path(".cache/provision"),
    ///     );
    ///
    ///     let report = Provisioner::new(&facts, &registry, &invoker, &options)
    ///         .run(|progress| println!("{:?}", progress))
    ///         .await;
    ///     println!("{}", report.outcome);
    /// }
    /// ```
    pub async fn run<F>(&self, on_progress: F) -> RunReport
    where
        F: Fn(StepProgress),
    {
        let mut results = Vec::with_capacity(self.registry.len());
        let mut failed: HashSet<String> = HashSet::new();
        let mut aborted_by: Option<String> = None;
        let mut not_reached = Vec::new();

        tracing::info!(
            steps = self.registry.len(),
            dry_run = self.options.dry_run,
            "Starting provisioning run"
        );

        for step in self.registry.steps() {
            if !self.options.selects(&step.name) {
                tracing::debug!("{}: not selected", step.name);
                continue;
            }

            let failed_dependency = step.depends_on.iter().find(|d| failed.contains(*d));

            if aborted_by.is_some() && failed_dependency.is_none() {
                not_reached.push(step.name.clone());
                continue;
            }

            let result = match failed_dependency {
                Some(dependency) => Err(ProvisionError::DependencyFailed {
                    dependency: dependency.clone(),
                    fix: format!("Fix '{}' and re-run provision", dependency),
                }),
                None => self.run_step(step, &on_progress).await,
            };

            match result {
                Ok((outcome, message)) => {
                    results.push(InstallResult::new(&step.name, outcome, message));
                }
                Err(e) => {
                    log_failure(step, &e);
                    on_progress(StepProgress::Failed {
                        step: step.name.clone(),
                        error: e.to_string(),
                        fix: e.fix_suggestion().to_string(),
                        policy: step.policy,
                    });
                    results.push(InstallResult::new(
                        &step.name,
                        Outcome::Failed,
                        Some(e.to_string()),
                    ));
                    failed.insert(step.name.clone());

                    if step.is_prerequisite() && aborted_by.is_none() {
                        tracing::error!(
                            "Prerequisite '{}' failed; abandoning the remaining steps",
                            step.name
                        );
                        on_progress(StepProgress::Aborted {
                            step: step.name.clone(),
                        });
                        aborted_by = Some(step.name.clone());
                    }
                }
            }
        }

        let outcome = if aborted_by.is_some() {
            RunOutcome::Aborted
        } else {
            RunOutcome::Completed
        };
        tracing::info!(
            %outcome,
            failed = failed.len(),
            not_reached = not_reached.len(),
            "Provisioning run finished"
        );

        RunReport {
            results,
            outcome,
            aborted_by,
            not_reached,
        }
    }

    /// Guard, resolve, perform. The guard is evaluated exactly once.
    async fn run_step<F>(
        &self,
        step: &Step,
        on_progress: &F,
    ) -> Result<(Outcome, Option<String>), ProvisionError>
    where
        F: Fn(StepProgress),
    {
        on_progress(StepProgress::Checking {
            step: step.name.clone(),
        });
        let ctx = GuardContext {
            facts: self.facts,
            runner: self.invoker.runner().as_ref(),
            probe_timeout: self.options.probe_timeout,
        };
        let decision = guard::evaluate(&step.precondition, ctx).await;
        tracing::debug!("{}: guard says {}", step.name, decision);

        if decision == GuardDecision::Skip {
            on_progress(StepProgress::Skipped {
                step: step.name.clone(),
            });
            return Ok((Outcome::Skipped, None));
        }

        let action = self.resolve_action(step)?;

        if self.options.dry_run {
            let commands = action.describe();
            let message = commands.join("; ");
            on_progress(StepProgress::Planned {
                step: step.name.clone(),
                commands,
            });
            return Ok((Outcome::Planned, Some(message)));
        }

        tracing::info!("{}: {}", step.name, step.description);
        on_progress(StepProgress::Running {
            step: step.name.clone(),
            description: step.description.clone(),
        });
        self.invoker.perform(&action).await?;
        on_progress(StepProgress::Performed {
            step: step.name.clone(),
        });
        Ok((Outcome::Performed, None))
    }

    /// Substitute `{arch}` for arch-templated steps.
    fn resolve_action(&self, step: &Step) -> Result<Action, ProvisionError> {
        match step.arch {
            None => Ok(step.action.clone()),
            Some(naming) => {
                let arch = CpuArch::resolve(&self.facts.arch)?;
                let token = arch.token(naming);
                tracing::debug!("{}: arch {} -> {}", step.name, self.facts.arch, token);
                Ok(step.action.map_strings(&|s| s.replace("{arch}", token)))
            }
        }
    }
}

fn log_failure(step: &Step, e: &ProvisionError) {
    match step.policy {
        FailurePolicy::ContinueOnFailure => {
            tracing::warn!("{} failed (continuing): {}", step.name, e)
        }
        FailurePolicy::Required | FailurePolicy::Prerequisite => {
            tracing::error!("{} failed: {}", step.name, e)
        }
    }
    if let ProvisionError::ExternalCommandFailure {
        stderr: Some(stderr),
        ..
    } = e
    {
        tracing::debug!("{} stderr:\n{}", step.name, stderr);
    }
}

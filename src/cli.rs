//! Command-line interface and terminal output.

use crate::outcome::{Outcome, RunOutcome, RunReport};
use crate::progress::StepProgress;
use crate::step::{FailurePolicy, Registry};
use clap::Parser;
use console::style;
use std::path::PathBuf;

/// Exit code for a bad invocation or unusable configuration.
pub const EXIT_INVALID: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "provision")]
#[command(version)]
#[command(about = "Idempotent developer workstation provisioning")]
#[command(
    long_about = "Install and configure a developer workstation on Debian/Ubuntu or Arch.\n\nEvery step checks the host first, so running it again only does what is missing."
)]
pub struct Cli {
    /// Check every step and print what would run, without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Steps to leave out (comma separated)
    #[arg(long, value_delimiter = ',', value_name = "STEPS")]
    pub skip: Vec<String>,

    /// Run only these steps (comma separated)
    #[arg(long, value_delimiter = ',', value_name = "STEPS")]
    pub only: Vec<String>,

    /// List the registered steps and exit
    #[arg(long)]
    pub list: bool,

    /// Configuration file (default: ~/.config/provision/config.toml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Git user.name
    #[arg(long, env = "GIT_NAME")]
    pub git_name: Option<String>,

    /// Git user.email
    #[arg(long, env = "GIT_EMAIL")]
    pub git_email: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Default tracing filter directive.
    pub fn log_directive(&self) -> &'static str {
        if self.verbose {
            "provision=debug,workstation_provision=debug"
        } else {
            "provision=info,workstation_provision=info"
        }
    }
}

/// Inline progress: one line per step transition.
pub fn print_progress(progress: &StepProgress) {
    match progress {
        StepProgress::Checking { .. } => {}
        StepProgress::Skipped { step } => {
            println!("  {} {} {}", style("✓").dim(), step, style("already done").dim());
        }
        StepProgress::Running { step, description } => {
            println!("{} {} {}", style("→").cyan().bold(), style(step).cyan(), style(description).dim());
        }
        StepProgress::Planned { step, commands } => {
            println!("{} {}", style("~").yellow().bold(), style(step).yellow());
            for cmd in commands {
                println!("    {}", style(cmd).dim());
            }
        }
        StepProgress::Performed { step } => {
            println!("  {} {}", style("✓").green().bold(), step);
        }
        StepProgress::Failed {
            step,
            error,
            fix,
            policy,
        } => {
            let mark = match policy {
                FailurePolicy::ContinueOnFailure => style("!").yellow().bold(),
                FailurePolicy::Required | FailurePolicy::Prerequisite => style("✗").red().bold(),
            };
            eprintln!("  {} {}: {}", mark, style(step).bold(), error);
            eprintln!("    {} {}", style("fix:").dim(), fix);
        }
        StepProgress::Aborted { step } => {
            eprintln!(
                "\n{} prerequisite '{}' failed, remaining steps abandoned",
                style("Aborted:").red().bold(),
                step
            );
        }
    }
}

/// `--list` output.
pub fn print_registry(registry: &Registry) {
    let width = registry.steps().iter().map(|s| s.name.len()).max().unwrap_or(0);
    println!("{}", style("Steps").bold().cyan());
    for step in registry.steps() {
        let deps = if step.depends_on.is_empty() {
            String::new()
        } else {
            format!(" (after {})", step.depends_on.join(", "))
        };
        println!(
            "  {:<width$}  {:<19}  {}{}",
            step.name,
            style(step.policy).dim(),
            step.description,
            style(deps).dim(),
            width = width
        );
    }
}

/// End-of-run step summary.
pub fn print_summary(report: &RunReport) {
    println!("\n{}", style("Summary").bold().cyan());
    for result in &report.results {
        let outcome = match result.outcome {
            Outcome::Performed => style(result.outcome).green(),
            Outcome::Skipped => style(result.outcome).dim(),
            Outcome::Failed => style(result.outcome).red(),
            Outcome::Planned => style(result.outcome).yellow(),
        };
        println!("  {:<10} {}", outcome, result.step);
    }
    if !report.not_reached.is_empty() {
        println!(
            "  {:<10} {}",
            style("Pending").dim(),
            report.not_reached.join(", ")
        );
    }

    let line = format!(
        "{} performed, {} skipped, {} failed",
        report.count(Outcome::Performed),
        report.count(Outcome::Skipped),
        report.count(Outcome::Failed)
    );
    match report.outcome {
        RunOutcome::Completed => println!("\n{} {}", style("Completed:").green().bold(), line),
        RunOutcome::Aborted => println!("\n{} {}", style("Aborted:").red().bold(), line),
    }
}

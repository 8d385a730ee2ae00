use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use workstation_provision::cli::{self, Cli, EXIT_INVALID};
use workstation_provision::{
    catalog, report, HostFacts, HttpFetcher, Invoker, ProcessRunner, ProvisionConfig,
    ProvisionError, Provisioner, RunOptions,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_directive().into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time().compact())
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            eprintln!("  {} {}", style("fix:").dim(), e.fix_suggestion());
            ExitCode::from(EXIT_INVALID)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, ProvisionError> {
    let facts = HostFacts::gather().await?;
    let config = ProvisionConfig::load(cli.config.as_deref(), &facts.home)?
        .with_git_overrides(cli.git_name.clone(), cli.git_email.clone());
    let registry = catalog::build(&facts, &config)?;

    if cli.list {
        cli::print_registry(&registry);
        return Ok(ExitCode::SUCCESS);
    }
    registry.validate_filter(&cli.skip, &cli.only)?;

    let options = RunOptions {
        dry_run: cli.dry_run,
        skip: cli.skip,
        only: cli.only,
        ..RunOptions::from_config(&config)
    };
    let invoker = Invoker::new(
        Arc::new(ProcessRunner::new(facts.is_root())),
        Arc::new(HttpFetcher::new(options.retry)?),
        options.command_timeout,
        facts.home_path(".cache/provision"),
    );

    println!(
        "{} {} workstation ({}, {}){}",
        style("Provisioning").bold().cyan(),
        facts.os,
        facts.arch,
        facts.user,
        if options.dry_run { " [dry run]" } else { "" }
    );

    let run_report = Provisioner::new(&facts, &registry, &invoker, &options)
        .run(|progress| cli::print_progress(&progress))
        .await;
    cli::print_summary(&run_report);

    let versions = report::generate(
        invoker.runner().as_ref(),
        &catalog::report_probes(&facts, &config),
        options.probe_timeout,
    )
    .await;
    println!("\n{}", style("Installed versions").bold().cyan());
    print!("{}", versions);

    Ok(ExitCode::from(
        u8::try_from(run_report.exit_code()).unwrap_or(1),
    ))
}

//! appfleet CLI entrypoint.
//!
//! This is the main entrypoint for the appfleet command-line tool.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use appfleet::cli::{Cli, Commands, OutputFormatter};
use appfleet::config::{
    discover_sources, ConfigParser, ConfigResolver, ConfigSource, ConfigValidator,
    ValidationResult,
};
use appfleet::error::Result;
use appfleet::planner::Category;
use appfleet::platform::{HerokuClient, ShellRunner};
use appfleet::reconciler::Reconciler;

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Targets are reconciled one at a time, a single thread is enough
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let formatter = OutputFormatter::new(cli.output);
    match runtime.block_on(run(cli, &formatter)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", formatter.format_error(&e.to_string()));
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli, formatter: &OutputFormatter) -> Result<ExitCode> {
    let (resolver, validation) = load_resolver(&cli)?;

    match &cli.command {
        Commands::Validate => {
            println!("{}", formatter.format_validation(&validation));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Apps => {
            let targets = cli.selector().select(&resolver)?;
            println!("{}", formatter.format_targets(&resolver, &targets));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Show => {
            let targets = cli.selector().select(&resolver)?;
            let states: Vec<_> = targets
                .iter()
                .map(|target| resolver.desired_state(target))
                .collect();
            println!("{}", formatter.format_desired(&states));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Setup { .. } | Commands::Scale => {
            let categories = cli.command.categories();
            cmd_reconcile(&cli, &resolver, &categories, formatter).await
        }
    }
}

/// Loads, merges and validates every settings source.
fn load_resolver(cli: &Cli) -> Result<(ConfigResolver, ValidationResult)> {
    let root = std::path::absolute(&cli.root)?;
    debug!("Project root: {}", root.display());

    let parser = ConfigParser::new().with_base_path(&root);
    parser.load_dotenv()?;

    let mut sources = discover_sources(&root)?;
    for file in &cli.config_files {
        sources.push(ConfigSource::tree(absolute_from(&root, file)));
    }

    let resolver = ConfigResolver::load(&parser, &sources)?;
    let validation = ConfigValidator::new().validate(resolver.settings())?;

    if !matches!(cli.command, Commands::Validate) {
        for warning in &validation.warnings {
            warn!("{warning}");
        }
    }

    Ok((resolver, validation))
}

fn absolute_from(root: &Path, file: &Path) -> PathBuf {
    if file.is_absolute() {
        file.to_path_buf()
    } else {
        root.join(file)
    }
}

/// Reconciles the selected targets.
async fn cmd_reconcile(
    cli: &Cli,
    resolver: &ConfigResolver,
    categories: &[Category],
    formatter: &OutputFormatter,
) -> Result<ExitCode> {
    let targets = cli.selector().select(resolver)?;
    info!(
        "Reconciling {} targets: {}",
        targets.len(),
        categories
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );

    let api_key = ConfigParser::get_api_key()?;
    let client = HerokuClient::from_env(&api_key)?;
    let runner = ShellRunner::new(cli.strict);
    if !runner.is_strict() {
        warn!("Strict mode is off, failed platform commands will be ignored");
    }

    let reconciler = Reconciler::new(resolver, &client, &runner);
    let result = reconciler.reconcile(&targets, categories).await?;

    println!("{}", formatter.format_reconciliation(&result));

    if result.success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

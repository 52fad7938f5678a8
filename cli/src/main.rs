//! CLI entrypoint for quorum-gate
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

mod commands;
mod logging;
mod output;
mod progress;

use anyhow::{Context, Result, bail};
use clap::Parser;
use commands::{Cli, Command, ConfigAction, OutputFormat, RunArgs};
use output::{ConsoleFormatter, JsonFormatter};
use progress::{ProgressReporter, SimpleProgress};
use quorum_gate_application::{
    CachedConsensusStore, ConsensusRepository, RoundProgressNotifier, RoundResult,
    RunRoundInput, RunRoundUseCase,
};
use quorum_gate_domain::{RoundFilter, RoundId, Verdict};
use quorum_gate_infrastructure::{
    ConfigLoader, FileConfig, ProcessSupervisor, SqliteConsensusStore, spawn_maintenance_daemon,
};
use std::io::{IsTerminal, Read};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Exit status for a settled round that did not reach quorum
const EXIT_DEGRADED: u8 = 2;
/// Exit status for a round with no successful agent
const EXIT_FAILED: u8 = 3;
/// Exit status when the round was interrupted (128 + SIGINT)
const EXIT_CANCELLED: u8 = 130;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let _log_guard = logging::init(cli.verbose, cli.log_file.as_deref())?;

    info!("Starting quorum-gate");

    let mut config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref())?
    };
    if let Some(db) = &cli.db {
        config.store.path = Some(db.clone());
    }

    match &cli.command {
        Command::Run(args) => run(&cli, &config, args).await,
        Command::Show { round_id, output } => {
            let store = open_store(&config)?;
            let stored = store.read_round(&RoundId::new(round_id.as_str())).await?;
            let text = match output {
                OutputFormat::Text => ConsoleFormatter::format_stored(&stored),
                OutputFormat::Content => ConsoleFormatter::format_content(&stored.round),
                OutputFormat::Json => JsonFormatter::format(&stored)?,
            };
            println!("{text}");
            Ok(ExitCode::SUCCESS)
        }
        Command::List {
            milestone,
            stage,
            limit,
            output,
        } => {
            let store = open_store(&config)?;
            let mut filter = RoundFilter::new().with_limit(*limit);
            if let Some(milestone) = milestone {
                filter = filter.with_milestone(milestone.as_str());
            }
            if let Some(stage) = stage {
                filter = filter.with_stage(stage.as_str());
            }
            let rounds = store.list_rounds(&filter).await?;
            match output {
                OutputFormat::Json => println!("{}", JsonFormatter::format(&rounds)?),
                OutputFormat::Text | OutputFormat::Content => {
                    print!("{}", ConsoleFormatter::format_list(&rounds))
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Maintain { daemon } => maintain(&config, *daemon).await,
        Command::Config { action } => show_config(&cli, &config, *action),
    }
}

async fn run(cli: &Cli, config: &FileConfig, args: &RunArgs) -> Result<ExitCode> {
    for warning in config.ensure_valid()? {
        warn!("{}", warning);
    }

    let roster = config.roster_for(&args.stage)?;
    let round_config = config.round_config()?;
    let supervisor = Arc::new(ProcessSupervisor::new(
        config.supervisor.to_supervisor_config(),
    ));
    let store = Arc::new(open_store(config)?);

    // === Cancellation ===
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; terminating agents");
                cancel.cancel();
            }
        });
    }

    let progress: Arc<dyn RoundProgressNotifier> = if cli.quiet {
        Arc::new(quorum_gate_application::NoProgress)
    } else if std::io::stderr().is_terminal() {
        Arc::new(ProgressReporter::new())
    } else {
        Arc::new(SimpleProgress)
    };

    let use_case = RunRoundUseCase::new(supervisor, store, round_config)
        .with_cancellation(cancel)
        .with_progress(progress);

    let mut input = RunRoundInput::new(args.milestone.as_str(), args.stage.as_str(), roster);
    if let Some(text) = read_input(args)? {
        input = input.with_input(text);
    }

    let result = use_case.execute(input).await?;

    let text = match args.output {
        OutputFormat::Text => ConsoleFormatter::format_result(&result),
        OutputFormat::Content => ConsoleFormatter::format_content(&result.round),
        OutputFormat::Json => JsonFormatter::format_result(&result)?,
    };
    println!("{text}");

    Ok(exit_code(&result))
}

fn exit_code(result: &RoundResult) -> ExitCode {
    if result.cancelled {
        return ExitCode::from(EXIT_CANCELLED);
    }
    match result.verdict() {
        Verdict::Accepted => ExitCode::SUCCESS,
        Verdict::Degraded => ExitCode::from(EXIT_DEGRADED),
        Verdict::Failed => ExitCode::from(EXIT_FAILED),
    }
}

fn read_input(args: &RunArgs) -> Result<Option<String>> {
    if let Some(text) = &args.input {
        return Ok(Some(text.clone()));
    }
    match args.input_file.as_deref() {
        None => Ok(None),
        Some(path) if path.as_os_str() == "-" => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read prompt from stdin")?;
            Ok(Some(text))
        }
        Some(path) => std::fs::read_to_string(path)
            .map(Some)
            .with_context(|| format!("Failed to read prompt file {}", path.display())),
    }
}

fn open_store(config: &FileConfig) -> Result<CachedConsensusStore<SqliteConsensusStore>> {
    let path = config.store.resolved_path()?;
    let store = SqliteConsensusStore::open(&path, &config.store.to_pool_options())
        .with_context(|| format!("Failed to open consensus store at {}", path.display()))?;
    Ok(CachedConsensusStore::new(Arc::new(store)))
}

async fn maintain(config: &FileConfig, daemon: bool) -> Result<ExitCode> {
    let store = open_store(config)?;
    let retention = config.store.to_retention();

    let report = store.run_maintenance(&retention).await?;
    print!("{}", ConsoleFormatter::format_report(&report));

    if daemon {
        let interval = config.store.maintenance_interval();
        if interval.is_zero() {
            bail!("store.maintenance_interval_hours must be greater than 0");
        }
        let cancel = CancellationToken::new();
        let handle = spawn_maintenance_daemon(
            Arc::new(store),
            retention,
            interval,
            cancel.clone(),
        );
        info!("Maintenance daemon running every {:?}; Ctrl-C to stop", interval);
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;
        cancel.cancel();
        handle.await.context("Maintenance daemon panicked")?;
    }

    Ok(ExitCode::SUCCESS)
}

fn show_config(cli: &Cli, config: &FileConfig, action: ConfigAction) -> Result<ExitCode> {
    match action {
        ConfigAction::Show => {
            print!(
                "{}",
                toml::to_string_pretty(config).context("Failed to render configuration")?
            );
            Ok(ExitCode::SUCCESS)
        }
        ConfigAction::Paths => {
            println!("Configuration sources (in priority order):");
            for line in ConfigLoader::describe_sources(cli.config.as_deref()) {
                println!("{line}");
            }
            Ok(ExitCode::SUCCESS)
        }
        ConfigAction::Validate => {
            let issues = config.validate();
            if issues.is_empty() {
                println!("Configuration OK");
                return Ok(ExitCode::SUCCESS);
            }
            for issue in &issues {
                println!("{issue}");
            }
            if issues.iter().any(|issue| issue.is_error()) {
                Ok(ExitCode::FAILURE)
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use evidence_custodian::cli::{Args, Command};
use evidence_custodian::config::{load_or_create_config, CustodyConfig};
use evidence_custodian::custody::{CustodyEventDetail, CustodyLedger};
use evidence_custodian::integrity::IntegrityManager;
use evidence_custodian::models::{Domain, EvidenceRecord, ToolTier};
use evidence_custodian::orchestrator::Orchestrator;
use evidence_custodian::session::SessionContext;

fn main() -> Result<()> {
    let args = Args::parse();

    initialize_logging(args.verbose)?;

    if let Some(cmd) = &args.command {
        return handle_subcommand(cmd, &args);
    }

    run_collection(&args)
}

/// Initialize logging with the specified verbosity level
fn initialize_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .context("Failed to initialize logger")?;
    Ok(())
}

/// Load the configuration and fold in command-line overrides
fn load_and_process_config(args: &Args) -> Result<CustodyConfig> {
    let mut config = load_or_create_config(args.config.as_deref())?;
    config.process_environment_variables();

    if let Some(investigator) = &args.investigator {
        config.investigator_id = investigator.clone();
    }
    if let Some(output) = &args.output {
        config.evidence_dir = output.to_string_lossy().to_string();
    }

    let problems = config.validate();
    if !problems.is_empty() {
        for problem in &problems {
            warn!("Configuration problem: {}", problem);
        }
        bail!("configuration is invalid ({} problems)", problems.len());
    }

    Ok(config)
}

/// Run a full collection session: collect, merge, seal, log custody
fn run_collection(args: &Args) -> Result<()> {
    info!("Starting evidence collection");

    let config = load_and_process_config(args)?;
    let domains = Domain::expand_selection(&args.domains)?;

    let session = SessionContext::create(Path::new(&config.evidence_dir))?;
    let orchestrator = Orchestrator::new(config.clone())?;

    let mut record = orchestrator.run(&session, &domains, args.advanced)?;
    let hash = IntegrityManager::persist(&mut record, &session)?;

    if args.skip_custody_log {
        warn!("Custody logging skipped by request; this session has no custody trail");
    } else {
        record_collection_event(&session, &config, &record, &hash, &domains)?;
    }

    info!(
        "Session {} completed: {} of {} domains produced usable evidence",
        session.session_id(),
        record.usable_domains(),
        domains.len()
    );
    info!("Evidence file: {}", session.evidence_file().display());
    info!("Evidence hash: {}", hash);
    Ok(())
}

/// Append the session's COLLECTION event to the custody log
fn record_collection_event(
    session: &SessionContext,
    config: &CustodyConfig,
    record: &EvidenceRecord,
    hash: &str,
    domains: &[Domain],
) -> Result<()> {
    let mut ledger = CustodyLedger::open(session)?;
    ledger.record(
        &session.evidence_id(),
        &config.investigator_id,
        CustodyEventDetail::Collection {
            evidence_hash: hash.to_string(),
            collection_source: record.host.os_source(),
            domains: domains.iter().map(|d| d.to_string()).collect(),
            tools_used: record.all_tools_used(),
        },
    )?;
    Ok(())
}

fn handle_subcommand(cmd: &Command, args: &Args) -> Result<()> {
    match cmd {
        Command::Tools => {
            let config = load_and_process_config(args)?;
            let orchestrator = Orchestrator::new(config)?;
            for tool in orchestrator.list_available_tools() {
                let tier = match tool.tier {
                    ToolTier::Core => "core",
                    ToolTier::Advanced => "advanced",
                };
                let location = tool
                    .resolved_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "not found".to_string());
                println!("{:<16} {:<10} {}", tool.name, tier, location);
            }
            Ok(())
        }
        Command::InitConfig { path } => {
            info!("Writing default configuration to {}", path.display());
            CustodyConfig::default().save_to_yaml_file(path)?;
            Ok(())
        }
        Command::Verify { session, hash } => {
            let session = SessionContext::open(session)?;
            let report = match hash {
                Some(expected) => IntegrityManager::verify_against(&session, expected)?,
                None => IntegrityManager::verify(&session)?,
            };

            if session.custody_log().is_file() {
                let config = load_and_process_config(args)?;
                let mut ledger = CustodyLedger::open(&session)?;
                ledger.verify_integrity(
                    &session.evidence_id(),
                    &actor_id(args, &config),
                    &report.computed_hash,
                    None,
                )?;
            }

            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.verified {
                bail!("evidence verification failed for session {}", session.session_id());
            }
            Ok(())
        }
        Command::Chain { session } => {
            let session = SessionContext::open(session)?;
            let ledger = CustodyLedger::open(&session)?;
            let chain = ledger.chain(&session.evidence_id());
            println!("{}", serde_json::to_string_pretty(&chain)?);
            Ok(())
        }
        Command::Stats { session } => {
            let session = SessionContext::open(session)?;
            let ledger = CustodyLedger::open(&session)?;
            println!("{}", serde_json::to_string_pretty(&ledger.statistics())?);
            Ok(())
        }
        Command::Access { session, purpose } => {
            let config = load_and_process_config(args)?;
            let session = SessionContext::open(session)?;
            let mut ledger = CustodyLedger::open(&session)?;
            ledger.record(
                &session.evidence_id(),
                &actor_id(args, &config),
                CustodyEventDetail::Access {
                    purpose: purpose.clone(),
                },
            )?;
            Ok(())
        }
        Command::Transfer { session, to, notes } => {
            let config = load_and_process_config(args)?;
            let session = SessionContext::open(session)?;
            let mut ledger = CustodyLedger::open(&session)?;
            ledger.record(
                &session.evidence_id(),
                &actor_id(args, &config),
                CustodyEventDetail::CustodyTransfer {
                    recipient: to.clone(),
                    notes: notes.clone(),
                },
            )?;
            info!("Custody of {} transferred to {}", session.evidence_id(), to);
            Ok(())
        }
        Command::Status { session } => {
            let session = SessionContext::open(session)?;
            println!("{}", serde_json::to_string_pretty(&session.status())?);
            Ok(())
        }
    }
}

fn actor_id(args: &Args, config: &CustodyConfig) -> String {
    args.investigator
        .clone()
        .unwrap_or_else(|| config.investigator_id.clone())
}

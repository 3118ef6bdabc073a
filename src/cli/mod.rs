//! Command-line interface.

use std::path::PathBuf;

use anyhow::Context;
use chrono::Duration;
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::config::Config;
use crate::models::SourceDocument;
use crate::report::LogNotifier;
use crate::repository::{
    LeaseRepository, MessageRepository, QuarantineRepository, RecordRepository,
};
use crate::services::gaps::GapDetector;
use crate::services::scan::Scanner;
use crate::vault::PdfVault;

#[derive(Parser)]
#[command(name = "waybill")]
#[command(about = "Delivery note scanning and ledger system")]
#[command(version)]
pub struct Cli {
    /// Configuration file path
    #[arg(long, global = true, env = "WAYBILL_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Process every candidate document in the watched directory
    Scan,

    /// Run gap detection over already-persisted records
    Gaps,

    /// List diagnostic messages
    Messages {
        /// Include deactivated messages
        #[arg(short, long)]
        all: bool,

        /// Emit JSON instead of the table
        #[arg(long)]
        json: bool,
    },

    /// Show record, quarantine and message counts
    Status {
        /// Emit JSON instead of the table
        #[arg(long)]
        json: bool,
    },
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Scan => cmd_scan(&config),
        Commands::Gaps => cmd_gaps(&config),
        Commands::Messages { all, json } => cmd_messages(&config, all, json),
        Commands::Status { json } => cmd_status(&config, json),
    }
}

/// Open every repository on the shared database.
///
/// This is the batch's single fatal failure point: an unreachable
/// store aborts the run before any document is touched.
fn open_repositories(
    config: &Config,
) -> anyhow::Result<(
    RecordRepository,
    QuarantineRepository,
    MessageRepository,
    LeaseRepository,
)> {
    let db = &config.storage.database;
    if let Some(parent) = db.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let context = || format!("storage unreachable at {}", db.display());
    Ok((
        RecordRepository::new(db).with_context(context)?,
        QuarantineRepository::new(db).with_context(context)?,
        MessageRepository::new(db).with_context(context)?,
        LeaseRepository::new(db).with_context(context)?,
    ))
}

fn cmd_scan(config: &Config) -> anyhow::Result<()> {
    let (records, quarantine, messages, leases) = open_repositories(config)?;
    let vault = PdfVault::new(
        &config.scanner.watched_dir,
        &config.scanner.quarantine_dir,
        &config.scanner.recorded_dir,
        &config.scanner.failed_dir,
    )?;
    let registry = config.plate_registry();
    let notifier = LogNotifier;

    let scanner = Scanner::new(
        &vault,
        &records,
        &quarantine,
        &messages,
        &leases,
        &registry,
        &notifier,
        Duration::minutes(config.scanner.lease_ttl_minutes),
    );
    let report = scanner.run_batch()?;

    println!(
        "{} documents, {} pages: {} recorded, {} promoted, {} quarantined, {} deferred, {} new gaps",
        report.documents,
        report.pages,
        report.recorded,
        report.promoted,
        report.quarantined,
        report.deferred,
        report.gaps_flagged,
    );
    Ok(())
}

fn cmd_gaps(config: &Config) -> anyhow::Result<()> {
    let (records, _, messages, _) = open_repositories(config)?;
    let flagged = GapDetector::new(&records, &messages).run()?;
    println!("{flagged} new gaps flagged");
    Ok(())
}

fn cmd_messages(config: &Config, all: bool, json: bool) -> anyhow::Result<()> {
    let (_, _, messages, _) = open_repositories(config)?;
    let listed = if all {
        messages.all()?
    } else {
        messages.active()?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&listed)?);
        return Ok(());
    }

    if listed.is_empty() {
        println!("no messages");
        return Ok(());
    }
    for message in listed {
        let state = if message.active { "active" } else { "-" };
        println!(
            "{:>6}  {:8}  {:7}  {}",
            message.id,
            message.kind.as_str(),
            state,
            message.text
        );
    }
    Ok(())
}

/// Snapshot printed by the `status` command.
#[derive(Serialize)]
struct StatusReport {
    records: i64,
    quarantined_total: i64,
    quarantined_pending: i64,
    active_messages: i64,
    periods: Vec<(i32, u32)>,
    documents: Vec<SourceDocument>,
}

fn cmd_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let (records, quarantine, messages, leases) = open_repositories(config)?;
    let vault = PdfVault::new(
        &config.scanner.watched_dir,
        &config.scanner.quarantine_dir,
        &config.scanner.recorded_dir,
        &config.scanner.failed_dir,
    )?;

    let report = StatusReport {
        records: records.count()?,
        quarantined_total: quarantine.count()?,
        quarantined_pending: quarantine.count_unresolved()?,
        active_messages: messages.count_active()?,
        periods: records.periods()?,
        documents: vault.documents(&leases.active_sources()?)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("records:              {}", report.records);
    println!("quarantined total:    {}", report.quarantined_total);
    println!("quarantined pending:  {}", report.quarantined_pending);
    println!("active messages:      {}", report.active_messages);
    if !report.periods.is_empty() {
        let periods: Vec<String> = report
            .periods
            .iter()
            .map(|(year, month)| format!("{year}-{month:02}"))
            .collect();
        println!("periods with records: {}", periods.join(", "));
    }

    if report.documents.is_empty() {
        return Ok(());
    }
    println!();
    for document in report.documents {
        println!(
            "{:11}  {:>3} pages  {}",
            document.state.as_str(),
            document.pages,
            document.name
        );
    }
    Ok(())
}

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::attach::{self, AttachOptions};
use crate::commands::ingest::{self, IngestOptions};
use crate::commands::ingest_batch::{self, IngestBatchOptions};
use crate::commands::repair::{self, RepairOptions};
use crate::commands::show::{self, ShowOptions};
use crate::commands::status;
use crate::commands::verify::{self, VerifyOptions};
use crate::commands::CommandReport;
use crate::ledger::event::EventKind;
use crate::logging;

#[derive(Debug, Parser)]
#[command(
    name = "client-ledger",
    version,
    about = "Merge partial client telemetry into one record per client"
)]
struct Cli {
    /// Print the command report as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Debug-level logging for this crate (RUST_LOG still wins).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct NetworkArgs {
    #[arg(long)]
    ip: Option<String>,
    #[arg(long = "user-agent")]
    user_agent: Option<String>,
    /// Pre-resolved address attributes as a JSON object.
    #[arg(long = "ip-details")]
    ip_details: Option<String>,
    /// RFC 3339 instant; defaults to now.
    #[arg(long)]
    timestamp: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Record a form sighting: email plus hardware JSON carrying `uuid`.
    Sighting {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        hardware: Option<String>,
        /// Device key when the hardware document has none.
        #[arg(long)]
        key: Option<String>,
        #[command(flatten)]
        network: NetworkArgs,
    },
    /// Record a hardware-only sighting.
    Hardware {
        #[arg(long)]
        key: Option<String>,
        #[arg(long)]
        hardware: Option<String>,
        #[command(flatten)]
        network: NetworkArgs,
    },
    /// Attach an email to a device key.
    Email {
        #[arg(long)]
        key: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[command(flatten)]
        network: NetworkArgs,
    },
    /// Ingest a JSONL file of events in order.
    IngestBatch { file: PathBuf },
    /// Print one record or all records.
    Show {
        #[arg(long)]
        key: Option<String>,
    },
    Status,
    /// Check that the text report matches the record store.
    Verify {
        /// Also run `status` and fail on unrecognized LEDGER_* variables.
        #[arg(long)]
        strict: bool,
    },
    /// Regenerate the text report from the record store.
    Repair {
        #[arg(long)]
        dry_run: bool,
    },
    /// Store a binary attachment under a record key.
    Attach {
        #[arg(long)]
        key: String,
        #[arg(long, default_value = "blob")]
        kind: String,
        #[arg(long)]
        file: PathBuf,
    },
}

fn ingest_options(
    kind: EventKind,
    key: Option<String>,
    email: Option<String>,
    hardware: Option<String>,
    network: NetworkArgs,
) -> IngestOptions {
    IngestOptions {
        kind,
        key,
        email,
        ip: network.ip,
        user_agent: network.user_agent,
        hardware,
        ip_details: network.ip_details,
        timestamp: network.timestamp,
    }
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    let status = if report.ok { "ok" } else { "failed" };
    println!("[{status}] {}", report.command);
    for detail in &report.details {
        println!("  {detail}");
    }
    for issue in &report.issues {
        println!("  ! {issue}");
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let report = match cli.command {
        Command::Sighting {
            email,
            hardware,
            key,
            network,
        } => ingest::run(&ingest_options(
            EventKind::Sighting,
            key,
            email,
            hardware,
            network,
        ))?,
        Command::Hardware {
            key,
            hardware,
            network,
        } => ingest::run(&ingest_options(
            EventKind::HardwareSighting,
            key,
            None,
            hardware,
            network,
        ))?,
        Command::Email {
            key,
            email,
            network,
        } => ingest::run(&ingest_options(
            EventKind::EmailUpdate,
            key,
            email,
            None,
            network,
        ))?,
        Command::IngestBatch { file } => ingest_batch::run(&IngestBatchOptions { file })?,
        Command::Show { key } => show::run(&ShowOptions { key })?,
        Command::Status => status::run()?,
        Command::Verify { strict } => verify::run(&VerifyOptions { strict })?,
        Command::Repair { dry_run } => repair::run(&RepairOptions { dry_run })?,
        Command::Attach { key, kind, file } => attach::run(&AttachOptions { key, kind, file })?,
    };

    print_report(&report, cli.json)?;
    if !report.ok {
        anyhow::bail!("{} reported {} issue(s)", report.command, report.issues.len());
    }
    Ok(())
}

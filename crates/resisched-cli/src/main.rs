//! Resisched CLI: local verification and schema inspection over a
//! schedule database, no running server to talk to (unlike the
//! teacher's websocket-backed debug/exercise commands).

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use resisched_core::acgme_audit;
use resisched_core::ports::{AssignmentRepository, ContextRepository};
use resisched_core::SchedulingContext;
use resisched_storage::SqliteStore;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "resisched")]
#[command(about = "Residency scheduling engine CLI", long_about = None)]
struct Cli {
    /// Path to the schedule database
    #[arg(short, long, default_value = "resisched.db")]
    db: PathBuf,

    /// Verbosity level (0=error, 1=warn, 2=info, 3=debug, 4=trace)
    #[arg(short, long, default_value = "2")]
    verbosity: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the C6 ACGME audit over a persisted schedule's date range
    VerifySchedule {
        /// First date of the range, inclusive (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,
        /// Last date of the range, inclusive (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,
    },
    /// Schema inspection commands
    Schema {
        #[command(subcommand)]
        command: SchemaCommands,
    },
}

#[derive(Subcommand)]
enum SchemaCommands {
    /// Print the live table/column manifest as JSON
    Export,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    let db_path = cli.db.to_str().context("invalid database path")?.to_string();

    match cli.command {
        Commands::VerifySchedule { start, end } => {
            let valid = verify_schedule(&db_path, start, end).await?;
            if !valid {
                std::process::exit(1);
            }
        }
        Commands::Schema { command } => match command {
            SchemaCommands::Export => export_schema(&db_path).await?,
        },
    }

    Ok(())
}

/// Load the persisted schedule over `[start, end]`, run the C6 audit,
/// print a human-readable report, and return whether it passed.
async fn verify_schedule(db_path: &str, start: NaiveDate, end: NaiveDate) -> Result<bool> {
    info!("Opening schedule database at {db_path}");
    let store = SqliteStore::connect(db_path).await.context("failed to open schedule database")?;

    let people = store.people().await?;
    let blocks = store.blocks(start, end).await?;
    let templates = store.templates().await?;
    let absences = store.absences(start, end).await?;
    let existing_assignments = store.existing_assignments(start, end).await?;
    let assignments = store.for_range(start, end).await?;

    let context = SchedulingContext::build(people, blocks, templates, existing_assignments, &absences);
    let audit = acgme_audit::validate_all(&assignments, &context, start, end);

    println!("=== ACGME Audit: {start} to {end} ===");
    println!("Valid:      {}", audit.valid);
    println!("Violations: {}", audit.summary.total);
    for (rule, count) in &audit.summary.by_rule {
        println!("  {rule}: {count}");
    }
    for violation in &audit.violations {
        println!("  [{:?}] {}", violation.severity, violation.message);
    }

    Ok(audit.valid)
}

async fn export_schema(db_path: &str) -> Result<()> {
    let store = SqliteStore::connect(db_path).await.context("failed to open schedule database")?;
    let manifest = resisched_storage::table_manifest(store.pool()).await?;
    println!("{}", serde_json::to_string_pretty(&manifest)?);
    Ok(())
}

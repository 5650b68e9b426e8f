use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use directory::config::AppConfig;
use directory::database::init_db;
use directory::models::{EmployeeFilter, EmployeeId};
use directory::store::{EmployeeFiles, SeaRecordStore};
use directory::EmployeeService;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "directory")]
#[command(about = "Operator tools for the employee directory")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe the record store and the blob store
    Health,
    /// Aggregate counts over all employees
    Stats,
    /// Report blobs and records that disagree (read-only)
    Orphans,
    /// List employees, optionally filtered
    List {
        /// Exact department, case-insensitive
        #[arg(long)]
        department: Option<String>,
        /// Exact position, case-insensitive
        #[arg(long)]
        position: Option<String>,
        /// Substring of name or email, case-insensitive
        #[arg(long)]
        query: Option<String>,
    },
    /// Show one employee with a fresh picture URL
    Get { id: EmployeeId },
    /// Distinct department names
    Departments,
    /// Distinct position titles
    Positions,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load().context("Failed to load config")?;

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_new(&config.log.level).context("Invalid log.level directive")?,
        )
        .with_writer(std::io::stderr)
        .init();

    let db = init_db(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to initialize database")?;
    let records = Arc::new(SeaRecordStore::new(db, config.database.table_page_size));
    let backend = config
        .storage
        .build()
        .await
        .context("Failed to initialize blob storage")?;
    info!(backend = ?config.storage.backend, "Blob storage ready");

    let files = EmployeeFiles::new(
        backend,
        config.storage.max_picture_size,
        config.storage.max_document_size,
    );
    let service = EmployeeService::new(records, files, config.url_ttl());

    match cli.command {
        Commands::Health => print_json(&service.health_check().await),
        Commands::Stats => print_json(&service.get_statistics().await?),
        Commands::Orphans => print_json(&service.find_orphans().await?),
        Commands::List {
            department,
            position,
            query,
        } => {
            let filter = EmployeeFilter {
                query,
                department,
                position,
            };
            print_json(&service.list_employees(&filter).await?)
        }
        Commands::Get { id } => print_json(&service.get_employee(id).await?),
        Commands::Departments => print_json(&service.list_departments().await?),
        Commands::Positions => print_json(&service.list_positions().await?),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    println!("{json}");
    Ok(())
}

mod config;
mod entities;
mod http;
mod maintenance;
mod models;
mod reconcile;
mod sheets;
mod state;
mod store;
mod workbook;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RegistryConfig;
use crate::maintenance::{AssumeYes, Confirm, DryRun, Maintenance, Outcome, StdinConfirm};
use crate::reconcile::import::rows_from_cells;
use crate::sheets::{DisabledMirror, SheetsMirror, VoteMirror};
use crate::state::AppState;
use crate::store::{PostgresVoterStore, VoterStore};
use anyhow::{Context, Result};
use axum::Router;
use clap::{Args, Parser, Subcommand};
use migration::MigratorTrait;
use sea_orm::ConnectOptions;
use sea_orm::Database;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "voter-registry")]
#[command(about = "Voter registry API and maintenance commands", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API (default)
    Serve,
    /// Copy family and classification from a workbook onto matching voters
    Import {
        path: PathBuf,
        /// Worksheet name; the first sheet when omitted
        #[arg(long)]
        sheet: Option<String>,
        #[command(flatten)]
        gate: GateArgs,
    },
    /// Delete voters sharing a name and father name, keeping the lowest id
    Dedup {
        #[command(flatten)]
        gate: GateArgs,
    },
    /// Suffix repeated register numbers so every value is unique
    FixRegisterNumbers {
        #[command(flatten)]
        gate: GateArgs,
    },
}

#[derive(Args)]
struct GateArgs {
    /// Apply without asking
    #[arg(short, long, conflicts_with = "dry_run")]
    yes: bool,
    /// Print the plan and exit
    #[arg(long)]
    dry_run: bool,
}

impl GateArgs {
    fn confirm(&self) -> Box<dyn Confirm> {
        if self.dry_run {
            Box::new(DryRun)
        } else if self.yes {
            Box::new(AssumeYes)
        } else {
            Box::new(StdinConfirm)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = RegistryConfig::load().context("Failed to load configuration")?;
    let database = connect_database(&config).await?;
    run_migrations(&database).await?;
    let store = PostgresVoterStore::new(database);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&config, Arc::new(store)).await,
        Commands::Import { path, sheet, gate } => {
            let cells = workbook::read_rows(&path, sheet.as_deref())
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let rows = rows_from_cells(&cells, &config.import);
            let confirm = gate.confirm();
            let outcome = Maintenance::new(&store, confirm.as_ref(), &config.maintenance)
                .import(&rows)
                .await?;
            report(outcome, |summary| summary.failed);
            Ok(())
        }
        Commands::Dedup { gate } => {
            let confirm = gate.confirm();
            let outcome = Maintenance::new(&store, confirm.as_ref(), &config.maintenance)
                .dedup()
                .await?;
            report(outcome, |summary| summary.deletion.failed_batches);
            Ok(())
        }
        Commands::FixRegisterNumbers { gate } => {
            let confirm = gate.confirm();
            let outcome = Maintenance::new(&store, confirm.as_ref(), &config.maintenance)
                .repair_register_numbers()
                .await?;
            report(outcome, |summary| summary.tally.failed);
            Ok(())
        }
    }
}

/// Per-item failures are already logged; they do not change the exit code.
fn report<R>(outcome: Outcome<R>, failures: impl Fn(&R) -> usize) {
    match outcome {
        Outcome::NothingToDo => println!("Nothing to do"),
        Outcome::Declined => println!("Cancelled; no changes made"),
        Outcome::Applied(report) => {
            let failed = failures(&report);
            if failed > 0 {
                warn!("{failed} operations failed; see log above");
            }
        }
    }
}

async fn serve(config: &RegistryConfig, store: Arc<dyn VoterStore>) -> Result<()> {
    let mirror: Arc<dyn VoteMirror> = match &config.spreadsheet {
        Some(spreadsheet) => Arc::new(
            SheetsMirror::new(spreadsheet.clone())
                .context("Failed to initialize spreadsheet client")?,
        ),
        None => {
            info!("No spreadsheet configured; vote mirroring disabled");
            Arc::new(DisabledMirror)
        }
    };
    let app_state = AppState::new(store, mirror, config.maintenance.page_size);

    let listener = TcpListener::bind(config.server.address())
        .await
        .context("Failed to bind HTTP listener")?;
    let local_addr = listener
        .local_addr()
        .context("Failed to obtain listener address")?;
    info!("Voter registry API listening on {local_addr}");

    let router: Router = http::router(app_state);
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server exited with error")
}

fn init_tracing() {
    let default_filter = "info";
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    assert!(filter.len() < 256, "Tracing filter length exceeds bounds");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .compact()
        .init();
}

async fn connect_database(config: &RegistryConfig) -> Result<sea_orm::DatabaseConnection> {
    let mut options = ConnectOptions::new(config.database.url.clone());
    options
        .max_connections(config.database.max_connections)
        .sqlx_logging(true)
        .sqlx_logging_level(tracing::log::LevelFilter::Debug)
        .acquire_timeout(Duration::from_secs(10));

    if let Some(min) = config.database.min_connections {
        options.min_connections(min);
    }

    Database::connect(options)
        .await
        .context("Failed to connect to PostgreSQL")
}

async fn run_migrations(database: &sea_orm::DatabaseConnection) -> Result<()> {
    migration::Migrator::up(database, None)
        .await
        .context("Database migrations failed")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {err}");
        return;
    }
    info!("Shutdown signal received");
}

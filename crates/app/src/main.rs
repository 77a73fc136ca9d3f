mod config;
mod error;
mod handlers;
mod logging;
mod router;
mod server;

use chrono::Utc;
use clap::{Parser, Subcommand};
use config::{Settings, VectorBackend};
use logging::{init_logging, LoggingArgs};
use server::Services;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "pet-policy-assistant", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    settings: Settings,

    #[command(flatten)]
    logging: LoggingArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API.
    Serve,
    /// Ingest every PDF under a folder into the vector store.
    Ingest {
        /// Folder that contains PDFs recursively.
        #[arg(long)]
        folder: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guards = init_logging(&cli.logging)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "pet-policy-assistant boot"
    );

    let services = Services::from_settings(&cli.settings)?;

    match cli.command {
        Command::Serve => server::serve(services, &cli.settings).await?,
        Command::Ingest { folder } => {
            if cli.settings.vector_backend == VectorBackend::Memory {
                warn!("ingesting into the in-memory index; nothing will persist after this run");
            }

            let report = services
                .pipeline
                .ingest_folder_best_effort(&folder)
                .await?;

            if !report.skipped_files.is_empty() {
                warn!(
                    skipped = report.skipped_files.len(),
                    folder = %folder.display(),
                    "some pdfs were skipped"
                );
                for skipped in &report.skipped_files {
                    println!("skipped {}: {}", skipped.path.display(), skipped.reason);
                }
            }

            for record in &report.records {
                println!(
                    "{} {} pages={} chunks={}",
                    record.policy_id, record.file_name, record.page_count, record.chunk_count
                );
            }

            let chunk_count = report
                .records
                .iter()
                .map(|record| record.chunk_count)
                .sum::<usize>();
            println!(
                "{} policies ({} chunks) ingested at {}",
                report.records.len(),
                chunk_count,
                Utc::now().to_rfc3339()
            );
        }
    }

    Ok(())
}

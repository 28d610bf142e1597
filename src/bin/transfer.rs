//! Bulk import/export of job records as JSON lines.

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use jobboard::{
    config::Config,
    interchange::{export_jsonl, import_jsonl},
    repositories::PgJobRepository,
};
use std::path::PathBuf;
use tokio::{
    fs::File,
    io::{BufReader, BufWriter},
};

#[derive(Parser)]
#[command(name = "transfer")]
#[command(about = "Import or export job records as JSON lines")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import records, skipping links that are already stored
    Import { file: PathBuf },

    /// Export every stored record
    Export { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(config.database_url())
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    let store = PgJobRepository::new(pool);

    match cli.command {
        Commands::Import { file } => {
            let input = File::open(&file)
                .await
                .with_context(|| format!("Failed to open {}", file.display()))?;
            let today = Local::now().date_naive();
            let report = import_jsonl(BufReader::new(input), &store, today).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Export { file } => {
            let output = File::create(&file)
                .await
                .with_context(|| format!("Failed to create {}", file.display()))?;
            let rows = export_jsonl(BufWriter::new(output), &store).await?;
            println!("{}", serde_json::json!({ "exported": rows }));
        }
    }

    Ok(())
}

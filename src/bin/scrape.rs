use anyhow::Result;
#[cfg(feature = "browser")]
use jobboard::driver::ChromeLauncher;
use jobboard::{
    config::{Config, DriverKind},
    driver::HtmlLauncher,
    ingest::{IngestSettings, run_ingestion},
    repositories::PgJobRepository,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(config.database_url())
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    // Ctrl-C stops the run between pages
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                return;
            }
            info!("Received shutdown signal, stopping after the current page...");
            cancel.cancel();
        });
    }

    let store = PgJobRepository::new(pool);
    let settings = IngestSettings::from_config(config.scrape());

    info!(driver = ?config.scrape().driver, "Starting ingestion");
    let summary = match config.scrape().driver {
        DriverKind::Html => {
            let launcher = HtmlLauncher::new(config.scrape().clone());
            run_ingestion(&launcher, &store, &settings, Some(&cancel)).await?
        }
        #[cfg(feature = "browser")]
        DriverKind::Chrome => {
            let launcher = ChromeLauncher::new(config.scrape().clone());
            run_ingestion(&launcher, &store, &settings, Some(&cancel)).await?
        }
        #[cfg(not(feature = "browser"))]
        DriverKind::Chrome => anyhow::bail!("chrome driver requires the `browser` feature"),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

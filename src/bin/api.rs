use anyhow::Result;
use jobboard::{app::build_router, app_state::AppState, config::Config};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(config.database_url())
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let app = build_router(AppState::new(pool));
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!("Listening on {}", config.bind_addr());
    axum::serve(listener, app).await?;
    Ok(())
}

use std::sync::Arc;

use dotenv::dotenv;
use natours_core::booking::StripeClient;
use natours_core::config::Config;
use natours_core::db::{create_pool, run_migrations};
use natours_core::handlers::create_router;
use natours_core::mailer::LogMailer;
use natours_core::state::AppState;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(LevelFilter::INFO.into());

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    info!("Starting Natours server...");

    let config = Config::from_env()?;

    let db_pool = create_pool(&config.database_url, config.database_max_connections).await?;
    run_migrations(&db_pool).await?;

    let payments = Arc::new(StripeClient::new(config.stripe_secret_key.clone()));
    let mailer = Arc::new(LogMailer::new(config.email_from.clone()));

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let state = AppState::new(db_pool.clone(), config, payments, mailer);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    db_pool.close().await;
    info!("Server stopped");
    Ok(())
}

//! blogstore - Main Entry Point
//! Opens the pooled data core for the blog and keeps it up until Ctrl+C

mod app;
mod settings;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use app::App;
use settings::Settings;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn init_logging() -> Result<()> {
    let log_format = std::env::var("BLOGSTORE_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("blogstore=info"))?;

    match log_format.as_str() {
        "json" => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .try_init()?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .try_init()?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging
    init_logging()?;
    info!("blogstore v{} starting...", VERSION);

    // 2. Configuration
    let settings = Settings::load()?;

    // 3. Pool, migrations, schema check, services
    let app = App::start(&settings.data).await?;

    info!("System ready. Press Ctrl+C to shutdown");

    // 4. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 5. Graceful shutdown
    app.shutdown().await;
    info!("Shutdown complete.");

    Ok(())
}

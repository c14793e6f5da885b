//! Dispatch host entry point.

use anyhow::Result;
use dispatch_host::cli::CliArgs;
use dispatch_host::config::AppConfig;
use dispatch_host::logging::setup_logging;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let mut config = AppConfig::load_from_file(&args.config_path).await?;
    config.apply_overrides(&args);

    setup_logging(&config.logging)?;
    info!(
        "🔧 Logging initialized with level: {}",
        config.logging.level
    );
    info!("🚀 Starting dispatch host v{}", env!("CARGO_PKG_VERSION"));

    match dispatch_host::run(&config).await {
        Ok(_) => Ok(()),
        Err(e) => {
            error!("❌ Dispatch host failed: {}", e);
            Err(e)
        }
    }
}

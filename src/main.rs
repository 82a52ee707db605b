use anyhow::Result;
use harakka_backup::{commands, config::AppConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config + command ---
    let (cfg, command) = AppConfig::from_env_and_args()?;
    tracing::debug!("Starting harakka-backup with config: {:?}", cfg);

    if let Err(err) = commands::run(&cfg, command).await {
        tracing::error!("{:#}", err);
        std::process::exit(1);
    }
    Ok(())
}

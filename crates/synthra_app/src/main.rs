mod commands;
mod config;
mod driver;

use anyhow::Context;
use engine_logging::{engine_info, LogDestination};

use crate::config::AppConfig;

fn main() -> anyhow::Result<()> {
    let path = config::config_path();
    let config = AppConfig::load(&path)?;

    engine_logging::initialize(
        LogDestination::default_file(),
        engine_logging::parse_level(&config.log_level),
    );
    engine_info!("Loaded configuration from {}", path.display());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(driver::run(config))
}

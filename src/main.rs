//! Demo binary: a deferred scene with terrain, shadows and TAA

use anyhow::Result;
use strata_engine::{app, EngineConfig, DEFAULT_CONFIG_FILE};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("[main] Starting Strata Engine {}", env!("CARGO_PKG_VERSION"));

    let config = EngineConfig::load_or_default(DEFAULT_CONFIG_FILE).map_err(|e| {
        log::error!("[main] Invalid configuration: {}", e);
        e
    })?;

    if let Err(e) = pollster::block_on(app::run(config)) {
        log::error!("[main] Engine stopped with error: {:#}", e);
        return Err(e);
    }
    log::info!("[main] Clean shutdown");
    Ok(())
}

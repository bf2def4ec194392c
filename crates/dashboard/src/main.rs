//! Occupancy Dashboard - Main Entry Point

use dashboard::{init_logging, run, DashboardConfig};
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1);
    let config = DashboardConfig::load(config_path.as_deref())?;
    init_logging(&config.logging)?;

    info!("=== Occupancy Dashboard v{} ===", env!("CARGO_PKG_VERSION"));
    run(config).await
}

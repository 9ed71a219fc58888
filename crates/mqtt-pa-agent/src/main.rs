//! # MQTT Physical Adapter Agent
//!
//! Hosts a single MQTT physical adapter outside any digital-twin framework.
//!
//! ## Architecture
//!
//! The agent runs three concurrent sources in one loop:
//! 1. **Notifications**: property variations and events from the adapter,
//!    folded into a shadow of the physical asset
//! 2. **Console**: `<action-key> [body]` lines on stdin, sent as action requests
//! 3. **Shutdown**: Ctrl+C stops the adapter cleanly

use anyhow::Result;
use tracing_subscriber::EnvFilter;

mod config;
mod runtime;

pub use config::AgentConfig;
pub use runtime::Agent;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting MQTT physical adapter agent"
    );

    let config = AgentConfig::from_env()?;
    let agent = Agent::new(config)?;

    agent.run().await?;

    Ok(())
}

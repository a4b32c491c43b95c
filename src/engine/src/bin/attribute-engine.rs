//! # Attribute Engine CLI
//!
//! Resolves and filters the attributes of one principal for one requester
//! and prints the released attributes as JSON.
//!
//! ```text
//! attribute-engine <principal> <requester> [attribute ...]
//! ```
//!
//! ## Configuration
//!
//! Environment variables:
//! - `ATTRIBUTE_ENGINE_CONFIG` - Path of the JSON configuration (default: attribute-engine.json)
//! - `RUST_LOG` - Log level (default: info)

use anyhow::{bail, Context};
use idp_attribute_engine::{AttributeEngine, AttributeRequest, EngineConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only the JSON result
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(principal), Some(requester)) = (args.next(), args.next()) else {
        bail!("usage: attribute-engine <principal> <requester> [attribute ...]");
    };
    let requested: Vec<String> = args.collect();

    let config_path =
        std::env::var("ATTRIBUTE_ENGINE_CONFIG").unwrap_or_else(|_| "attribute-engine.json".to_string());

    info!("Starting attribute engine v{}", idp_attribute_engine::VERSION);
    info!("Configuration: {}", config_path);

    let config = EngineConfig::from_file(&config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path))?;
    let engine = AttributeEngine::from_config(&config).context("failed to build attribute engine")?;
    engine.initialize().context("failed to initialize attribute engine")?;

    let request = AttributeRequest::new(principal)
        .with_requester(requester)
        .with_requested_attributes(requested);
    let released = engine.process(&request)?;

    let output: Vec<_> = released.into_values().collect();
    println!("{}", serde_json::to_string_pretty(&output)?);

    engine.destroy();
    Ok(())
}

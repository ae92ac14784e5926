//! Standalone extension host.
//!
//! Resolves the managed root from the environment, restores the
//! persisted-active extensions, and serves the management API. Hosts
//! embedding the framework would instead mount [`webext_api::router`]
//! into their own server and register their builtin factories first.

use std::sync::Arc;

use anyhow::Result;
use webext_core::{ExtensionRegistry, RegistryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("webext=info,info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .compact()
        .init();

    let config = RegistryConfig::from_env();
    let registry = Arc::new(ExtensionRegistry::new(config)?);

    let results = registry.initialize_all().await;
    for (name, (success, message)) in &results {
        if !success {
            tracing::warn!(extension = %name, %message, "startup enable failed");
        }
    }

    let addr = std::env::var("WEBEXT_LISTEN").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    webext_api::serve(registry, &addr).await?;
    Ok(())
}

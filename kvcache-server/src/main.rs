use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kvcache_engine::MemoryStore;

const DEFAULT_ADDR: &str = "127.0.0.1:6380";
const EXPIRER_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let addr = std::env::var("KVCACHE_SERVER_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let store = Arc::new(MemoryStore::new());
    let expirer = store.start_expirer(EXPIRER_INTERVAL);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "kvcache-server listening");

    tokio::select! {
        result = kvcache_server::serve(listener, Arc::clone(&store)) => {
            result.context("accept loop failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
        }
    }

    expirer.stop();
    Ok(())
}

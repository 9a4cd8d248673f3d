use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use signalk_core::FileConfigStorage;
use signalk_plugins::PluginHost;
use signalk_rest_provider::RestProvider;

mod http;

const DEFAULT_SELF_URN: &str = "vessels.urn:mrn:signalk:uuid:c0d79334-4e25-4245-8892-54e8ccc8021d";

fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SIGNALK_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    std::env::var("HOME")
        .map(|home| PathBuf::from(home).join(".signalk"))
        .unwrap_or_else(|_| PathBuf::from(".signalk"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,signalk_rest_provider=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("SignalK plugin runner starting...");

    // Configuration
    let http_addr: SocketAddr = std::env::var("SIGNALK_HTTP_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3000".into())
        .parse()
        .context("SIGNALK_HTTP_ADDR is not a socket address")?;
    let self_urn = std::env::var("SIGNALK_SELF_URN").unwrap_or_else(|_| DEFAULT_SELF_URN.into());
    let config_dir = config_dir();
    tracing::info!("Plugin configuration in {}", config_dir.display());

    let storage = Arc::new(FileConfigStorage::new(&config_dir));
    let host = Arc::new(PluginHost::new(&self_urn, storage));
    host.add_plugin(Arc::new(RestProvider::new()));
    host.start_all();

    // Log everything published through the host
    let mut deltas = host.subscribe_deltas();
    let delta_log = tokio::spawn(async move {
        loop {
            match deltas.recv().await {
                Ok(delta) => match serde_json::to_string(&delta) {
                    Ok(json) => tracing::debug!("delta: {}", json),
                    Err(e) => tracing::warn!("Unserializable delta: {}", e),
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Delta log lagged {} messages", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let app = http::router(host.clone()).layer(TraceLayer::new_for_http());
    let listener = tokio::net::TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("binding {}", http_addr))?;

    tracing::info!("HTTP API listening on http://{}/signalk/v1/api", http_addr);
    tracing::info!("Try these commands:");
    tracing::info!("   curl http://localhost:{}/skServer/plugins", http_addr.port());
    tracing::info!(
        "   curl -X PUT -H 'Content-Type: application/json' -d '{{\"value\": 1.5}}' http://localhost:{}/signalk/v1/api/vessels/self/<path>",
        http_addr.port()
    );

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        result = axum::serve(listener, app).into_future() => {
            if let Err(e) = result {
                tracing::error!("HTTP server error: {}", e);
            }
        }
    }

    host.stop_all();
    delta_log.abort();
    tracing::info!("Shutdown complete");
    Ok(())
}

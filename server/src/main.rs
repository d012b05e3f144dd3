#![cfg_attr(test, allow(clippy::disallowed_methods))]
// Forbid unwrap() in production code to prevent panics from corrupt data.
// Test code is allowed to use unwrap() for convenience.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
use std::net::SocketAddr;
use std::sync::Arc;

use server::api::{self, AppState};
use server::config::ServerConfig;
use server::store::QueryStore;
use server::time::{SystemTimeSource, TimeSource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment variables
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Loaded configuration: seed={}, listen_port={}, test_mode={}, chaos_rate={}",
        config.seed,
        config.listen_port,
        config.test_mode,
        config.chaos_rate
    );

    // Generate the dataset up front; every request reads from this store.
    let time: Arc<dyn TimeSource> = Arc::new(SystemTimeSource);
    #[allow(clippy::disallowed_methods)] // Arc::clone is safe and expected for shared state
    let store = match QueryStore::new(&config.seed, Arc::clone(&time)) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to generate dataset: {e}");
            std::process::exit(1);
        }
    };

    let listen_port = config.listen_port;
    let state = AppState::new(store, Arc::new(config), time);
    let app = api::router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], listen_port));
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to bind: {e}");
            std::process::exit(1);
        });

    axum::serve(listener, app).await.unwrap_or_else(|e| {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    });
}

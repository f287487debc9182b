//! Checkout bridge HTTP server.
//!
//! # Usage
//!
//! ```bash
//! # Run with default config (config.toml in current directory)
//! cargo run -p paybridge-server --release
//!
//! # Run with custom config path
//! CONFIG=/path/to/config.toml cargo run -p paybridge-server
//!
//! # Configure logging level
//! RUST_LOG=debug cargo run -p paybridge-server
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` — Path to TOML configuration file (default: `config.toml`)
//! - `HOST` / `PORT` — Override bind address and port
//! - `RUST_LOG` — Log level filter (default: `info`)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::Method;
use paybridge::notify::Notifier;
use paybridge::{ConfirmationReconciler, PaymentInitiator, TokenProvider, TransactionStore};
use paybridge_gateway::client::GatewayConfig;
use paybridge_gateway::{HttpGateway, PushSink};
use tower_http::cors;
use tracing_subscriber::EnvFilter;

use paybridge_server::config::BridgeConfig;
use paybridge_server::handlers::{AppState, bridge_router};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("Bridge server failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = BridgeConfig::load()?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        gateway = %config.gateway.base_url,
        "Loaded configuration"
    );

    let gateway = Arc::new(HttpGateway::new(GatewayConfig {
        base_url: config.gateway.base_url.clone(),
        client_id: config.gateway.client_id.clone(),
        client_secret: config.gateway.client_secret.clone(),
        wallet_mpesa: config.gateway.wallet_mpesa.clone(),
        wallet_emola: config.gateway.wallet_emola.clone(),
        timeout: config.gateway_timeout(),
    }));
    let gateway: Arc<dyn paybridge::gateway::Gateway> = gateway;

    let sink = Arc::new(PushSink::new(
        config.alerts.push_url.clone(),
        config.gateway_timeout(),
    ));
    let notifier = match &config.alerts.title {
        Some(title) => Notifier::with_title(sink, title.clone()),
        None => Notifier::new(sink),
    };

    let store = Arc::new(TransactionStore::new());
    let tokens = Arc::new(TokenProvider::new(Arc::clone(&gateway)));

    let state = AppState {
        store: Arc::clone(&store),
        initiator: Arc::new(PaymentInitiator::new(
            Arc::clone(&store),
            Arc::clone(&tokens),
            Arc::clone(&gateway),
            config.checkout.reference_prefix.clone(),
            config.checkout.amount,
        )),
        reconciler: Arc::new(ConfirmationReconciler::new(
            Arc::clone(&store),
            tokens,
            gateway,
            notifier,
            config.min_poll_interval(),
        )),
        redirect_url: config.checkout.redirect_url.clone(),
    };

    spawn_eviction_sweep(
        Arc::clone(&store),
        Duration::from_secs(config.lifecycle.eviction_sweep_secs),
        Duration::from_secs(config.lifecycle.eviction_max_age_secs),
    );

    let app: Router = bridge_router(state).layer(
        cors::CorsLayer::new()
            .allow_origin(cors::Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(cors::Any),
    );

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Bridge listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Bridge shut down gracefully");
    Ok(())
}

/// Periodically evicts aged transactions to bound memory growth.
fn spawn_eviction_sweep(store: Arc<TransactionStore>, period: Duration, max_age: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let evicted = store.evict_older_than(max_age);
            if evicted > 0 {
                tracing::info!(evicted, remaining = store.len(), "eviction sweep");
            }
        }
    });
}

/// Waits for Ctrl-C or SIGTERM (Unix) to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down..."),
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down..."),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for Ctrl-C");
        tracing::info!("Received Ctrl-C, shutting down...");
    }
}

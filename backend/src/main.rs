//! Artifact Curator - Main Entry Point

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use artifact_curator_backend::{
    api,
    clock::{Clock, SystemClock},
    config::Config,
    db,
    error::Result,
    models::user::{Role, SystemPrincipal},
    services::{
        content_store::{ContentStore, PinataClient},
        ledger_client::{LedgerClient, RpcLedgerClient},
        scheduler_service,
    },
    store::{MemoryReviewStore, PgReviewStore, ReviewStore},
    telemetry,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;
    telemetry::init_tracing(&config.log_level, &config.log_format);
    tracing::info!("Starting Artifact Curator");
    tracing::debug!(config = ?config, "Loaded configuration");

    let store = open_store(&config).await?;

    // Reserved actor for sweeper transitions
    let system_user = store
        .ensure_user(&config.system_identity, Role::Admin)
        .await?;
    let system = SystemPrincipal::new(system_user.id);
    tracing::info!("System principal: {} ({})", system_user.identity, system_user.id);

    let content: Option<Arc<dyn ContentStore>> = match &config.pinata {
        Some(pinata) => {
            tracing::info!("Pinning to Pinata at {}", pinata.api_url);
            Some(Arc::new(PinataClient::new(pinata.clone())?))
        }
        None => {
            tracing::info!("Content store not configured, pinning disabled");
            None
        }
    };

    let ledger: Option<Arc<dyn LedgerClient>> = match &config.ledger {
        Some(ledger) => {
            tracing::info!("Anchoring on {} via {}", ledger.network, ledger.rpc_url);
            Some(Arc::new(RpcLedgerClient::new(ledger.clone())?))
        }
        None => {
            tracing::info!("Ledger not configured, anchoring disabled");
            None
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = Arc::new(api::AppState::new(
        config.clone(),
        store,
        clock,
        system,
        content,
        ledger,
    ));

    // Spawn background schedulers
    scheduler_service::spawn_all(state.sweeper.clone(), config.sweep_interval());

    // Build router
    let app = api::routes::create_router(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr: SocketAddr = config.bind_address.parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn open_store(config: &Config) -> Result<Arc<dyn ReviewStore>> {
    match (config.store_backend.as_str(), &config.database_url) {
        ("postgres", Some(url)) => {
            let pool = db::create_pool(url).await?;
            tracing::info!("Connected to database");
            db::run_migrations(&pool).await?;
            tracing::info!("Database migrations complete");
            Ok(Arc::new(PgReviewStore::new(pool)))
        }
        _ => {
            tracing::warn!("Using the in-memory development store; data is lost on restart");
            Ok(Arc::new(MemoryReviewStore::new()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

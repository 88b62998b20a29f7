// Framework bootstrap for the swarm server runtime.

use crate::domain::ports::SessionStore;
use crate::frameworks::config;
use crate::interface_adapters::clients::store::{HttpStoreClient, MemoryStore};
use crate::interface_adapters::net::{create_session_handler, list_sessions_handler, ws_handler};
use crate::interface_adapters::state::AppState;
use crate::use_cases::{SessionRegistry, SessionSettings};

use axum::{
    Router,
    routing::{get, post},
};
use std::io::Result;
use std::net::SocketAddr;
use std::sync::Arc;

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    let state = build_state()?;

    let app = Router::new()
        .route(
            "/sessions",
            post(create_session_handler).get(list_sessions_handler),
        )
        .route("/ws", get(ws_handler))
        .with_state(state);

    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::from(([127, 0, 0, 1], config::http_port()));

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

fn build_state() -> Result<Arc<AppState>> {
    // The external session service is optional; without it the store lives
    // in-process and sessions don't survive a restart.
    let store: Arc<dyn SessionStore> = match config::store_service_url() {
        Some(base_url) => {
            let timeout = config::store_timeout();
            tracing::debug!(
                store_base_url = %base_url,
                store_timeout_ms = timeout.as_millis(),
                "session store client configured"
            );
            let client = HttpStoreClient::new(base_url, timeout).map_err(|e| {
                std::io::Error::other(format!("failed to initialize store client: {e}"))
            })?;
            Arc::new(client)
        }
        None => {
            tracing::debug!("no session store configured; using in-process store");
            Arc::new(MemoryStore::new())
        }
    };

    // Session registry owning the set of active engine tasks.
    let session_registry = Arc::new(SessionRegistry::new(SessionSettings {
        event_channel_capacity: config::EVENT_CHANNEL_CAPACITY,
        update_broadcast_capacity: config::UPDATE_BROADCAST_CAPACITY,
        tick_interval: config::TICK_INTERVAL,
    }));

    Ok(Arc::new(AppState {
        session_registry,
        store,
    }))
}

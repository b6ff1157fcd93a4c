//! Karavan Back binary entrypoint wiring REST, WebSocket and the room store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use karavan_back::{
    config::AppConfig,
    dao::{
        room_store::{RoomStore, memory::MemoryRoomStore},
        storage::StorageError,
    },
    routes,
    services::storage_supervisor,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config);
    if app_state.catalog().is_empty() {
        warn!("song catalog is empty; turns will have no song to sing");
    } else {
        info!(songs = app_state.catalog().len(), "song catalog loaded");
    }

    spawn_storage_supervisor(app_state.clone());
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Start the supervisor for the backend named by `STORAGE_BACKEND` (`memory` by default).
fn spawn_storage_supervisor(state: SharedState) {
    let backend = env::var("STORAGE_BACKEND").unwrap_or_else(|_| "memory".into());
    info!(backend = %backend, "selecting room store");

    match backend.as_str() {
        #[cfg(feature = "couch-store")]
        "couch" => {
            tokio::spawn(storage_supervisor::run(state, connect_couch));
        }
        #[cfg(feature = "mongo-store")]
        "mongo" => {
            tokio::spawn(storage_supervisor::run(state, connect_mongo));
        }
        other => {
            if other != "memory" {
                warn!(backend = %other, "unknown or disabled storage backend; using memory");
            }
            let store = MemoryRoomStore::new();
            tokio::spawn(storage_supervisor::run(state, move || {
                let store: Arc<dyn RoomStore> = Arc::new(store.clone());
                async move { Ok::<_, StorageError>(store) }
            }));
        }
    }
}

#[cfg(feature = "couch-store")]
async fn connect_couch() -> Result<Arc<dyn RoomStore>, StorageError> {
    use karavan_back::dao::room_store::couchdb::{CouchConfig, CouchRoomStore};

    let config = CouchConfig::from_env()?;
    let store = CouchRoomStore::connect(config).await?;
    Ok(Arc::new(store))
}

#[cfg(feature = "mongo-store")]
async fn connect_mongo() -> Result<Arc<dyn RoomStore>, StorageError> {
    use karavan_back::dao::room_store::mongodb::{MongoConfig, MongoRoomStore};

    let config = MongoConfig::from_env().await?;
    let store = MongoRoomStore::connect(config).await?;
    Ok(Arc::new(store))
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

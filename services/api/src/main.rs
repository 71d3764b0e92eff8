//! SentryDash API server
//!
//! Tracks live room occupancy and suggests alternate rooms when a room
//! overflows.

use std::sync::Arc;

use anyhow::Result;
use sentrydash_api::{
    api,
    config::{self, StoreBackend},
    db::LazyDatabase,
    service::OccupancyService,
    state::AppState,
    store::{
        seed, MemoryRoomStore, MemoryRosterStore, PgRoomStore, PgRosterStore, RoomStore,
        RosterStore,
    },
};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = config::Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to SENTRYDASH_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting SentryDash API");
    info!(listen_addr = %config.listen_addr, store = ?config.store, "Configuration loaded");

    let database = match config.store {
        StoreBackend::Memory => None,
        StoreBackend::Postgres => Some(Arc::new(LazyDatabase::new(config.database.clone()))),
    };
    let rooms: Arc<dyn RoomStore> = match &database {
        Some(db) => Arc::new(PgRoomStore::new(db.clone())),
        None => Arc::new(MemoryRoomStore::new()),
    };
    let roster: Arc<dyn RosterStore> = match &database {
        Some(db) => Arc::new(PgRosterStore::new(db.clone())),
        None => Arc::new(MemoryRosterStore::new()),
    };

    // Run migrations in dev mode
    if let (Some(db), true) = (&database, config.dev_mode) {
        info!("Running database migrations (dev mode)");
        if let Err(e) = db.run_migrations().await {
            error!(error = %e, "Failed to run migrations");
            return Err(e.into());
        }
    }

    if let Some(path) = &config.rooms_file {
        seed::seed_rooms(rooms.as_ref(), path).await?;
    }
    if let Some(path) = &config.roster_file {
        seed::seed_roster(roster.as_ref(), path).await?;
    }

    let service = OccupancyService::new(rooms, roster, config.service);
    let app = api::create_router(AppState::new(service));

    // Create shutdown channel for graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for connections");

    // Spawn the server with graceful shutdown
    let mut server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let mut shutdown_rx = shutdown_rx;
                loop {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
    });

    // Wait for shutdown signal (Ctrl+C)
    let server_done = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            false
        }
        result = &mut server_handle => {
            match result {
                Ok(Ok(())) => info!("Server exited normally"),
                Ok(Err(e)) => error!(error = %e, "Server error"),
                Err(e) => error!(error = %e, "Server task panicked"),
            }
            true
        }
    };

    let _ = shutdown_tx.send(true);

    if !server_done {
        let drain_timeout = std::time::Duration::from_secs(10);
        if tokio::time::timeout(drain_timeout, server_handle).await.is_err() {
            error!("HTTP server did not drain in time");
        }
    }

    if let Some(db) = database {
        db.close().await;
    }

    info!("SentryDash shutdown complete");
    Ok(())
}

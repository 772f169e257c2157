// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitness Tracker API Server
//!
//! Serves registration, login and per-user fitness records over HTTP,
//! backed by an in-memory, Firestore or PostgreSQL datastore.

use fitness_tracker::{
    config::{Config, DatastoreKind},
    db::{FirestoreDb, MemoryDb, PgStore},
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        datastore = ?config.datastore,
        "Starting Fitness Tracker API"
    );

    let state = match config.datastore {
        DatastoreKind::Memory => {
            tracing::warn!("Using in-memory datastore; data is lost on restart");
            AppState::new(config.clone(), Arc::new(MemoryDb::new()))?
        }
        DatastoreKind::Firestore => {
            let db = FirestoreDb::new(&config.gcp_project_id).await?;
            AppState::new(config.clone(), Arc::new(db))?
        }
        DatastoreKind::Postgres => {
            // No connection is made until the schema bootstrap below.
            let db = PgStore::connect_lazy(&config)?;
            db.ensure_schema().await?;
            tracing::info!("PostgreSQL schema ready");
            AppState::new(config.clone(), Arc::new(db))?
        }
    };
    let state = Arc::new(state);

    // Expired sessions are also rejected on lookup; this just bounds memory.
    let _cleanup = state
        .sessions
        .spawn_cleanup(Duration::from_secs(config.session_cleanup_interval_seconds));

    // Build router
    let app = fitness_tracker::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fitness_tracker=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}

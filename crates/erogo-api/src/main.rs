//! # erogo-api Service Entry Point
//!
//! Initializes tracing, connects the optional Postgres pool, hydrates the
//! in-memory stores, and serves the application router.

use std::sync::Arc;

use erogo_api::state::AppState;
use erogo_notify::{AllowAllSettings, LoggingSink};
use erogo_state::InMemoryGrants;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let pool = erogo_api::db::init_pool().await?;

    let state = AppState::with_parts(
        Arc::new(InMemoryGrants::new()),
        Arc::new(AllowAllSettings),
        Arc::new(LoggingSink),
        Arc::new(LoggingSink),
        pool.clone(),
    );
    if let Some(pool) = &pool {
        erogo_api::db::hydrate(&state, pool).await?;
    }

    let port: u16 = std::env::var("EROGO_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "erogo API listening");

    axum::serve(listener, erogo_api::app(state)).await?;
    Ok(())
}

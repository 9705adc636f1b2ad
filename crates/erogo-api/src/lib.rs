//! # erogo-api — Axum API Service for the Disbursement Lifecycle Engine
//!
//! The service layer over `erogo-state` and `erogo-notify`: stateless
//! request handlers executing the transition pipeline
//! (guard → conditional mutation → audit → notify) against in-memory
//! stores with optional Postgres write-through.
//!
//! ## API Surface
//!
//! | Route                                   | Module                    |
//! |-----------------------------------------|---------------------------|
//! | `POST /v1/disbursements`                | [`routes::disbursements`] |
//! | `GET  /v1/disbursements`                | [`routes::disbursements`] |
//! | `GET  /v1/disbursements/{id}`           | [`routes::disbursements`] |
//! | `GET  /v1/disbursements/{id}/history`   | [`routes::disbursements`] |
//! | `POST /v1/disbursements/{id}/transition`| [`routes::disbursements`] |
//! | `POST /v1/communities/{id}/approve-all` | [`routes::bulk`]          |
//! | `POST /v1/disbursements/mark-paid`      | [`routes::bulk`]          |
//! | `/health/*`, `/metrics`, `/openapi.json`| unauthenticated           |
//!
//! ## Identity
//!
//! The upstream identity provider injects `x-actor-id`, `x-actor-role`,
//! and `x-actor-active` headers; the engine trusts the claim and
//! re-validates scope itself. There is no authentication here.
//!
//! ## Crate Policy
//!
//! - No business rules in route handlers beyond pipeline orchestration —
//!   the permission matrix and transition table live in `erogo-state`.
//! - All errors map to structured HTTP responses via [`AppError`].

pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod notifier;
pub mod openapi;
pub mod routes;
pub mod state;

use std::collections::HashMap;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::{Extension, Router};
use tower_http::trace::TraceLayer;

use crate::middleware::metrics::ApiMetrics;

pub use error::AppError;
pub use state::AppState;

/// Check if metrics are enabled via the `EROGO_METRICS_ENABLED` env var.
/// Defaults to `true` when the variable is absent or set to anything other
/// than `"false"`.
fn metrics_enabled() -> bool {
    std::env::var("EROGO_METRICS_ENABLED")
        .map(|v| v.to_lowercase() != "false")
        .unwrap_or(true)
}

/// Assemble the full application router with all routes and middleware.
///
/// Health probes (`/health/*`), `/metrics`, and `/openapi.json` are
/// mounted outside the identity-claim surface so probes and scrapers need
/// no headers.
///
/// Body size limit: 2 MiB, preventing OOM from oversized request bodies.
pub fn app(state: AppState) -> Router {
    let metrics = ApiMetrics::new();
    let metrics_on = metrics_enabled();

    let api = Router::new()
        .merge(routes::disbursements::router())
        .merge(routes::bulk::router())
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024));

    let mut api = api;
    if metrics_on {
        api = api
            .layer(from_fn(middleware::metrics::metrics_middleware))
            .layer(Extension(metrics.clone()));
    }

    let api = api
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let mut unauthenticated = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness))
        .merge(openapi::router());

    if metrics_on {
        unauthenticated = unauthenticated
            .route("/metrics", axum::routing::get(prometheus_metrics))
            .layer(Extension(metrics));
    }

    let unauthenticated = unauthenticated.with_state(state);

    Router::new().merge(unauthenticated).merge(api)
}

/// GET /metrics — Prometheus metrics scrape endpoint.
///
/// Updates domain gauges from current `AppState` on each scrape (pull
/// model), then gathers and encodes all metrics in Prometheus text
/// exposition format.
async fn prometheus_metrics(
    State(state): State<AppState>,
    Extension(metrics): Extension<ApiMetrics>,
) -> impl IntoResponse {
    // -- Update domain gauges from AppState --

    let mut by_kind_state: HashMap<(&'static str, &'static str), usize> = HashMap::new();
    for record in state.disbursements.list() {
        *by_kind_state
            .entry((record.kind.as_str(), record.state.as_str()))
            .or_default() += 1;
    }
    metrics.disbursements_total().reset();
    for ((kind, st), count) in &by_kind_state {
        metrics
            .disbursements_total()
            .with_label_values(&[kind, st])
            .set(*count as f64);
    }

    metrics
        .history_entries_total()
        .set(state.history.len() as f64);
    metrics
        .audit_failures_total()
        .set(state.audit_failure_count() as f64);
    metrics
        .notification_failures_total()
        .set(state.notification_failure_count() as f64);

    // -- Gather and encode --
    match metrics.gather_and_encode() {
        Ok(body) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to encode Prometheus metrics: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
        }
    }
}

/// Liveness probe — always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe — verifies the application is ready to serve traffic.
///
/// Checks that the in-memory stores are accessible and, when configured,
/// that the database answers a trivial query.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let _ = state.disbursements.len();
    let _ = state.history.len();

    if let Some(pool) = &state.db_pool {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!("Database health check failed: {e}");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unreachable").into_response();
        }
    }

    (StatusCode::OK, "ready").into_response()
}

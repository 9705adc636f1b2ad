//! # Database Persistence Layer
//!
//! Optional Postgres write-through via SQLx. When `DATABASE_URL` is set,
//! every mutation is persisted and the in-memory stores are hydrated from
//! the database on startup. When absent, the API runs in-memory only
//! (suitable for development and testing).
//!
//! ## What is persisted (engine owned)
//!
//! - `compensations` and `expense_reimbursements` — request state, written
//!   through conditional updates filtered on the expected current state.
//! - `history_entries` — the append-only audit trail. Insert-only.
//!
//! ## What is consumed read-only (externally owned)
//!
//! - `community_access_grants` — the staff registry owns this mapping; the
//!   engine only ever SELECTs from it.

pub mod disbursements;
pub mod grants;
pub mod history;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::state::AppState;

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set — running in-memory only mode. \
                 State will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

/// Load all persisted state into the in-memory stores on startup.
pub async fn hydrate(state: &AppState, pool: &PgPool) -> Result<(), sqlx::Error> {
    let records = disbursements::load_all(pool).await?;
    let count = records.len();
    for record in records {
        state.disbursements.insert(record);
    }

    let entries = history::load_all(pool).await?;
    let history_count = entries.len();
    state.history.append_batch(&entries);

    tracing::info!(
        disbursements = count,
        history_entries = history_count,
        "hydrated in-memory stores from database"
    );
    Ok(())
}

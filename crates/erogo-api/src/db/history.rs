//! History entry persistence operations.
//!
//! History entries are immutable once created — there are no update or
//! delete operations on the `history_entries` table.

use chrono::{DateTime, Utc};
use erogo_core::PersonId;
use erogo_state::{DisbursementKind, DisbursementState, HistoryEntry};
use sqlx::PgPool;
use uuid::Uuid;

/// Insert a new history entry.
pub async fn insert(pool: &PgPool, entry: &HistoryEntry) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO history_entries (id, request_id, entity_kind, previous_state,
         new_state, changed_by, role_label, note, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(entry.id)
    .bind(entry.request_id)
    .bind(entry.entity_kind.as_str())
    .bind(entry.previous_state.map(|s| s.as_str()))
    .bind(entry.new_state.as_str())
    .bind(entry.changed_by.0)
    .bind(&entry.role_label)
    .bind(&entry.note)
    .bind(entry.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert a batch of history entries in one transaction.
pub async fn insert_batch(pool: &PgPool, entries: &[HistoryEntry]) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for entry in entries {
        sqlx::query(
            "INSERT INTO history_entries (id, request_id, entity_kind, previous_state,
             new_state, changed_by, role_label, note, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(entry.id)
        .bind(entry.request_id)
        .bind(entry.entity_kind.as_str())
        .bind(entry.previous_state.map(|s| s.as_str()))
        .bind(entry.new_state.as_str())
        .bind(entry.changed_by.0)
        .bind(&entry.role_label)
        .bind(&entry.note)
        .bind(entry.created_at)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await
}

/// Load all history entries for startup hydration.
pub async fn load_all(pool: &PgPool) -> Result<Vec<HistoryEntry>, sqlx::Error> {
    let rows: Vec<HistoryRow> = sqlx::query_as(
        "SELECT id, request_id, entity_kind, previous_state, new_state,
         changed_by, role_label, note, created_at
         FROM history_entries ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().filter_map(HistoryRow::into_entry).collect())
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: Uuid,
    request_id: Uuid,
    entity_kind: String,
    previous_state: Option<String>,
    new_state: String,
    changed_by: Uuid,
    role_label: String,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

impl HistoryRow {
    fn into_entry(self) -> Option<HistoryEntry> {
        let entity_kind = match self.entity_kind.as_str() {
            "compensation" => DisbursementKind::Compensation,
            "expense_reimbursement" => DisbursementKind::ExpenseReimbursement,
            other => {
                tracing::warn!(id = %self.id, kind = other, "unknown entity kind in history, skipping row");
                return None;
            }
        };
        let parse = |s: &str| match DisbursementState::parse(s) {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::warn!(id = %self.id, error = %e, "unknown state in history, skipping row");
                None
            }
        };
        let previous_state = match &self.previous_state {
            Some(s) => Some(parse(s)?),
            None => None,
        };
        let new_state = parse(&self.new_state)?;

        Some(HistoryEntry {
            id: self.id,
            request_id: self.request_id,
            entity_kind,
            previous_state,
            new_state,
            changed_by: PersonId(self.changed_by),
            role_label: self.role_label,
            note: self.note,
            created_at: self.created_at,
        })
    }
}

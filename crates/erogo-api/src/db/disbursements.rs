//! Disbursement persistence operations.
//!
//! Requests live in two tables sharing one record shape: `compensations`
//! (gross/net amounts, optional community) and `expense_reimbursements`
//! (single amount, no community). Every state change is a conditional
//! update filtered on the expected current state — a concurrent transition
//! shows up as zero affected rows, never as a silent overwrite.

use chrono::{DateTime, Utc};
use erogo_core::{CommunityId, PersonId};
use erogo_state::{DisbursementKind, DisbursementState};
use sqlx::PgPool;
use uuid::Uuid;

use crate::state::DisbursementRecord;

/// The table a kind is stored in.
pub fn table(kind: DisbursementKind) -> &'static str {
    match kind {
        DisbursementKind::Compensation => "compensations",
        DisbursementKind::ExpenseReimbursement => "expense_reimbursements",
    }
}

/// Insert a new disbursement record.
pub async fn insert(pool: &PgPool, record: &DisbursementRecord) -> Result<(), sqlx::Error> {
    match record.kind {
        DisbursementKind::Compensation => {
            sqlx::query(
                "INSERT INTO compensations (id, collaborator_id, community_id,
                 gross_amount_cents, net_amount_cents, category, description, state,
                 integration_note, rejection_reason, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            )
            .bind(record.id)
            .bind(record.collaborator_id.0)
            .bind(record.community_id.map(|c| c.0))
            .bind(record.gross_amount_cents)
            .bind(record.net_amount_cents)
            .bind(&record.category)
            .bind(&record.description)
            .bind(record.state.as_str())
            .bind(&record.integration_note)
            .bind(&record.rejection_reason)
            .bind(record.created_at)
            .bind(record.updated_at)
            .execute(pool)
            .await?;
        }
        DisbursementKind::ExpenseReimbursement => {
            sqlx::query(
                "INSERT INTO expense_reimbursements (id, collaborator_id, amount_cents,
                 category, description, state, integration_note, rejection_reason,
                 created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(record.id)
            .bind(record.collaborator_id.0)
            .bind(record.amount_cents)
            .bind(&record.category)
            .bind(&record.description)
            .bind(record.state.as_str())
            .bind(&record.integration_note)
            .bind(&record.rejection_reason)
            .bind(record.created_at)
            .bind(record.updated_at)
            .execute(pool)
            .await?;
        }
    }
    Ok(())
}

/// Write through the result of a single transition.
///
/// The update is keyed on `(id, expected_from)`; `Ok(false)` means another
/// writer got there first and the row was left untouched.
pub async fn update_transition(
    pool: &PgPool,
    record: &DisbursementRecord,
    expected_from: DisbursementState,
) -> Result<bool, sqlx::Error> {
    let query = format!(
        "UPDATE {} SET state = $1, integration_note = $2, rejection_reason = $3,
         approved_by = $4, approved_at = $5, paid_by = $6, paid_at = $7,
         payment_reference = $8, updated_at = $9
         WHERE id = $10 AND state = $11",
        table(record.kind)
    );
    let result = sqlx::query(&query)
        .bind(record.state.as_str())
        .bind(&record.integration_note)
        .bind(&record.rejection_reason)
        .bind(record.approved_by.map(|p| p.0))
        .bind(record.approved_at)
        .bind(record.paid_by.map(|p| p.0))
        .bind(record.paid_at)
        .bind(&record.payment_reference)
        .bind(record.updated_at)
        .bind(record.id)
        .bind(expected_from.as_str())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Conditionally approve a set of compensations in one batch.
///
/// Only rows still in `IN_ATTESA` are touched; the returned ids are the
/// rows actually changed.
pub async fn approve_ids(
    pool: &PgPool,
    ids: &[Uuid],
    approver: PersonId,
    now: DateTime<Utc>,
) -> Result<Vec<Uuid>, sqlx::Error> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        "UPDATE compensations
         SET state = 'APPROVATO', approved_by = $2, approved_at = $3, updated_at = $3
         WHERE id = ANY($1) AND state = 'IN_ATTESA'
         RETURNING id",
    )
    .bind(ids)
    .bind(approver.0)
    .bind(now)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Conditionally mark a set of requests paid in one batch.
///
/// Only rows still in `APPROVATO` are touched; the returned ids are the
/// rows actually changed.
pub async fn mark_paid_ids(
    pool: &PgPool,
    kind: DisbursementKind,
    ids: &[Uuid],
    payer: PersonId,
    now: DateTime<Utc>,
    payment_reference: Option<&str>,
) -> Result<Vec<Uuid>, sqlx::Error> {
    let query = format!(
        "UPDATE {}
         SET state = 'LIQUIDATO', paid_by = $2, paid_at = $3,
             payment_reference = $4, updated_at = $3
         WHERE id = ANY($1) AND state = 'APPROVATO'
         RETURNING id",
        table(kind)
    );
    let rows: Vec<(Uuid,)> = sqlx::query_as(&query)
        .bind(ids)
        .bind(payer.0)
        .bind(now)
        .bind(payment_reference)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Load all disbursements from both tables for startup hydration.
pub async fn load_all(pool: &PgPool) -> Result<Vec<DisbursementRecord>, sqlx::Error> {
    let compensations: Vec<CompensationRow> = sqlx::query_as(
        "SELECT id, collaborator_id, community_id, gross_amount_cents, net_amount_cents,
         category, description, state, integration_note, rejection_reason,
         approved_by, approved_at, paid_by, paid_at, payment_reference,
         created_at, updated_at
         FROM compensations ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    let expenses: Vec<ExpenseRow> = sqlx::query_as(
        "SELECT id, collaborator_id, amount_cents, category, description, state,
         integration_note, rejection_reason, approved_by, approved_at,
         paid_by, paid_at, payment_reference, created_at, updated_at
         FROM expense_reimbursements ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(compensations
        .into_iter()
        .filter_map(CompensationRow::into_record)
        .chain(expenses.into_iter().filter_map(ExpenseRow::into_record))
        .collect())
}

/// Parse a stored state string, logging and discarding unknown values.
fn parse_state(id: Uuid, state: &str) -> Option<DisbursementState> {
    match DisbursementState::parse(state) {
        Ok(state) => Some(state),
        Err(e) => {
            tracing::warn!(id = %id, error = %e, "unknown state in database, skipping row");
            None
        }
    }
}

/// Internal row type for SQLx mapping (compensations).
#[derive(sqlx::FromRow)]
struct CompensationRow {
    id: Uuid,
    collaborator_id: Uuid,
    community_id: Option<Uuid>,
    gross_amount_cents: Option<i64>,
    net_amount_cents: Option<i64>,
    category: String,
    description: String,
    state: String,
    integration_note: Option<String>,
    rejection_reason: Option<String>,
    approved_by: Option<Uuid>,
    approved_at: Option<DateTime<Utc>>,
    paid_by: Option<Uuid>,
    paid_at: Option<DateTime<Utc>>,
    payment_reference: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CompensationRow {
    fn into_record(self) -> Option<DisbursementRecord> {
        let state = parse_state(self.id, &self.state)?;
        Some(DisbursementRecord {
            id: self.id,
            kind: DisbursementKind::Compensation,
            collaborator_id: PersonId(self.collaborator_id),
            community_id: self.community_id.map(CommunityId),
            gross_amount_cents: self.gross_amount_cents,
            net_amount_cents: self.net_amount_cents,
            amount_cents: None,
            category: self.category,
            description: self.description,
            state,
            integration_note: self.integration_note,
            rejection_reason: self.rejection_reason,
            approved_by: self.approved_by.map(PersonId),
            approved_at: self.approved_at,
            paid_by: self.paid_by.map(PersonId),
            paid_at: self.paid_at,
            payment_reference: self.payment_reference,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Internal row type for SQLx mapping (expense reimbursements).
#[derive(sqlx::FromRow)]
struct ExpenseRow {
    id: Uuid,
    collaborator_id: Uuid,
    amount_cents: Option<i64>,
    category: String,
    description: String,
    state: String,
    integration_note: Option<String>,
    rejection_reason: Option<String>,
    approved_by: Option<Uuid>,
    approved_at: Option<DateTime<Utc>>,
    paid_by: Option<Uuid>,
    paid_at: Option<DateTime<Utc>>,
    payment_reference: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ExpenseRow {
    fn into_record(self) -> Option<DisbursementRecord> {
        let state = parse_state(self.id, &self.state)?;
        Some(DisbursementRecord {
            id: self.id,
            kind: DisbursementKind::ExpenseReimbursement,
            collaborator_id: PersonId(self.collaborator_id),
            community_id: None,
            gross_amount_cents: None,
            net_amount_cents: None,
            amount_cents: self.amount_cents,
            category: self.category,
            description: self.description,
            state,
            integration_note: self.integration_note,
            rejection_reason: self.rejection_reason,
            approved_by: self.approved_by.map(PersonId),
            approved_at: self.approved_at,
            paid_by: self.paid_by.map(PersonId),
            paid_at: self.paid_at,
            payment_reference: self.payment_reference,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

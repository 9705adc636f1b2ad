//! # Bulk Operations
//!
//! Mass-approve and mass-mark-paid. Both are idempotent and tolerate
//! partial eligibility: rows that transitioned out of eligibility between
//! selection and update are simply excluded, and the response reports how
//! many rows actually changed. Ineligible subsets are never an error —
//! concurrent state changes are expected.

use std::collections::HashSet;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use erogo_core::{CommunityId, Role};
use erogo_state::{
    CommunityGrantLookup, DisbursementAction, DisbursementKind, DisbursementState, HistoryEntry,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;
use crate::extractors::{extract_validated_json, ActorClaims, Validate};
use crate::state::AppState;

// ── Requests / Responses ────────────────────────────────────────

/// Response from a bulk operation: how many rows actually changed.
///
/// A count lower than requested means some rows were ineligible (already
/// transitioned) — the caller detects partial application from the delta.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BulkUpdateResponse {
    pub updated_count: usize,
}

/// Which table a mark-paid batch addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TableSelector {
    Compensations,
    Expenses,
}

impl TableSelector {
    /// The disbursement kind stored in the selected table.
    pub fn kind(&self) -> DisbursementKind {
        match self {
            Self::Compensations => DisbursementKind::Compensation,
            Self::Expenses => DisbursementKind::ExpenseReimbursement,
        }
    }
}

/// Request to mark a set of approved requests as paid.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct MarkPaidRequest {
    /// The ids to pay. Ids not currently in APPROVATO are skipped.
    pub ids: Vec<Uuid>,
    /// Payment reference recorded on every updated row.
    pub payment_reference: Option<String>,
    /// `compensations` or `expenses`.
    pub table: TableSelector,
}

impl Validate for MarkPaidRequest {
    fn validate(&self) -> Result<(), String> {
        if self.ids.is_empty() {
            return Err("at least one id is required".into());
        }
        if self.ids.len() > 1_000 {
            return Err(format!("too many ids: {} (max 1,000)", self.ids.len()));
        }
        if let Some(reference) = &self.payment_reference {
            let trimmed = reference.trim();
            if trimmed.is_empty() {
                return Err("malformed payment reference: must be non-empty".into());
            }
            if trimmed.len() > 140 {
                return Err("malformed payment reference: at most 140 characters".into());
            }
            if trimmed.chars().any(char::is_control) {
                return Err("malformed payment reference: control characters not allowed".into());
            }
        }
        Ok(())
    }
}

// ── Router ──────────────────────────────────────────────────────

/// Build the bulk operations router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/communities/{id}/approve-all", post(approve_all))
        .route("/v1/disbursements/mark-paid", post(mark_paid))
}

// ── Handlers ────────────────────────────────────────────────────

/// POST /v1/communities/:id/approve-all — Approve every pending
/// compensation in a community.
///
/// Manager-only; a scoped responsabile must hold a grant for the community
/// (re-validated here, not assumed from the claim). The batch is one
/// conditional update over `IN_ATTESA` rows; one history row is written
/// per row actually changed. Zero eligible rows is a success, not an error.
#[utoipa::path(
    post,
    path = "/v1/communities/{id}/approve-all",
    params(("id" = Uuid, Path, description = "Community ID")),
    responses(
        (status = 200, description = "Batch applied", body = BulkUpdateResponse),
        (status = 403, description = "Role or scope violation", body = crate::error::ErrorBody),
    ),
    tag = "bulk"
)]
pub(crate) async fn approve_all(
    State(state): State<AppState>,
    ActorClaims(actor): ActorClaims,
    Path(id): Path<Uuid>,
) -> Result<Json<BulkUpdateResponse>, AppError> {
    if !actor.role.is_manager() {
        return Err(AppError::Forbidden("not authorized".to_string()));
    }
    let community = CommunityId(id);
    if actor.role == Role::ResponsabileCompensi {
        let grants = state.grants_for(actor.person).await?;
        if !grants.allows(actor.person, community) {
            return Err(AppError::Forbidden("out of scope".to_string()));
        }
    }

    let now = Utc::now();
    let updated = state.disbursements.update_where(
        |r| {
            r.kind == DisbursementKind::Compensation
                && r.community_id == Some(community)
                && r.state == DisbursementState::InAttesa
        },
        |r| {
            r.apply(
                DisbursementAction::Approve,
                DisbursementState::Approvato,
                actor.person,
                None,
                None,
                now,
            )
        },
    );

    if let Some(pool) = &state.db_pool {
        if !updated.is_empty() {
            let ids: Vec<Uuid> = updated.iter().map(|r| r.id).collect();
            match crate::db::disbursements::approve_ids(pool, &ids, actor.person, now).await {
                Ok(db_ids) => {
                    if db_ids.len() != updated.len() {
                        tracing::warn!(
                            memory = updated.len(),
                            database = db_ids.len(),
                            community = %community,
                            "approve-all row count mismatch between store and database"
                        );
                    }
                }
                Err(e) => {
                    tracing::error!(community = %community, error = %e, "failed to persist approve-all batch");
                    return Err(AppError::Internal(
                        "batch applied in-memory but database persist failed".to_string(),
                    ));
                }
            }
        }
    }

    let entries: Vec<HistoryEntry> = updated
        .iter()
        .map(|r| {
            HistoryEntry::transition(
                r.id,
                r.kind,
                DisbursementState::InAttesa,
                DisbursementState::Approvato,
                actor.person,
                actor.role.label(),
                None,
            )
        })
        .collect();
    state.record_history_batch(&entries).await;

    // Compensation approvals are not a collaborator-facing event; the
    // batch produces no notifications.

    Ok(Json(BulkUpdateResponse {
        updated_count: updated.len(),
    }))
}

/// POST /v1/disbursements/mark-paid — Mark a set of approved requests paid.
///
/// Restricted to the administration. Only ids currently in `APPROVATO` are
/// updated; the rest are silently excluded and reported via the count
/// delta. History rows and liquidation notifications are produced only for
/// the rows actually updated.
#[utoipa::path(
    post,
    path = "/v1/disbursements/mark-paid",
    request_body = MarkPaidRequest,
    responses(
        (status = 200, description = "Batch applied", body = BulkUpdateResponse),
        (status = 403, description = "Administration only", body = crate::error::ErrorBody),
        (status = 422, description = "Validation failed", body = crate::error::ErrorBody),
    ),
    tag = "bulk"
)]
pub(crate) async fn mark_paid(
    State(state): State<AppState>,
    ActorClaims(actor): ActorClaims,
    body: Result<Json<MarkPaidRequest>, JsonRejection>,
) -> Result<Json<BulkUpdateResponse>, AppError> {
    let req = extract_validated_json(body)?;
    if actor.role != Role::Amministrazione {
        return Err(AppError::Forbidden("not authorized".to_string()));
    }

    let kind = req.table.kind();
    let reference = req
        .payment_reference
        .as_deref()
        .map(str::trim)
        .map(str::to_string);
    let requested: HashSet<Uuid> = req.ids.iter().copied().collect();

    let now = Utc::now();
    let updated = state.disbursements.update_where(
        |r| {
            requested.contains(&r.id)
                && r.kind == kind
                && r.state == DisbursementState::Approvato
        },
        |r| {
            r.apply(
                DisbursementAction::MarkLiquidated,
                DisbursementState::Liquidato,
                actor.person,
                None,
                reference.clone(),
                now,
            )
        },
    );

    if let Some(pool) = &state.db_pool {
        if !updated.is_empty() {
            let ids: Vec<Uuid> = updated.iter().map(|r| r.id).collect();
            match crate::db::disbursements::mark_paid_ids(
                pool,
                kind,
                &ids,
                actor.person,
                now,
                reference.as_deref(),
            )
            .await
            {
                Ok(db_ids) => {
                    if db_ids.len() != updated.len() {
                        tracing::warn!(
                            memory = updated.len(),
                            database = db_ids.len(),
                            "mark-paid row count mismatch between store and database"
                        );
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to persist mark-paid batch");
                    return Err(AppError::Internal(
                        "batch applied in-memory but database persist failed".to_string(),
                    ));
                }
            }
        }
    }

    let entries: Vec<HistoryEntry> = updated
        .iter()
        .map(|r| {
            HistoryEntry::transition(
                r.id,
                r.kind,
                DisbursementState::Approvato,
                DisbursementState::Liquidato,
                actor.person,
                actor.role.label(),
                None,
            )
        })
        .collect();
    state.record_history_batch(&entries).await;

    // Liquidation is allowlisted for both kinds; notify each owner.
    for r in &updated {
        state.notify_transition(
            r.kind,
            DisbursementAction::MarkLiquidated,
            r.collaborator_id,
            r.id,
            None,
        );
    }

    Ok(Json(BulkUpdateResponse {
        updated_count: updated.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_selector_maps_to_kinds() {
        assert_eq!(
            TableSelector::Compensations.kind(),
            DisbursementKind::Compensation
        );
        assert_eq!(
            TableSelector::Expenses.kind(),
            DisbursementKind::ExpenseReimbursement
        );
    }

    #[test]
    fn table_selector_wire_names() {
        let parsed: TableSelector = serde_json::from_str("\"compensations\"").unwrap();
        assert_eq!(parsed, TableSelector::Compensations);
        let parsed: TableSelector = serde_json::from_str("\"expenses\"").unwrap();
        assert_eq!(parsed, TableSelector::Expenses);
    }

    #[test]
    fn mark_paid_requires_ids() {
        let req = MarkPaidRequest {
            ids: vec![],
            payment_reference: None,
            table: TableSelector::Compensations,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn mark_paid_rejects_blank_reference() {
        let req = MarkPaidRequest {
            ids: vec![Uuid::new_v4()],
            payment_reference: Some("   ".to_string()),
            table: TableSelector::Expenses,
        };
        let err = req.validate().unwrap_err();
        assert!(err.contains("malformed payment reference"));
    }
}

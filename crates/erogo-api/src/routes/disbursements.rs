//! # Disbursement API
//!
//! Creation, reads, the audit trail, and the single-transition pipeline:
//! guard → conditional state mutation → history append → notification
//! fan-out. The guard rejects early and cheaply; once the mutation commits,
//! nothing downstream can fail the request.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use erogo_core::{CommunityId, PersonId, Role};
use erogo_state::{
    actions_from, evaluate, DisbursementAction, DisbursementKind, DisbursementState,
    GuardRejection, HistoryEntry, TransitionRequest,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;
use crate::extractors::{extract_validated_json, ActorClaims, Validate};
use crate::state::{visible_to, AppState, DisbursementRecord};

// ── Requests / Responses ────────────────────────────────────────

/// Request to create a disbursement. Amounts are EUR cents.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateDisbursementRequest {
    /// `compensation` or `expense_reimbursement`.
    #[schema(value_type = String)]
    pub kind: DisbursementKind,
    /// Community the compensation is scoped to. Compensations only.
    pub community_id: Option<Uuid>,
    /// Gross amount. Compensations only.
    pub gross_amount_cents: Option<i64>,
    /// Net amount. Compensations only.
    pub net_amount_cents: Option<i64>,
    /// Claimed amount. Expense reimbursements only.
    pub amount_cents: Option<i64>,
    pub category: String,
    pub description: String,
    /// `true` submits immediately (IN_ATTESA); `false` keeps a draft
    /// (BOZZA).
    #[serde(default)]
    pub submit: bool,
}

impl Validate for CreateDisbursementRequest {
    fn validate(&self) -> Result<(), String> {
        if self.category.trim().is_empty() {
            return Err("category must be non-empty".into());
        }
        if self.category.len() > 100 {
            return Err("category must be at most 100 characters".into());
        }
        if self.description.trim().is_empty() {
            return Err("description must be non-empty".into());
        }
        if self.description.len() > 2000 {
            return Err("description must be at most 2000 characters".into());
        }
        match self.kind {
            DisbursementKind::Compensation => {
                let gross = self.gross_amount_cents.ok_or("gross_amount_cents is required")?;
                let net = self.net_amount_cents.ok_or("net_amount_cents is required")?;
                if gross <= 0 {
                    return Err("gross_amount_cents must be positive".into());
                }
                if net <= 0 || net > gross {
                    return Err("net_amount_cents must be positive and at most the gross amount".into());
                }
                if self.amount_cents.is_some() {
                    return Err("amount_cents is not valid for compensations".into());
                }
            }
            DisbursementKind::ExpenseReimbursement => {
                let amount = self.amount_cents.ok_or("amount_cents is required")?;
                if amount <= 0 {
                    return Err("amount_cents must be positive".into());
                }
                if self.gross_amount_cents.is_some() || self.net_amount_cents.is_some() {
                    return Err("gross/net amounts are not valid for expense reimbursements".into());
                }
                if self.community_id.is_some() {
                    return Err("community_id is not valid for expense reimbursements".into());
                }
            }
        }
        Ok(())
    }
}

/// Request to apply a lifecycle action.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct TransitionBody {
    /// One of `submit`, `reopen`, `approve`, `reject`, `mark_liquidated`.
    #[schema(value_type = String)]
    pub action: DisbursementAction,
    /// Free-text note. Mandatory for `reject`.
    pub note: Option<String>,
    /// Payment reference recorded with `mark_liquidated`.
    pub payment_reference: Option<String>,
}

impl Validate for TransitionBody {
    fn validate(&self) -> Result<(), String> {
        if let Some(note) = &self.note {
            if note.len() > 2000 {
                return Err("note must be at most 2000 characters".into());
            }
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

impl TransitionBody {
    /// The note, trimmed, with whitespace-only notes treated as absent.
    fn trimmed_note(&self) -> Option<String> {
        self.note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
    }

    /// The payment reference, trimmed. Validation guarantees non-empty.
    fn trimmed_reference(&self) -> Option<String> {
        self.payment_reference
            .as_deref()
            .map(str::trim)
            .map(str::to_string)
    }
}

/// Response to a transition: the state the request is now in.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransitionResponse {
    #[schema(value_type = String)]
    pub new_state: DisbursementState,
}

/// One audit trail entry.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HistoryEntryResponse {
    pub id: Uuid,
    pub request_id: Uuid,
    #[schema(value_type = String)]
    pub entity_kind: DisbursementKind,
    #[schema(value_type = Option<String>)]
    pub previous_state: Option<DisbursementState>,
    #[schema(value_type = String)]
    pub new_state: DisbursementState,
    #[schema(value_type = Uuid)]
    pub changed_by: PersonId,
    pub role_label: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<HistoryEntry> for HistoryEntryResponse {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            id: entry.id,
            request_id: entry.request_id,
            entity_kind: entry.entity_kind,
            previous_state: entry.previous_state,
            new_state: entry.new_state,
            changed_by: entry.changed_by,
            role_label: entry.role_label,
            note: entry.note,
            created_at: entry.created_at,
        }
    }
}

/// List filters plus pagination.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub state: Option<String>,
    pub kind: Option<String>,
    pub community_id: Option<Uuid>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

// ── Router ──────────────────────────────────────────────────────

/// Build the disbursements router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/disbursements",
            get(list_disbursements).post(create_disbursement),
        )
        .route("/v1/disbursements/{id}", get(get_disbursement))
        .route("/v1/disbursements/{id}/history", get(get_history))
        .route("/v1/disbursements/{id}/transition", post(transition_disbursement))
}

// ── Handlers ────────────────────────────────────────────────────

/// POST /v1/disbursements — Create a disbursement request.
///
/// Collaborators create their own claims; the submission mode picks the
/// initial state (`submit: true` → IN_ATTESA, otherwise BOZZA). The
/// creation itself is recorded in the audit trail with a null previous
/// state.
#[utoipa::path(
    post,
    path = "/v1/disbursements",
    request_body = CreateDisbursementRequest,
    responses(
        (status = 201, description = "Disbursement created", body = DisbursementRecord),
        (status = 403, description = "Only collaborators create requests", body = crate::error::ErrorBody),
        (status = 422, description = "Validation failed", body = crate::error::ErrorBody),
    ),
    tag = "disbursements"
)]
pub(crate) async fn create_disbursement(
    State(state): State<AppState>,
    ActorClaims(actor): ActorClaims,
    body: Result<Json<CreateDisbursementRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DisbursementRecord>), AppError> {
    let req = extract_validated_json(body)?;
    if actor.role != Role::Collaborator {
        return Err(AppError::Forbidden("not authorized".to_string()));
    }

    let now = Utc::now();
    let initial_state = if req.submit {
        DisbursementState::InAttesa
    } else {
        DisbursementState::Bozza
    };
    let record = DisbursementRecord {
        id: Uuid::new_v4(),
        kind: req.kind,
        collaborator_id: actor.person,
        community_id: req.community_id.map(CommunityId),
        gross_amount_cents: req.gross_amount_cents,
        net_amount_cents: req.net_amount_cents,
        amount_cents: req.amount_cents,
        category: req.category.trim().to_string(),
        description: req.description.trim().to_string(),
        state: initial_state,
        integration_note: None,
        rejection_reason: None,
        approved_by: None,
        approved_at: None,
        paid_by: None,
        paid_at: None,
        payment_reference: None,
        created_at: now,
        updated_at: now,
    };

    state.disbursements.insert(record.clone());

    // Write-through. Failure is surfaced because the in-memory record would
    // be lost on restart, causing silent data loss.
    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::disbursements::insert(pool, &record).await {
            tracing::error!(id = %record.id, error = %e, "failed to persist disbursement");
            return Err(AppError::Internal(
                "disbursement recorded in-memory but database persist failed".to_string(),
            ));
        }
    }

    state
        .record_history(HistoryEntry::creation(
            record.id,
            record.kind,
            initial_state,
            actor.person,
            actor.role.label(),
        ))
        .await;

    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /v1/disbursements — List disbursements visible to the caller.
#[utoipa::path(
    get,
    path = "/v1/disbursements",
    params(
        ("state" = Option<String>, Query, description = "Filter by lifecycle state"),
        ("kind" = Option<String>, Query, description = "Filter by kind"),
        ("community_id" = Option<Uuid>, Query, description = "Filter by community"),
        ("limit" = Option<usize>, Query, description = "Max items (default 100, max 1000)"),
        ("offset" = Option<usize>, Query, description = "Items to skip"),
    ),
    responses(
        (status = 200, description = "Visible disbursements", body = Vec<DisbursementRecord>),
        (status = 422, description = "Unknown filter value", body = crate::error::ErrorBody),
    ),
    tag = "disbursements"
)]
pub(crate) async fn list_disbursements(
    State(state): State<AppState>,
    ActorClaims(actor): ActorClaims,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<DisbursementRecord>>, AppError> {
    let state_filter = query
        .state
        .as_deref()
        .map(DisbursementState::parse)
        .transpose()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let kind_filter = match query.kind.as_deref() {
        None => None,
        Some("compensation") => Some(DisbursementKind::Compensation),
        Some("expense_reimbursement") => Some(DisbursementKind::ExpenseReimbursement),
        Some(other) => {
            return Err(AppError::Validation(format!("unknown kind: {other:?}")));
        }
    };
    let pagination = super::PaginationParams {
        limit: query.limit,
        offset: query.offset,
    };

    let grants = state.grants_for(actor.person).await?;
    let visible: Vec<DisbursementRecord> = state
        .disbursements
        .list()
        .into_iter()
        .filter(|r| state_filter.map_or(true, |s| r.state == s))
        .filter(|r| kind_filter.map_or(true, |k| r.kind == k))
        .filter(|r| {
            query
                .community_id
                .map_or(true, |c| r.community_id == Some(CommunityId(c)))
        })
        .filter(|r| visible_to(r, &actor, &grants))
        .skip(pagination.effective_offset())
        .take(pagination.effective_limit())
        .collect();

    Ok(Json(visible))
}

/// GET /v1/disbursements/:id — Fetch one disbursement.
///
/// Unknown ids and ids outside the caller's visibility collapse to the
/// same 404 so existence is never leaked.
#[utoipa::path(
    get,
    path = "/v1/disbursements/{id}",
    params(("id" = Uuid, Path, description = "Disbursement ID")),
    responses(
        (status = 200, description = "Disbursement found", body = DisbursementRecord),
        (status = 404, description = "Not found or not readable", body = crate::error::ErrorBody),
    ),
    tag = "disbursements"
)]
pub(crate) async fn get_disbursement(
    State(state): State<AppState>,
    ActorClaims(actor): ActorClaims,
    Path(id): Path<Uuid>,
) -> Result<Json<DisbursementRecord>, AppError> {
    let record = state
        .disbursements
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("disbursement {id} not found")))?;
    let grants = state.grants_for(actor.person).await?;
    if !visible_to(&record, &actor, &grants) {
        return Err(AppError::NotFound(format!("disbursement {id} not found")));
    }
    Ok(Json(record))
}

/// GET /v1/disbursements/:id/history — The audit trail of one request.
#[utoipa::path(
    get,
    path = "/v1/disbursements/{id}/history",
    params(("id" = Uuid, Path, description = "Disbursement ID")),
    responses(
        (status = 200, description = "History entries, oldest first", body = Vec<HistoryEntryResponse>),
        (status = 404, description = "Not found or not readable", body = crate::error::ErrorBody),
    ),
    tag = "disbursements"
)]
pub(crate) async fn get_history(
    State(state): State<AppState>,
    ActorClaims(actor): ActorClaims,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<HistoryEntryResponse>>, AppError> {
    let record = state
        .disbursements
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("disbursement {id} not found")))?;
    let grants = state.grants_for(actor.person).await?;
    if !visible_to(&record, &actor, &grants) {
        return Err(AppError::NotFound(format!("disbursement {id} not found")));
    }
    let entries = state
        .history
        .for_request(id)
        .into_iter()
        .map(HistoryEntryResponse::from)
        .collect();
    Ok(Json(entries))
}

/// POST /v1/disbursements/:id/transition — Apply a lifecycle action.
///
/// The pipeline: guard (reject early) → atomic conditional state mutation →
/// history append → notification fan-out. The mutation is keyed on the
/// expected current state both in the store and in the write-through
/// update, so a concurrent transition loses with a 409 instead of silently
/// overwriting — the caller re-fetches and retries.
#[utoipa::path(
    post,
    path = "/v1/disbursements/{id}/transition",
    params(("id" = Uuid, Path, description = "Disbursement ID")),
    request_body = TransitionBody,
    responses(
        (status = 200, description = "Transition applied", body = TransitionResponse),
        (status = 403, description = "Role or scope violation", body = crate::error::ErrorBody),
        (status = 404, description = "Not found or not readable", body = crate::error::ErrorBody),
        (status = 409, description = "Stale or invalid state", body = crate::error::ErrorBody),
        (status = 422, description = "Validation failed", body = crate::error::ErrorBody),
    ),
    tag = "disbursements"
)]
pub(crate) async fn transition_disbursement(
    State(state): State<AppState>,
    ActorClaims(actor): ActorClaims,
    Path(id): Path<Uuid>,
    body: Result<Json<TransitionBody>, JsonRejection>,
) -> Result<Json<TransitionResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let note = req.trimmed_note();
    let payment_reference = req.trimmed_reference();

    let record = state
        .disbursements
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("disbursement {id} not found")))?;
    let grants = state.grants_for(actor.person).await?;

    // No read-visibility collapse here: ownership and scope violations on a
    // transition are Forbidden by contract, and the guard decides them.
    let guard_request = TransitionRequest {
        actor: &actor,
        kind: record.kind,
        current_state: record.state,
        action: req.action,
        note: note.as_deref(),
        owner: record.collaborator_id,
        community: record.community_id,
    };
    let row = evaluate(&guard_request, &grants).map_err(|rejection| {
        if rejection == GuardRejection::InvalidStateForAction {
            conflict_diagnostic(record.kind, record.state, req.action)
        } else {
            AppError::from(rejection)
        }
    })?;

    // Atomically re-validate the state and apply under the write lock.
    // A request that raced past the guard loses here instead of
    // overwriting the winner's transition.
    let now = Utc::now();
    let updated = state
        .disbursements
        .try_update(&id, |rec| {
            if rec.state != row.from {
                return Err(conflict_diagnostic(rec.kind, rec.state, req.action));
            }
            rec.apply(
                req.action,
                row.to,
                actor.person,
                note.as_deref(),
                payment_reference.clone(),
                now,
            );
            Ok(rec.clone())
        })
        .ok_or_else(|| AppError::NotFound(format!("disbursement {id} not found")))??;

    // Conditional write-through keyed on (id, expected state). Zero rows
    // affected means another writer won between our read and this update.
    if let Some(pool) = &state.db_pool {
        match crate::db::disbursements::update_transition(pool, &updated, row.from).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(id = %id, from = %row.from, "conditional update affected zero rows");
                return Err(AppError::Conflict(
                    "invalid state for action: the request was modified concurrently; re-fetch and retry"
                        .to_string(),
                ));
            }
            Err(e) => {
                tracing::error!(id = %id, error = %e, "failed to persist transition");
                return Err(AppError::Internal(
                    "transition applied in-memory but database persist failed".to_string(),
                ));
            }
        }
    }

    // From here on the transition is durable: history and notification
    // failures are logged and counted, never returned to the caller.
    state
        .record_history(HistoryEntry::transition(
            id,
            updated.kind,
            row.from,
            row.to,
            actor.person,
            actor.role.label(),
            note.clone(),
        ))
        .await;

    state.notify_transition(
        updated.kind,
        req.action,
        updated.collaborator_id,
        id,
        note.as_deref(),
    );

    Ok(Json(TransitionResponse {
        new_state: updated.state,
    }))
}

/// Build the 409 body for a state mismatch, listing what would be legal.
fn conflict_diagnostic(
    kind: DisbursementKind,
    current: DisbursementState,
    action: DisbursementAction,
) -> AppError {
    let valid = actions_from(kind, current);
    AppError::Conflict(format!(
        "invalid state for action: cannot {action} a {kind} in state {current}. Valid actions from {current}: [{}]",
        valid
            .iter()
            .map(|a| a.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    ))
}

//! # Application State
//!
//! Shared state for the axum application: the in-memory stores, the
//! external-collaborator seams (grants, delivery settings, notification
//! sinks), and the optional Postgres pool for write-through persistence.
//!
//! ## Architecture
//!
//! The stores are the in-process source of truth; when `DATABASE_URL` is
//! configured every mutation is written through to Postgres and the stores
//! are hydrated from it on startup. In-process races serialize on the
//! store's write lock; cross-process races serialize on the SQL
//! `WHERE state = $expected` filter. Both losers observe the same
//! stale-state conflict.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use erogo_core::{Actor, CommunityId, PersonId, Role};
use erogo_notify::{
    dispatch, plan_delivery, AllowAllSettings, DeliveryChannel, DeliverySettingsLookup,
    InMemorySink, LoggingSink, NotificationEvent, NotificationSink,
};
use erogo_state::{
    CommunityGrantLookup, DisbursementAction, DisbursementKind, DisbursementState, HistoryEntry,
    InMemoryGrants,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::notifier::Mailer;

/// One disbursement request as stored by the engine.
///
/// Compensations carry `gross_amount_cents`/`net_amount_cents` and an
/// optional community; expense reimbursements carry `amount_cents` and no
/// community. Amounts are EUR cents.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DisbursementRecord {
    pub id: Uuid,
    #[schema(value_type = String)]
    pub kind: DisbursementKind,
    #[schema(value_type = Uuid)]
    pub collaborator_id: PersonId,
    #[schema(value_type = Option<Uuid>)]
    pub community_id: Option<CommunityId>,
    pub gross_amount_cents: Option<i64>,
    pub net_amount_cents: Option<i64>,
    pub amount_cents: Option<i64>,
    pub category: String,
    pub description: String,
    #[schema(value_type = String)]
    pub state: DisbursementState,
    /// Set only while a correction is awaited (legacy integration flow);
    /// cleared when a compensation is rejected.
    pub integration_note: Option<String>,
    pub rejection_reason: Option<String>,
    #[schema(value_type = Option<Uuid>)]
    pub approved_by: Option<PersonId>,
    pub approved_at: Option<DateTime<Utc>>,
    #[schema(value_type = Option<Uuid>)]
    pub paid_by: Option<PersonId>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DisbursementRecord {
    /// Apply the field effects of a validated action.
    ///
    /// This is the only place transition side effects on the record are
    /// defined — single transitions and bulk operations both route here.
    pub fn apply(
        &mut self,
        action: DisbursementAction,
        target: DisbursementState,
        actor: PersonId,
        note: Option<&str>,
        payment_reference: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.state = target;
        self.updated_at = now;
        match action {
            DisbursementAction::Submit => {}
            DisbursementAction::Reopen => {
                // The old rejection is contradicted by the reopen.
                self.rejection_reason = None;
            }
            DisbursementAction::Approve => {
                self.approved_by = Some(actor);
                self.approved_at = Some(now);
            }
            DisbursementAction::Reject => {
                self.rejection_reason = note.map(|n| n.trim().to_string());
                self.approved_by = None;
                self.approved_at = None;
                if self.kind == DisbursementKind::Compensation {
                    self.integration_note = None;
                }
            }
            DisbursementAction::MarkLiquidated => {
                self.paid_by = Some(actor);
                self.paid_at = Some(now);
                self.payment_reference = payment_reference;
            }
        }
    }
}

/// Whether `record` is readable by `actor`.
///
/// Drafts are private to their owner. Beyond that: owners see their own
/// requests; the administration sees everything; a responsabile sees
/// compensations within granted communities (unscoped compensations and
/// expenses are manager-wide). Unreadable records are reported to the
/// caller as not found, never as forbidden.
pub fn visible_to(
    record: &DisbursementRecord,
    actor: &Actor,
    grants: &dyn CommunityGrantLookup,
) -> bool {
    if record.collaborator_id == actor.person {
        return true;
    }
    if record.state == DisbursementState::Bozza {
        return false;
    }
    match actor.role {
        Role::Amministrazione => true,
        Role::ResponsabileCompensi => match (record.kind, record.community_id) {
            (DisbursementKind::Compensation, Some(community)) => {
                grants.allows(actor.person, community)
            }
            _ => true,
        },
        Role::Collaborator => false,
    }
}

// ─── Stores ──────────────────────────────────────────────────────────

/// In-memory disbursement store with atomic conditional updates.
#[derive(Debug, Clone, Default)]
pub struct DisbursementStore {
    inner: Arc<RwLock<HashMap<Uuid, DisbursementRecord>>>,
}

impl DisbursementStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a record.
    pub fn insert(&self, record: DisbursementRecord) {
        self.inner.write().insert(record.id, record);
    }

    /// Fetch a record by id.
    pub fn get(&self, id: &Uuid) -> Option<DisbursementRecord> {
        self.inner.read().get(id).cloned()
    }

    /// All records, most recently created first.
    pub fn list(&self) -> Vec<DisbursementRecord> {
        let mut records: Vec<_> = self.inner.read().values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Atomically read-validate-update a single record under the write
    /// lock. Returns `None` when the id is unknown; otherwise the closure's
    /// result. The closure must itself check the expected current state —
    /// this is what makes concurrent transitions lose cleanly instead of
    /// overwriting each other.
    pub fn try_update<R, E>(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut DisbursementRecord) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        let mut map = self.inner.write();
        map.get_mut(id).map(f)
    }

    /// Atomically update every record matching `pred` in one write-lock
    /// section. Returns the updated records. This is the in-memory form of
    /// the conditional batch update used by bulk operations.
    pub fn update_where(
        &self,
        pred: impl Fn(&DisbursementRecord) -> bool,
        mut mutate: impl FnMut(&mut DisbursementRecord),
    ) -> Vec<DisbursementRecord> {
        let mut map = self.inner.write();
        let mut updated = Vec::new();
        for record in map.values_mut() {
            if pred(record) {
                mutate(record);
                updated.push(record.clone());
            }
        }
        updated.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        updated
    }
}

/// Append-only in-memory history store.
#[derive(Debug, Clone, Default)]
pub struct HistoryStore {
    inner: Arc<RwLock<Vec<HistoryEntry>>>,
}

impl HistoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry.
    pub fn append(&self, entry: HistoryEntry) {
        self.inner.write().push(entry);
    }

    /// Append a batch of entries.
    pub fn append_batch(&self, entries: &[HistoryEntry]) {
        self.inner.write().extend_from_slice(entries);
    }

    /// All entries for one request, oldest first.
    pub fn for_request(&self, request_id: Uuid) -> Vec<HistoryEntry> {
        let mut entries: Vec<_> = self
            .inner
            .read()
            .iter()
            .filter(|e| e.request_id == request_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        entries
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether no entries have been recorded.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

// ─── Grants ──────────────────────────────────────────────────────────

/// The grant lookup active for one request.
///
/// In-memory mode shares the configured lookup; database mode snapshots
/// the caller's granted communities with one read-only query.
pub enum GrantView {
    /// Delegate to the shared in-memory lookup.
    Shared(Arc<dyn CommunityGrantLookup + Send + Sync>),
    /// A loaded snapshot of one person's grants.
    Loaded {
        person: PersonId,
        communities: HashSet<CommunityId>,
    },
}

impl CommunityGrantLookup for GrantView {
    fn allows(&self, person: PersonId, community: CommunityId) -> bool {
        match self {
            Self::Shared(lookup) => lookup.allows(person, community),
            Self::Loaded {
                person: loaded,
                communities,
            } => *loaded == person && communities.contains(&community),
        }
    }
}

// ─── AppState ────────────────────────────────────────────────────────

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    /// The disbursement requests.
    pub disbursements: DisbursementStore,
    /// The append-only audit trail.
    pub history: HistoryStore,
    /// Community grant lookup (in-memory mode).
    pub grants: Arc<dyn CommunityGrantLookup + Send + Sync>,
    /// Per-event delivery settings.
    pub delivery_settings: Arc<dyn DeliverySettingsLookup + Send + Sync>,
    /// In-app notification sink, delivered synchronously (best-effort).
    pub inapp_sink: Arc<dyn NotificationSink>,
    /// Background e-mail dispatch (fire-and-forget).
    pub mailer: Mailer,
    /// Optional Postgres pool for write-through persistence.
    pub db_pool: Option<PgPool>,
    /// History rows that could not be persisted (operator-facing).
    pub audit_failures: Arc<AtomicU64>,
    /// In-app deliveries that failed (operator-facing).
    pub inapp_delivery_failures: Arc<AtomicU64>,
}

impl AppState {
    /// In-memory state with permissive defaults: empty grants, all delivery
    /// channels enabled, in-memory in-app sink, logging e-mail sink.
    ///
    /// Requires a tokio runtime (the mailer worker is spawned here).
    pub fn new() -> Self {
        Self::with_parts(
            Arc::new(InMemoryGrants::new()),
            Arc::new(AllowAllSettings),
            Arc::new(InMemorySink::new()),
            Arc::new(LoggingSink),
            None,
        )
    }

    /// Assemble state from explicit collaborator seams.
    pub fn with_parts(
        grants: Arc<dyn CommunityGrantLookup + Send + Sync>,
        delivery_settings: Arc<dyn DeliverySettingsLookup + Send + Sync>,
        inapp_sink: Arc<dyn NotificationSink>,
        email_sink: Arc<dyn NotificationSink>,
        db_pool: Option<PgPool>,
    ) -> Self {
        Self {
            disbursements: DisbursementStore::new(),
            history: HistoryStore::new(),
            grants,
            delivery_settings,
            inapp_sink,
            mailer: Mailer::spawn(email_sink),
            db_pool,
            audit_failures: Arc::new(AtomicU64::new(0)),
            inapp_delivery_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The grant lookup to use for this request's caller.
    pub async fn grants_for(&self, person: PersonId) -> Result<GrantView, crate::error::AppError> {
        match &self.db_pool {
            Some(pool) => {
                let communities = crate::db::grants::communities_for(pool, person)
                    .await
                    .map_err(|e| {
                        crate::error::AppError::Internal(format!("grant lookup failed: {e}"))
                    })?;
                Ok(GrantView::Loaded {
                    person,
                    communities,
                })
            }
            None => Ok(GrantView::Shared(Arc::clone(&self.grants))),
        }
    }

    /// Record one history entry: in-memory append plus best-effort
    /// write-through. Persistence failure is logged and counted, never
    /// surfaced — the state change is the authoritative business fact.
    pub async fn record_history(&self, entry: HistoryEntry) {
        self.history.append(entry.clone());
        if let Some(pool) = &self.db_pool {
            if let Err(e) = crate::db::history::insert(pool, &entry).await {
                self.audit_failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    request_id = %entry.request_id,
                    error = %e,
                    "failed to persist history entry"
                );
            }
        }
    }

    /// Record a batch of history entries (bulk operations).
    pub async fn record_history_batch(&self, entries: &[HistoryEntry]) {
        self.history.append_batch(entries);
        if let Some(pool) = &self.db_pool {
            if let Err(e) = crate::db::history::insert_batch(pool, entries).await {
                self.audit_failures
                    .fetch_add(entries.len() as u64, Ordering::Relaxed);
                tracing::error!(
                    count = entries.len(),
                    error = %e,
                    "failed to persist history batch"
                );
            }
        }
    }

    /// Fan out the notification side effect of a realized transition.
    ///
    /// Consults the allowlist and the per-event delivery settings; in-app
    /// delivery is synchronous best-effort, e-mail goes to the background
    /// worker. Nothing here can fail the caller.
    pub fn notify_transition(
        &self,
        kind: DisbursementKind,
        action: DisbursementAction,
        owner: PersonId,
        request_id: Uuid,
        note: Option<&str>,
    ) {
        let Some(event) = NotificationEvent::for_transition(kind, action) else {
            return;
        };
        let Some(payload) = dispatch(kind, action, owner, request_id, note) else {
            return;
        };
        for channel in plan_delivery(event, Role::Collaborator, self.delivery_settings.as_ref()) {
            match channel {
                DeliveryChannel::InApp => {
                    if let Err(e) = self.inapp_sink.deliver(DeliveryChannel::InApp, &payload) {
                        self.inapp_delivery_failures.fetch_add(1, Ordering::Relaxed);
                        tracing::error!(
                            recipient = %payload.recipient,
                            error = %e,
                            "in-app notification delivery failed"
                        );
                    }
                }
                DeliveryChannel::Email => self.mailer.enqueue(payload.clone()),
            }
        }
    }

    /// Count of history rows that failed to persist.
    pub fn audit_failure_count(&self) -> u64 {
        self.audit_failures.load(Ordering::Relaxed)
    }

    /// Count of failed notification deliveries across both channels.
    pub fn notification_failure_count(&self) -> u64 {
        self.inapp_delivery_failures.load(Ordering::Relaxed) + self.mailer.failure_count()
    }
}

//! # History Records
//!
//! The immutable audit row written for every realized transition. History
//! rows are never updated or deleted; the creation of a request is itself
//! recorded as a row with `previous_state = None`.

use chrono::{DateTime, Utc};
use erogo_core::PersonId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::disbursement::{DisbursementKind, DisbursementState};

/// One immutable audit entry for a disbursement request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Unique entry identifier.
    pub id: Uuid,
    /// The request this entry belongs to.
    pub request_id: Uuid,
    /// The kind of the request.
    pub entity_kind: DisbursementKind,
    /// State before the transition. `None` exactly for the creation entry.
    pub previous_state: Option<DisbursementState>,
    /// State after the transition.
    pub new_state: DisbursementState,
    /// The person who performed the transition.
    pub changed_by: PersonId,
    /// Human-readable role label at the time of the change.
    pub role_label: String,
    /// Free-text note accompanying the transition, if any.
    pub note: Option<String>,
    /// When the transition was recorded.
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Build an entry for a realized transition.
    pub fn transition(
        request_id: Uuid,
        entity_kind: DisbursementKind,
        previous_state: DisbursementState,
        new_state: DisbursementState,
        changed_by: PersonId,
        role_label: &str,
        note: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id,
            entity_kind,
            previous_state: Some(previous_state),
            new_state,
            changed_by,
            role_label: role_label.to_string(),
            note,
            created_at: Utc::now(),
        }
    }

    /// Build the creation entry (`previous_state = None`).
    pub fn creation(
        request_id: Uuid,
        entity_kind: DisbursementKind,
        initial_state: DisbursementState,
        changed_by: PersonId,
        role_label: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id,
            entity_kind,
            previous_state: None,
            new_state: initial_state,
            changed_by,
            role_label: role_label.to_string(),
            note: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_entry_has_null_previous_state() {
        let entry = HistoryEntry::creation(
            Uuid::new_v4(),
            DisbursementKind::Compensation,
            DisbursementState::Bozza,
            PersonId::new(),
            "Collaboratore",
        );
        assert!(entry.previous_state.is_none());
        assert_eq!(entry.new_state, DisbursementState::Bozza);
        assert!(entry.note.is_none());
    }

    #[test]
    fn serde_roundtrip_preserves_states_and_note() {
        let entry = HistoryEntry::transition(
            Uuid::new_v4(),
            DisbursementKind::ExpenseReimbursement,
            DisbursementState::InAttesa,
            DisbursementState::Rifiutato,
            PersonId::new(),
            "Responsabile Compensi",
            Some("Missing receipt".to_string()),
        );
        let json = serde_json::to_string(&entry).unwrap();
        let parsed: HistoryEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, entry);
        assert_eq!(parsed.previous_state, Some(DisbursementState::InAttesa));
        assert_eq!(parsed.new_state, DisbursementState::Rifiutato);
        assert_eq!(parsed.note.as_deref(), Some("Missing receipt"));
    }

    #[test]
    fn serde_roundtrip_preserves_null_previous_state() {
        let entry = HistoryEntry::creation(
            Uuid::new_v4(),
            DisbursementKind::Compensation,
            DisbursementState::InAttesa,
            PersonId::new(),
            "Collaboratore",
        );
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"previous_state\":null"));
        let parsed: HistoryEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.previous_state, None);
        assert_eq!(parsed.note, None);
    }

    #[test]
    fn states_serialize_as_wire_names() {
        let entry = HistoryEntry::transition(
            Uuid::new_v4(),
            DisbursementKind::Compensation,
            DisbursementState::InAttesa,
            DisbursementState::Approvato,
            PersonId::new(),
            "Amministrazione",
            None,
        );
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"IN_ATTESA\""));
        assert!(json.contains("\"APPROVATO\""));
    }
}

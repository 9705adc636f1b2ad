//! # Payload Dispatch
//!
//! Builds the ephemeral notification payload for a realized transition.
//! The engine does not own the payload after creation — it is handed to
//! the delivery collaborator through the sink seam.

use erogo_core::PersonId;
use erogo_state::{DisbursementAction, DisbursementKind};
use serde::Serialize;
use uuid::Uuid;

use crate::event::NotificationEvent;

/// An ephemeral notification for one recipient.
///
/// Not owned by the engine after creation — serialized and handed to the
/// delivery collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationPayload {
    /// The person to notify (the request owner).
    pub recipient: PersonId,
    /// Entity-type label: `compensation` or `reimbursement`.
    pub entity_type: &'static str,
    /// The request the notification is about.
    pub entity_id: Uuid,
    /// The event wire name, e.g. `reimbursement_approved`.
    pub kind: &'static str,
    /// The notification title.
    pub title: &'static str,
    /// The message body. `"Note: <note>"` when the transition carried a
    /// note, the event's fixed default phrase otherwise.
    pub message: String,
}

/// Build the payload for a realized transition, if the event is
/// allowlisted. Returns `None` for silent transitions.
pub fn dispatch(
    kind: DisbursementKind,
    action: DisbursementAction,
    owner: PersonId,
    request_id: Uuid,
    note: Option<&str>,
) -> Option<NotificationPayload> {
    let event = NotificationEvent::for_transition(kind, action)?;

    let message = match note.map(str::trim).filter(|n| !n.is_empty()) {
        Some(note) => format!("Note: {note}"),
        None => event.default_message().to_string(),
    };

    Some(NotificationPayload {
        recipient: owner,
        entity_type: kind.entity_type(),
        entity_id: request_id,
        kind: event.as_str(),
        title: event.title(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use DisbursementAction as A;
    use DisbursementKind as K;

    #[test]
    fn reject_note_becomes_note_message() {
        let owner = PersonId::new();
        let id = Uuid::new_v4();
        let payload =
            dispatch(K::Compensation, A::Reject, owner, id, Some("Missing receipt")).unwrap();
        assert_eq!(payload.message, "Note: Missing receipt");
        assert_eq!(payload.recipient, owner);
        assert_eq!(payload.entity_id, id);
        assert_eq!(payload.entity_type, "compensation");
        assert_eq!(payload.kind, "compensation_rejected");
    }

    #[test]
    fn missing_note_uses_default_phrase() {
        let payload = dispatch(
            K::ExpenseReimbursement,
            A::Approve,
            PersonId::new(),
            Uuid::new_v4(),
            None,
        )
        .unwrap();
        assert_eq!(payload.message, "Il tuo rimborso spese è stato approvato.");
        assert_eq!(payload.entity_type, "reimbursement");
    }

    #[test]
    fn whitespace_note_is_treated_as_absent() {
        let payload = dispatch(
            K::Compensation,
            A::MarkLiquidated,
            PersonId::new(),
            Uuid::new_v4(),
            Some("   "),
        )
        .unwrap();
        assert_eq!(payload.message, "Il tuo compenso è stato liquidato.");
    }

    #[test]
    fn silent_transitions_produce_no_payload() {
        assert!(dispatch(
            K::Compensation,
            A::Approve,
            PersonId::new(),
            Uuid::new_v4(),
            None
        )
        .is_none());
        assert!(dispatch(
            K::Compensation,
            A::Reopen,
            PersonId::new(),
            Uuid::new_v4(),
            None
        )
        .is_none());
    }

    #[test]
    fn payload_serializes_for_the_delivery_collaborator() {
        let payload = dispatch(
            K::ExpenseReimbursement,
            A::Reject,
            PersonId::new(),
            Uuid::new_v4(),
            Some("Scontrino mancante"),
        )
        .unwrap();
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("reimbursement_rejected"));
        assert!(json.contains("Note: Scontrino mancante"));
    }
}

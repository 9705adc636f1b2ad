//! # Notification Events
//!
//! The fixed allowlist of collaborator-facing events. A transition outside
//! this table produces no notification at all; the delivery settings then
//! decide per channel whether an allowlisted event actually goes out.

use erogo_state::{DisbursementAction, DisbursementKind};
use serde::{Deserialize, Serialize};

/// A collaborator-facing notification event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    /// A compensation was rejected.
    CompensationRejected,
    /// A compensation was paid out.
    CompensationLiquidated,
    /// An expense reimbursement was approved.
    ReimbursementApproved,
    /// An expense reimbursement was rejected.
    ReimbursementRejected,
    /// An expense reimbursement was paid out.
    ReimbursementLiquidated,
}

impl NotificationEvent {
    /// Look up the event for a realized transition, if any.
    ///
    /// `submit` and `reopen` never notify; compensation approvals are
    /// deliberately silent — collaborators hear about the payout, not the
    /// intermediate manager decision.
    pub fn for_transition(
        kind: DisbursementKind,
        action: DisbursementAction,
    ) -> Option<Self> {
        use DisbursementAction as A;
        use DisbursementKind as K;

        match (kind, action) {
            (K::Compensation, A::Reject) => Some(Self::CompensationRejected),
            (K::Compensation, A::MarkLiquidated) => Some(Self::CompensationLiquidated),
            (K::ExpenseReimbursement, A::Approve) => Some(Self::ReimbursementApproved),
            (K::ExpenseReimbursement, A::Reject) => Some(Self::ReimbursementRejected),
            (K::ExpenseReimbursement, A::MarkLiquidated) => {
                Some(Self::ReimbursementLiquidated)
            }
            _ => None,
        }
    }

    /// The wire name of the event.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CompensationRejected => "compensation_rejected",
            Self::CompensationLiquidated => "compensation_liquidated",
            Self::ReimbursementApproved => "reimbursement_approved",
            Self::ReimbursementRejected => "reimbursement_rejected",
            Self::ReimbursementLiquidated => "reimbursement_liquidated",
        }
    }

    /// The notification title shown to the collaborator.
    pub fn title(&self) -> &'static str {
        match self {
            Self::CompensationRejected => "Compenso rifiutato",
            Self::CompensationLiquidated => "Compenso liquidato",
            Self::ReimbursementApproved => "Rimborso spese approvato",
            Self::ReimbursementRejected => "Rimborso spese rifiutato",
            Self::ReimbursementLiquidated => "Rimborso spese liquidato",
        }
    }

    /// The default message used when the transition carried no note.
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::CompensationRejected => "Il tuo compenso è stato rifiutato.",
            Self::CompensationLiquidated => "Il tuo compenso è stato liquidato.",
            Self::ReimbursementApproved => "Il tuo rimborso spese è stato approvato.",
            Self::ReimbursementRejected => "Il tuo rimborso spese è stato rifiutato.",
            Self::ReimbursementLiquidated => "Il tuo rimborso spese è stato liquidato.",
        }
    }
}

impl std::fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

//! # Transition Table
//!
//! The declarative action map of the lifecycle engine. Given
//! `(kind, action)` the table yields the required source state, the target
//! state, and the action's data requirement. It is pure data: no side
//! effects, no role knowledge — authorization lives in [`crate::guard`].
//!
//! | Action            | Kinds        | From      | To        | Data                  |
//! |-------------------|--------------|-----------|-----------|-----------------------|
//! | `submit`          | both         | BOZZA     | IN_ATTESA | none                  |
//! | `reopen`          | compensation | RIFIUTATO | IN_ATTESA | none                  |
//! | `approve`         | both         | IN_ATTESA | APPROVATO | none                  |
//! | `reject`          | both         | IN_ATTESA | RIFIUTATO | mandatory note        |
//! | `mark_liquidated` | both         | APPROVATO | LIQUIDATO | optional payment ref. |

use serde::{Deserialize, Serialize};

use crate::disbursement::{DisbursementKind, DisbursementState};

/// A named lifecycle action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisbursementAction {
    /// Submit a draft for review.
    Submit,
    /// Reopen a rejected compensation for a new decision.
    Reopen,
    /// Approve a pending request.
    Approve,
    /// Reject a pending request with a mandatory reason.
    Reject,
    /// Record the payout of an approved request.
    MarkLiquidated,
}

/// Every defined action, in table order.
pub const ALL_ACTIONS: [DisbursementAction; 5] = [
    DisbursementAction::Submit,
    DisbursementAction::Reopen,
    DisbursementAction::Approve,
    DisbursementAction::Reject,
    DisbursementAction::MarkLiquidated,
];

impl DisbursementAction {
    /// The wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Reopen => "reopen",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::MarkLiquidated => "mark_liquidated",
        }
    }
}

impl std::fmt::Display for DisbursementAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What request data an action requires beyond the action name itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataRequirement {
    /// No additional data.
    None,
    /// A non-empty free-text note (after trimming whitespace).
    MandatoryNote,
    /// An optional payment reference to record with the payout.
    OptionalPaymentReference,
}

/// One row of the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionSpec {
    /// The state the request must currently be in.
    pub from: DisbursementState,
    /// The state the request moves to.
    pub to: DisbursementState,
    /// The action's data requirement.
    pub data: DataRequirement,
}

/// Look up the transition row for `(kind, action)`.
///
/// Returns `None` when the action is not defined for the kind — notably
/// `reopen` on an expense reimbursement, whose rejection is terminal.
pub fn transition_for(
    kind: DisbursementKind,
    action: DisbursementAction,
) -> Option<TransitionSpec> {
    use DisbursementAction as A;
    use DisbursementState as S;

    match (kind, action) {
        (_, A::Submit) => Some(TransitionSpec {
            from: S::Bozza,
            to: S::InAttesa,
            data: DataRequirement::None,
        }),
        (DisbursementKind::Compensation, A::Reopen) => Some(TransitionSpec {
            from: S::Rifiutato,
            to: S::InAttesa,
            data: DataRequirement::None,
        }),
        (DisbursementKind::ExpenseReimbursement, A::Reopen) => None,
        (_, A::Approve) => Some(TransitionSpec {
            from: S::InAttesa,
            to: S::Approvato,
            data: DataRequirement::None,
        }),
        (_, A::Reject) => Some(TransitionSpec {
            from: S::InAttesa,
            to: S::Rifiutato,
            data: DataRequirement::MandatoryNote,
        }),
        (_, A::MarkLiquidated) => Some(TransitionSpec {
            from: S::Approvato,
            to: S::Liquidato,
            data: DataRequirement::OptionalPaymentReference,
        }),
    }
}

/// The actions that can leave `state` for the given kind.
///
/// Used for conflict diagnostics — a 409 response lists what would have
/// been legal instead.
pub fn actions_from(
    kind: DisbursementKind,
    state: DisbursementState,
) -> Vec<DisbursementAction> {
    ALL_ACTIONS
        .into_iter()
        .filter(|action| {
            transition_for(kind, *action).is_some_and(|spec| spec.from == state)
        })
        .collect()
}

//! # Disbursement Kinds and States
//!
//! The two payable-claim kinds and the shared lifecycle state enum.
//! Wire names use the organization's vocabulary (`BOZZA`, `IN_ATTESA`,
//! `APPROVATO`, `RIFIUTATO`, `LIQUIDATO`); those exact strings are what the
//! persistence layer stores and the API returns.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The kind of a disbursement request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisbursementKind {
    /// Compensation for work performed. Optionally scoped to a community.
    Compensation,
    /// Reimbursement of expenses advanced by the collaborator.
    ExpenseReimbursement,
}

impl DisbursementKind {
    /// The wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compensation => "compensation",
            Self::ExpenseReimbursement => "expense_reimbursement",
        }
    }

    /// The short entity-type label used in notification payloads.
    pub fn entity_type(&self) -> &'static str {
        match self {
            Self::Compensation => "compensation",
            Self::ExpenseReimbursement => "reimbursement",
        }
    }
}

impl std::fmt::Display for DisbursementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The lifecycle state of a disbursement request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisbursementState {
    /// Draft, visible only to its owner, not yet submitted.
    Bozza,
    /// Submitted, awaiting a manager decision.
    InAttesa,
    /// Approved, awaiting payment.
    Approvato,
    /// Rejected. Terminal for expense reimbursements; compensations may be
    /// reopened by their owner.
    Rifiutato,
    /// Paid out (terminal).
    Liquidato,
}

impl DisbursementState {
    /// The wire name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bozza => "BOZZA",
            Self::InAttesa => "IN_ATTESA",
            Self::Approvato => "APPROVATO",
            Self::Rifiutato => "RIFIUTATO",
            Self::Liquidato => "LIQUIDATO",
        }
    }

    /// Parse a wire name.
    pub fn parse(s: &str) -> Result<Self, UnknownState> {
        match s {
            "BOZZA" => Ok(Self::Bozza),
            "IN_ATTESA" => Ok(Self::InAttesa),
            "APPROVATO" => Ok(Self::Approvato),
            "RIFIUTATO" => Ok(Self::Rifiutato),
            "LIQUIDATO" => Ok(Self::Liquidato),
            other => Err(UnknownState(other.to_string())),
        }
    }

    /// Whether this state has no outgoing transitions for the given kind.
    ///
    /// `LIQUIDATO` is terminal for both kinds. `RIFIUTATO` is terminal only
    /// for expense reimbursements — compensations define `reopen`.
    pub fn is_terminal(&self, kind: DisbursementKind) -> bool {
        match self {
            Self::Liquidato => true,
            Self::Rifiutato => kind == DisbursementKind::ExpenseReimbursement,
            _ => false,
        }
    }
}

impl std::fmt::Display for DisbursementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored state string did not match any known lifecycle state.
#[derive(Error, Debug)]
#[error("unknown disbursement state: {0:?}")]
pub struct UnknownState(pub String);

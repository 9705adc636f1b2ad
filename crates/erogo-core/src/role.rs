//! # Roles and Actor Claims
//!
//! The role model for the back office. Roles arrive as claims from the
//! upstream identity provider; the engine trusts them unconditionally and
//! performs no authentication of its own. Scope re-validation (community
//! grants) happens in the guard evaluator, never here.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::PersonId;

/// The role a caller acts under.
///
/// Wire names follow the organization's vocabulary: `collaboratore`,
/// `responsabile_compensi`, `amministrazione`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// A collaborator who owns disbursement requests.
    #[serde(rename = "collaboratore")]
    Collaborator,
    /// A compensation manager scoped to granted communities.
    #[serde(rename = "responsabile_compensi")]
    ResponsabileCompensi,
    /// The administration office. Unscoped; the only role that may pay.
    #[serde(rename = "amministrazione")]
    Amministrazione,
}

impl Role {
    /// The wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Collaborator => "collaboratore",
            Self::ResponsabileCompensi => "responsabile_compensi",
            Self::Amministrazione => "amministrazione",
        }
    }

    /// The human-readable label, recorded verbatim in history rows.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Collaborator => "Collaboratore",
            Self::ResponsabileCompensi => "Responsabile Compensi",
            Self::Amministrazione => "Amministrazione",
        }
    }

    /// Whether the role is a manager role (may approve and reject).
    pub fn is_manager(&self) -> bool {
        matches!(self, Self::ResponsabileCompensi | Self::Amministrazione)
    }

    /// Parse a wire name.
    pub fn parse(s: &str) -> Result<Self, UnknownRole> {
        match s {
            "collaboratore" => Ok(Self::Collaborator),
            "responsabile_compensi" => Ok(Self::ResponsabileCompensi),
            "amministrazione" => Ok(Self::Amministrazione),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The role claim did not match any known role.
#[derive(Error, Debug)]
#[error("unknown role: {0:?}")]
pub struct UnknownRole(pub String);

/// The authenticated caller as claimed by the identity provider.
///
/// The engine receives this already authorized; it re-validates scope
/// (community grants, ownership) but never escalates privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// The person acting.
    pub person: PersonId,
    /// The role the person acts under.
    pub role: Role,
    /// Whether the person is currently active in the organization.
    pub active: bool,
}

impl Actor {
    /// Construct an active actor claim.
    pub fn new(person: PersonId, role: Role) -> Self {
        Self {
            person,
            role,
            active: true,
        }
    }
}

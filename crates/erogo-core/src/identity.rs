//! # Domain Identity Newtypes
//!
//! Newtype wrappers for the identifiers used across the erogo stack.
//! These prevent accidental identifier confusion — you cannot pass a
//! `CommunityId` where a `PersonId` is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a person (collaborator, manager, administrator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersonId(pub Uuid);

/// Unique identifier for an organizational community (sub-group).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommunityId(pub Uuid);

impl PersonId {
    /// Generate a new random person identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PersonId {
    fn default() -> Self {
        Self::new()
    }
}

impl CommunityId {
    /// Generate a new random community identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CommunityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PersonId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "person:{}", self.0)
    }
}

impl std::fmt::Display for CommunityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "community:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn person_ids_are_unique() {
        assert_ne!(PersonId::new(), PersonId::new());
    }

    #[test]
    fn display_is_prefixed() {
        let id = PersonId::new();
        assert!(id.to_string().starts_with("person:"));
        let cid = CommunityId::new();
        assert!(cid.to_string().starts_with("community:"));
    }

    #[test]
    fn serde_roundtrip() {
        let id = CommunityId::new();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: CommunityId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }
}

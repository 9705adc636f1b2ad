//! # erogo-core — Foundational Types for the erogo Stack
//!
//! The leaf crate of the workspace. It defines the identifier newtypes and
//! the role model that every other crate consumes; it depends on nothing
//! internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** `PersonId` and
//!    `CommunityId` are distinct types — you cannot pass a community where a
//!    person is expected. No bare strings or loose UUIDs for identifiers.
//!
//! 2. **One role model.** A single [`Role`] enum with exhaustive `match`
//!    everywhere. The permission matrix in `erogo-state` consumes it; there
//!    are no per-call-site role strings.
//!
//! 3. **The actor claim is data, not a session.** [`Actor`] is the identity
//!    claim handed to the engine by the upstream identity provider. The
//!    engine trusts it and never authenticates.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `erogo-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.
//! - All public types derive `Debug`, `Clone`, and implement
//!   `Serialize`/`Deserialize`.

pub mod identity;
pub mod role;

pub use identity::{CommunityId, PersonId};
pub use role::{Actor, Role, UnknownRole};

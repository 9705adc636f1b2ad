//! # Guard Evaluator
//!
//! The single permission matrix of the engine. Every enforcement point —
//! single transitions and bulk operations alike — calls [`evaluate`];
//! there are no per-call-site role checks to drift apart.
//!
//! The evaluator is synchronous and side-effect free. Community grants are
//! consumed read-only through [`CommunityGrantLookup`], so the whole matrix
//! is unit-testable with an in-memory lookup and no persistence layer.
//!
//! ## Check order
//!
//! 1. The action must be defined for the entity kind.
//! 2. The current state must match the transition table's source state.
//!    Stale-state conflicts from concurrent transitions surface as the same
//!    rejection.
//! 3. The role must be authorized: collaborators may `submit`/`reopen` only
//!    their own request; manager roles may `approve`/`reject`; only the
//!    administration may `mark_liquidated`.
//! 4. `reject` requires a non-empty note after trimming.
//! 5. A `responsabile_compensi` acting on a compensation scoped to a
//!    community must hold a grant for that community.

use erogo_core::{Actor, CommunityId, PersonId, Role};
use thiserror::Error;

use crate::disbursement::{DisbursementKind, DisbursementState};
use crate::transition::{transition_for, DataRequirement, DisbursementAction, TransitionSpec};

/// Read-only lookup of which communities a manager may act on.
///
/// The grant store is externally owned; the engine only ever asks
/// membership questions.
pub trait CommunityGrantLookup {
    /// Whether `person` holds a grant for `community`.
    fn allows(&self, person: PersonId, community: CommunityId) -> bool;
}

/// In-memory grant lookup for development and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGrants {
    grants: std::collections::HashSet<(PersonId, CommunityId)>,
}

impl InMemoryGrants {
    /// Create an empty grant set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a grant for `person` on `community`.
    pub fn grant(&mut self, person: PersonId, community: CommunityId) {
        self.grants.insert((person, community));
    }
}

impl CommunityGrantLookup for InMemoryGrants {
    fn allows(&self, person: PersonId, community: CommunityId) -> bool {
        self.grants.contains(&(person, community))
    }
}

/// Why a requested transition was refused.
///
/// The `Display` strings are the machine-readable reason vocabulary of the
/// API contract; callers match on them, so they never change.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardRejection {
    /// The action is not defined for this entity kind.
    #[error("unknown action")]
    UnknownAction,
    /// The request is not in the state the action departs from.
    #[error("invalid state for action")]
    InvalidStateForAction,
    /// The caller's role (or ownership) does not permit the action.
    #[error("not authorized")]
    NotAuthorized,
    /// The action requires a non-empty note and none was supplied.
    #[error("note required")]
    NoteRequired,
    /// The entity's community is outside the caller's granted set.
    #[error("out of scope")]
    OutOfScope,
}

/// A requested transition, assembled by the caller from the entity record
/// and the identity claim.
#[derive(Debug, Clone, Copy)]
pub struct TransitionRequest<'a> {
    /// The caller.
    pub actor: &'a Actor,
    /// The entity kind.
    pub kind: DisbursementKind,
    /// The entity's current state as read before the update.
    pub current_state: DisbursementState,
    /// The requested action.
    pub action: DisbursementAction,
    /// The free-text note accompanying the action, if any.
    pub note: Option<&'a str>,
    /// The collaborator who owns the request.
    pub owner: PersonId,
    /// The community the request is scoped to (compensations only).
    pub community: Option<CommunityId>,
}

/// Validate a requested transition against the permission matrix.
///
/// On success returns the transition table row to apply. Rejections carry
/// the exact reason string of the API contract.
pub fn evaluate(
    request: &TransitionRequest<'_>,
    grants: &dyn CommunityGrantLookup,
) -> Result<TransitionSpec, GuardRejection> {
    let row = transition_for(request.kind, request.action)
        .ok_or(GuardRejection::UnknownAction)?;

    if request.current_state != row.from {
        return Err(GuardRejection::InvalidStateForAction);
    }

    let authorized = match request.action {
        DisbursementAction::Submit | DisbursementAction::Reopen => {
            request.actor.role == Role::Collaborator && request.actor.person == request.owner
        }
        DisbursementAction::Approve | DisbursementAction::Reject => {
            request.actor.role.is_manager()
        }
        DisbursementAction::MarkLiquidated => request.actor.role == Role::Amministrazione,
    };
    if !authorized {
        return Err(GuardRejection::NotAuthorized);
    }

    if row.data == DataRequirement::MandatoryNote
        && request.note.map(str::trim).filter(|n| !n.is_empty()).is_none()
    {
        return Err(GuardRejection::NoteRequired);
    }

    if request.actor.role == Role::ResponsabileCompensi {
        if let Some(community) = request.community {
            if !grants.allows(request.actor.person, community) {
                return Err(GuardRejection::OutOfScope);
            }
        }
    }

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::ALL_ACTIONS;
    use DisbursementAction as A;
    use DisbursementKind as K;
    use DisbursementState as S;

    const ALL_STATES: [S; 5] = [S::Bozza, S::InAttesa, S::Approvato, S::Rifiutato, S::Liquidato];

    fn collaborator() -> Actor {
        Actor::new(PersonId::new(), Role::Collaborator)
    }

    fn responsabile() -> Actor {
        Actor::new(PersonId::new(), Role::ResponsabileCompensi)
    }

    fn amministrazione() -> Actor {
        Actor::new(PersonId::new(), Role::Amministrazione)
    }

    fn request<'a>(
        actor: &'a Actor,
        kind: K,
        state: S,
        action: A,
        note: Option<&'a str>,
        owner: PersonId,
        community: Option<CommunityId>,
    ) -> TransitionRequest<'a> {
        TransitionRequest {
            actor,
            kind,
            current_state: state,
            action,
            note,
            owner,
            community,
        }
    }

    #[test]
    fn reopen_on_expense_is_unknown_action() {
        let actor = collaborator();
        let req = request(
            &actor,
            K::ExpenseReimbursement,
            S::Rifiutato,
            A::Reopen,
            None,
            actor.person,
            None,
        );
        assert_eq!(
            evaluate(&req, &InMemoryGrants::new()),
            Err(GuardRejection::UnknownAction)
        );
    }

    #[test]
    fn wrong_source_state_is_invalid_state_for_action() {
        let actor = amministrazione();
        for state in ALL_STATES {
            if state == S::Approvato {
                continue;
            }
            let req = request(
                &actor,
                K::Compensation,
                state,
                A::MarkLiquidated,
                None,
                PersonId::new(),
                None,
            );
            assert_eq!(
                evaluate(&req, &InMemoryGrants::new()),
                Err(GuardRejection::InvalidStateForAction),
                "mark_liquidated from {state}"
            );
        }
    }

    #[test]
    fn every_undefined_cell_rejects_with_table_reasons() {
        // For all (state, action) not present in the table for a kind, the
        // rejection is "unknown action" or "invalid state for action" —
        // never a role reason, which would leak authorization ordering.
        let actor = amministrazione();
        for kind in [K::Compensation, K::ExpenseReimbursement] {
            for state in ALL_STATES {
                for action in ALL_ACTIONS {
                    let defined = transition_for(kind, action)
                        .is_some_and(|spec| spec.from == state);
                    if defined {
                        continue;
                    }
                    let req = request(&actor, kind, state, action, Some("x"), actor.person, None);
                    let rejection = evaluate(&req, &InMemoryGrants::new()).unwrap_err();
                    assert!(
                        matches!(
                            rejection,
                            GuardRejection::UnknownAction
                                | GuardRejection::InvalidStateForAction
                        ),
                        "{kind} {state} {action} gave {rejection:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn collaborator_cannot_approve_or_reject() {
        let actor = collaborator();
        for action in [A::Approve, A::Reject] {
            let req = request(
                &actor,
                K::Compensation,
                S::InAttesa,
                action,
                Some("reason"),
                actor.person,
                None,
            );
            assert_eq!(
                evaluate(&req, &InMemoryGrants::new()),
                Err(GuardRejection::NotAuthorized)
            );
        }
    }

    #[test]
    fn managers_approve_and_reject_both_kinds() {
        for actor in [responsabile(), amministrazione()] {
            for kind in [K::Compensation, K::ExpenseReimbursement] {
                let req = request(&actor, kind, S::InAttesa, A::Approve, None, PersonId::new(), None);
                assert!(evaluate(&req, &InMemoryGrants::new()).is_ok());
            }
        }
    }

    #[test]
    fn only_amministrazione_marks_liquidated() {
        let req_owner = PersonId::new();
        let resp = responsabile();
        let req = request(&resp, K::Compensation, S::Approvato, A::MarkLiquidated, None, req_owner, None);
        assert_eq!(
            evaluate(&req, &InMemoryGrants::new()),
            Err(GuardRejection::NotAuthorized)
        );

        let admin = amministrazione();
        let req = request(&admin, K::Compensation, S::Approvato, A::MarkLiquidated, None, req_owner, None);
        assert!(evaluate(&req, &InMemoryGrants::new()).is_ok());
    }

    #[test]
    fn reject_without_note_is_note_required() {
        let actor = responsabile();
        for note in [None, Some(""), Some("   "), Some("\t\n")] {
            for kind in [K::Compensation, K::ExpenseReimbursement] {
                let req = request(&actor, kind, S::InAttesa, A::Reject, note, PersonId::new(), None);
                assert_eq!(
                    evaluate(&req, &InMemoryGrants::new()),
                    Err(GuardRejection::NoteRequired),
                    "{kind} note={note:?}"
                );
            }
        }
    }

    #[test]
    fn reject_with_note_passes() {
        let actor = responsabile();
        let req = request(
            &actor,
            K::ExpenseReimbursement,
            S::InAttesa,
            A::Reject,
            Some("Missing receipt"),
            PersonId::new(),
            None,
        );
        assert!(evaluate(&req, &InMemoryGrants::new()).is_ok());
    }

    #[test]
    fn collaborator_reopens_only_their_own_compensation() {
        let actor = collaborator();
        let own = request(
            &actor,
            K::Compensation,
            S::Rifiutato,
            A::Reopen,
            None,
            actor.person,
            None,
        );
        assert!(evaluate(&own, &InMemoryGrants::new()).is_ok());

        let someone_else = PersonId::new();
        let foreign = request(
            &actor,
            K::Compensation,
            S::Rifiutato,
            A::Reopen,
            None,
            someone_else,
            None,
        );
        assert_eq!(
            evaluate(&foreign, &InMemoryGrants::new()),
            Err(GuardRejection::NotAuthorized)
        );
    }

    #[test]
    fn submit_requires_ownership() {
        let actor = collaborator();
        let foreign = request(
            &actor,
            K::ExpenseReimbursement,
            S::Bozza,
            A::Submit,
            None,
            PersonId::new(),
            None,
        );
        assert_eq!(
            evaluate(&foreign, &InMemoryGrants::new()),
            Err(GuardRejection::NotAuthorized)
        );
    }

    #[test]
    fn responsabile_is_scoped_by_community_grants() {
        let actor = responsabile();
        let community = CommunityId::new();
        let mut grants = InMemoryGrants::new();

        let req = request(
            &actor,
            K::Compensation,
            S::InAttesa,
            A::Approve,
            None,
            PersonId::new(),
            Some(community),
        );
        assert_eq!(evaluate(&req, &grants), Err(GuardRejection::OutOfScope));

        grants.grant(actor.person, community);
        assert!(evaluate(&req, &grants).is_ok());
    }

    #[test]
    fn amministrazione_is_unscoped() {
        let actor = amministrazione();
        let req = request(
            &actor,
            K::Compensation,
            S::InAttesa,
            A::Approve,
            None,
            PersonId::new(),
            Some(CommunityId::new()),
        );
        assert!(evaluate(&req, &InMemoryGrants::new()).is_ok());
    }

    #[test]
    fn compensation_without_community_needs_no_grant() {
        let actor = responsabile();
        let req = request(
            &actor,
            K::Compensation,
            S::InAttesa,
            A::Approve,
            None,
            PersonId::new(),
            None,
        );
        assert!(evaluate(&req, &InMemoryGrants::new()).is_ok());
    }

    #[test]
    fn note_check_runs_before_scope_check() {
        // A scoped manager rejecting without a note gets "note required",
        // not "out of scope" — check order is part of the contract.
        let actor = responsabile();
        let req = request(
            &actor,
            K::Compensation,
            S::InAttesa,
            A::Reject,
            None,
            PersonId::new(),
            Some(CommunityId::new()),
        );
        assert_eq!(
            evaluate(&req, &InMemoryGrants::new()),
            Err(GuardRejection::NoteRequired)
        );
    }

    #[test]
    fn rejection_reason_strings_are_stable() {
        assert_eq!(GuardRejection::UnknownAction.to_string(), "unknown action");
        assert_eq!(
            GuardRejection::InvalidStateForAction.to_string(),
            "invalid state for action"
        );
        assert_eq!(GuardRejection::NotAuthorized.to_string(), "not authorized");
        assert_eq!(GuardRejection::NoteRequired.to_string(), "note required");
        assert_eq!(GuardRejection::OutOfScope.to_string(), "out of scope");
    }
}

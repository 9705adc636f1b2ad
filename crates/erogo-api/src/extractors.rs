//! # Request Extractors
//!
//! - [`Validate`] + [`extract_validated_json`]: JSON body extraction where
//!   both deserialization failures and business-rule violations map to 422.
//! - [`ActorClaims`]: the identity claim injected by the upstream identity
//!   provider as trusted headers. The engine performs no authentication of
//!   its own — it receives an already-authorized role claim and re-validates
//!   scope downstream (explicit trusted-service boundary).

use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::Json;
use erogo_core::{Actor, PersonId, Role};
use uuid::Uuid;

use crate::error::AppError;

/// Request-body validation, checked after deserialization.
pub trait Validate {
    /// Validate field contents; the message becomes the 422 body.
    fn validate(&self) -> Result<(), String>;
}

/// Extract and validate a JSON body.
///
/// JSON deserialization failures and validation failures are both 422:
/// the client sent syntactically valid HTTP with semantically invalid
/// content.
pub fn extract_validated_json<T: Validate>(
    body: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let Json(value) =
        body.map_err(|rejection| AppError::Validation(format!("invalid request body: {rejection}")))?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

/// Header carrying the caller's person id.
pub const ACTOR_ID_HEADER: &str = "x-actor-id";
/// Header carrying the caller's role claim.
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";
/// Header carrying the caller's active-status flag.
pub const ACTOR_ACTIVE_HEADER: &str = "x-actor-active";

/// The authenticated caller, extracted from trusted gateway headers.
///
/// Missing or malformed claims are 401; an inactive actor is 403. Role and
/// active-status are trusted unconditionally — the identity provider is the
/// authority, the engine only re-validates scope.
#[derive(Debug, Clone, Copy)]
pub struct ActorClaims(pub Actor);

impl<S> FromRequestParts<S> for ActorClaims
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let person = header_value(parts, ACTOR_ID_HEADER)?
            .ok_or_else(|| AppError::Unauthorized(format!("missing {ACTOR_ID_HEADER} header")))?;
        let person = Uuid::parse_str(person)
            .map(PersonId)
            .map_err(|_| AppError::Unauthorized(format!("malformed {ACTOR_ID_HEADER} header")))?;

        let role = header_value(parts, ACTOR_ROLE_HEADER)?
            .ok_or_else(|| AppError::Unauthorized(format!("missing {ACTOR_ROLE_HEADER} header")))?;
        let role = Role::parse(role)
            .map_err(|_| AppError::Unauthorized(format!("malformed {ACTOR_ROLE_HEADER} header")))?;

        let active = match header_value(parts, ACTOR_ACTIVE_HEADER)? {
            None => true,
            Some("true") => true,
            Some("false") => false,
            Some(_) => {
                return Err(AppError::Unauthorized(format!(
                    "malformed {ACTOR_ACTIVE_HEADER} header"
                )))
            }
        };
        if !active {
            return Err(AppError::Forbidden("actor is not active".to_string()));
        }

        Ok(Self(Actor {
            person,
            role,
            active,
        }))
    }
}

/// Read an optional header as UTF-8, rejecting undecodable values.
fn header_value<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, AppError> {
    match parts.headers.get(name) {
        Some(value) => value
            .to_str()
            .map(Some)
            .map_err(|_| AppError::Unauthorized(format!("malformed {name} header"))),
        None => Ok(None),
    }
}

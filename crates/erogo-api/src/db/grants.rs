//! Community grant lookups.
//!
//! The `community_access_grants` table is owned by the staff registry; the
//! engine consumes it strictly read-only and never migrates or writes it.

use std::collections::HashSet;

use erogo_core::{CommunityId, PersonId};
use sqlx::PgPool;
use uuid::Uuid;

/// The communities `person` holds grants for.
pub async fn communities_for(
    pool: &PgPool,
    person: PersonId,
) -> Result<HashSet<CommunityId>, sqlx::Error> {
    let rows: Vec<(Uuid,)> =
        sqlx::query_as("SELECT community_id FROM community_access_grants WHERE person_id = $1")
            .bind(person.0)
            .fetch_all(pool)
            .await?;

    Ok(rows.into_iter().map(|(id,)| CommunityId(id)).collect())
}

//! # OpenAPI Document
//!
//! OpenAPI 3.1 spec auto-generated from handler annotations via utoipa,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::routes;
use crate::state::AppState;

/// The assembled OpenAPI document for the erogo API.
#[derive(OpenApi)]
#[openapi(
    paths(
        routes::disbursements::create_disbursement,
        routes::disbursements::list_disbursements,
        routes::disbursements::get_disbursement,
        routes::disbursements::get_history,
        routes::disbursements::transition_disbursement,
        routes::bulk::approve_all,
        routes::bulk::mark_paid,
    ),
    components(schemas(
        crate::state::DisbursementRecord,
        routes::disbursements::CreateDisbursementRequest,
        routes::disbursements::TransitionBody,
        routes::disbursements::TransitionResponse,
        routes::disbursements::HistoryEntryResponse,
        routes::bulk::MarkPaidRequest,
        routes::bulk::BulkUpdateResponse,
        routes::bulk::TableSelector,
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "disbursements", description = "Disbursement lifecycle operations"),
        (name = "bulk", description = "Bulk approve and mark-paid operations"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(serve_openapi))
}

/// GET /openapi.json — The OpenAPI document.
async fn serve_openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_includes_all_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.contains("/v1/disbursements")));
        assert!(paths.iter().any(|p| p.contains("approve-all")));
        assert!(paths.iter().any(|p| p.contains("mark-paid")));
    }
}

//! Base API routes.

use actix_web::{HttpResponse, get};

/// API version check endpoint - `GET /v2/`
///
/// Clients probe this endpoint to determine whether the registry speaks
/// the v2 distribution API. Always answers 200 with an empty body.
#[get("/v2")]
pub async fn api_version_check() -> HttpResponse {
    HttpResponse::Ok()
        .insert_header(("Docker-Distribution-API-Version", "registry/2.0"))
        .finish()
}

//! OCI Distribution Specification implementation over filesystem storage.
//!
//! # Endpoints
//!
//! | ID     | Method         | API Endpoint                                                 | Success     | Failure     |
//! | ------ | -------------- | ------------------------------------------------------------ | ----------- | ----------- |
//! | end-1  | `GET`          | `/v2/`                                                       | `200`       | `404`       |
//! | end-2  | `GET` / `HEAD` | `/v2/<name>/blobs/<digest>`                                  | `200`       | `404`       |
//! | end-3  | `GET` / `HEAD` | `/v2/<name>/manifests/<reference>`                           | `200`       | `404`       |
//! | end-4a | `POST`         | `/v2/<name>/blobs/uploads/`                                  | `202`       | `400`       |
//! | end-4b | `POST`         | `/v2/<name>/blobs/uploads/?digest=<digest>`                  | `201`       | `400`       |
//! | end-5  | `PATCH`        | `/v2/<name>/blobs/uploads/<session>`                         | `202`       | `404`/`416` |
//! | end-6  | `PUT`          | `/v2/<name>/blobs/uploads/<session>?digest=<digest>`         | `201`       | `400`/`404` |
//! | end-7  | `PUT`          | `/v2/<name>/manifests/<reference>`                           | `201`       | `400`       |
//! | end-8a | `GET`          | `/v2/<name>/tags/list`                                       | `200`       | `404`       |
//! | end-8b | `GET`          | `/v2/<name>/tags/list?n=<integer>&last=<tag>`                | `200`       | `404`       |
//! | end-9  | `DELETE`       | `/v2/<name>/manifests/<reference>`                           | `202`       | `400`/`404` |
//! | end-10 | `DELETE`       | `/v2/<name>/blobs/<digest>`                                  | `202`       | `404`       |
//! | end-11 | `POST`         | `/v2/<name>/blobs/uploads/?mount=<digest>&from=<other_name>` | `201`/`202` | `400`       |
//! | end-12 | `GET`          | `/v2/<name>/referrers/<digest>`                              | `200`       | `400`       |
//! | end-13 | `GET`          | `/v2/<name>/blobs/uploads/<session>`                         | `204`       | `404`       |
//!
//! Plus `GET /v2/_catalog` for repository discovery.

pub mod error;
pub mod limits;
pub mod names;
pub mod routes;
pub mod storage;

use actix_web::web;
pub use error::*;
pub use limits::*;
pub use names::*;
pub use routes::*;
pub use storage::*;

/// Registers every distribution route. The application is expected to
/// provide [`Storage`] and [`UploadLimits`] as app data and to trim
/// trailing slashes (`NormalizePath`) so `/blobs/uploads/` matches.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Base API version check
        .service(routes::api_version_check)
        // Push operations (upload routes go first so a session path is
        // never read as a blob digest)
        .service(routes::start_blob_upload)
        .service(routes::upload_chunk)
        .service(routes::complete_blob_upload)
        .service(routes::upload_status)
        .service(routes::put_manifest)
        // Pull operations
        .service(routes::get_manifest)
        .service(routes::head_manifest)
        .service(routes::get_blob)
        .service(routes::head_blob)
        // Content discovery
        .service(routes::list_tags)
        .service(routes::list_repositories)
        .service(routes::list_referrers)
        // Content management
        .service(routes::delete_manifest)
        .service(routes::delete_blob);
}

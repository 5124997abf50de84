//! Push operation routes: blob upload flows and manifest push.
//!
//! Three upload flows share one session model. Monolithic: POST opens a
//! session, PUT streams the whole blob and finalizes. Single-POST: a
//! `digest` query on the POST writes and finalizes in one request.
//! Chunked: PATCH appends contiguous chunks, PUT closes with the digest
//! and an optional trailing chunk. A session lives entirely on disk; its
//! id is the only handle.

use actix_web::http::header::CONTENT_RANGE;
use actix_web::{HttpRequest, HttpResponse, Result, get, patch, post, put, web};
use serde::Deserialize;
use uuid::Uuid;

use crate::model::digest::parse_digest;
use crate::registry::{RegistryError, Storage, UploadLimits, names};

#[derive(Deserialize)]
pub struct UploadQuery {
    digest: Option<String>,
    mount: Option<String>,
    from: Option<String>,
}

#[derive(Deserialize)]
pub struct FinalizeQuery {
    digest: Option<String>,
}

/// Start blob upload - `POST /v2/<name>/blobs/uploads/`
///
/// Opens a resumable upload session. With `mount` and `from` parameters,
/// attempts a cross-repository mount instead, falling back to a fresh
/// session when the source blob is missing. With a `digest` parameter the
/// body is the whole blob, written and finalized in this one request.
#[post("/v2/{name:.*}/blobs/uploads")]
pub async fn start_blob_upload(
    path: web::Path<String>,
    query: web::Query<UploadQuery>,
    storage: web::Data<Storage>,
    body: web::Bytes,
) -> Result<HttpResponse, RegistryError> {
    let name = path.into_inner();
    names::ensure_valid_name(&name)?;

    if let (Some(mount), Some(from)) = (query.mount.as_deref(), query.from.as_deref()) {
        if let Ok(digest) = parse_digest(mount)
            && names::validate_repository_name(from).is_ok()
            && storage.mount_blob(from, &name, &digest).await?
        {
            let blob_url = format!("/v2/{name}/blobs/{digest}");
            return Ok(HttpResponse::Created()
                .insert_header(("Location", blob_url))
                .insert_header(("Docker-Content-Digest", digest.to_string()))
                .finish());
        }
        // unmountable: fall through and open a session as usual
    } else if let Some(digest) = query.digest.as_deref() {
        let digest = parse_digest(digest).map_err(|_| RegistryError::DigestInvalid(digest.to_owned()))?;
        storage.put_blob(&name, &digest, &body).await?;

        let blob_url = format!("/v2/{name}/blobs/{digest}");
        return Ok(HttpResponse::Created()
            .insert_header(("Location", blob_url))
            .insert_header(("Docker-Content-Digest", digest.to_string()))
            .finish());
    }

    let session_id = storage.create_upload(&name).await?;
    let upload_url = format!("/v2/{name}/blobs/uploads/{session_id}");

    Ok(HttpResponse::Accepted()
        .insert_header(("Location", upload_url))
        .insert_header(("Docker-Upload-UUID", session_id))
        .insert_header(("Range", "0-0"))
        .finish())
}

/// Upload a chunk - `PATCH /v2/<name>/blobs/uploads/<session>`
///
/// Without `Content-Range` the body starts the session at offset 0. With
/// `Content-Range: <start>-<end>` the chunk must continue the session
/// contiguously; a gap or an already-present range answers 416 and leaves
/// the session untouched.
#[patch("/v2/{name:.*}/blobs/uploads/{session_id}")]
pub async fn upload_chunk(
    path: web::Path<(String, String)>,
    storage: web::Data<Storage>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, RegistryError> {
    let (name, session_id) = path.into_inner();
    names::ensure_valid_name(&name)?;
    ensure_session_id(&session_id)?;

    let new_size = match content_range(&req)? {
        Some((start, _)) => storage.append_chunk(&name, &session_id, start, &body).await?,
        None => storage.reset_upload(&name, &session_id, &body).await?,
    };

    let upload_url = format!("/v2/{name}/blobs/uploads/{session_id}");

    Ok(HttpResponse::Accepted()
        .insert_header(("Location", upload_url))
        .insert_header(("Range", format!("0-{}", new_size.saturating_sub(1))))
        .insert_header(("Docker-Upload-UUID", session_id))
        .finish())
}

/// Complete blob upload - `PUT /v2/<name>/blobs/uploads/<session>?digest=<d>`
///
/// Appends the body as a final chunk when present, verifies the session
/// against the digest, and renames it into the blob store. On a digest
/// mismatch the session survives for another attempt.
#[put("/v2/{name:.*}/blobs/uploads/{session_id}")]
pub async fn complete_blob_upload(
    path: web::Path<(String, String)>,
    query: web::Query<FinalizeQuery>,
    storage: web::Data<Storage>,
    body: web::Bytes,
) -> Result<HttpResponse, RegistryError> {
    let (name, session_id) = path.into_inner();
    names::ensure_valid_name(&name)?;
    ensure_session_id(&session_id)?;

    let digest = query
        .digest
        .as_deref()
        .ok_or_else(|| RegistryError::DigestInvalid("missing digest parameter".to_owned()))?;
    let digest = parse_digest(digest).map_err(|_| RegistryError::DigestInvalid(digest.to_owned()))?;

    if !body.is_empty() {
        storage.append_final_chunk(&name, &session_id, &body).await?;
    }

    storage.finalize_upload(&name, &session_id, &digest).await?;

    let blob_url = format!("/v2/{name}/blobs/{digest}");

    Ok(HttpResponse::Created()
        .insert_header(("Location", blob_url))
        .insert_header(("Docker-Content-Digest", digest.to_string()))
        .finish())
}

/// Upload status - `GET /v2/<name>/blobs/uploads/<session>`
///
/// Reports how much of the session has been received. A session that has
/// no bytes on disk is indistinguishable from one that never existed and
/// answers 404.
#[get("/v2/{name:.*}/blobs/uploads/{session_id}")]
pub async fn upload_status(
    path: web::Path<(String, String)>,
    storage: web::Data<Storage>,
) -> Result<HttpResponse, RegistryError> {
    let (name, session_id) = path.into_inner();
    names::ensure_valid_name(&name)?;
    ensure_session_id(&session_id)?;

    let size = storage
        .upload_size(&name, &session_id)
        .await?
        .ok_or_else(|| RegistryError::BlobUnknown(session_id.clone()))?;

    let upload_url = format!("/v2/{name}/blobs/uploads/{session_id}");

    Ok(HttpResponse::NoContent()
        .insert_header(("Location", upload_url))
        .insert_header(("Range", format!("0-{}", size.saturating_sub(1))))
        .insert_header(("Docker-Upload-UUID", session_id))
        .finish())
}

/// Put manifest - `PUT /v2/<name>/manifests/<reference>`
///
/// Stores the body verbatim under the reference. The body must be
/// well-formed JSON and fit the manifest size cap; pushing to a digest
/// reference additionally requires the body to hash to that digest.
#[put("/v2/{name:.*}/manifests/{reference}")]
pub async fn put_manifest(
    path: web::Path<(String, String)>,
    storage: web::Data<Storage>,
    limits: web::Data<UploadLimits>,
    body: web::Bytes,
) -> Result<HttpResponse, RegistryError> {
    let (name, reference) = path.into_inner();
    names::ensure_valid_name(&name)?;

    if body.len() > limits.max_manifest_size {
        return Err(RegistryError::ManifestInvalid("manifest too large".to_owned()));
    }

    // stored verbatim, but must at least parse as JSON
    if serde_json::from_slice::<serde_json::Value>(&body).is_err() {
        return Err(RegistryError::ManifestInvalid(reference));
    }

    match parse_digest(&reference) {
        Ok(expected) if !expected.verify(&body) => {
            return Err(RegistryError::DigestInvalid(reference));
        }
        Ok(_) => {}
        Err(_) if !names::validate_reference(&reference) => {
            return Err(RegistryError::ManifestInvalid(reference));
        }
        Err(_) => {}
    }

    let digest = storage.write_manifest(&name, &reference, &body).await?;

    let manifest_url = format!("/v2/{name}/manifests/{digest}");

    Ok(HttpResponse::Created()
        .insert_header(("Location", manifest_url))
        .insert_header(("Docker-Content-Digest", digest.to_string()))
        .finish())
}

/// Session ids are opaque to clients but must be UUIDs on disk, which
/// also keeps traversal sequences out of session paths.
fn ensure_session_id(session_id: &str) -> Result<(), RegistryError> {
    match Uuid::parse_str(session_id) {
        Ok(_) => Ok(()),
        Err(_) => Err(RegistryError::BlobUnknown(session_id.to_owned())),
    }
}

/// Parses an optional `Content-Range` header. The registry grammar is
/// `<start>-<end>`; the HTTP `bytes ` prefix and `/<total>` suffix are
/// tolerated.
fn content_range(req: &HttpRequest) -> Result<Option<(u64, u64)>, RegistryError> {
    let Some(value) = req.headers().get(CONTENT_RANGE) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| RegistryError::RangeNotSatisfiable)?;

    match parse_content_range(value) {
        Some(range) => Ok(Some(range)),
        None => Err(RegistryError::RangeNotSatisfiable),
    }
}

fn parse_content_range(value: &str) -> Option<(u64, u64)> {
    let value = value.trim();
    let value = value.strip_prefix("bytes ").unwrap_or(value);
    let value = match value.split_once('/') {
        Some((range, _total)) => range,
        None => value,
    };

    let (start, end) = value.split_once('-')?;
    let start = start.trim().parse().ok()?;
    let end = end.trim().parse().ok()?;

    (end >= start).then_some((start, end))
}

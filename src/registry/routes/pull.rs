//! Pull operation routes: blob and manifest retrieval.

use actix_web::http::header::{self, Header};
use actix_web::{HttpRequest, HttpResponse, Result, get, head, web};

use crate::model::digest::{Digest, parse_digest};
use crate::model::media_types;
use crate::registry::{RegistryError, Storage, names};

/// Get manifest - `GET /v2/<name>/manifests/<reference>`
///
/// Retrieve the manifest identified by name and reference, where reference
/// is a tag or a digest. Tag lookups read the tag's file directly; digest
/// lookups scan the repository's tags.
#[get("/v2/{name:.*}/manifests/{reference}")]
pub async fn get_manifest(
    path: web::Path<(String, String)>,
    storage: web::Data<Storage>,
) -> Result<HttpResponse, RegistryError> {
    let (name, reference) = path.into_inner();
    names::ensure_valid_name(&name)?;

    let (data, digest) = resolve_manifest(&storage, &name, &reference).await?;

    Ok(HttpResponse::Ok()
        .insert_header(("Content-Type", media_types::IMAGE_MANIFEST))
        .insert_header(("Docker-Content-Digest", digest.to_string()))
        .insert_header(("Content-Length", data.len().to_string()))
        .body(data))
}

/// Check manifest exists - `HEAD /v2/<name>/manifests/<reference>`
#[head("/v2/{name:.*}/manifests/{reference}")]
pub async fn head_manifest(
    path: web::Path<(String, String)>,
    storage: web::Data<Storage>,
) -> Result<HttpResponse, RegistryError> {
    let (name, reference) = path.into_inner();
    names::ensure_valid_name(&name)?;

    let (data, digest) = resolve_manifest(&storage, &name, &reference).await?;

    Ok(HttpResponse::Ok()
        .insert_header(("Content-Type", media_types::IMAGE_MANIFEST))
        .insert_header(("Docker-Content-Digest", digest.to_string()))
        .insert_header(("Content-Length", data.len().to_string()))
        .finish())
}

/// Get blob - `GET /v2/<name>/blobs/<digest>`
///
/// Retrieve blob content by digest. Single byte ranges are honored with a
/// 206 partial response; multipart ranges are not supported.
#[get("/v2/{name:.*}/blobs/{digest}")]
pub async fn get_blob(
    path: web::Path<(String, String)>,
    req: HttpRequest,
    storage: web::Data<Storage>,
) -> Result<HttpResponse, RegistryError> {
    let (name, digest) = path.into_inner();
    names::ensure_valid_name(&name)?;
    let digest = parse_digest(&digest).map_err(|_| RegistryError::BlobUnknown(digest))?;

    let data = storage.read_blob(&name, &digest).await?;

    if req.headers().contains_key(header::RANGE) {
        let byte_specs = match header::Range::parse(&req) {
            Ok(header::Range::Bytes(byte_specs)) if byte_specs.len() == 1 => byte_specs,
            _ => return Err(RegistryError::RangeNotSatisfiable),
        };

        let total_len = data.len() as u64;
        let Some((start, end)) = byte_specs[0].to_satisfiable_range(total_len) else {
            return Err(RegistryError::RangeNotSatisfiable);
        };

        // ranges are zero-indexed and inclusive
        let partial = data[start as usize..=end as usize].to_vec();

        return Ok(HttpResponse::PartialContent()
            .insert_header(("Content-Type", media_types::OCTET_STREAM))
            .insert_header(("Content-Length", partial.len().to_string()))
            .insert_header(("Content-Range", format!("bytes {start}-{end}/{total_len}")))
            .insert_header(("Docker-Content-Digest", digest.to_string()))
            .body(partial));
    }

    Ok(HttpResponse::Ok()
        .insert_header(("Content-Type", media_types::OCTET_STREAM))
        .insert_header(("Content-Length", data.len().to_string()))
        .insert_header(("Docker-Content-Digest", digest.to_string()))
        .body(data))
}

/// Check blob exists - `HEAD /v2/<name>/blobs/<digest>`
///
/// Headers only; the blob's size comes from file metadata so the content
/// is never read.
#[head("/v2/{name:.*}/blobs/{digest}")]
pub async fn head_blob(
    path: web::Path<(String, String)>,
    storage: web::Data<Storage>,
) -> Result<HttpResponse, RegistryError> {
    let (name, digest) = path.into_inner();
    names::ensure_valid_name(&name)?;
    let digest = parse_digest(&digest).map_err(|_| RegistryError::BlobUnknown(digest))?;

    let len = storage.blob_len(&name, &digest).await?;

    Ok(HttpResponse::Ok()
        .insert_header(("Content-Type", media_types::OCTET_STREAM))
        .insert_header(("Content-Length", len.to_string()))
        .insert_header(("Docker-Content-Digest", digest.to_string()))
        .finish())
}

/// Resolves a manifest reference to its bytes and digest. A syntactically
/// invalid reference is rejected before any I/O.
async fn resolve_manifest(
    storage: &Storage,
    name: &str,
    reference: &str,
) -> Result<(Vec<u8>, Digest), RegistryError> {
    if let Ok(digest) = parse_digest(reference) {
        log::debug!("resolving manifest in {name} by digest scan: {digest}");
        match storage.find_manifest_by_digest(name, &digest).await? {
            Some(data) => Ok((data, digest)),
            None => Err(RegistryError::ManifestUnknown(reference.to_owned())),
        }
    } else if names::validate_reference(reference) {
        let data = storage.read_manifest(name, reference).await?;
        let digest = Digest::of_bytes(&data);
        Ok((data, digest))
    } else {
        Err(RegistryError::ManifestInvalid(reference.to_owned()))
    }
}

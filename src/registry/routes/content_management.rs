//! Content management routes: blob and manifest deletion.

use actix_web::{HttpResponse, Result, delete, web};

use crate::model::digest::parse_digest;
use crate::registry::{RegistryError, Storage, names};

/// Delete manifest - `DELETE /v2/<name>/manifests/<reference>`
///
/// Deleting by tag removes that tag directory only. Deleting by digest
/// removes the first tag whose manifest matches; other tags pointing at
/// identical content keep their own copies.
#[delete("/v2/{name:.*}/manifests/{reference}")]
pub async fn delete_manifest(
    path: web::Path<(String, String)>,
    storage: web::Data<Storage>,
) -> Result<HttpResponse, RegistryError> {
    let (name, reference) = path.into_inner();
    names::ensure_valid_name(&name)?;

    if let Ok(digest) = parse_digest(&reference) {
        storage.delete_manifest_by_digest(&name, &digest).await?;
    } else if names::validate_reference(&reference) {
        storage.delete_manifest_by_ref(&name, &reference).await?;
    } else {
        return Err(RegistryError::ManifestInvalid(reference));
    }

    Ok(HttpResponse::Accepted().finish())
}

/// Delete blob - `DELETE /v2/<name>/blobs/<digest>`
#[delete("/v2/{name:.*}/blobs/{digest}")]
pub async fn delete_blob(
    path: web::Path<(String, String)>,
    storage: web::Data<Storage>,
) -> Result<HttpResponse, RegistryError> {
    let (name, digest) = path.into_inner();
    names::ensure_valid_name(&name)?;
    let digest = parse_digest(&digest).map_err(|_| RegistryError::BlobUnknown(digest))?;

    storage.delete_blob(&name, &digest).await?;

    Ok(HttpResponse::Accepted().finish())
}

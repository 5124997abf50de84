//! Content discovery routes: tag listing, repository catalog, referrers.

use actix_web::{HttpResponse, Result, get, web};
use serde::{Deserialize, Serialize};

use crate::model::digest::parse_digest;
use crate::model::index::ImageIndex;
use crate::model::media_types;
use crate::registry::{RegistryError, Storage, names};

#[derive(Deserialize)]
pub struct ListTagsQuery {
    /// number of entries to return
    n: Option<u32>,
    /// last tag value for pagination
    last: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct TagsResponse {
    pub name: String,
    pub tags: Vec<String>,
}

/// List tags - `GET /v2/<name>/tags/list`
///
/// Fetch the tags under the repository, lexicographically sorted. `last`
/// resumes after the given tag, `n` caps the page size.
#[get("/v2/{name:.*}/tags/list")]
pub async fn list_tags(
    path: web::Path<String>,
    query: web::Query<ListTagsQuery>,
    storage: web::Data<Storage>,
) -> Result<HttpResponse, RegistryError> {
    let name = path.into_inner();
    names::ensure_valid_name(&name)?;

    let mut tags = storage.list_tags(&name).await?;
    paginate(&mut tags, query.last.as_ref(), query.n);

    let response = TagsResponse { name, tags };

    Ok(HttpResponse::Ok().json(response))
}

#[derive(Deserialize)]
pub struct CatalogQuery {
    /// number of entries to return
    n: Option<u32>,
    /// last repository name for pagination
    last: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct CatalogResponse {
    pub repositories: Vec<String>,
}

/// List repositories - `GET /v2/_catalog`
#[get("/v2/_catalog")]
pub async fn list_repositories(
    query: web::Query<CatalogQuery>,
    storage: web::Data<Storage>,
) -> Result<HttpResponse, RegistryError> {
    let mut repositories = storage.list_repositories().await?;
    paginate(&mut repositories, query.last.as_ref(), query.n);

    let response = CatalogResponse { repositories };

    Ok(HttpResponse::Ok().json(response))
}

#[derive(Deserialize)]
pub struct ReferrersQuery {
    #[serde(rename = "artifactType")]
    artifact_type: Option<String>,
}

/// List referrers - `GET /v2/<name>/referrers/<digest>`
///
/// No referrer index is maintained, so every subject has an empty
/// referrers list; the response is a valid, empty image index rather than
/// a 404. The `artifactType` filter is accepted and trivially satisfied.
#[get("/v2/{name:.*}/referrers/{digest}")]
pub async fn list_referrers(
    path: web::Path<(String, String)>,
    query: web::Query<ReferrersQuery>,
) -> Result<HttpResponse, RegistryError> {
    let (name, digest) = path.into_inner();
    names::ensure_valid_name(&name)?;
    parse_digest(&digest).map_err(|_| RegistryError::DigestInvalid(digest))?;

    if let Some(filter) = &query.artifact_type {
        log::debug!("referrers artifactType filter {filter:?} against empty index");
    }

    let body = serde_json::to_string(&ImageIndex::empty()).map_err(|e| RegistryError::Internal(e.to_string()))?;

    Ok(HttpResponse::Ok()
        .insert_header(("Content-Type", media_types::IMAGE_INDEX))
        .body(body))
}

/// Applies `last`/`n` pagination to a sorted listing. `last` drops
/// everything up to and including the matching entry; `n` truncates, and
/// truncation clamps so an over-large `n` returns the whole remainder.
pub fn paginate<T: PartialEq>(items: &mut Vec<T>, last: Option<&T>, n: Option<u32>) {
    if let Some(last) = last {
        if let Some(pos) = items.iter().position(|item| item == last) {
            items.drain(..=pos);
        }
    }

    if let Some(n) = n {
        items.truncate(n as usize);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags() -> Vec<String> {
        ["a", "b", "c", "d"].map(String::from).to_vec()
    }

    #[test]
    fn paginate_last_and_n() {
        let mut items = tags();
        paginate(&mut items, Some(&"a".to_string()), Some(2));
        assert_eq!(items, ["b", "c"]);
    }

    #[test]
    fn paginate_n_clamps_to_length() {
        let mut items = tags();
        paginate(&mut items, None, Some(100));
        assert_eq!(items, ["a", "b", "c", "d"]);
    }

    #[test]
    fn paginate_unknown_last_keeps_everything() {
        let mut items = tags();
        paginate(&mut items, Some(&"zzz".to_string()), None);
        assert_eq!(items, ["a", "b", "c", "d"]);
    }

    #[test]
    fn paginate_last_at_end_yields_empty() {
        let mut items = tags();
        paginate(&mut items, Some(&"d".to_string()), Some(2));
        assert!(items.is_empty());
    }
}

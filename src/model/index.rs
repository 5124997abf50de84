//! Minimal `application/vnd.oci.image.index.v1+json` document, as returned
//! by the referrers endpoint.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::digest::Digest;
use crate::model::media_types;

/// A descriptor for one manifest listed in an index.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ManifestDescriptor {
    /// Media type of the referenced manifest.
    #[serde(rename = "mediaType")]
    pub media_type: String,

    /// Digest of the referenced manifest.
    pub digest: Digest,

    /// Size of the referenced manifest in bytes.
    pub size: u64,

    /// Artifact type, surfaced by referrers listings.
    #[serde(rename = "artifactType", skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

/// An image index: a list of manifest descriptors. The referrers endpoint
/// answers with an index whose `manifests` array may be empty.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ImageIndex {
    /// Must be `2` for this version of the image specification.
    #[serde(rename = "schemaVersion")]
    pub schema_version: u8,

    #[serde(rename = "mediaType", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,

    pub manifests: Vec<ManifestDescriptor>,
}

impl ImageIndex {
    /// Creates an index listing the given manifests.
    pub fn new(manifests: Vec<ManifestDescriptor>) -> Self {
        Self {
            schema_version: 2,
            media_type: Some(media_types::IMAGE_INDEX.to_string()),
            manifests,
        }
    }

    /// Creates an index with no manifests.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

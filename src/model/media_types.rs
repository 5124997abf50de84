//! OCI media types served by the registry.

/// Image Index media type, also the referrers response document type
pub const IMAGE_INDEX: &str = "application/vnd.oci.image.index.v1+json";

/// Image Manifest media type
pub const IMAGE_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";

/// Media type for raw blob content
pub const OCTET_STREAM: &str = "application/octet-stream";

//! Error types for the registry HTTP surface.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while serving a registry request. Every variant
/// maps to one status code and one OCI error code; unexpected I/O failures
/// collapse into [`RegistryError::Internal`].
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("invalid repository name: {0}")]
    NameInvalid(String),

    #[error("repository not known to registry: {0}")]
    NameUnknown(String),

    #[error("blob unknown to registry: {0}")]
    BlobUnknown(String),

    #[error("manifest invalid: {0}")]
    ManifestInvalid(String),

    #[error("manifest unknown to registry: {0}")]
    ManifestUnknown(String),

    #[error("digest invalid: {0}")]
    DigestInvalid(String),

    #[error("requested range not satisfiable")]
    RangeNotSatisfiable,

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

impl From<std::io::Error> for RegistryError {
    fn from(err: std::io::Error) -> Self {
        RegistryError::Internal(err.to_string())
    }
}

/// Standard registry error response format
#[derive(Deserialize, Serialize)]
pub struct ErrorResponse {
    pub errors: Vec<ErrorDetail>,
}

/// Individual error detail in a registry error response
#[derive(Deserialize, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    pub detail: String,
}

impl RegistryError {
    fn code(&self) -> &'static str {
        match self {
            RegistryError::NameInvalid(_) => "NAME_INVALID",
            RegistryError::NameUnknown(_) => "NAME_UNKNOWN",
            RegistryError::BlobUnknown(_) => "BLOB_UNKNOWN",
            RegistryError::ManifestInvalid(_) => "MANIFEST_INVALID",
            RegistryError::ManifestUnknown(_) => "MANIFEST_UNKNOWN",
            RegistryError::DigestInvalid(_) => "DIGEST_INVALID",
            RegistryError::RangeNotSatisfiable => "RANGE_INVALID",
            RegistryError::Internal(_) => "UNKNOWN",
        }
    }
}

impl ResponseError for RegistryError {
    fn status_code(&self) -> StatusCode {
        match self {
            RegistryError::NameInvalid(_) => StatusCode::BAD_REQUEST,
            RegistryError::NameUnknown(_) => StatusCode::NOT_FOUND,
            RegistryError::BlobUnknown(_) => StatusCode::NOT_FOUND,
            RegistryError::ManifestInvalid(_) => StatusCode::BAD_REQUEST,
            RegistryError::ManifestUnknown(_) => StatusCode::NOT_FOUND,
            RegistryError::DigestInvalid(_) => StatusCode::BAD_REQUEST,
            RegistryError::RangeNotSatisfiable => StatusCode::RANGE_NOT_SATISFIABLE,
            RegistryError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Internal detail is logged, never returned to the client.
        let message = match self {
            RegistryError::Internal(detail) => {
                log::error!("internal error while serving request: {detail}");
                "unexpected error encountered".to_string()
            }
            other => other.to_string(),
        };

        let error_response = ErrorResponse {
            errors: vec![ErrorDetail {
                code: self.code().to_string(),
                message,
                detail: "{}".to_string(),
            }],
        };

        HttpResponse::build(self.status_code()).json(error_response)
    }
}

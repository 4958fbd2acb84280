//! Error kinds surfaced at the resolver and publish boundaries.

use thiserror::Error;

use crate::artifact::{ArtifactError, KeyError};
use crate::cursor::CursorError;
use crate::download::DownloadError;
use crate::workflow::WorkflowError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    MalformedRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Payload of {size} bytes exceeds the limit of {limit} bytes")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error("{0}")]
    UpstreamTimeout(String),

    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    /// HTTP status for this error kind.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::MalformedRequest(_) => 400,
            ServiceError::Unauthorized(_) => 401,
            ServiceError::NotFound(_) => 404,
            ServiceError::PayloadTooLarge { .. } => 413,
            ServiceError::UpstreamTimeout(_) => 504,
            ServiceError::Internal(_) => 500,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<WorkflowError> for ServiceError {
    fn from(e: WorkflowError) -> Self {
        match e {
            WorkflowError::NotFound(_) => {
                ServiceError::Unauthorized("Workflow ticket not found, not authorized".to_string())
            }
            WorkflowError::OrderingOutOfRange(_) => ServiceError::MalformedRequest(e.to_string()),
            WorkflowError::Database(msg) => ServiceError::Internal(msg),
        }
    }
}

impl From<ArtifactError> for ServiceError {
    fn from(e: ArtifactError) -> Self {
        match e {
            ArtifactError::UploadNotFound(_) => ServiceError::NotFound(e.to_string()),
            ArtifactError::InvalidPart(_) | ArtifactError::EmptyUpload(_) => {
                ServiceError::MalformedRequest(e.to_string())
            }
            ArtifactError::Database(msg) => ServiceError::Internal(msg),
        }
    }
}

impl From<CursorError> for ServiceError {
    fn from(e: CursorError) -> Self {
        match e {
            CursorError::OrderingOutOfRange(_) => ServiceError::MalformedRequest(e.to_string()),
            CursorError::Database(msg) => ServiceError::Internal(msg),
        }
    }
}

impl From<DownloadError> for ServiceError {
    fn from(e: DownloadError) -> Self {
        ServiceError::Internal(e.to_string())
    }
}

impl From<KeyError> for ServiceError {
    fn from(e: KeyError) -> Self {
        ServiceError::MalformedRequest(e.to_string())
    }
}

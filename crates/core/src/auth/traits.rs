use async_trait::async_trait;
use thiserror::Error;

use super::types::{AuthRequest, Identity};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Maintenance secret required")]
    NotAuthenticated,

    #[error("Invalid maintenance secret")]
    InvalidSecret,

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

/// Gatekeeper for maintenance endpoints.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError>;

    /// Name of this authentication method
    fn method_name(&self) -> &'static str;
}

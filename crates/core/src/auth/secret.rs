//! Shared-secret authentication for maintenance endpoints.

use async_trait::async_trait;

use super::{AuthError, AuthRequest, Authenticator, Identity};

/// Header carrying the maintenance secret.
pub const SECRET_HEADER: &str = "x-maintenance-secret";

/// Accepts the secret in either:
/// - `x-maintenance-secret: <secret>` header
/// - `Authorization: Bearer <secret>` header
pub struct SecretAuthenticator {
    expected: String,
}

impl SecretAuthenticator {
    pub fn new(secret: String) -> Self {
        Self { expected: secret }
    }

    fn extract(request: &AuthRequest) -> Option<&str> {
        if let Some(secret) = request.header(SECRET_HEADER) {
            return Some(secret);
        }
        let auth = request.header("authorization")?;
        auth.strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
    }
}

#[async_trait]
impl Authenticator for SecretAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let provided = Self::extract(request).ok_or(AuthError::NotAuthenticated)?;

        if constant_time_eq(provided.as_bytes(), self.expected.as_bytes()) {
            Ok(Identity::operator())
        } else {
            Err(AuthError::InvalidSecret)
        }
    }

    fn method_name(&self) -> &'static str {
        "secret"
    }
}

/// Constant-time byte comparison.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

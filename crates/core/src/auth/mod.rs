mod none;
mod secret;
mod traits;
mod types;

pub use none::*;
pub use secret::*;
pub use traits::*;
pub use types::*;

use crate::config::AuthConfig;

/// Factory function to create authenticator from config
pub fn create_authenticator(config: &AuthConfig) -> Result<Box<dyn Authenticator>, AuthError> {
    use crate::config::AuthMethod;

    match config.method {
        AuthMethod::None => Ok(Box::new(NoneAuthenticator::new())),
        AuthMethod::Secret => {
            let secret = config
                .secret
                .clone()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    AuthError::ConfigurationError(
                        "secret must be set when using the secret auth method".to_string(),
                    )
                })?;
            Ok(Box::new(SecretAuthenticator::new(secret)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthMethod;

    #[test]
    fn test_create_authenticator_none() {
        let config = AuthConfig {
            method: AuthMethod::None,
            secret: None,
        };
        assert_eq!(create_authenticator(&config).unwrap().method_name(), "none");
    }

    #[test]
    fn test_create_authenticator_secret() {
        let config = AuthConfig {
            method: AuthMethod::Secret,
            secret: Some("s3cret".to_string()),
        };
        assert_eq!(
            create_authenticator(&config).unwrap().method_name(),
            "secret"
        );
    }

    #[test]
    fn test_create_authenticator_secret_missing() {
        let config = AuthConfig {
            method: AuthMethod::Secret,
            secret: None,
        };
        let result = create_authenticator(&config);
        assert!(matches!(result, Err(AuthError::ConfigurationError(_))));
    }
}

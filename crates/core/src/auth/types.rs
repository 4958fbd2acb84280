use serde::Serialize;
use std::collections::HashMap;

/// Request headers relevant to authentication, lower-cased names.
#[derive(Debug, Clone, Default)]
pub struct AuthRequest {
    pub headers: HashMap<String, String>,
}

impl AuthRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Caller admitted to a maintenance endpoint.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
    pub method: String,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            subject: "anonymous".to_string(),
            method: "none".to_string(),
        }
    }

    pub fn operator() -> Self {
        Self {
            subject: "operator".to_string(),
            method: "secret".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup() {
        let mut request = AuthRequest::default();
        request
            .headers
            .insert("x-maintenance-secret".to_string(), "abc".to_string());
        assert_eq!(request.header("x-maintenance-secret"), Some("abc"));
        assert_eq!(request.header("authorization"), None);
    }

    #[test]
    fn test_identity_serialization() {
        let json = serde_json::to_value(Identity::operator()).unwrap();
        assert_eq!(json["subject"], "operator");
        assert_eq!(json["method"], "secret");
    }
}

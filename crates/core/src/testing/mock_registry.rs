//! Mock package registry for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::registry::{PackageManifest, PackageRegistry, RegistryError};

/// Mock implementation of the PackageRegistry trait.
///
/// Provides controllable behavior for testing:
/// - Return configurable manifests
/// - Track lookups for assertions
/// - Simulate failures and slow responses
#[derive(Debug)]
pub struct MockRegistry {
    manifests: Arc<RwLock<HashMap<String, PackageManifest>>>,
    lookups: Arc<RwLock<Vec<String>>>,
    /// If set, the next lookup will fail with this error.
    next_error: Arc<RwLock<Option<RegistryError>>>,
    delay: Arc<RwLock<Option<Duration>>>,
}

impl Default for MockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRegistry {
    pub fn new() -> Self {
        Self {
            manifests: Arc::new(RwLock::new(HashMap::new())),
            lookups: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(None)),
        }
    }

    /// Register a package whose manifest declares `repository_url`.
    pub async fn add_package(&self, name: &str, repository_url: &str) {
        self.manifests.write().await.insert(
            name.to_string(),
            PackageManifest {
                name: name.to_string(),
                repository_url: Some(repository_url.to_string()),
            },
        );
    }

    pub async fn add_manifest(&self, manifest: PackageManifest) {
        self.manifests
            .write()
            .await
            .insert(manifest.name.clone(), manifest);
    }

    pub async fn set_next_error(&self, error: RegistryError) {
        *self.next_error.write().await = Some(error);
    }

    /// Delay every lookup, e.g. to exceed a caller's timeout.
    pub async fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write().await = delay;
    }

    /// Package names looked up so far.
    pub async fn lookups(&self) -> Vec<String> {
        self.lookups.read().await.clone()
    }
}

#[async_trait]
impl PackageRegistry for MockRegistry {
    async fn get_manifest(&self, package_name: &str) -> Result<PackageManifest, RegistryError> {
        self.lookups.write().await.push(package_name.to_string());

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        self.manifests
            .read()
            .await
            .get(package_name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(package_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_and_record() {
        let registry = MockRegistry::new();
        registry
            .add_package("tinybench", "git+https://github.com/tinylibs/tinybench.git")
            .await;

        let manifest = registry.get_manifest("tinybench").await.unwrap();
        assert_eq!(manifest.name, "tinybench");
        assert!(matches!(
            registry.get_manifest("missing").await,
            Err(RegistryError::NotFound(_))
        ));
        assert_eq!(registry.lookups().await, vec!["tinybench", "missing"]);
    }

    #[tokio::test]
    async fn test_next_error_is_consumed() {
        let registry = MockRegistry::new();
        registry.add_package("a", "https://github.com/o/a").await;
        registry
            .set_next_error(RegistryError::ParseError("boom".to_string()))
            .await;

        assert!(registry.get_manifest("a").await.is_err());
        assert!(registry.get_manifest("a").await.is_ok());
    }
}

//! npm registry HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{PackageManifest, PackageRegistry, RegistryError, RepositoryField};
use crate::config::RegistryConfig;

pub struct NpmRegistryClient {
    client: Client,
    base_url: String,
}

impl NpmRegistryClient {
    pub fn new(config: &RegistryConfig) -> Result<Self, RegistryError> {
        let client = Client::builder()
            .user_agent(concat!("prpkg/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    /// Scoped names keep their `@` but escape the slash.
    fn manifest_url(&self, package_name: &str) -> String {
        let encoded = match package_name.strip_prefix('@') {
            Some(scoped) => format!("@{}", urlencoding::encode(scoped)),
            None => urlencoding::encode(package_name).into_owned(),
        };
        format!("{}/{}", self.base_url, encoded)
    }
}

#[derive(Debug, Deserialize)]
struct NpmManifest {
    name: Option<String>,
    repository: Option<RepositoryField>,
}

#[async_trait]
impl PackageRegistry for NpmRegistryClient {
    async fn get_manifest(&self, package_name: &str) -> Result<PackageManifest, RegistryError> {
        let url = self.manifest_url(package_name);
        debug!("npm manifest lookup: {}", url);

        let response = self
            .client
            .get(&url)
            .header("accept", "application/vnd.npm.install-v1+json; q=0.5, application/json")
            .send()
            .await?;

        let status = response.status();
        if status == 404 {
            return Err(RegistryError::NotFound(package_name.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let manifest: NpmManifest = response
            .json()
            .await
            .map_err(|e| RegistryError::ParseError(e.to_string()))?;

        Ok(PackageManifest {
            name: manifest.name.unwrap_or_else(|| package_name.to_string()),
            repository_url: manifest.repository.and_then(RepositoryField::into_url),
        })
    }
}

//! Common test utilities for end-to-end testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock collaborators injected, so the full HTTP surface can be
//! exercised without network access.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use prpkg_core::artifact::sha256_hex;
use prpkg_core::testing::{MockNotifier, MockRegistry};
use prpkg_core::{
    create_authenticator, create_background_system, load_config_from_str, AllowList,
    ArtifactStore, AuthMethod, CursorStore, DownloadIndex, RetentionManager, SqliteArtifactStore,
    SqliteCursorStore, SqliteDownloadIndex, SqliteWorkflowRegistry, WorkflowRegistry,
};
use prpkg_server::{create_router, AppState, Collaborators, Stores};

/// Re-export fixtures for test convenience
pub use prpkg_core::testing::fixtures;

/// Secret used when a fixture gates maintenance endpoints.
pub const MAINTENANCE_SECRET: &str = "test-secret";

const BOUNDARY: &str = "prpkg-test-boundary";

/// Test fixture for end-to-end testing with mock collaborators.
///
/// Provides an in-process server with controllable mocks for:
/// - npm registry lookups (MockRegistry)
/// - check runs and pull request comments (MockNotifier)
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_publish() {
///     let fixture = TestFixture::new().await;
///     let key = fixture.register_workflow("acme", "widgets", &commit, "main", 1).await;
///     let response = fixture.publish(&key, &[("widgets", tarball)]).await;
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    pub registry: Arc<MockRegistry>,
    pub notifier: Arc<MockNotifier>,
    pub workflows: Arc<dyn WorkflowRegistry>,
    pub cursors: Arc<dyn CursorStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub downloads: Arc<dyn DownloadIndex>,
    pub config: TestConfig,
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: Bytes,
    /// JSON body, `Null` when empty or not JSON.
    pub body: Value,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Entity tag without its quotes.
    pub fn etag(&self) -> Option<&str> {
        self.header("etag").map(|v| v.trim_matches('"'))
    }
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub max_payload_bytes: u64,
    /// `owner/repo` entries exempt from the payload ceiling.
    pub whitelist: Vec<String>,
    /// Gate `/retain` and `/workflow` with [`MAINTENANCE_SECRET`].
    pub require_secret: bool,
    pub public_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: 1024 * 1024,
            whitelist: Vec::new(),
            require_secret: false,
            public_url: String::new(),
        }
    }
}

impl TestConfig {
    pub fn with_secret() -> Self {
        Self {
            require_secret: true,
            ..Default::default()
        }
    }

    pub fn with_ceiling(max_payload_bytes: u64, whitelist: &[&str]) -> Self {
        Self {
            max_payload_bytes,
            whitelist: whitelist.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let auth_section = if test_config.require_secret {
            format!("[auth]\nmethod = \"secret\"\nsecret = \"{MAINTENANCE_SECRET}\"\n")
        } else {
            "[auth]\nmethod = \"none\"\n".to_string()
        };
        let mut config = load_config_from_str(&auth_section).expect("Failed to parse config");
        config.database.path = db_path.clone();
        config.publish.max_payload_bytes = test_config.max_payload_bytes;
        config.publish.public_url = test_config.public_url.clone();
        config.publish.notify_timeout_secs = 1;
        config.registry.timeout_secs = 1;
        assert_eq!(
            config.auth.method == AuthMethod::Secret,
            test_config.require_secret
        );

        let authenticator = Arc::from(
            create_authenticator(&config.auth).expect("Failed to create authenticator"),
        );

        let workflows: Arc<dyn WorkflowRegistry> =
            Arc::new(SqliteWorkflowRegistry::new(&db_path).expect("workflow registry"));
        let cursors: Arc<dyn CursorStore> =
            Arc::new(SqliteCursorStore::new(&db_path).expect("cursor store"));
        let artifacts: Arc<dyn ArtifactStore> =
            Arc::new(SqliteArtifactStore::new(&db_path).expect("artifact store"));
        let downloads: Arc<dyn DownloadIndex> =
            Arc::new(SqliteDownloadIndex::new(&db_path).expect("download index"));

        let registry = Arc::new(MockRegistry::new());
        let notifier = Arc::new(MockNotifier::new());
        let whitelist = Arc::new(AllowList::parse(&test_config.whitelist.join("\n")));

        let retention = Arc::new(RetentionManager::new(
            Arc::clone(&artifacts),
            Arc::clone(&downloads),
            &config.retention,
        ));
        let (background, worker) =
            create_background_system(Arc::clone(&downloads), Arc::clone(&retention), 100);
        tokio::spawn(worker.run());

        let state = Arc::new(AppState::new(
            config,
            authenticator,
            Stores {
                workflows: Arc::clone(&workflows),
                cursors: Arc::clone(&cursors),
                artifacts: Arc::clone(&artifacts),
                downloads: Arc::clone(&downloads),
            },
            Collaborators {
                registry: Arc::clone(&registry) as _,
                notifier: Some(Arc::clone(&notifier) as _),
                whitelist,
            },
            retention,
            background,
        ));

        let router = create_router(state);

        Self {
            router,
            registry,
            notifier,
            workflows,
            cursors,
            artifacts,
            downloads,
            config: test_config,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Method::GET, path, &[], Body::empty()).await
    }

    /// Send a HEAD request to the test server.
    pub async fn head(&self, path: &str) -> TestResponse {
        self.send(Method::HEAD, path, &[], Body::empty()).await
    }

    /// GET `path`, following one redirect if the server issues one.
    pub async fn get_following(&self, path: &str) -> TestResponse {
        let response = self.get(path).await;
        if response.status != StatusCode::FOUND {
            return response;
        }
        let location = response
            .header("location")
            .expect("redirect without location")
            .to_string();
        self.get(&location).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.post_with_headers(path, &[], body).await
    }

    /// Send a POST request with JSON body and extra headers.
    pub async fn post_with_headers(
        &self,
        path: &str,
        headers: &[(&str, String)],
        body: Value,
    ) -> TestResponse {
        let mut all = vec![("content-type", "application/json".to_string())];
        all.extend(headers.iter().cloned());
        let body = Body::from(serde_json::to_vec(&body).unwrap());
        self.send(Method::POST, path, &all, body).await
    }

    /// Send a POST request with a raw body.
    pub async fn post_bytes(
        &self,
        path: &str,
        headers: &[(&str, String)],
        body: Vec<u8>,
    ) -> TestResponse {
        self.send(Method::POST, path, headers, Body::from(body)).await
    }

    /// Headers admitting a request to maintenance endpoints.
    pub fn maintenance_headers(&self) -> Vec<(&'static str, String)> {
        if self.config.require_secret {
            vec![("x-maintenance-secret", MAINTENANCE_SECRET.to_string())]
        } else {
            Vec::new()
        }
    }

    /// Register a workflow run through the HTTP endpoint and return its ticket key.
    pub async fn register_workflow(
        &self,
        owner: &str,
        repo: &str,
        commit: &str,
        git_ref: &str,
        ordering_number: u64,
    ) -> String {
        let response = self
            .post_with_headers(
                "/workflow",
                &self.maintenance_headers(),
                json!({
                    "runUrl": format!("https://ci.example/{owner}/{repo}/runs/{ordering_number}"),
                    "attempt": 1,
                    "actor": "ci-bot",
                    "owner": owner,
                    "repo": repo,
                    "commit": commit,
                    "ref": git_ref,
                    "orderingNumber": ordering_number,
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
        response.body["key"]
            .as_str()
            .expect("workflow key")
            .to_string()
    }

    /// Publish inline packages with correct content hashes.
    pub async fn publish(&self, key: &str, packages: &[(&str, Vec<u8>)]) -> TestResponse {
        let mut form = MultipartForm::new();
        for (name, bytes) in packages {
            form = form.file(&format!("package:{name}"), bytes);
        }
        let hashes = content_hashes(packages);
        self.publish_form(key, form, &[("x-content-hashes", hashes.to_string())])
            .await
    }

    /// Publish an arbitrary form with the given extra headers.
    pub async fn publish_form(
        &self,
        key: &str,
        form: MultipartForm,
        extra: &[(&str, String)],
    ) -> TestResponse {
        let mut headers = vec![
            ("x-publish-key", key.to_string()),
            ("content-type", form.content_type()),
        ];
        headers.extend(extra.iter().cloned());
        self.post_bytes("/publish", &headers, form.finish()).await
    }

    /// Wait until the background worker has recorded a download of `key`.
    pub async fn wait_for_download(&self, key: &str) -> bool {
        for _ in 0..50 {
            if matches!(self.downloads.last_download(key), Ok(Some(_))) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        headers: &[(&str, String)],
        body: Body,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            builder = builder.header(*name, value.as_str());
        }
        let request = builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            bytes,
            body,
        }
    }
}

/// `x-content-hashes` value for `packages`.
pub fn content_hashes(packages: &[(&str, Vec<u8>)]) -> Value {
    let map: serde_json::Map<String, Value> = packages
        .iter()
        .map(|(name, bytes)| (name.to_string(), Value::String(sha256_hex(bytes))))
        .collect();
    Value::Object(map)
}

/// Minimal `multipart/form-data` encoder.
#[derive(Debug, Default)]
pub struct MultipartForm {
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, name: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"blob\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
        self
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

/// Helper to assert a JSON path equals expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json[$path];
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}

//! Publish pipeline tests: tickets, payload ceiling, chunked uploads,
//! templates and notifications, driven through the HTTP surface.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{content_hashes, fixtures, MultipartForm, TestConfig, TestFixture};
use prpkg_core::artifact::sha256_hex;
use prpkg_core::testing::RecordedNotifierCall;

// =============================================================================
// End to end
// =============================================================================

#[tokio::test]
async fn test_publish_then_download() {
    let fixture = TestFixture::new().await;
    let commit = fixtures::commit("deadbee0");
    let tarball = fixtures::tarball("widgets 1.0.0");

    let key = fixture
        .register_workflow("acme", "widgets", &commit, "main", 1)
        .await;
    let response = fixture
        .publish(&key, &[("widgets", tarball.clone())])
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["ok"], true);
    assert_eq!(response.body["urls"][0], "/acme/widgets@deadbee");

    // Short form redirects to the full form, which serves the bytes
    let redirect = fixture.get("/acme/widgets@deadbee").await;
    assert_eq!(redirect.status, StatusCode::FOUND);
    assert_eq!(
        redirect.header("location"),
        Some("/acme/widgets/widgets@deadbee")
    );

    let served = fixture.get_following("/acme/widgets@deadbee").await;
    assert_eq!(served.status, StatusCode::OK);
    assert_eq!(served.bytes.as_ref(), tarball.as_slice());
    assert_eq!(served.etag(), Some(sha256_hex(&tarball).as_str()));
    assert_eq!(served.header("x-commit-key"), Some("acme:widgets:deadbee"));
    assert_eq!(served.header("x-pkg-name-key"), Some("widgets"));
    assert_eq!(served.header("content-type"), Some("application/tar+gzip"));
    assert!(served.header("last-modified").is_some());
}

#[tokio::test]
async fn test_public_url_prefix() {
    let fixture = TestFixture::with_config(TestConfig {
        public_url: "https://pkg.example/".to_string(),
        ..Default::default()
    })
    .await;
    let commit = fixtures::commit("deadbee0");

    let key = fixture
        .register_workflow("acme", "widgets", &commit, "main", 1)
        .await;
    let response = fixture
        .publish(
            &key,
            &[
                ("widgets", fixtures::tarball("a")),
                ("@acme/gizmo", fixtures::tarball("b")),
            ],
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(
        response.body["urls"],
        json!([
            "https://pkg.example/acme/widgets@deadbee",
            "https://pkg.example/acme/widgets/@acme/gizmo@deadbee"
        ])
    );
}

// =============================================================================
// Tickets
// =============================================================================

#[tokio::test]
async fn test_ticket_is_one_shot() {
    let fixture = TestFixture::new().await;
    let commit = fixtures::commit("deadbee0");
    let packages = [("widgets", fixtures::tarball("x"))];

    let key = fixture
        .register_workflow("acme", "widgets", &commit, "main", 1)
        .await;
    let first = fixture.publish(&key, &packages).await;
    assert_status!(first, StatusCode::OK);

    let second = fixture.publish(&key, &packages).await;
    assert_status!(second, StatusCode::UNAUTHORIZED);
    assert_eq!(second.body["error"], true);
}

#[tokio::test]
async fn test_unknown_ticket_rejected() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .publish("never-registered", &[("widgets", fixtures::tarball("x"))])
        .await;
    assert_status!(response, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_missing_publish_key_is_malformed() {
    let fixture = TestFixture::new().await;
    let form = MultipartForm::new().file("package:widgets", b"x");
    let response = fixture
        .post_bytes(
            "/publish",
            &[("content-type", form.content_type())],
            form.finish(),
        )
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Content hashes
// =============================================================================

#[tokio::test]
async fn test_content_hash_mismatch_rejected() {
    let fixture = TestFixture::new().await;
    let commit = fixtures::commit("deadbee0");
    let key = fixture
        .register_workflow("acme", "widgets", &commit, "main", 1)
        .await;

    let form = MultipartForm::new().file("package:widgets", &fixtures::tarball("real"));
    let hashes = content_hashes(&[("widgets", fixtures::tarball("forged"))]);
    let response = fixture
        .publish_form(&key, form, &[("x-content-hashes", hashes.to_string())])
        .await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    let missing = fixture.get("/acme/widgets/widgets@deadbee").await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_content_hash_rejected() {
    let fixture = TestFixture::new().await;
    let commit = fixtures::commit("deadbee0");
    let key = fixture
        .register_workflow("acme", "widgets", &commit, "main", 1)
        .await;

    let form = MultipartForm::new().file("package:widgets", &fixtures::tarball("x"));
    let response = fixture.publish_form(&key, form, &[]).await;
    assert_status!(response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_empty_payload_rejected() {
    let fixture = TestFixture::new().await;
    let commit = fixtures::commit("deadbee0");
    let key = fixture
        .register_workflow("acme", "widgets", &commit, "main", 1)
        .await;

    let response = fixture.publish(&key, &[]).await;
    assert_status!(response, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Payload ceiling
// =============================================================================

#[tokio::test]
async fn test_oversized_payload_rejected() {
    let fixture = TestFixture::with_config(TestConfig::with_ceiling(64, &["big/monorepo"])).await;
    let commit = fixtures::commit("deadbee0");
    let packages = [("widgets", vec![7u8; 200])];

    let key = fixture
        .register_workflow("acme", "widgets", &commit, "main", 1)
        .await;
    let response = fixture.publish(&key, &packages).await;
    assert_status!(response, StatusCode::PAYLOAD_TOO_LARGE);

    // The ticket was consumed before the size check
    let retry = fixture.publish(&key, &packages).await;
    assert_status!(retry, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_declared_length_checked_before_body() {
    let fixture = TestFixture::with_config(TestConfig::with_ceiling(64, &[])).await;
    let commit = fixtures::commit("deadbee0");
    let key = fixture
        .register_workflow("acme", "widgets", &commit, "main", 1)
        .await;

    let form = MultipartForm::new().file("package:widgets", b"tiny");
    let response = fixture
        .publish_form(&key, form, &[("content-length", "100000".to_string())])
        .await;
    assert_status!(response, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_whitelisted_repo_exceeds_ceiling() {
    let fixture = TestFixture::with_config(TestConfig::with_ceiling(64, &["big/monorepo"])).await;
    let commit = fixtures::commit("cafe1234");

    let key = fixture
        .register_workflow("big", "monorepo", &commit, "main", 1)
        .await;
    let response = fixture
        .publish(&key, &[("monorepo", vec![7u8; 200])])
        .await;
    assert_status!(response, StatusCode::OK);
}

// =============================================================================
// Chunked uploads
// =============================================================================

#[tokio::test]
async fn test_chunked_upload_then_publish() {
    let fixture = TestFixture::new().await;
    let commit = fixtures::commit("deadbee0");
    let key = fixture
        .register_workflow("acme", "widgets", &commit, "main", 1)
        .await;

    let created = fixture
        .post_with_headers(
            "/multipart/create",
            &[("x-publish-key", key.clone())],
            json!({ "name": "widgets" }),
        )
        .await;
    assert_status!(created, StatusCode::OK);
    let upload_id = created.body["uploadId"].as_str().unwrap().to_string();
    let staging_key = created.body["key"].as_str().unwrap().to_string();
    assert!(staging_key.starts_with("upload:"));

    // Parts arrive out of order
    let part_two = b"-second-half".to_vec();
    let part_one = fixtures::tarball("first-half");
    for (number, bytes) in [(2, part_two.clone()), (1, part_one.clone())] {
        let response = fixture
            .post_bytes(
                "/multipart/upload",
                &[
                    ("x-upload-id", upload_id.clone()),
                    ("x-part-number", number.to_string()),
                ],
                bytes,
            )
            .await;
        assert_status!(response, StatusCode::OK);
        assert_eq!(response.body["partNumber"], number);
    }

    let completed = fixture
        .post_bytes(
            "/multipart/complete",
            &[("x-upload-id", upload_id.clone())],
            Vec::new(),
        )
        .await;
    assert_status!(completed, StatusCode::OK);
    assert_eq!(completed.body["key"], staging_key.as_str());

    let mut assembled = part_one;
    assembled.extend_from_slice(&part_two);
    assert_eq!(completed.body["size"], assembled.len());

    let form = MultipartForm::new().text("package:widgets", &format!("object:{staging_key}"));
    let hashes = content_hashes(&[("widgets", assembled.clone())]);
    let response = fixture
        .publish_form(&key, form, &[("x-content-hashes", hashes.to_string())])
        .await;
    assert_status!(response, StatusCode::OK);

    let served = fixture.get("/acme/widgets/widgets@deadbee").await;
    assert_eq!(served.status, StatusCode::OK);
    assert_eq!(served.bytes.as_ref(), assembled.as_slice());

    // Staging object is gone once copied
    assert!(fixture.artifacts.head(&staging_key).unwrap().is_none());
}

#[tokio::test]
async fn test_create_upload_requires_ticket() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .post_with_headers(
            "/multipart/create",
            &[("x-publish-key", "unknown".to_string())],
            json!({ "name": "widgets" }),
        )
        .await;
    assert_status!(response, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_upload_part_validation() {
    let fixture = TestFixture::new().await;

    let unknown = fixture
        .post_bytes(
            "/multipart/upload",
            &[
                ("x-upload-id", "missing".to_string()),
                ("x-part-number", "1".to_string()),
            ],
            b"bytes".to_vec(),
        )
        .await;
    assert_status!(unknown, StatusCode::NOT_FOUND);

    let no_number = fixture
        .post_bytes(
            "/multipart/upload",
            &[("x-upload-id", "missing".to_string())],
            b"bytes".to_vec(),
        )
        .await;
    assert_status!(no_number, StatusCode::BAD_REQUEST);
}

/// Open a chunked upload with `ticket` and send `parts` as parts 1..=n.
/// Returns the upload id, the staging key and the last part response.
async fn stage(
    fixture: &TestFixture,
    ticket: &str,
    parts: &[Vec<u8>],
) -> (String, String, common::TestResponse) {
    let created = fixture
        .post_with_headers(
            "/multipart/create",
            &[("x-publish-key", ticket.to_string())],
            json!({ "name": "widgets" }),
        )
        .await;
    assert_status!(created, StatusCode::OK);
    let upload_id = created.body["uploadId"].as_str().unwrap().to_string();
    let staging_key = created.body["key"].as_str().unwrap().to_string();

    let mut last = None;
    for (index, bytes) in parts.iter().enumerate() {
        let response = fixture
            .post_bytes(
                "/multipart/upload",
                &[
                    ("x-upload-id", upload_id.clone()),
                    ("x-part-number", (index + 1).to_string()),
                ],
                bytes.clone(),
            )
            .await;
        last = Some(response);
    }
    (upload_id, staging_key, last.expect("at least one part"))
}

async fn complete(fixture: &TestFixture, upload_id: &str) -> common::TestResponse {
    fixture
        .post_bytes(
            "/multipart/complete",
            &[("x-upload-id", upload_id.to_string())],
            Vec::new(),
        )
        .await
}

#[tokio::test]
async fn test_chunked_upload_held_to_ceiling() {
    let fixture = TestFixture::with_config(TestConfig::with_ceiling(64, &["big/monorepo"])).await;
    let commit = fixtures::commit("deadbee0");
    let key = fixture
        .register_workflow("acme", "widgets", &commit, "main", 1)
        .await;

    let (upload_id, staging_key, part) = stage(&fixture, &key, &[vec![7u8; 10_000]]).await;
    assert_status!(part, StatusCode::PAYLOAD_TOO_LARGE);

    // The session is dropped, so there is nothing to complete or publish
    let completed = complete(&fixture, &upload_id).await;
    assert_status!(completed, StatusCode::NOT_FOUND);
    assert!(fixture.artifacts.head(&staging_key).unwrap().is_none());

    let form = MultipartForm::new().text("package:widgets", &format!("object:{staging_key}"));
    let hashes = content_hashes(&[("widgets", vec![7u8; 10_000])]);
    let response = fixture
        .publish_form(&key, form, &[("x-content-hashes", hashes.to_string())])
        .await;
    assert_status!(response, StatusCode::NOT_FOUND);
    assert_eq!(fixture.get("/acme/widgets/widgets@deadbee").await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_whitelisted_chunked_upload_exceeds_ceiling() {
    let fixture = TestFixture::with_config(TestConfig::with_ceiling(64, &["big/monorepo"])).await;
    let commit = fixtures::commit("cafe1234");
    let key = fixture
        .register_workflow("big", "monorepo", &commit, "main", 1)
        .await;

    let big = vec![7u8; 10_000];
    let (upload_id, staging_key, part) = stage(&fixture, &key, &[big.clone()]).await;
    assert_status!(part, StatusCode::OK);
    let completed = complete(&fixture, &upload_id).await;
    assert_status!(completed, StatusCode::OK);

    let form = MultipartForm::new().text("package:monorepo", &format!("object:{staging_key}"));
    let hashes = content_hashes(&[("monorepo", big)]);
    let response = fixture
        .publish_form(&key, form, &[("x-content-hashes", hashes.to_string())])
        .await;
    assert_status!(response, StatusCode::OK);
}

#[tokio::test]
async fn test_staged_packages_count_toward_ceiling() {
    let fixture = TestFixture::with_config(TestConfig::with_ceiling(64, &[])).await;
    let commit = fixtures::commit("deadbee0");
    let key = fixture
        .register_workflow("acme", "widgets", &commit, "main", 1)
        .await;

    // Each upload fits on its own, together they do not
    let mut form = MultipartForm::new();
    let mut packages = Vec::new();
    for (name, fill) in [("widgets", 1u8), ("gizmo", 2)] {
        let bytes = vec![fill; 40];
        let (upload_id, staging_key, part) = stage(&fixture, &key, &[bytes.clone()]).await;
        assert_status!(part, StatusCode::OK);
        let completed = complete(&fixture, &upload_id).await;
        assert_status!(completed, StatusCode::OK);
        form = form.text(&format!("package:{name}"), &format!("object:{staging_key}"));
        packages.push((name, bytes));
    }

    let hashes = content_hashes(&packages);
    let response = fixture
        .publish_form(&key, form, &[("x-content-hashes", hashes.to_string())])
        .await;
    assert_status!(response, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(fixture.get("/acme/widgets/widgets@deadbee").await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_staged_upload_bound_to_repository() {
    let fixture = TestFixture::new().await;
    let commit = fixtures::commit("deadbee0");
    let theirs = fixture
        .register_workflow("acme", "gadgets", &commit, "main", 1)
        .await;
    let ours = fixture
        .register_workflow("acme", "widgets", &commit, "main", 2)
        .await;

    let tarball = fixtures::tarball("gadgets");
    let (upload_id, staging_key, part) = stage(&fixture, &theirs, &[tarball.clone()]).await;
    assert_status!(part, StatusCode::OK);
    assert!(staging_key.starts_with("upload:acme:gadgets:"));
    let completed = complete(&fixture, &upload_id).await;
    assert_status!(completed, StatusCode::OK);

    let form = MultipartForm::new().text("package:widgets", &format!("object:{staging_key}"));
    let hashes = content_hashes(&[("widgets", tarball)]);
    let response = fixture
        .publish_form(&ours, form, &[("x-content-hashes", hashes.to_string())])
        .await;
    assert_status!(response, StatusCode::UNAUTHORIZED);
    assert!(fixture.artifacts.head(&staging_key).unwrap().is_some());
}

// =============================================================================
// Templates
// =============================================================================

#[tokio::test]
async fn test_template_launch_document() {
    let fixture = TestFixture::new().await;
    let commit = fixtures::commit("deadbee0");
    let tarball = fixtures::tarball("widgets");
    let key = fixture
        .register_workflow("acme", "widgets", &commit, "main", 1)
        .await;

    let logo = [0x89, b'P', b'N', b'G', 0x00, 0x01];
    let form = MultipartForm::new()
        .file("package:widgets", &tarball)
        .file(
            "template:basic:package.json",
            br#"{"name":"demo","dependencies":{"widgets":"^1.0.0"}}"#,
        )
        .file("template:basic:index.js", b"require('widgets')\n")
        .file("template:basic:logo.png", &logo);
    let hashes = content_hashes(&[("widgets", tarball)]);
    let response = fixture
        .publish_form(&key, form, &[("x-content-hashes", hashes.to_string())])
        .await;
    assert_status!(response, StatusCode::OK);

    let url = response.body["templates"]["basic"]
        .as_str()
        .expect("template url")
        .to_string();
    assert!(url.starts_with("/template/"));

    let document = fixture.get(&url).await;
    assert_eq!(document.status, StatusCode::OK);
    assert!(document
        .header("content-type")
        .unwrap()
        .starts_with("text/html"));
    let html = String::from_utf8(document.bytes.to_vec()).unwrap();
    assert!(html.contains("project[files][package.json]"));
    assert!(html.contains("/acme/widgets@deadbee"));
    assert!(html.contains("project[files][index.js]"));
    assert!(html.contains("project[urls][logo.png]"));

    // The binary asset is served from its own template id
    let start = html.find("/template/").expect("asset url");
    let asset_url: String = html[start..]
        .chars()
        .take_while(|c| *c != '"')
        .collect();
    let asset = fixture.get(&asset_url).await;
    assert_eq!(asset.status, StatusCode::OK);
    assert_eq!(asset.header("content-type"), Some("image/png"));
    assert_eq!(asset.bytes.as_ref(), &logo);
}

#[tokio::test]
async fn test_unknown_template_is_not_found() {
    let fixture = TestFixture::new().await;

    let missing = fixture
        .get("/template/550e8400-e29b-41d4-a716-446655440000")
        .await;
    assert_status!(missing, StatusCode::NOT_FOUND);

    let invalid = fixture.get("/template/not-a-uuid").await;
    assert_status!(invalid, StatusCode::NOT_FOUND);
}

// =============================================================================
// Check and notifications
// =============================================================================

#[tokio::test]
async fn test_check_reports_commit() {
    let fixture = TestFixture::new().await;
    let commit = fixtures::commit("deadbee0");
    let key = fixture
        .register_workflow("acme", "widgets", &commit, "main", 1)
        .await;

    let response = fixture.post("/check", json!({ "key": key })).await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["ok"], true);
    assert_eq!(response.body["sha"], commit.as_str());

    // Checking does not consume the ticket
    let publish = fixture
        .publish(&key, &[("widgets", fixtures::tarball("x"))])
        .await;
    assert_status!(publish, StatusCode::OK);
}

#[tokio::test]
async fn test_check_rejections() {
    let fixture = TestFixture::new().await;

    let unknown = fixture.post("/check", json!({ "key": "unknown" })).await;
    assert_status!(unknown, StatusCode::UNAUTHORIZED);

    let commit = fixtures::commit("deadbee0");
    let key = fixture
        .register_workflow("acme", "widgets", &commit, "main", 1)
        .await;
    fixture.notifier.set_installed("acme", "widgets", false).await;
    let uninstalled = fixture.post("/check", json!({ "key": key })).await;
    assert_status!(uninstalled, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pull_request_comment_is_updated_in_place() {
    let fixture = TestFixture::new().await;
    fixture.notifier.open_pull_request(12).await;

    for (seed, run) in [("aaaa1111", 1), ("bbbb2222", 2)] {
        let commit = fixtures::commit(seed);
        let key = fixture
            .register_workflow("acme", "widgets", &commit, "12", run)
            .await;
        let response = fixture
            .publish(&key, &[("widgets", fixtures::tarball(seed))])
            .await;
        assert_status!(response, StatusCode::OK);
    }

    let comments = fixture.notifier.comments_on(12).await;
    assert_eq!(comments.len(), 1);
    let summary = fixture
        .notifier
        .comment_summary(comments[0].id)
        .await
        .unwrap();
    assert_eq!(summary.commit, fixtures::commit("bbbb2222"));
    assert_eq!(fixture.notifier.checks().await.len(), 2);
}

#[tokio::test]
async fn test_comment_policy_off() {
    let fixture = TestFixture::new().await;
    fixture.notifier.open_pull_request(12).await;
    let commit = fixtures::commit("aaaa1111");
    let key = fixture
        .register_workflow("acme", "widgets", &commit, "12", 1)
        .await;

    let tarball = fixtures::tarball("x");
    let form = MultipartForm::new().file("package:widgets", &tarball);
    let hashes = content_hashes(&[("widgets", tarball)]);
    let response = fixture
        .publish_form(
            &key,
            form,
            &[
                ("x-content-hashes", hashes.to_string()),
                ("x-comment", "off".to_string()),
            ],
        )
        .await;
    assert_status!(response, StatusCode::OK);

    assert!(fixture.notifier.comments_on(12).await.is_empty());
    assert!(fixture
        .notifier
        .calls()
        .await
        .iter()
        .all(|call| !matches!(call, RecordedNotifierCall::PullRequestOpen { .. })));
}

#[tokio::test]
async fn test_notifier_failure_does_not_fail_publish() {
    let fixture = TestFixture::new().await;
    fixture.notifier.set_failing(true).await;
    let commit = fixtures::commit("deadbee0");
    let key = fixture
        .register_workflow("acme", "widgets", &commit, "main", 1)
        .await;

    let response = fixture
        .publish(&key, &[("widgets", fixtures::tarball("x"))])
        .await;
    assert_status!(response, StatusCode::OK);

    let served = fixture.get("/acme/widgets/widgets@deadbee").await;
    assert_eq!(served.status, StatusCode::OK);
}

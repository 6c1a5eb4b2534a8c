//! Session file cache integration tests.

mod common;

use chrono::Duration;
use common::TestHarness;

use squish_core::SessionId;

#[tokio::test]
async fn upload_requires_session() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/api/files")
        .add_header("x-file-name", "photo.jpg")
        .bytes(vec![1u8; 64].into())
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn upload_requires_filename() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/api/files")
        .add_header("x-session-id", harness.session_header())
        .bytes(vec![1u8; 64].into())
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn upload_spools_and_resolves() {
    let harness = TestHarness::new();

    let id = harness.upload("photo.jpg", &[7u8; 128]).await;

    // Bytes landed in the spool directory.
    let spooled = harness.spool_dir.path().join(&id);
    assert_eq!(std::fs::read(&spooled).unwrap(), vec![7u8; 128]);

    let response = harness
        .server
        .get(&format!("/api/files/{id}"))
        .add_header("x-session-id", harness.session_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["original_name"], "photo.jpg");
    assert_eq!(body["size_bytes"], 128);
}

#[tokio::test]
async fn reupload_deduplicates_within_ttl() {
    let harness = TestHarness::new();

    let first = harness.upload("photo.jpg", &[7u8; 128]).await;

    let response = harness
        .server
        .post("/api/files")
        .add_header("x-session-id", harness.session_header())
        .add_header("x-file-name", "photo.jpg")
        .add_header("content-type", "image/jpeg")
        .bytes(vec![7u8; 128].into())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["deduplicated"], true);
    assert_eq!(body["file"]["id"], first);
}

#[tokio::test]
async fn files_are_scoped_per_session() {
    let harness = TestHarness::new();

    let id = harness.upload("photo.jpg", &[7u8; 128]).await;

    let other_session = SessionId::generate().to_string();
    let response = harness
        .server
        .get(&format!("/api/files/{id}"))
        .add_header("x-session-id", other_session)
        .await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn expired_file_stops_resolving() {
    let harness = TestHarness::new();

    let id = harness.upload("photo.jpg", &[7u8; 128]).await;

    // 30 minutes plus one tick.
    harness.clock.advance(Duration::minutes(30) + Duration::seconds(1));

    let response = harness
        .server
        .get(&format!("/api/files/{id}"))
        .add_header("x-session-id", harness.session_header())
        .await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn list_and_clear_session_files() {
    let harness = TestHarness::new();

    harness.upload("a.jpg", &[1u8; 10]).await;
    harness.clock.advance(Duration::seconds(1));
    harness.upload("b.jpg", &[2u8; 20]).await;

    let response = harness
        .server
        .get("/api/files")
        .add_header("x-session-id", harness.session_header())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["count"], 2);
    assert_eq!(body["files"][0]["original_name"], "a.jpg");
    assert_eq!(body["files"][1]["original_name"], "b.jpg");

    let response = harness
        .server
        .delete("/api/files")
        .add_header("x-session-id", harness.session_header())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["cleared"], 2);

    // Spool directory is emptied along with the cache.
    let remaining = std::fs::read_dir(harness.spool_dir.path()).unwrap().count();
    assert_eq!(remaining, 0);

    let response = harness
        .server
        .get("/api/files")
        .add_header("x-session-id", harness.session_header())
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn capacity_eviction_drops_oldest_uploads() {
    let harness = TestHarness::new();

    let mut ids = Vec::new();
    for i in 0..101 {
        // Distinct timestamps keep the age ordering deterministic.
        ids.push(harness.upload(&format!("f{i}.jpg"), &[1u8; 16]).await);
        harness.clock.advance(Duration::seconds(1));
    }

    for id in &ids[..20] {
        let response = harness
            .server
            .get(&format!("/api/files/{id}"))
            .add_header("x-session-id", harness.session_header())
            .await;
        response.assert_status_not_found();
    }

    for id in &ids[20..] {
        let response = harness
            .server
            .get(&format!("/api/files/{id}"))
            .add_header("x-session-id", harness.session_header())
            .await;
        response.assert_status_ok();
    }
}

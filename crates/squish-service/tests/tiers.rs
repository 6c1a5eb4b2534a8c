//! Tier middleware integration tests: the full chain from API key to
//! asynchronous usage recording.

mod common;

use common::TestHarness;
use serde_json::json;

use squish_core::{Clock, Identity, OperationClass, PlanId, UsageRecord};
use squish_store::Store;

// ============================================================================
// Key resolution
// ============================================================================

#[tokio::test]
async fn missing_api_key_is_unauthorized() {
    let harness = TestHarness::new();

    let response = harness.server.get("/v1/jobs").await;
    response.assert_status_unauthorized();
}

#[tokio::test]
async fn unknown_api_key_is_unauthorized() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/v1/jobs")
        .add_header("x-api-key", "sq_not_a_real_key")
        .await;
    response.assert_status_unauthorized();
}

#[tokio::test]
async fn inactive_subscription_is_forbidden() {
    let harness = TestHarness::new();
    let (key, _) = harness.mint_api_key(PlanId::ApiProfessional, false);

    let response = harness
        .server
        .get("/v1/jobs")
        .add_header("x-api-key", key)
        .await;

    response.assert_status_forbidden();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "subscription_required");
}

// ============================================================================
// Tier headers
// ============================================================================

#[tokio::test]
async fn responses_carry_tier_headers() {
    let harness = TestHarness::new();
    let (key, _) = harness.mint_api_key(PlanId::ApiStarter, true);

    let response = harness
        .server
        .get("/v1/jobs")
        .add_header("x-api-key", key)
        .await;

    response.assert_status_ok();
    assert_eq!(response.header("x-api-tier"), "starter");
    assert_eq!(response.header("x-api-tier-display"), "API Starter");
    assert_eq!(response.header("x-api-rate-limit"), "10");
    assert_eq!(response.header("x-api-monthly-limit"), "5000");
}

// ============================================================================
// Quota and rate validation
// ============================================================================

#[tokio::test]
async fn exhausted_monthly_quota_is_rejected_with_upgrade_hint() {
    let harness = TestHarness::new();
    let (key, user_id) = harness.mint_api_key(PlanId::ApiStarter, true);

    let identity = Identity::User(user_id);
    let mut record = UsageRecord::new(identity, harness.clock.now());
    record.monthly.regular = 5_000; // starter monthly cap
    harness.store.put_usage(&record).unwrap();

    let response = harness
        .server
        .get("/v1/jobs")
        .add_header("x-api-key", key)
        .await;

    assert_eq!(response.status_code(), 429);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "quota_exceeded");
    assert_eq!(body["error"]["message"], "monthly limit reached");
    assert_eq!(body["error"]["details"]["upgrade_required"], "professional");
}

#[tokio::test]
async fn per_minute_rate_limit_is_enforced() {
    let harness = TestHarness::new();
    let (key, _) = harness.mint_api_key(PlanId::ApiStarter, true);

    // Starter allows 10 requests per minute.
    for _ in 0..10 {
        harness
            .server
            .get("/v1/jobs")
            .add_header("x-api-key", &key)
            .await
            .assert_status_ok();
    }

    let response = harness
        .server
        .get("/v1/jobs")
        .add_header("x-api-key", &key)
        .await;

    assert_eq!(response.status_code(), 429);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["message"], "rate limit exceeded");
}

// ============================================================================
// Feature gating
// ============================================================================

#[tokio::test]
async fn starter_batch_request_requires_professional() {
    let harness = TestHarness::new();
    let (key, _) = harness.mint_api_key(PlanId::ApiStarter, true);

    let response = harness
        .server
        .post("/v1/operations/batch")
        .add_header("x-api-key", key)
        .add_header("x-session-id", harness.session_header())
        .json(&json!({
            "file_ids": ["anything"],
            "operation": "compress"
        }))
        .await;

    response.assert_status_forbidden();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "feature_not_available");
    assert_eq!(body["error"]["details"]["feature"], "batch");
    assert_eq!(body["error"]["details"]["upgrade_required"], "professional");
}

#[tokio::test]
async fn raw_input_requires_raw_feature() {
    let harness = TestHarness::new();
    let (key, _) = harness.mint_api_key(PlanId::ApiStarter, true);

    let file_id = harness.upload("shot.nef", &[9u8; 256]).await;

    let response = harness
        .server
        .post("/v1/operations")
        .add_header("x-api-key", key)
        .add_header("x-session-id", harness.session_header())
        .json(&json!({
            "file_id": file_id,
            "operation": "compress"
        }))
        .await;

    response.assert_status_forbidden();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["details"]["feature"], "raw");
    assert_eq!(body["error"]["details"]["upgrade_required"], "professional");
}

// ============================================================================
// Operations and post-2xx usage recording
// ============================================================================

#[tokio::test]
async fn operation_is_accepted_and_usage_recorded() {
    let harness = TestHarness::new();
    let (key, user_id) = harness.mint_api_key(PlanId::ApiProfessional, true);

    let file_id = harness.upload("photo.jpg", &[1u8; 512]).await;

    let response = harness
        .server
        .post("/v1/operations")
        .add_header("x-api-key", &key)
        .add_header("x-session-id", harness.session_header())
        .json(&json!({
            "file_id": file_id,
            "operation": "convert",
            "target_format": "webp"
        }))
        .await;

    assert_eq!(response.status_code(), 202);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["operation"], "convert");
    assert_eq!(body["target_format"], "webp");
    assert_eq!(body["input_bytes"], 512);
    let job_id = body["id"].as_str().unwrap().to_string();

    // Usage recording is fire-and-forget after the 2xx.
    let identity = Identity::User(user_id);
    harness
        .wait_for_monthly_usage(&identity, OperationClass::Regular, 1)
        .await;

    let record = harness.store.get_usage(&identity).unwrap().unwrap();
    assert_eq!(record.monthly_bytes, 512);

    // The job is visible in the history.
    let response = harness
        .server
        .get(&format!("/v1/jobs/{job_id}"))
        .add_header("x-api-key", &key)
        .await;
    response.assert_status_ok();

    let response = harness
        .server
        .get("/v1/jobs")
        .add_header("x-api-key", &key)
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["count"], 1);
    assert_eq!(body["jobs"][0]["id"], job_id);
}

#[tokio::test]
async fn operation_on_missing_file_is_not_found_and_unrecorded() {
    let harness = TestHarness::new();
    let (key, user_id) = harness.mint_api_key(PlanId::ApiProfessional, true);

    let response = harness
        .server
        .post("/v1/operations")
        .add_header("x-api-key", key)
        .add_header("x-session-id", harness.session_header())
        .json(&json!({
            "file_id": "does-not-exist",
            "operation": "compress"
        }))
        .await;

    response.assert_status_not_found();

    // Give any stray recording task a chance to run, then confirm nothing
    // was counted for the failed request.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let record = harness
        .store
        .get_usage(&Identity::User(user_id))
        .unwrap();
    assert!(record.map_or(true, |r| r.monthly.regular == 0));
}

#[tokio::test]
async fn convert_requires_target_format() {
    let harness = TestHarness::new();
    let (key, _) = harness.mint_api_key(PlanId::ApiProfessional, true);

    let file_id = harness.upload("photo.jpg", &[1u8; 64]).await;

    let response = harness
        .server
        .post("/v1/operations")
        .add_header("x-api-key", key)
        .add_header("x-session-id", harness.session_header())
        .json(&json!({
            "file_id": file_id,
            "operation": "convert"
        }))
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn batch_accepts_partial_failures() {
    let harness = TestHarness::new();
    let (key, user_id) = harness.mint_api_key(PlanId::ApiProfessional, true);

    let good = harness.upload("a.jpg", &[1u8; 100]).await;

    let response = harness
        .server
        .post("/v1/operations/batch")
        .add_header("x-api-key", key)
        .add_header("x-session-id", harness.session_header())
        .json(&json!({
            "file_ids": [good, "missing-file"],
            "operation": "compress"
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["accepted"], 1);
    assert_eq!(body["failed"], 1);
    assert_eq!(body["results"][0]["success"], true);
    assert_eq!(body["results"][1]["success"], false);

    // Only the accepted file is recorded.
    harness
        .wait_for_monthly_usage(&Identity::User(user_id), OperationClass::Regular, 1)
        .await;
}

#[tokio::test]
async fn jobs_are_not_visible_across_keys() {
    let harness = TestHarness::new();
    let (key_a, _) = harness.mint_api_key(PlanId::ApiProfessional, true);
    let (key_b, _) = harness.mint_api_key(PlanId::ApiProfessional, true);

    let file_id = harness.upload("photo.jpg", &[1u8; 64]).await;

    let response = harness
        .server
        .post("/v1/operations")
        .add_header("x-api-key", &key_a)
        .add_header("x-session-id", harness.session_header())
        .json(&json!({ "file_id": file_id, "operation": "compress" }))
        .await;
    assert_eq!(response.status_code(), 202);
    let job_id = response.json::<serde_json::Value>()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = harness
        .server
        .get(&format!("/v1/jobs/{job_id}"))
        .add_header("x-api-key", &key_b)
        .await;
    response.assert_status_not_found();
}

//! Common test utilities for squish-service integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::Router;
use axum_test::TestServer;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use tempfile::TempDir;

use squish_core::{
    ApiKeyRecord, Identity, ManualClock, OperationClass, PlanId, SessionId, UserId,
};
use squish_service::{create_router, AppState, FileCache, ServiceConfig};
use squish_store::{MemoryStore, Store};

/// HS256 secret the harness configures and signs test tokens with.
pub const TEST_JWT_SECRET: &str = "test-secret";

/// Admin key the harness configures.
pub const TEST_ADMIN_KEY: &str = "test-admin-key";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The in-memory store behind the service.
    pub store: Arc<MemoryStore>,
    /// The manual clock driving windows and the file cache.
    pub clock: Arc<ManualClock>,
    /// Handle on the service's file cache.
    pub cache: Arc<FileCache>,
    /// Temporary spool directory (kept alive for test duration).
    pub spool_dir: TempDir,
    /// A test user ID for authenticated requests.
    pub test_user_id: UserId,
    /// A test session ID for anonymous requests.
    pub test_session_id: SessionId,
}

impl TestHarness {
    /// Create a new test harness with a fresh store and a frozen clock.
    pub fn new() -> Self {
        let spool_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: String::new(),
            spool_dir: spool_dir.path().to_path_buf(),
            jwt_secret: Some(TEST_JWT_SECRET.into()),
            admin_api_key: Some(TEST_ADMIN_KEY.into()),
            ..ServiceConfig::default()
        };

        let state = AppState::new(store.clone(), clock.clone(), config);
        let cache = state.cache.clone();
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            store,
            clock,
            cache,
            spool_dir,
            test_user_id: UserId::generate(),
            test_session_id: SessionId::generate(),
        }
    }

    /// Get the authorization header for user authentication.
    pub fn user_auth_header(&self) -> String {
        Self::auth_header_for(self.test_user_id)
    }

    /// Mint a bearer header for an arbitrary user.
    pub fn auth_header_for(user_id: UserId) -> String {
        #[derive(serde::Serialize)]
        struct Claims {
            sub: String,
            exp: i64,
            iat: i64,
        }

        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            exp: now + 3600,
            iat: now,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
        )
        .expect("Failed to sign test token");

        format!("Bearer {token}")
    }

    /// The session header value for the harness session.
    pub fn session_header(&self) -> String {
        self.test_session_id.to_string()
    }

    /// Insert an API key for `plan` directly into the store, returning the
    /// plaintext and the owning user.
    pub fn mint_api_key(&self, plan: PlanId, subscription_active: bool) -> (String, UserId) {
        let user_id = UserId::generate();
        let plaintext = format!("sq_test_{}", uuid_suffix());
        let record = ApiKeyRecord::new(
            &plaintext,
            user_id,
            plan,
            "test key".into(),
            subscription_active,
            Utc::now(),
        );
        self.store.put_api_key(&record).expect("put api key");
        (plaintext, user_id)
    }

    /// Wait for the fire-and-forget usage recording to land.
    pub async fn wait_for_monthly_usage(
        &self,
        identity: &Identity,
        class: OperationClass,
        expected: u64,
    ) {
        for _ in 0..100 {
            let used = self
                .store
                .get_usage(identity)
                .expect("get usage")
                .map_or(0, |r| r.monthly.used(class));
            if used >= expected {
                return;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        panic!("usage was never recorded (expected {expected} {} ops)", class.as_str());
    }

    /// Upload `bytes` as `name` for the harness session; returns the file ID.
    pub async fn upload(&self, name: &str, bytes: &[u8]) -> String {
        let response = self
            .server
            .post("/api/files")
            .add_header("x-session-id", self.session_header())
            .add_header("x-file-name", name)
            .add_header("content-type", "image/jpeg")
            .bytes(bytes.to_vec().into())
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        body["file"]["id"].as_str().expect("file id").to_string()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

fn uuid_suffix() -> String {
    UserId::generate().to_string().replace('-', "")
}

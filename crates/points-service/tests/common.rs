//! Common test utilities for points service integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use serde_json::{json, Value};

use points_core::{BonusRules, UserId};
use points_engine::{Ledger, DEFAULT_TX_TIMEOUT};
use points_service::{create_router, AppState, ServiceConfig};
use points_store::MemoryStore;

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The ledger behind the server, for seeding and inspection.
    pub ledger: Arc<Ledger<MemoryStore>>,
}

impl TestHarness {
    /// Create a new test harness with an empty in-memory store.
    pub fn new() -> Self {
        Self::with_ledger(Ledger::new(
            MemoryStore::new(),
            BonusRules::default(),
            DEFAULT_TX_TIMEOUT,
        ))
    }

    /// Create a test harness around a specific ledger.
    pub fn with_ledger(ledger: Ledger<MemoryStore>) -> Self {
        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            ..ServiceConfig::default()
        };

        let ledger = Arc::new(ledger);
        let state = AppState::with_ledger(Arc::clone(&ledger), config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self { server, ledger }
    }

    /// The in-memory store.
    pub fn store(&self) -> &MemoryStore {
        self.ledger.store()
    }

    /// Register a user over HTTP and return the `user` object.
    pub async fn register(&self, referral_code: Option<&str>) -> Value {
        let response = self
            .server
            .post("/register")
            .json(&json!({
                "name": "Test User",
                "email": "test@example.com",
                "referral_code": referral_code,
            }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        body["user"].clone()
    }

    /// Register a user and grant them `points`.
    pub async fn funded_user(&self, referral_code: Option<&str>, points: i64) -> Value {
        let user = self.register(referral_code).await;
        if points > 0 {
            self.ledger
                .grant_points(user_id_of(&user), points)
                .await
                .expect("Failed to grant points");
        }
        user
    }

    /// Current balance over HTTP.
    pub async fn balance(&self, user: &Value) -> i64 {
        let response = self
            .server
            .get(&format!("/users/{}/balance", user["id"].as_str().unwrap()))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        body["points"].as_i64().unwrap()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse the `id` of a user object.
pub fn user_id_of(user: &Value) -> UserId {
    user["id"].as_str().unwrap().parse().unwrap()
}

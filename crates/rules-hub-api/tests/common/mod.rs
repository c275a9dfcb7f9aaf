//! Shared harness for the HTTP integration tests.

#![allow(dead_code)] // Each test file uses a different subset

use axum_test::TestServer;
use serde_json::{Value, json};

use rules_hub_api::{AppState, AppStateInner, HubConfig, create_router};
use rules_hub_db::Database;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const PASSWORD: &str = "correct-horse-battery";

/// A registered account as seen by the client.
pub struct TestUser {
    pub id: String,
    pub token: String,
}

impl TestUser {
    pub fn auth(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

pub struct TestHarness {
    pub server: TestServer,
    /// Direct store access for arranging states the API cannot reach.
    pub state: AppState,
}

impl TestHarness {
    pub fn new() -> Self {
        let db = Database::open_in_memory().expect("Failed to open in-memory store");
        let config = HubConfig {
            jwt_secret: "integration-test-secret".into(),
            admin_email: Some(ADMIN_EMAIL.into()),
            ..Default::default()
        };

        let state = AppStateInner::new(db, config);
        let server =
            TestServer::new(create_router(state.clone())).expect("Failed to create test server");

        Self { server, state }
    }

    /// Register through the API; the username doubles as the email local part.
    pub async fn register(&self, username: &str) -> TestUser {
        self.register_with_email(username, &format!("{username}@example.com")).await
    }

    pub async fn register_admin(&self) -> TestUser {
        self.register_with_email("admin", ADMIN_EMAIL).await
    }

    pub async fn register_with_email(&self, username: &str, email: &str) -> TestUser {
        let response = self
            .server
            .post("/auth/register")
            .json(&json!({ "email": email, "password": PASSWORD, "username": username }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);

        let body: Value = response.json();
        TestUser {
            id: body["data"]["user_id"].as_str().expect("user_id").to_string(),
            token: body["data"]["token"].as_str().expect("token").to_string(),
        }
    }

    /// Publish a rule as `user` and return its id.
    pub async fn create_rule(&self, user: &TestUser, name: &str, category: &str) -> String {
        let response = self
            .server
            .post("/rules")
            .add_header("authorization", user.auth())
            .json(&json!({
                "name": name,
                "description": format!("{name} conventions"),
                "rule_content": format!("Always follow {name}."),
                "tags": ["Rust", "style"],
                "category": category,
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);

        let body: Value = response.json();
        body["data"]["id"].as_str().expect("rule id").to_string()
    }

    pub async fn list_rules(&self, query: &str) -> Value {
        let response = self.server.get(&format!("/rules{query}")).await;
        response.assert_status_ok();
        response.json::<Value>()["data"].clone()
    }

    pub async fn notifications(&self, user: &TestUser) -> Vec<Value> {
        let response = self
            .server
            .get("/notifications")
            .add_header("authorization", user.auth())
            .await;
        response.assert_status_ok();
        response.json::<Value>()["data"]
            .as_array()
            .cloned()
            .unwrap_or_default()
    }

    pub async fn unread_count(&self, user: &TestUser) -> i64 {
        let response = self
            .server
            .get("/notifications/unread-count")
            .add_header("authorization", user.auth())
            .await;
        response.assert_status_ok();
        response.json::<Value>()["data"]["count"].as_i64().expect("count")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

//! Common test utilities for E2E testing with mocks.
//!
//! Builds the full server router in-process with mock implementations of
//! the external collaborators (object store, work queue), so the API can be
//! exercised without NATS or real storage.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use scrivano_core::testing::{MockObjectStore, MockWorkQueue};
use scrivano_core::{
    create_authenticator, AuthConfig, AuthMethod, Config, DatabaseConfig, EventBus,
    ObjectStoreConfig, OrchestratorConfig, QueueConfig, ServerConfig, SqliteEventLog,
    SqliteTaskStore, TaskOrchestrator,
};
use scrivano_server::state::AppState;

/// Multipart boundary used by `post_pdf`.
pub const BOUNDARY: &str = "scrivano-test-boundary";

/// Test fixture for E2E testing with mock dependencies.
pub struct TestFixture {
    /// The Axum router for testing.
    pub router: Router,
    /// Mock object store - inspect stored documents, inject artifacts.
    pub objects: Arc<MockObjectStore>,
    /// Mock work queue - inspect published messages, simulate outages.
    pub queue: Arc<MockWorkQueue>,
}

/// Response from a test request.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture with auth disabled.
    pub fn new() -> Self {
        Self::with_auth(AuthConfig {
            method: AuthMethod::None,
            api_key: None,
        })
    }

    /// Create a test fixture with the given auth configuration.
    pub fn with_auth(auth: AuthConfig) -> Self {
        let config = Config {
            auth: auth.clone(),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            objects: ObjectStoreConfig::default(),
            queue: QueueConfig::default(),
            orchestrator: OrchestratorConfig::default(),
        };

        let objects = Arc::new(MockObjectStore::new());
        let queue = Arc::new(MockWorkQueue::new());

        let tasks = Arc::new(SqliteTaskStore::in_memory().expect("task store"));
        let log = Arc::new(SqliteEventLog::in_memory().expect("event log"));
        let events = Arc::new(EventBus::new(log, config.orchestrator.event_capacity));

        let orchestrator = Arc::new(TaskOrchestrator::new(
            config.orchestrator.clone(),
            tasks,
            Arc::clone(&objects) as Arc<dyn scrivano_core::ObjectStore>,
            Arc::clone(&queue) as Arc<dyn scrivano_core::WorkQueue>,
            events,
        ));

        let authenticator: Arc<dyn scrivano_core::Authenticator> =
            Arc::from(create_authenticator(&auth).expect("authenticator"));

        let state = Arc::new(AppState::new(config, authenticator, orchestrator));
        let router = scrivano_server::api::create_router(state);

        Self {
            router,
            objects,
            queue,
        }
    }

    /// GET a path and parse the JSON body.
    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .uri(path)
            .body(Body::empty())
            .expect("request");
        self.send(request).await
    }

    /// POST a JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request");
        self.send(request).await
    }

    /// POST a PDF upload as multipart form data.
    pub async fn post_pdf(&self, path: &str, filename: &str, content: &[u8]) -> TestResponse {
        self.post_file(path, filename, "application/pdf", content)
            .await
    }

    /// POST an arbitrary file upload as multipart form data.
    pub async fn post_file(
        &self,
        path: &str,
        filename: &str,
        content_type: &str,
        content: &[u8],
    ) -> TestResponse {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("request");
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router response");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or(Value::String(String::from_utf8_lossy(&bytes).to_string()))
        };

        TestResponse { status, body }
    }
}

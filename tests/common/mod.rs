use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request, Response},
    Router,
};
use serde_json::{json, Value};
use storefront_api::{
    auth::{AuthConfig, AuthService},
    config::AppConfig,
    db::{self, DbConfig},
    events::{self, EventSender},
    AppServices, AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;

pub const TEST_INVITE_CODE: &str = "test-invite-code";

/// Helper harness for spinning up an application backed by an in-memory
/// SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.admin_invite_code = Some(TEST_INVITE_CODE.to_string());

        // A single connection keeps every query on the same in-memory database.
        let db_cfg = DbConfig {
            url: cfg.database_url.clone(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };
        let pool = db::establish_connection_with_config(&db_cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let auth_service = Arc::new(AuthService::new(AuthConfig::new(
            cfg.jwt_secret.clone(),
            cfg.auth_issuer.clone(),
            cfg.auth_audience.clone(),
            Duration::from_secs(cfg.jwt_expiration as u64),
        )));

        let services = AppServices::new(db_arc.clone(), event_sender, auth_service, &cfg);
        let state = AppState {
            db: db_arc,
            config: cfg,
            services,
        };

        let router = storefront_api::app(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    /// Issue a request without credentials.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Response<Body> {
        self.request_with_token(method, path, None, body).await
    }

    /// Issue a request with an optional bearer token.
    pub async fn request_with_token(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match body {
            Some(value) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(value.to_string()))
                .expect("build request"),
            None => builder.body(Body::empty()).expect("build request"),
        };

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router call failed")
    }

    /// Register a regular user and return a login token for them.
    pub async fn register_and_login(&self, username: &str, email: &str, password: &str) -> String {
        let response = self
            .request(
                Method::POST,
                "/register",
                Some(json!({
                    "username": username,
                    "email": email,
                    "password": password,
                })),
            )
            .await;
        assert_eq!(response.status(), 201, "registration should succeed");

        let response = self
            .request(
                Method::POST,
                "/login",
                Some(json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(response.status(), 200, "login should succeed");

        let body = read_json(response).await;
        body["access_token"]
            .as_str()
            .expect("login returns access_token")
            .to_string()
    }

    /// Register an elevated account through the invite-gated endpoint and
    /// return its token.
    pub async fn register_admin(&self, username: &str, email: &str, password: &str) -> String {
        let response = self
            .request(
                Method::POST,
                "/admin-register",
                Some(json!({
                    "username": username,
                    "email": email,
                    "password": password,
                    "invite_code": TEST_INVITE_CODE,
                })),
            )
            .await;
        assert_eq!(response.status(), 201, "admin registration should succeed");

        let body = read_json(response).await;
        body["access_token"]
            .as_str()
            .expect("admin registration returns access_token")
            .to_string()
    }

    /// Seed a product through the catalog service and return its id.
    pub async fn seed_product(&self, name: &str, price: &str, stock: i32) -> uuid::Uuid {
        use storefront_api::services::catalog::CreateProductInput;

        let product = self
            .state
            .services
            .catalog
            .create_product(CreateProductInput {
                name: name.to_string(),
                description: None,
                price: price.parse().expect("valid decimal"),
                stock,
            })
            .await
            .expect("seed product");
        product.id
    }
}

/// Read a response body as JSON.
pub async fn read_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("parse response body")
}

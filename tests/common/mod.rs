#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use rust_decimal_macros::dec;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;
use windowworks_api::{
    app_router,
    auth::{AuthConfig, AuthService, Role},
    config::AppConfig,
    db,
    entities::{client, job},
    events::{self, EventSender},
    handlers::AppServices,
    models::JobType,
    notifications::NotificationDispatcher,
    services::{
        clients::CreateClientRequest,
        jobs::CreateJobRequest,
        orders::{CreateOrderItem, CreateOrderRequest, OrderDetails},
    },
    AppState,
};

/// A user id paired with a bearer token for it.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub token: String,
}

/// Full application over a fresh in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    auth_service: Arc<AuthService>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::build(None).await
    }

    /// Same as [`TestApp::new`] with a caller-supplied notification dispatcher.
    pub async fn with_notifier(notifier: Arc<dyn NotificationDispatcher>) -> Self {
        Self::build(Some(notifier)).await
    }

    async fn build(notifier: Option<Arc<dyn NotificationDispatcher>>) -> Self {
        let cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "integration-test-secret-with-plenty-of-entropy-0123456789abcdef".to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "development".to_string(),
        );

        let pool = db::establish_connection_with_config(&db::DbConfig::from(&cfg))
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let services = match notifier {
            Some(notifier) => {
                AppServices::with_notifier(db_arc.clone(), &cfg, event_sender.clone(), notifier)
            }
            None => AppServices::new(db_arc.clone(), &cfg, event_sender.clone()),
        };
        let auth_service = Arc::new(AuthService::new(AuthConfig::from(&cfg)));

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            auth: auth_service.clone(),
            services,
        };

        Self {
            router: app_router(state.clone()),
            state,
            auth_service,
            _event_task: event_task,
        }
    }

    /// Mint a token for a new user holding `role`.
    pub fn user(&self, role: Role) -> TestUser {
        self.user_with_id(Uuid::new_v4(), role)
    }

    pub fn user_with_id(&self, id: Uuid, role: Role) -> TestUser {
        let token = self
            .auth_service
            .issue_token(id, Some(format!("{} {}", role, id)), &[role])
            .expect("issue test token");
        TestUser { id, token }
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Authenticated request as `user`.
    pub async fn request_as(
        &self,
        user: &TestUser,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        self.request(method, uri, body, Some(&user.token)).await
    }

    pub async fn seed_client(&self, user_id: Option<Uuid>) -> client::Model {
        self.state
            .services
            .clients
            .create_client(CreateClientRequest {
                user_id,
                name: "Anna Kowalska".to_string(),
                email: Some("anna@example.com".to_string()),
                phone: None,
                address: Some("Ul. Długa 5, Gdańsk".to_string()),
            })
            .await
            .expect("seed client")
    }

    pub async fn seed_order(&self, client_id: Uuid, actor: Uuid) -> OrderDetails {
        self.state
            .services
            .orders
            .create_order(
                CreateOrderRequest {
                    client_id,
                    manager_id: Some(actor),
                    total_amount: None,
                    currency: None,
                    estimated_completion_date: None,
                    notes: None,
                    crm_reference: None,
                    items: vec![CreateOrderItem {
                        product_type: "window".to_string(),
                        description: Some("Tilt and turn, triple glazed".to_string()),
                        width_mm: Some(1200),
                        height_mm: Some(1400),
                        quantity: 2,
                        unit_price: dec!(450),
                    }],
                },
                actor,
            )
            .await
            .expect("seed order")
    }

    pub async fn seed_job(
        &self,
        order_id: Uuid,
        job_type: JobType,
        worker_id: Option<Uuid>,
        actor: Uuid,
    ) -> job::Model {
        self.state
            .services
            .jobs
            .create_job(
                CreateJobRequest {
                    order_id,
                    job_type,
                    assigned_worker_id: worker_id,
                    scheduled_date: None,
                    location_address: Some("Ul. Długa 5, Gdańsk".to_string()),
                    location: None,
                    estimated_duration_minutes: Some(60),
                    notes: None,
                },
                actor,
            )
            .await
            .expect("seed job")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

//! Notification side effects never decide whether a state change sticks.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use mockall::mock;
use serde_json::json;
use windowworks_api::{
    auth::Role,
    entities::notification::NotificationType,
    models::{JobStatus, JobType, OrderStatus},
    notifications::{NotificationDispatcher, NotificationError, NotificationRequest},
};

mock! {
    pub Dispatcher {}

    #[async_trait]
    impl NotificationDispatcher for Dispatcher {
        async fn notify(&self, request: NotificationRequest) -> Result<(), NotificationError>;
    }
}

#[tokio::test]
async fn failed_delivery_does_not_undo_the_transition() {
    let mut dispatcher = MockDispatcher::new();
    dispatcher
        .expect_notify()
        .returning(|_| Err(NotificationError::Delivery("push gateway unavailable".into())));
    let app = TestApp::with_notifier(Arc::new(dispatcher)).await;

    let manager = app.user(Role::Manager);
    let measurer = app.user(Role::Measurer);
    let client_user = app.user(Role::Client);
    let client = app.seed_client(Some(client_user.id)).await;
    let order = app.seed_order(client.id, manager.id).await;
    let job = app
        .seed_job(order.order().id, JobType::Measuring, Some(measurer.id), manager.id)
        .await;

    for next in ["en_route", "arrived", "in_progress", "completed"] {
        let response = app
            .request_as(
                &measurer,
                Method::PUT,
                &format!("/api/v1/jobs/{}/status", job.id),
                Some(json!({ "status": next })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let job = app.state.services.jobs.get_job(job.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    let details = app.state.services.orders.get_order(order.order().id).await.unwrap();
    assert_eq!(details.order().status, OrderStatus::MeasuringCompleted);
}

#[tokio::test]
async fn derivation_notifies_the_client_user_once() {
    let app_client_user = uuid::Uuid::new_v4();
    let mut dispatcher = MockDispatcher::new();
    dispatcher
        .expect_notify()
        .withf(|request| request.notification_type == NotificationType::JobAssignment)
        .times(1)
        .returning(|_| Ok(()));
    dispatcher
        .expect_notify()
        .withf(move |request| {
            request.user_id == app_client_user
                && request.notification_type == NotificationType::StatusUpdate
                && request.related_order_id.is_some()
        })
        .times(1)
        .returning(|_| Ok(()));
    let app = TestApp::with_notifier(Arc::new(dispatcher)).await;

    let manager = app.user(Role::Manager);
    let installer = app.user(Role::Installer);
    let client = app.seed_client(Some(app_client_user)).await;
    let order = app.seed_order(client.id, manager.id).await;
    let job = app
        .seed_job(order.order().id, JobType::Installation, Some(installer.id), manager.id)
        .await;

    let jobs = &app.state.services.jobs;
    for next in [
        JobStatus::EnRoute,
        JobStatus::Arrived,
        JobStatus::InProgress,
        JobStatus::Completed,
    ] {
        jobs.transition(job.id, next, installer.id, None, None).await.unwrap();
    }
}

#[tokio::test]
async fn inbox_can_be_read_and_cleared() {
    let app = TestApp::new().await;
    let manager = app.user(Role::Manager);
    let installer = app.user(Role::Installer);
    let client = app.seed_client(None).await;
    let order = app.seed_order(client.id, manager.id).await;
    for job_type in [JobType::Delivery, JobType::Installation] {
        app.seed_job(order.order().id, job_type, Some(installer.id), manager.id)
            .await;
    }

    let response = app
        .request_as(&installer, Method::GET, "/api/v1/notifications?unread_only=true", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let inbox = response_json(response).await;
    assert_eq!(inbox["data"]["unread_count"], 2);
    let first_id = inbox["data"]["items"][0]["id"].as_str().expect("id").to_string();

    // Someone else's notification looks missing
    let response = app
        .request_as(&manager, Method::PUT, &format!("/api/v1/notifications/{}/read", first_id), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .request_as(&installer, Method::PUT, &format!("/api/v1/notifications/{}/read", first_id), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let read = response_json(response).await;
    assert_eq!(read["data"]["is_read"], true);

    let response = app
        .request_as(&installer, Method::PUT, "/api/v1/notifications/read-all", None)
        .await;
    let cleared = response_json(response).await;
    assert_eq!(cleared["data"]["updated"], 1);

    let page = app
        .state
        .services
        .notifications
        .list(installer.id, true, 1, 20)
        .await
        .unwrap();
    assert_eq!(page.unread_count, 0);
    assert!(page.page.items.is_empty());
}

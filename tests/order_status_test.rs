//! Direct order status management, derivation edge cases and the order
//! read surface (visibility, deletion, contracts).

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use serde_json::json;
use windowworks_api::{
    auth::Role,
    entities::order_status_update::StatusChangeSource,
    models::{JobStatus, JobType, OrderStatus},
};

#[tokio::test]
async fn management_may_set_any_status_and_it_is_audited() {
    let app = TestApp::new().await;
    let director = app.user(Role::Director);
    let client_user = app.user(Role::Client);
    let client = app.seed_client(Some(client_user.id)).await;
    let order = app.seed_order(client.id, director.id).await;
    let order_id = order.order().id;

    // Jumping straight to production is allowed for management
    let response = app
        .request_as(
            &director,
            Method::PUT,
            &format!("/api/v1/orders/{}/status", order_id),
            Some(json!({ "status": "in_production", "notes": "Client paid upfront" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], "in_production");
    assert_eq!(body["data"]["status_display"], "In Production");
    assert_eq!(body["data"]["progress_percentage"], 40);
    assert_eq!(body["data"]["notes"], "Client paid upfront");
    assert_eq!(body["data"]["version"], 2);

    let history = app.state.services.orders.order_history(order_id).await.unwrap();
    assert_eq!(history.len(), 2);
    let last = &history[1];
    assert_eq!(last.previous_status, Some(OrderStatus::Pending));
    assert_eq!(last.new_status, OrderStatus::InProduction);
    assert_eq!(last.source, StatusChangeSource::Manual);
    assert_eq!(last.changed_by, Some(director.id));

    let page = app
        .state
        .services
        .notifications
        .list(client_user.id, true, 1, 20)
        .await
        .unwrap();
    assert_eq!(page.unread_count, 1);
}

#[tokio::test]
async fn completing_an_order_stamps_the_completion_date() {
    let app = TestApp::new().await;
    let manager = app.user(Role::Manager);
    let client = app.seed_client(None).await;
    let order = app.seed_order(client.id, manager.id).await;

    let updated = app
        .state
        .services
        .orders
        .set_order_status(order.order().id, OrderStatus::Completed, None, manager.id)
        .await
        .unwrap();
    assert_eq!(updated.order.status, OrderStatus::Completed);
    assert!(updated.order.actual_completion_date.is_some());
    assert_eq!(updated.progress_percentage, 100);
}

#[tokio::test]
async fn non_management_cannot_set_order_status() {
    let app = TestApp::new().await;
    let manager = app.user(Role::Manager);
    let installer = app.user(Role::Installer);
    let client_user = app.user(Role::Client);
    let client = app.seed_client(Some(client_user.id)).await;
    let order = app.seed_order(client.id, manager.id).await;

    for user in [&installer, &client_user] {
        let response = app
            .request_as(
                user,
                Method::PUT,
                &format!("/api/v1/orders/{}/status", order.order().id),
                Some(json!({ "status": "confirmed" })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    let response = app
        .request_as(
            &manager,
            Method::PUT,
            &format!("/api/v1/orders/{}/status", order.order().id),
            Some(json!({ "status": "teleported" })),
        )
        .await;
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn terminal_orders_are_not_rederived_by_job_completion() {
    let app = TestApp::new().await;
    let manager = app.user(Role::Manager);
    let installer = app.user(Role::Installer);
    let client = app.seed_client(None).await;
    let order = app.seed_order(client.id, manager.id).await;
    let order_id = order.order().id;
    let job = app
        .seed_job(order_id, JobType::Installation, Some(installer.id), manager.id)
        .await;

    let jobs = &app.state.services.jobs;
    for next in [JobStatus::EnRoute, JobStatus::Arrived, JobStatus::InProgress] {
        jobs.transition(job.id, next, installer.id, None, None).await.unwrap();
    }

    app.state
        .services
        .orders
        .set_order_status(order_id, OrderStatus::Cancelled, None, manager.id)
        .await
        .unwrap();

    let completed = jobs
        .transition(job.id, JobStatus::Completed, installer.id, None, None)
        .await
        .unwrap();
    assert_eq!(completed.status, JobStatus::Completed);

    let details = app.state.services.orders.get_order(order_id).await.unwrap();
    assert_eq!(details.order().status, OrderStatus::Cancelled);
    let history = app.state.services.orders.order_history(order_id).await.unwrap();
    assert!(history.iter().all(|row| row.source != StatusChangeSource::Derived));
}

#[tokio::test]
async fn delivery_and_installation_completion_derive_their_statuses() {
    let app = TestApp::new().await;
    let manager = app.user(Role::Manager);
    let driver = app.user(Role::DeliveryPerson);
    let client = app.seed_client(None).await;
    let order = app.seed_order(client.id, manager.id).await;
    let order_id = order.order().id;
    let jobs = &app.state.services.jobs;

    let delivery = app
        .seed_job(order_id, JobType::Delivery, Some(driver.id), manager.id)
        .await;
    for next in [
        JobStatus::EnRoute,
        JobStatus::Arrived,
        JobStatus::InProgress,
        JobStatus::Completed,
    ] {
        jobs.transition(delivery.id, next, driver.id, None, None).await.unwrap();
    }
    let details = app.state.services.orders.get_order(order_id).await.unwrap();
    assert_eq!(details.order().status, OrderStatus::Delivered);

    let installation = app
        .seed_job(order_id, JobType::Installation, Some(driver.id), manager.id)
        .await;
    for next in [
        JobStatus::EnRoute,
        JobStatus::Arrived,
        JobStatus::InProgress,
        JobStatus::Completed,
    ] {
        jobs.transition(installation.id, next, manager.id, None, None)
            .await
            .unwrap();
    }
    let details = app.state.services.orders.get_order(order_id).await.unwrap();
    assert_eq!(details.order().status, OrderStatus::InstallationCompleted);
    assert_eq!(details.summary.progress_percentage, 95);
}

#[tokio::test]
async fn cancelling_a_job_leaves_the_order_alone() {
    let app = TestApp::new().await;
    let manager = app.user(Role::Manager);
    let measurer = app.user(Role::Measurer);
    let client = app.seed_client(None).await;
    let order = app.seed_order(client.id, manager.id).await;
    let job = app
        .seed_job(order.order().id, JobType::Measuring, Some(measurer.id), manager.id)
        .await;

    app.state
        .services
        .jobs
        .transition(job.id, JobStatus::Cancelled, manager.id, Some("Client away".into()), None)
        .await
        .unwrap();

    let details = app.state.services.orders.get_order(order.order().id).await.unwrap();
    assert_eq!(details.order().status, OrderStatus::Pending);
}

#[tokio::test]
async fn only_pending_orders_can_be_deleted() {
    let app = TestApp::new().await;
    let manager = app.user(Role::Manager);
    let client = app.seed_client(None).await;
    let kept = app.seed_order(client.id, manager.id).await;
    let doomed = app.seed_order(client.id, manager.id).await;

    app.state
        .services
        .orders
        .set_order_status(kept.order().id, OrderStatus::Confirmed, None, manager.id)
        .await
        .unwrap();

    let response = app
        .request_as(&manager, Method::DELETE, &format!("/api/v1/orders/{}", kept.order().id), None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request_as(&manager, Method::DELETE, &format!("/api/v1/orders/{}", doomed.order().id), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .request_as(&manager, Method::GET, &format!("/api/v1/orders/{}", doomed.order().id), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn clients_see_only_their_own_orders() {
    let app = TestApp::new().await;
    let manager = app.user(Role::Manager);
    let owner = app.user(Role::Client);
    let other = app.user(Role::Client);
    let owner_client = app.seed_client(Some(owner.id)).await;
    let other_client = app.seed_client(Some(other.id)).await;
    let order = app.seed_order(owner_client.id, manager.id).await;
    app.seed_order(other_client.id, manager.id).await;

    let response = app
        .request_as(&owner, Method::GET, &format!("/api/v1/orders/{}", order.order().id), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request_as(&other, Method::GET, &format!("/api/v1/orders/{}", order.order().id), None)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.request_as(&owner, Method::GET, "/api/v1/orders", None).await;
    let page = response_json(response).await;
    assert_eq!(page["data"]["total"], 1);
    assert_eq!(page["data"]["items"][0]["id"], json!(order.order().id));

    let response = app.request_as(&manager, Method::GET, "/api/v1/orders", None).await;
    let page = response_json(response).await;
    assert_eq!(page["data"]["total"], 2);

    // History is management only
    let response = app
        .request_as(&owner, Method::GET, &format!("/api/v1/orders/{}/history", order.order().id), None)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn order_creation_validates_items() {
    let app = TestApp::new().await;
    let manager = app.user(Role::Manager);
    let client = app.seed_client(None).await;

    let response = app
        .request_as(
            &manager,
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "client_id": client.id,
                "items": [
                    { "product_type": "window", "quantity": 1, "unit_price": "100" },
                    { "product_type": "door", "quantity": 0, "unit_price": "100" }
                ]
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["errors"][0], "items[1].quantity: Quantity must be at least 1");

    let response = app
        .request_as(
            &manager,
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "client_id": uuid::Uuid::new_v4(), "items": [] })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn oversized_item_amounts_are_a_bad_request() {
    let app = TestApp::new().await;
    let manager = app.user(Role::Manager);
    let client = app.seed_client(None).await;

    let response = app
        .request_as(
            &manager,
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "client_id": client.id,
                "items": [
                    { "product_type": "window", "quantity": 2000000000, "unit_price": "70000000000000000000" }
                ]
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Bad Request");
    assert!(body["message"].as_str().unwrap().contains("items[0]"));

    // Nothing was written.
    let response = app
        .request_as(&manager, Method::GET, "/api/v1/orders", None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn contracts_are_numbered_and_signed_once() {
    let app = TestApp::new().await;
    let manager = app.user(Role::Manager);
    let client = app.seed_client(None).await;
    let order = app.seed_order(client.id, manager.id).await;
    let order_id = order.order().id;

    let response = app
        .request_as(
            &manager,
            Method::POST,
            &format!("/api/v1/orders/{}/contracts", order_id),
            Some(json!({})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let contract = response_json(response).await;
    assert_eq!(contract["data"]["status"], "draft");
    assert!(contract["data"]["contract_number"]
        .as_str()
        .expect("contract number")
        .starts_with("CT-"));
    // Defaults to the order total: 2 x 450
    assert_eq!(
        contract["data"]["total_amount"].as_str().map(|s| s.parse::<f64>().ok()),
        Some(Some(900.0))
    );
    let contract_id = contract["data"]["id"].as_str().expect("contract id").to_string();

    let response = app
        .request_as(&manager, Method::PUT, &format!("/api/v1/contracts/{}/sign", contract_id), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let signed = response_json(response).await;
    assert_eq!(signed["data"]["status"], "signed");
    assert!(signed["data"]["signed_at"].is_string());

    let response = app
        .request_as(&manager, Method::PUT, &format!("/api/v1/contracts/{}/sign", contract_id), None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request_as(&manager, Method::GET, &format!("/api/v1/orders/{}/contracts", order_id), None)
        .await;
    let list = response_json(response).await;
    assert_eq!(list["data"].as_array().map(Vec::len), Some(1));
}

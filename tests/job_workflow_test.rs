//! End-to-end job lifecycle over HTTP: creation, the worker walking the job
//! through its statuses, order status derivation, the audit trail and the
//! notifications that fall out of it.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use serde_json::{json, Value};
use windowworks_api::{auth::Role, models::JobType};

async fn put_status(app: &TestApp, user: &common::TestUser, job_id: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .request_as(user, Method::PUT, &format!("/api/v1/jobs/{}/status", job_id), Some(body))
        .await;
    let status = response.status();
    (status, response_json(response).await)
}

#[tokio::test]
async fn measuring_job_walkthrough_derives_order_status() {
    let app = TestApp::new().await;
    let manager = app.user(Role::Manager);
    let measurer = app.user(Role::Measurer);
    let client_user = app.user(Role::Client);

    let response = app
        .request_as(
            &manager,
            Method::POST,
            "/api/v1/clients",
            Some(json!({
                "user_id": client_user.id,
                "name": "Jan Nowak",
                "email": "jan@example.com",
                "address": "Ul. Morska 12, Gdynia"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let client = response_json(response).await;
    let client_id = client["data"]["id"].as_str().expect("client id").to_string();

    let response = app
        .request_as(
            &manager,
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "client_id": client_id,
                "items": [{
                    "product_type": "window",
                    "width_mm": 900,
                    "height_mm": 1200,
                    "quantity": 3,
                    "unit_price": "250"
                }]
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let order = response_json(response).await;
    let order_id = order["data"]["id"].as_str().expect("order id").to_string();
    assert_eq!(order["data"]["status"], "pending");
    assert_eq!(order["data"]["progress_percentage"], 0);
    assert!(order["data"]["order_number"]
        .as_str()
        .expect("order number")
        .starts_with("WM-"));

    let response = app
        .request_as(
            &manager,
            Method::POST,
            "/api/v1/jobs",
            Some(json!({
                "order_id": order_id,
                "job_type": "measuring",
                "assigned_worker_id": measurer.id,
                "location_address": "Ul. Morska 12, Gdynia"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let job = response_json(response).await;
    let job_id = job["data"]["id"].as_str().expect("job id").to_string();
    assert_eq!(job["data"]["status"], "assigned");

    for next in ["en_route", "arrived"] {
        let (status, body) = put_status(&app, &measurer, &job_id, json!({ "status": next })).await;
        assert_eq!(status, StatusCode::OK, "moving to {next}: {body}");
        assert_eq!(body["data"]["status"], next);
    }

    let (status, body) = put_status(
        &app,
        &measurer,
        &job_id,
        json!({
            "status": "in_progress",
            "location_coordinates": { "latitude": 54.5189, "longitude": 18.5305 }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["actual_start_time"].is_string());

    let (status, body) = put_status(
        &app,
        &measurer,
        &job_id,
        json!({ "status": "completed", "notes": "All openings measured" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "completed");
    assert!(body["data"]["actual_end_time"].is_string());

    // Order follows the completed measuring job
    let response = app
        .request_as(&manager, Method::GET, &format!("/api/v1/orders/{}", order_id), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let order = response_json(response).await;
    assert_eq!(order["data"]["status"], "measuring_completed");
    assert_eq!(order["data"]["progress_percentage"], 20);
    assert_eq!(order["data"]["jobs"].as_array().map(Vec::len), Some(1));

    // Job audit trail, oldest first, starting with the creation record
    let response = app
        .request_as(&measurer, Method::GET, &format!("/api/v1/jobs/{}/history", job_id), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let history = response_json(response).await;
    let rows = history["data"].as_array().expect("history rows");
    let transitions: Vec<(Value, Value)> = rows
        .iter()
        .map(|row| (row["previous_status"].clone(), row["new_status"].clone()))
        .collect();
    assert_eq!(
        transitions,
        vec![
            (Value::Null, json!("assigned")),
            (json!("assigned"), json!("en_route")),
            (json!("en_route"), json!("arrived")),
            (json!("arrived"), json!("in_progress")),
            (json!("in_progress"), json!("completed")),
        ]
    );
    assert_eq!(rows[3]["latitude"], json!(54.5189));
    assert_eq!(rows[4]["notes"], "All openings measured");
    assert_eq!(rows[4]["changed_by"], json!(measurer.id));

    // Order audit trail records creation and the derived change
    let response = app
        .request_as(&manager, Method::GET, &format!("/api/v1/orders/{}/history", order_id), None)
        .await;
    let history = response_json(response).await;
    let rows = history["data"].as_array().expect("order history rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["source"], "created");
    assert_eq!(rows[1]["source"], "derived");
    assert_eq!(rows[1]["new_status"], "measuring_completed");
    assert_eq!(rows[1]["related_job_id"], job_id.as_str());
    assert!(rows[1]["changed_by"].is_null());

    // The client hears about the order, the worker about the assignment
    let response = app
        .request_as(&client_user, Method::GET, "/api/v1/notifications", None)
        .await;
    let inbox = response_json(response).await;
    assert_eq!(inbox["data"]["unread_count"], 1);
    assert_eq!(inbox["data"]["items"][0]["related_order_id"], order_id.as_str());

    let response = app
        .request_as(&measurer, Method::GET, "/api/v1/notifications", None)
        .await;
    let inbox = response_json(response).await;
    let items = inbox["data"]["items"].as_array().expect("worker notifications");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["notification_type"], "job_assignment");

    // Terminal jobs reject further moves and say so
    let (status, body) = put_status(&app, &measurer, &job_id, json!({ "status": "en_route" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["current_status"], "completed");
    assert_eq!(body["valid_next_statuses"], json!([]));
}

#[tokio::test]
async fn skipping_a_step_is_rejected_with_valid_options() {
    let app = TestApp::new().await;
    let manager = app.user(Role::Manager);
    let installer = app.user(Role::Installer);
    let client = app.seed_client(None).await;
    let order = app.seed_order(client.id, manager.id).await;
    let job = app
        .seed_job(order.order().id, JobType::Installation, Some(installer.id), manager.id)
        .await;

    let (status, body) = put_status(&app, &installer, &job.id.to_string(), json!({ "status": "arrived" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["current_status"], "assigned");
    assert_eq!(body["valid_next_statuses"], json!(["en_route", "cancelled"]));

    // Nothing was written
    let history = app.state.services.jobs.job_history(job.id).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn only_the_assigned_worker_or_management_may_move_a_job() {
    let app = TestApp::new().await;
    let manager = app.user(Role::Manager);
    let assigned = app.user(Role::DeliveryPerson);
    let other_worker = app.user(Role::DeliveryPerson);
    let client_user = app.user(Role::Client);
    let client = app.seed_client(Some(client_user.id)).await;
    let order = app.seed_order(client.id, manager.id).await;
    let job = app
        .seed_job(order.order().id, JobType::Delivery, Some(assigned.id), manager.id)
        .await;
    let job_id = job.id.to_string();

    let (status, _) = put_status(&app, &other_worker, &job_id, json!({ "status": "en_route" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = put_status(&app, &client_user, &job_id, json!({ "status": "en_route" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/jobs/{}/status", job_id),
            Some(json!({ "status": "en_route" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // A supervisor may step in; the assigned worker is told about it
    let supervisor = app.user(Role::Supervisor);
    let (status, _) = put_status(&app, &supervisor, &job_id, json!({ "status": "en_route" })).await;
    assert_eq!(status, StatusCode::OK);

    let page = app
        .state
        .services
        .notifications
        .list(assigned.id, false, 1, 20)
        .await
        .unwrap();
    // assignment + status update
    assert_eq!(page.page.total, 2);
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let app = TestApp::new().await;
    let manager = app.user(Role::Director);

    let (status, body) = put_status(
        &app,
        &manager,
        &uuid::Uuid::new_v4().to_string(),
        json!({ "status": "en_route" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not Found");
}

#[tokio::test]
async fn invalid_coordinates_fail_validation() {
    let app = TestApp::new().await;
    let manager = app.user(Role::Manager);
    let measurer = app.user(Role::Measurer);
    let client = app.seed_client(None).await;
    let order = app.seed_order(client.id, manager.id).await;
    let job = app
        .seed_job(order.order().id, JobType::Measuring, Some(measurer.id), manager.id)
        .await;

    let (status, body) = put_status(
        &app,
        &measurer,
        &job.id.to_string(),
        json!({
            "status": "en_route",
            "location_coordinates": { "latitude": 120.0, "longitude": 18.0 }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["errors"][0]
        .as_str()
        .expect("validation message")
        .starts_with("location_coordinates.latitude"));

    let current = app.state.services.jobs.get_job(job.id).await.unwrap();
    assert_eq!(current.status, windowworks_api::models::JobStatus::Assigned);
}

#[tokio::test]
async fn workers_only_list_their_own_jobs_and_clients_cannot_list() {
    let app = TestApp::new().await;
    let manager = app.user(Role::Manager);
    let installer = app.user(Role::Installer);
    let measurer = app.user(Role::Measurer);
    let client_user = app.user(Role::Client);
    let client = app.seed_client(Some(client_user.id)).await;
    let order = app.seed_order(client.id, manager.id).await;
    let order_id = order.order().id;

    app.seed_job(order_id, JobType::Measuring, Some(measurer.id), manager.id)
        .await;
    app.seed_job(order_id, JobType::Installation, Some(installer.id), manager.id)
        .await;

    let response = app
        .request_as(&installer, Method::GET, &format!("/api/v1/jobs?worker_id={}", measurer.id), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = response_json(response).await;
    let items = page["data"]["items"].as_array().expect("jobs");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["job_type"], "installation");

    let response = app.request_as(&manager, Method::GET, "/api/v1/jobs", None).await;
    let page = response_json(response).await;
    assert_eq!(page["data"]["total"], 2);

    let response = app.request_as(&client_user, Method::GET, "/api/v1/jobs", None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Workers see orders they have jobs on; strangers see nothing
    let response = app.request_as(&installer, Method::GET, "/api/v1/orders", None).await;
    let page = response_json(response).await;
    assert_eq!(page["data"]["total"], 1);

    let stranger = app.user(Role::Installer);
    let response = app.request_as(&stranger, Method::GET, "/api/v1/orders", None).await;
    let page = response_json(response).await;
    assert_eq!(page["data"]["total"], 0);
}

#[tokio::test]
async fn reassigning_and_deleting_jobs() {
    let app = TestApp::new().await;
    let manager = app.user(Role::Manager);
    let first = app.user(Role::Installer);
    let second = app.user(Role::Installer);
    let client = app.seed_client(None).await;
    let order = app.seed_order(client.id, manager.id).await;
    let job = app
        .seed_job(order.order().id, JobType::Installation, Some(first.id), manager.id)
        .await;

    let response = app
        .request_as(
            &manager,
            Method::PUT,
            &format!("/api/v1/jobs/{}/assign", job.id),
            Some(json!({ "worker_id": second.id })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["assigned_worker_id"], json!(second.id));

    // Workers cannot reassign
    let response = app
        .request_as(
            &second,
            Method::PUT,
            &format!("/api/v1/jobs/{}/assign", job.id),
            Some(json!({ "worker_id": first.id })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let (status, _) = put_status(&app, &second, &job.id.to_string(), json!({ "status": "en_route" })).await;
    assert_eq!(status, StatusCode::OK);

    // Started jobs cannot be deleted
    let response = app
        .request_as(&manager, Method::DELETE, &format!("/api/v1/jobs/{}", job.id), None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let fresh = app
        .seed_job(order.order().id, JobType::Delivery, None, manager.id)
        .await;
    let response = app
        .request_as(&manager, Method::DELETE, &format!("/api/v1/jobs/{}", fresh.id), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

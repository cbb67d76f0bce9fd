use axum::{routing::get, Json, Router};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "WindowWorks API",
        version = "1.0.0",
        description = r#"
# WindowWorks API

Backend for a window manufacturing business: clients, orders, field jobs
(measuring, delivery, installation), contracts and in-app notifications.

## Authentication

Every `/api/v1` endpoint requires a bearer token:

```
Authorization: Bearer <your-jwt-token>
```

## Workflow

Jobs move `assigned → en_route → arrived → in_progress → completed`, with
`cancelled` reachable from any non-terminal state. Completing a job updates
the order status (measuring → measuring_completed, delivery → delivered,
installation → installation_completed). Rejected job transitions answer 400
with `current_status` and `valid_next_statuses`.

## Pagination

List endpoints accept `page` (default 1) and `limit` (default 20, max 100).
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Jobs", description = "Worker jobs and their status workflow"),
        (name = "Orders", description = "Order management and status override"),
        (name = "Contracts", description = "Contract records"),
        (name = "Clients", description = "Client records"),
        (name = "Notifications", description = "In-app notification inbox"),
        (name = "System", description = "Health and status")
    ),
    paths(
        // Jobs
        crate::handlers::jobs::update_job_status,
        crate::handlers::jobs::create_job,
        crate::handlers::jobs::list_jobs,
        crate::handlers::jobs::get_job,
        crate::handlers::jobs::get_job_history,
        crate::handlers::jobs::assign_worker,
        crate::handlers::jobs::delete_job,

        // Orders and contracts
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::create_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::get_order_history,
        crate::handlers::orders::delete_order,
        crate::handlers::orders::create_contract,
        crate::handlers::orders::list_contracts,
        crate::handlers::orders::sign_contract,

        // Clients
        crate::handlers::clients::create_client,
        crate::handlers::clients::list_clients,
        crate::handlers::clients::get_client,

        // Notifications
        crate::handlers::notifications::list_notifications,
        crate::handlers::notifications::mark_notification_read,
        crate::handlers::notifications::mark_all_notifications_read,

        // System
        crate::handlers::health::health_check,
        crate::handlers::health::api_status,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::PaginatedResponse<serde_json::Value>,
            crate::ListQuery,

            // Status enums
            crate::models::JobStatus,
            crate::models::JobType,
            crate::models::OrderStatus,
            crate::auth::Role,

            // Error types
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDocV1;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDocV1::openapi())
}

/// Serves the document at `/api-docs/openapi.json`.
pub fn openapi_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/api-docs/openapi.json", get(openapi_json))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_workflow_paths_and_bearer_scheme() {
        let json = serde_json::to_string(&ApiDocV1::openapi()).unwrap();
        assert!(json.contains("WindowWorks API"));
        assert!(json.contains("/api/v1/jobs/{job_id}/status"));
        assert!(json.contains("/api/v1/orders/{order_id}/contracts"));
        assert!(json.contains("\"Bearer\""));
    }
}

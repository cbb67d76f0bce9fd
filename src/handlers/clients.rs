use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use super::common::validation_failed;
use crate::{
    auth::{AccessPolicy, AuthUser},
    entities::client,
    errors::ServiceError,
    services::clients::CreateClientRequest,
    ApiResponse, AppState, ListQuery, PaginatedResponse,
};

/// Create a client
#[utoipa::path(
    post,
    path = "/api/v1/clients",
    summary = "Create client",
    request_body = CreateClientRequest,
    responses(
        (status = 201, description = "Client created", body = ApiResponse<client::Model>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 403, description = "Management role required", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Clients"
)]
pub async fn create_client(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<CreateClientRequest>,
) -> Result<(StatusCode, Json<ApiResponse<client::Model>>), ServiceError> {
    AccessPolicy::require_management(&auth_user)?;
    if let Err(errors) = request.validate() {
        return Ok(validation_failed(&errors));
    }

    let client = state.services.clients.create_client(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(client))))
}

/// List clients
#[utoipa::path(
    get,
    path = "/api/v1/clients",
    summary = "List clients",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u64>, Query, description = "Items per page (default: 20)"),
        ("search" = Option<String>, Query, description = "Matches name or email"),
    ),
    responses(
        (status = 200, description = "Clients retrieved", body = ApiResponse<PaginatedResponse<client::Model>>),
        (status = 403, description = "Management role required", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Clients"
)]
pub async fn list_clients(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<client::Model>>>, ServiceError> {
    AccessPolicy::require_management(&auth_user)?;
    let page = state
        .services
        .clients
        .list_clients(query.search, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

/// Get a client
#[utoipa::path(
    get,
    path = "/api/v1/clients/{client_id}",
    summary = "Get client",
    params(("client_id" = Uuid, Path, description = "Client ID")),
    responses(
        (status = 200, description = "Client retrieved", body = ApiResponse<client::Model>),
        (status = 403, description = "Management role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Client not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Clients"
)]
pub async fn get_client(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(client_id): Path<Uuid>,
) -> Result<Json<ApiResponse<client::Model>>, ServiceError> {
    AccessPolicy::require_management(&auth_user)?;
    let client = state.services.clients.get_client(client_id).await?;
    Ok(Json(ApiResponse::success(client)))
}

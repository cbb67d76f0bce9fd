use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::common::validation_failed;
use crate::{
    auth::{AccessPolicy, AuthUser},
    entities::{contract, order_status_update},
    errors::ServiceError,
    models::OrderStatus,
    services::{
        contracts::CreateContractRequest,
        orders::{CreateOrderRequest, OrderDetails, OrderFilter, OrderScope, OrderSummary},
    },
    ApiResponse, AppState, PaginatedResponse,
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct OrderListQuery {
    #[serde(default = "crate::default_page")]
    pub page: u64,
    #[serde(default = "crate::default_limit")]
    pub limit: u64,
    pub status: Option<OrderStatus>,
    pub client_id: Option<Uuid>,
    /// Substring of the order number.
    pub search: Option<String>,
}

/// Set an order's status directly
#[utoipa::path(
    put,
    path = "/api/v1/orders/{order_id}/status",
    summary = "Update order status",
    description = "Management override. Any status may be set from any status; the change is audited and the client is notified.",
    params(("order_id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Order status updated", body = ApiResponse<OrderSummary>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 403, description = "Management role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(order_id): Path<Uuid>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderSummary>>), ServiceError> {
    AccessPolicy::require_management(&auth_user)?;
    if let Err(errors) = request.validate() {
        return Ok(validation_failed(&errors));
    }

    let order = state
        .services
        .orders
        .set_order_status(order_id, request.status, request.notes, auth_user.user_id)
        .await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(order))))
}

/// Create an order with its items
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Create order",
    description = "Creates a pending order numbered WM-<year>-<seq>.",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<OrderDetails>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 403, description = "Management role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Client not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderDetails>>), ServiceError> {
    AccessPolicy::require_management(&auth_user)?;
    if let Err(errors) = request.validate() {
        return Ok(validation_failed(&errors));
    }

    let order = state
        .services
        .orders
        .create_order(request, auth_user.user_id)
        .await?;
    info!(order_number = %order.order().order_number, "Order created via API");
    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

/// List orders visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List orders",
    description = "Management sees all orders, clients their own, workers those they have jobs on.",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Orders retrieved", body = ApiResponse<PaginatedResponse<OrderSummary>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<OrderSummary>>>, ServiceError> {
    let filter = OrderFilter {
        status: query.status,
        client_id: query.client_id,
        search: query.search,
    };
    let page = state
        .services
        .orders
        .list_orders(OrderScope::for_user(&auth_user), filter, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

/// Get an order with client, items, jobs and progress
#[utoipa::path(
    get,
    path = "/api/v1/orders/{order_id}",
    summary = "Get order",
    params(("order_id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order retrieved", body = ApiResponse<OrderDetails>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderDetails>>, ServiceError> {
    let details = state.services.orders.get_order(order_id).await?;
    let worker_jobs = details.job_ids_for_worker(auth_user.user_id);
    AccessPolicy::authorize_order_view(
        &auth_user,
        details.order(),
        details.client.as_ref(),
        &worker_jobs,
    )?;
    Ok(Json(ApiResponse::success(details)))
}

/// Order status audit trail
#[utoipa::path(
    get,
    path = "/api/v1/orders/{order_id}/history",
    summary = "Order status history",
    params(("order_id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "History retrieved", body = ApiResponse<Vec<order_status_update::Model>>),
        (status = 403, description = "Management role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn get_order_history(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<order_status_update::Model>>>, ServiceError> {
    AccessPolicy::require_management(&auth_user)?;
    let history = state.services.orders.order_history(order_id).await?;
    Ok(Json(ApiResponse::success(history)))
}

/// Delete a pending order
#[utoipa::path(
    delete,
    path = "/api/v1/orders/{order_id}",
    summary = "Delete order",
    params(("order_id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 400, description = "Order is no longer pending", body = crate::errors::ErrorResponse),
        (status = 403, description = "Management role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    AccessPolicy::require_management(&auth_user)?;
    state.services.orders.delete_order(order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Draft a contract for an order
#[utoipa::path(
    post,
    path = "/api/v1/orders/{order_id}/contracts",
    summary = "Create contract",
    description = "Drafts a contract numbered CT-<year>-<seq>; the amount defaults to the order total.",
    params(("order_id" = Uuid, Path, description = "Order ID")),
    request_body = CreateContractRequest,
    responses(
        (status = 201, description = "Contract created", body = ApiResponse<contract::Model>),
        (status = 403, description = "Management role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Contracts"
)]
pub async fn create_contract(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(order_id): Path<Uuid>,
    Json(request): Json<CreateContractRequest>,
) -> Result<(StatusCode, Json<ApiResponse<contract::Model>>), ServiceError> {
    AccessPolicy::require_management(&auth_user)?;
    if let Err(errors) = request.validate() {
        return Ok(validation_failed(&errors));
    }

    let contract = state
        .services
        .contracts
        .create_contract(order_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(contract))))
}

/// Contracts of an order
#[utoipa::path(
    get,
    path = "/api/v1/orders/{order_id}/contracts",
    summary = "List contracts",
    params(("order_id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Contracts retrieved", body = ApiResponse<Vec<contract::Model>>),
        (status = 403, description = "Management role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Contracts"
)]
pub async fn list_contracts(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<contract::Model>>>, ServiceError> {
    AccessPolicy::require_management(&auth_user)?;
    let contracts = state.services.contracts.list_contracts(order_id).await?;
    Ok(Json(ApiResponse::success(contracts)))
}

/// Mark a draft contract as signed
#[utoipa::path(
    put,
    path = "/api/v1/contracts/{contract_id}/sign",
    summary = "Sign contract",
    params(("contract_id" = Uuid, Path, description = "Contract ID")),
    responses(
        (status = 200, description = "Contract signed", body = ApiResponse<contract::Model>),
        (status = 400, description = "Contract is not a draft", body = crate::errors::ErrorResponse),
        (status = 403, description = "Management role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Contract not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Contracts"
)]
pub async fn sign_contract(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(contract_id): Path<Uuid>,
) -> Result<Json<ApiResponse<contract::Model>>, ServiceError> {
    AccessPolicy::require_management(&auth_user)?;
    let contract = state.services.contracts.sign_contract(contract_id).await?;
    Ok(Json(ApiResponse::success(contract)))
}

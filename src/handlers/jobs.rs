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
    entities::{job, job_status_update},
    errors::ServiceError,
    models::{JobStatus, JobType},
    services::jobs::{Coordinates, CreateJobRequest, JobFilter},
    ApiResponse, AppState, PaginatedResponse,
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateJobStatusRequest {
    pub status: JobStatus,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[validate]
    pub location_coordinates: Option<Coordinates>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AssignWorkerRequest {
    pub worker_id: Uuid,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct JobListQuery {
    #[serde(default = "crate::default_page")]
    pub page: u64,
    #[serde(default = "crate::default_limit")]
    pub limit: u64,
    pub status: Option<JobStatus>,
    pub job_type: Option<JobType>,
    pub order_id: Option<Uuid>,
    /// Ignored for workers, who only see their own jobs.
    pub worker_id: Option<Uuid>,
}

/// Change a job's status
#[utoipa::path(
    put,
    path = "/api/v1/jobs/{job_id}/status",
    summary = "Update job status",
    description = "Move a job along its lifecycle. Allowed only for the assigned worker or management.",
    params(("job_id" = Uuid, Path, description = "Job ID")),
    request_body = UpdateJobStatusRequest,
    responses(
        (status = 200, description = "Job status updated", body = ApiResponse<job::Model>),
        (status = 400, description = "Invalid transition; body lists current_status and valid_next_statuses", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not the assigned worker", body = crate::errors::ErrorResponse),
        (status = 404, description = "Job not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Jobs"
)]
pub async fn update_job_status(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(job_id): Path<Uuid>,
    Json(request): Json<UpdateJobStatusRequest>,
) -> Result<(StatusCode, Json<ApiResponse<job::Model>>), ServiceError> {
    if let Err(errors) = request.validate() {
        return Ok(validation_failed(&errors));
    }

    // Authorization is checked against the locked row inside the transaction.
    let updated = state
        .services
        .jobs
        .transition_as(
            &auth_user,
            job_id,
            request.status,
            request.notes,
            request.location_coordinates,
        )
        .await?;

    Ok((StatusCode::OK, Json(ApiResponse::success(updated))))
}

/// Create a job on an order
#[utoipa::path(
    post,
    path = "/api/v1/jobs",
    summary = "Create job",
    request_body = CreateJobRequest,
    responses(
        (status = 201, description = "Job created", body = ApiResponse<job::Model>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 403, description = "Management role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Jobs"
)]
pub async fn create_job(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<ApiResponse<job::Model>>), ServiceError> {
    AccessPolicy::require_management(&auth_user)?;
    if let Err(errors) = request.validate() {
        return Ok(validation_failed(&errors));
    }

    let job = state.services.jobs.create_job(request, auth_user.user_id).await?;
    info!(job_id = %job.id, created_by = %auth_user.user_id, "Job created via API");
    Ok((StatusCode::CREATED, Json(ApiResponse::success(job))))
}

/// List jobs
#[utoipa::path(
    get,
    path = "/api/v1/jobs",
    summary = "List jobs",
    description = "Management sees every job; workers only their own.",
    params(JobListQuery),
    responses(
        (status = 200, description = "Jobs retrieved", body = ApiResponse<PaginatedResponse<job::Model>>),
        (status = 403, description = "Clients cannot list jobs", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Jobs"
)]
pub async fn list_jobs(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<JobListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<job::Model>>>, ServiceError> {
    AccessPolicy::authorize_job_listing(&auth_user)?;

    let mut filter = JobFilter {
        status: query.status,
        job_type: query.job_type,
        order_id: query.order_id,
        worker_id: query.worker_id,
    };
    if !auth_user.is_management() {
        filter = filter.restrict_to_worker(auth_user.user_id);
    }

    let page = state
        .services
        .jobs
        .list_jobs(filter, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

/// Get a job
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{job_id}",
    summary = "Get job",
    params(("job_id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job retrieved", body = ApiResponse<job::Model>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Job not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Jobs"
)]
pub async fn get_job(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(job_id): Path<Uuid>,
) -> Result<Json<ApiResponse<job::Model>>, ServiceError> {
    let job = state.services.jobs.get_job(job_id).await?;
    AccessPolicy::authorize_job_view(&auth_user, &job)?;
    Ok(Json(ApiResponse::success(job)))
}

/// Job status audit trail
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{job_id}/history",
    summary = "Job status history",
    description = "Audit rows oldest first, starting with the creation record.",
    params(("job_id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "History retrieved", body = ApiResponse<Vec<job_status_update::Model>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Job not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Jobs"
)]
pub async fn get_job_history(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(job_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<job_status_update::Model>>>, ServiceError> {
    let jobs = &state.services.jobs;
    let job = jobs.get_job(job_id).await?;
    AccessPolicy::authorize_job_view(&auth_user, &job)?;
    let history = jobs.job_history(job_id).await?;
    Ok(Json(ApiResponse::success(history)))
}

/// Assign or reassign the worker
#[utoipa::path(
    put,
    path = "/api/v1/jobs/{job_id}/assign",
    summary = "Assign worker",
    params(("job_id" = Uuid, Path, description = "Job ID")),
    request_body = AssignWorkerRequest,
    responses(
        (status = 200, description = "Worker assigned", body = ApiResponse<job::Model>),
        (status = 400, description = "Job is completed or cancelled", body = crate::errors::ErrorResponse),
        (status = 403, description = "Management role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Job not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Jobs"
)]
pub async fn assign_worker(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(job_id): Path<Uuid>,
    Json(request): Json<AssignWorkerRequest>,
) -> Result<Json<ApiResponse<job::Model>>, ServiceError> {
    AccessPolicy::require_management(&auth_user)?;
    let job = state
        .services
        .jobs
        .assign_worker(job_id, request.worker_id)
        .await?;
    Ok(Json(ApiResponse::success(job)))
}

/// Delete a job that has not started
#[utoipa::path(
    delete,
    path = "/api/v1/jobs/{job_id}",
    summary = "Delete job",
    params(("job_id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 204, description = "Job deleted"),
        (status = 400, description = "Job is past the assigned status", body = crate::errors::ErrorResponse),
        (status = 403, description = "Management role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Job not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Jobs"
)]
pub async fn delete_job(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(job_id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    AccessPolicy::require_management(&auth_user)?;
    state.services.jobs.delete_job(job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

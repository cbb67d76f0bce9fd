//! Job lifecycle: creation, assignment and the status transition core.
//!
//! A transition validates against [`JobStatus::valid_next_statuses`], writes
//! the job and its audit row, and when a job completes derives the owning
//! order's status, all in one transaction. Notifications go out after commit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    DbBackend, PaginatorTrait, QueryFilter, QueryOrder, Select, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{AccessPolicy, AuthUser},
    db::for_update,
    entities::{
        job::{self, ActiveModel as JobActiveModel, Entity as JobEntity, Model as JobModel},
        job_status_update,
        notification::NotificationType,
        order::{Entity as OrderEntity, Model as OrderModel},
        order_status_update::StatusChangeSource,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    models::{derive_order_status_on_job_completion, JobStatus, JobType, OrderStatus},
    notifications::{dispatch_all, NotificationDispatcher, NotificationRequest},
    services::orders::{
        apply_order_status, client_user_id, order_for_update, order_status_notification,
        OrderStatusChange,
    },
    PaginatedResponse,
};

/// GPS position reported with a status change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct Coordinates {
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be within [-90, 90]"))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be within [-180, 180]"))]
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateJobRequest {
    pub order_id: Uuid,
    pub job_type: JobType,
    pub assigned_worker_id: Option<Uuid>,
    pub scheduled_date: Option<DateTime<Utc>>,
    #[validate(length(max = 500))]
    pub location_address: Option<String>,
    #[validate]
    pub location: Option<Coordinates>,
    #[validate(range(min = 1, max = 10080, message = "Duration must be between 1 minute and 7 days"))]
    pub estimated_duration_minutes: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub job_type: Option<JobType>,
    pub order_id: Option<Uuid>,
    pub worker_id: Option<Uuid>,
}

impl JobFilter {
    /// Pins the filter to one worker, overriding any requested worker.
    pub fn restrict_to_worker(mut self, worker_id: Uuid) -> Self {
        self.worker_id = Some(worker_id);
        self
    }
}

/// Result of a derived order change inside a transition.
struct DerivedOrderChange {
    order: OrderModel,
    old_status: OrderStatus,
    client_user: Option<Uuid>,
}

/// Selects the job row for a write; see [`for_update`].
fn job_for_update(job_id: Uuid, backend: DbBackend) -> Select<JobEntity> {
    for_update(JobEntity::find_by_id(job_id), backend)
}

#[derive(Clone)]
pub struct JobService {
    db: Arc<DatabaseConnection>,
    notifier: Arc<dyn NotificationDispatcher>,
    event_sender: Option<Arc<EventSender>>,
}

impl JobService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        notifier: Arc<dyn NotificationDispatcher>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db,
            notifier,
            event_sender,
        }
    }

    async fn send_event(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            sender.send_or_log(event).await;
        }
    }

    async fn find_job(&self, job_id: Uuid) -> Result<JobModel, ServiceError> {
        JobEntity::find_by_id(job_id)
            .one(&*self.db)
            .await
            .map_err(|e| {
                error!(%job_id, error = %e, "Failed to fetch job");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::not_found("Job", job_id))
    }

    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn get_job(&self, job_id: Uuid) -> Result<JobModel, ServiceError> {
        self.find_job(job_id).await
    }

    /// Moves a job to `requested` on behalf of `user`, who must be management
    /// or the assigned worker as of the locked read.
    #[instrument(skip(self, user, notes), fields(job_id = %job_id, requested = %requested, actor = %user.user_id))]
    pub async fn transition_as(
        &self,
        user: &AuthUser,
        job_id: Uuid,
        requested: JobStatus,
        notes: Option<String>,
        location: Option<Coordinates>,
    ) -> Result<JobModel, ServiceError> {
        self.apply_transition(job_id, requested, user.user_id, Some(user), notes, location)
            .await
    }

    /// Moves a job to `requested`. Authorization is the caller's concern.
    ///
    /// Fails with [`ServiceError::InvalidTransition`] when `requested` is not
    /// reachable from the current status; nothing is written in that case.
    #[instrument(skip(self, notes), fields(job_id = %job_id, requested = %requested, actor = %actor))]
    pub async fn transition(
        &self,
        job_id: Uuid,
        requested: JobStatus,
        actor: Uuid,
        notes: Option<String>,
        location: Option<Coordinates>,
    ) -> Result<JobModel, ServiceError> {
        self.apply_transition(job_id, requested, actor, None, notes, location)
            .await
    }

    async fn apply_transition(
        &self,
        job_id: Uuid,
        requested: JobStatus,
        actor: Uuid,
        authorize: Option<&AuthUser>,
        notes: Option<String>,
        location: Option<Coordinates>,
    ) -> Result<JobModel, ServiceError> {
        if let Some(coords) = &location {
            coords.validate()?;
        }

        let db = &*self.db;
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to begin transaction");
            ServiceError::DatabaseError(e)
        })?;
        let backend = txn.get_database_backend();

        let job = job_for_update(job_id, backend)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch job for transition");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::not_found("Job", job_id))?;
        if let Some(user) = authorize {
            AccessPolicy::authorize_job_status_change(user, &job)?;
        }

        let old_status = job.status;
        if let Err(rejection) = old_status.validate_transition(requested) {
            warn!(from = %old_status, to = %requested, "Rejected job status transition");
            counter!("windowworks_jobs.transition.rejected", 1);
            return Err(rejection.into());
        }

        let order_id = job.order_id;
        let job_type = job.job_type;
        let now = Utc::now();

        let mut active: JobActiveModel = job.into();
        active.status = Set(requested);
        if requested == JobStatus::InProgress && active.actual_start_time.as_ref().is_none() {
            active.actual_start_time = Set(Some(now));
        }
        if requested == JobStatus::Completed {
            active.actual_end_time = Set(Some(now));
        }
        let current_version = *active.version.as_ref();
        active.version = Set(current_version + 1);

        let updated = active.update(&txn).await.map_err(|e| {
            error!(error = %e, "Failed to update job status");
            ServiceError::DatabaseError(e)
        })?;

        job_status_update::ActiveModel {
            id: Set(Uuid::new_v4()),
            job_id: Set(job_id),
            previous_status: Set(Some(old_status)),
            new_status: Set(requested),
            changed_by: Set(actor),
            notes: Set(notes),
            latitude: Set(location.map(|c| c.latitude)),
            longitude: Set(location.map(|c| c.longitude)),
            created_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to record job status update");
            ServiceError::DatabaseError(e)
        })?;

        let derived = match derive_order_status_on_job_completion(job_type, requested) {
            Some(target) => self.derive_order_status(&txn, order_id, job_id, target, backend).await?,
            None => None,
        };

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit job transition");
            ServiceError::DatabaseError(e)
        })?;

        info!(from = %old_status, to = %requested, "Job status updated");
        counter!("windowworks_jobs.transition.applied", 1, "to" => requested.as_ref().to_string());

        let mut outgoing = Vec::new();
        if let Some(worker) = updated.assigned_worker_id.filter(|w| *w != actor) {
            outgoing.push(
                NotificationRequest::new(
                    worker,
                    NotificationType::StatusUpdate,
                    "Job status updated",
                    format!(
                        "{} job moved from {} to {}",
                        job_type.display_name(),
                        old_status.display_name(),
                        requested.display_name()
                    ),
                )
                .for_job(job_id)
                .for_order(order_id),
            );
        }
        if let Some(change) = &derived {
            if let Some(user_id) = change.client_user {
                outgoing.push(order_status_notification(user_id, &change.order).for_job(job_id));
            }
        }
        dispatch_all(self.notifier.as_ref(), outgoing).await;

        self.send_event(Event::JobStatusChanged {
            job_id,
            order_id,
            old_status,
            new_status: requested,
            changed_by: actor,
        })
        .await;
        if let Some(change) = derived {
            self.send_event(Event::OrderStatusDerived {
                order_id,
                job_id,
                old_status: change.old_status,
                new_status: change.order.status,
            })
            .await;
        }

        Ok(updated)
    }

    /// Writes the derived order status unless the order is terminal or
    /// already there.
    async fn derive_order_status<C>(
        &self,
        conn: &C,
        order_id: Uuid,
        job_id: Uuid,
        target: OrderStatus,
        backend: DbBackend,
    ) -> Result<Option<DerivedOrderChange>, ServiceError>
    where
        C: ConnectionTrait,
    {
        let order = order_for_update(order_id, backend)
            .one(conn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::not_found("Order", order_id))?;

        let old_status = order.status;
        if old_status.is_terminal() {
            warn!(%order_id, status = %old_status, derived = %target, "Skipping order status derivation on terminal order");
            return Ok(None);
        }
        if old_status == target {
            debug!(%order_id, status = %old_status, "Order already at derived status");
            return Ok(None);
        }

        let client_id = order.client_id;
        let order = apply_order_status(
            conn,
            order,
            target,
            OrderStatusChange {
                changed_by: None,
                source: StatusChangeSource::Derived,
                related_job_id: Some(job_id),
                notes: None,
            },
        )
        .await?;
        let client_user = client_user_id(conn, client_id).await?;

        info!(%order_id, from = %old_status, to = %target, "Order status derived from job completion");
        counter!("windowworks_orders.status_changed", 1, "source" => "derived");

        Ok(Some(DerivedOrderChange {
            order,
            old_status,
            client_user,
        }))
    }

    /// Creates a job in `assigned` with its creation audit row.
    #[instrument(skip(self, request), fields(order_id = %request.order_id, job_type = %request.job_type))]
    pub async fn create_job(&self, request: CreateJobRequest, actor: Uuid) -> Result<JobModel, ServiceError> {
        request.validate()?;

        let db = &*self.db;
        let order = OrderEntity::find_by_id(request.order_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::not_found("Order", request.order_id))?;

        let now = Utc::now();
        let job_id = Uuid::new_v4();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to begin transaction");
            ServiceError::DatabaseError(e)
        })?;

        let job = JobActiveModel {
            id: Set(job_id),
            order_id: Set(order.id),
            job_type: Set(request.job_type),
            status: Set(JobStatus::Assigned),
            assigned_worker_id: Set(request.assigned_worker_id),
            scheduled_date: Set(request.scheduled_date),
            location_address: Set(request.location_address),
            latitude: Set(request.location.map(|c| c.latitude)),
            longitude: Set(request.location.map(|c| c.longitude)),
            estimated_duration_minutes: Set(request.estimated_duration_minutes),
            actual_start_time: Set(None),
            actual_end_time: Set(None),
            notes: Set(request.notes),
            version: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create job");
            ServiceError::DatabaseError(e)
        })?;

        job_status_update::ActiveModel {
            id: Set(Uuid::new_v4()),
            job_id: Set(job_id),
            previous_status: Set(None),
            new_status: Set(JobStatus::Assigned),
            changed_by: Set(actor),
            notes: Set(Some("Job created".to_string())),
            latitude: Set(None),
            longitude: Set(None),
            created_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to record job creation");
            ServiceError::DatabaseError(e)
        })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit job creation");
            ServiceError::DatabaseError(e)
        })?;

        info!(%job_id, "Job created");
        counter!("windowworks_jobs.created", 1);

        if let Some(worker) = job.assigned_worker_id {
            dispatch_all(
                self.notifier.as_ref(),
                vec![assignment_notification(worker, &job, &order.order_number)],
            )
            .await;
            self.send_event(Event::JobAssigned {
                job_id,
                worker_id: worker,
            })
            .await;
        }
        self.send_event(Event::JobCreated {
            job_id,
            order_id: order.id,
            job_type: job.job_type,
        })
        .await;

        Ok(job)
    }

    /// Reassigns a non-terminal job. Status is unchanged, so no audit row.
    /// The job row is locked so a concurrent completion cannot slip in
    /// between the terminal check and the write.
    #[instrument(skip(self), fields(job_id = %job_id, worker_id = %worker_id))]
    pub async fn assign_worker(&self, job_id: Uuid, worker_id: Uuid) -> Result<JobModel, ServiceError> {
        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to begin transaction");
            ServiceError::DatabaseError(e)
        })?;

        let job = job_for_update(job_id, txn.get_database_backend())
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch job for reassignment");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::not_found("Job", job_id))?;
        if job.status.is_terminal() {
            return Err(ServiceError::InvalidOperation(format!(
                "Cannot reassign a {} job",
                job.status
            )));
        }

        let mut active: JobActiveModel = job.into();
        active.assigned_worker_id = Set(Some(worker_id));
        let current_version = *active.version.as_ref();
        active.version = Set(current_version + 1);

        let updated = active.update(&txn).await.map_err(|e| {
            error!(error = %e, "Failed to assign worker");
            ServiceError::DatabaseError(e)
        })?;
        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit worker assignment");
            ServiceError::DatabaseError(e)
        })?;

        info!("Worker assigned to job");

        let order_number = OrderEntity::find_by_id(updated.order_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .map(|o| o.order_number)
            .unwrap_or_default();
        dispatch_all(
            self.notifier.as_ref(),
            vec![assignment_notification(worker_id, &updated, &order_number)],
        )
        .await;
        self.send_event(Event::JobAssigned { job_id, worker_id }).await;

        Ok(updated)
    }

    /// Only jobs still in `assigned` may be deleted.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn delete_job(&self, job_id: Uuid) -> Result<(), ServiceError> {
        let job = self.find_job(job_id).await?;
        if job.status != JobStatus::Assigned {
            return Err(ServiceError::InvalidOperation(format!(
                "Only assigned jobs can be deleted (job is {})",
                job.status
            )));
        }

        job.delete(&*self.db).await.map_err(|e| {
            error!(error = %e, "Failed to delete job");
            ServiceError::DatabaseError(e)
        })?;

        info!("Job deleted");
        self.send_event(Event::JobDeleted(job_id)).await;
        Ok(())
    }

    /// Scheduled jobs first, soonest date on top.
    #[instrument(skip(self, filter))]
    pub async fn list_jobs(
        &self,
        filter: JobFilter,
        page: u64,
        limit: u64,
    ) -> Result<PaginatedResponse<JobModel>, ServiceError> {
        let mut query = JobEntity::find();
        if let Some(status) = filter.status {
            query = query.filter(job::Column::Status.eq(status));
        }
        if let Some(job_type) = filter.job_type {
            query = query.filter(job::Column::JobType.eq(job_type));
        }
        if let Some(order_id) = filter.order_id {
            query = query.filter(job::Column::OrderId.eq(order_id));
        }
        if let Some(worker_id) = filter.worker_id {
            query = query.filter(job::Column::AssignedWorkerId.eq(worker_id));
        }

        let (page, limit) = crate::clamp_page(page, limit);
        let paginator = query
            .order_by_asc(job::Column::ScheduledDate)
            .order_by_desc(job::Column::CreatedAt)
            .paginate(&*self.db, limit);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count jobs");
            ServiceError::DatabaseError(e)
        })?;
        let jobs = paginator.fetch_page(page - 1).await.map_err(|e| {
            error!(error = %e, page, limit, "Failed to fetch jobs page");
            ServiceError::DatabaseError(e)
        })?;

        Ok(PaginatedResponse::new(jobs, total, page, limit))
    }

    /// Audit rows for a job, oldest first.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn job_history(&self, job_id: Uuid) -> Result<Vec<job_status_update::Model>, ServiceError> {
        let job = self.find_job(job_id).await?;
        job.find_related(job_status_update::Entity)
            .order_by_asc(job_status_update::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }
}

fn assignment_notification(worker_id: Uuid, job: &JobModel, order_number: &str) -> NotificationRequest {
    let when = job
        .scheduled_date
        .map(|d| format!(" on {}", d.format("%Y-%m-%d %H:%M")))
        .unwrap_or_default();
    NotificationRequest::new(
        worker_id,
        NotificationType::JobAssignment,
        "New job assigned",
        format!(
            "{} job for order {}{}",
            job.job_type.display_name(),
            order_number,
            when
        ),
    )
    .for_job(job.id)
    .for_order(job.order_id)
}

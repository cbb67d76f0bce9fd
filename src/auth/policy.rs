//! Role model and the access checks handlers run before calling a service.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

use super::AuthUser;
use crate::entities::{client, job, order};
use crate::errors::ServiceError;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Director,
    Manager,
    Supervisor,
    Measurer,
    DeliveryPerson,
    Installer,
    Client,
}

impl Role {
    /// Director, manager and supervisor.
    pub fn is_management(self) -> bool {
        matches!(self, Role::Director | Role::Manager | Role::Supervisor)
    }

    /// Field roles that get jobs assigned.
    pub fn is_worker(self) -> bool {
        matches!(self, Role::Measurer | Role::DeliveryPerson | Role::Installer)
    }
}

/// Stateless access checks. Each returns `Forbidden` on denial.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessPolicy;

impl AccessPolicy {
    pub fn can_manage(user: &AuthUser) -> bool {
        user.roles.iter().any(|r| r.is_management())
    }

    pub fn require_management(user: &AuthUser) -> Result<(), ServiceError> {
        if Self::can_manage(user) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "Management role required".to_string(),
            ))
        }
    }

    /// The assigned worker or management may change a job's status.
    pub fn authorize_job_status_change(user: &AuthUser, job: &job::Model) -> Result<(), ServiceError> {
        if Self::can_manage(user) || job.is_assigned_to(user.user_id) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "User {} may not update job {}",
                user.user_id, job.id
            )))
        }
    }

    /// Same audience as status changes.
    pub fn authorize_job_view(user: &AuthUser, job: &job::Model) -> Result<(), ServiceError> {
        if Self::can_manage(user) || job.is_assigned_to(user.user_id) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "User {} may not view job {}",
                user.user_id, job.id
            )))
        }
    }

    /// Clients have no job list; everyone else does (workers see their own).
    pub fn authorize_job_listing(user: &AuthUser) -> Result<(), ServiceError> {
        if Self::can_manage(user) || user.roles.iter().any(|r| r.is_worker()) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "Clients cannot list jobs".to_string(),
            ))
        }
    }

    /// Management, the owning client user, or a worker with a job on the order.
    pub fn authorize_order_view(
        user: &AuthUser,
        order: &order::Model,
        client: Option<&client::Model>,
        worker_job_ids: &[Uuid],
    ) -> Result<(), ServiceError> {
        if Self::can_manage(user) {
            return Ok(());
        }
        let owns = client
            .filter(|c| c.id == order.client_id)
            .and_then(|c| c.user_id)
            .is_some_and(|uid| uid == user.user_id);
        if owns || !worker_job_ids.is_empty() {
            return Ok(());
        }
        Err(ServiceError::Forbidden(format!(
            "User {} may not view order {}",
            user.user_id, order.id
        )))
    }
}

//! Job lifecycle state machine.
//!
//! ```text
//!   assigned → en_route → arrived → in_progress → completed
//!      ↓          ↓          ↓           ↓
//!      └──────────┴──────────┴───────────┴──────> cancelled
//! ```
//!
//! `completed` and `cancelled` are terminal. Validation is pure; persistence
//! lives in [`crate::services::jobs`].

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::order_status::OrderStatus;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    #[sea_orm(string_value = "assigned")]
    Assigned,
    #[sea_orm(string_value = "en_route")]
    EnRoute,
    #[sea_orm(string_value = "arrived")]
    Arrived,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobType {
    #[sea_orm(string_value = "measuring")]
    Measuring,
    #[sea_orm(string_value = "delivery")]
    Delivery,
    #[sea_orm(string_value = "installation")]
    Installation,
}

/// A rejected job transition, carrying what the caller needs to retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Cannot transition job from '{current}' to '{requested}'")]
pub struct TransitionError {
    pub current: JobStatus,
    pub requested: JobStatus,
    pub valid_next: Vec<JobStatus>,
}

impl JobStatus {
    pub const ALL: [JobStatus; 6] = [
        JobStatus::Assigned,
        JobStatus::EnRoute,
        JobStatus::Arrived,
        JobStatus::InProgress,
        JobStatus::Completed,
        JobStatus::Cancelled,
    ];

    /// Statuses reachable from `self` in one step.
    pub fn valid_next_statuses(self) -> &'static [JobStatus] {
        match self {
            JobStatus::Assigned => &[JobStatus::EnRoute, JobStatus::Cancelled],
            JobStatus::EnRoute => &[JobStatus::Arrived, JobStatus::Cancelled],
            JobStatus::Arrived => &[JobStatus::InProgress, JobStatus::Cancelled],
            JobStatus::InProgress => &[JobStatus::Completed, JobStatus::Cancelled],
            JobStatus::Completed | JobStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, next: JobStatus) -> bool {
        self.valid_next_statuses().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.valid_next_statuses().is_empty()
    }

    /// Validates a transition without touching storage.
    pub fn validate_transition(self, requested: JobStatus) -> Result<(), TransitionError> {
        if self.can_transition_to(requested) {
            Ok(())
        } else {
            Err(TransitionError {
                current: self,
                requested,
                valid_next: self.valid_next_statuses().to_vec(),
            })
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            JobStatus::Assigned => "Assigned",
            JobStatus::EnRoute => "En Route",
            JobStatus::Arrived => "Arrived",
            JobStatus::InProgress => "In Progress",
            JobStatus::Completed => "Completed",
            JobStatus::Cancelled => "Cancelled",
        }
    }
}

impl JobType {
    /// Order status implied by a job of this type reaching `completed`.
    pub fn derived_order_status(self) -> Option<OrderStatus> {
        match self {
            JobType::Measuring => Some(OrderStatus::MeasuringCompleted),
            JobType::Delivery => Some(OrderStatus::Delivered),
            JobType::Installation => Some(OrderStatus::InstallationCompleted),
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            JobType::Measuring => "Measuring",
            JobType::Delivery => "Delivery",
            JobType::Installation => "Installation",
        }
    }
}

/// Order status to derive when `job_type` transitions into `new_status`.
///
/// Only completion derives anything; every other transition yields `None`.
pub fn derive_order_status_on_job_completion(
    job_type: JobType,
    new_status: JobStatus,
) -> Option<OrderStatus> {
    if new_status == JobStatus::Completed {
        job_type.derived_order_status()
    } else {
        None
    }
}

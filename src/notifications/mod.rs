//! Notification dispatch.
//!
//! Dispatch happens after the owning transaction commits. A failed dispatch
//! is logged and counted but never reverses the state change that caused it.

use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, instrument};
use uuid::Uuid;

use crate::entities::notification::{self, NotificationType};
use crate::events::{Event, EventSender};

/// A notification to deliver to a single user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub related_job_id: Option<Uuid>,
    pub related_order_id: Option<Uuid>,
}

impl NotificationRequest {
    pub fn new(
        user_id: Uuid,
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            title: title.into(),
            message: message.into(),
            notification_type,
            related_job_id: None,
            related_order_id: None,
        }
    }

    pub fn for_job(mut self, job_id: Uuid) -> Self {
        self.related_job_id = Some(job_id);
        self
    }

    pub fn for_order(mut self, order_id: Uuid) -> Self {
        self.related_order_id = Some(order_id);
        self
    }
}

/// Notification service errors
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn notify(&self, request: NotificationRequest) -> Result<(), NotificationError>;
}

/// Sends every request, logging failures. Never fails.
pub async fn dispatch_all(dispatcher: &dyn NotificationDispatcher, requests: Vec<NotificationRequest>) {
    for request in requests {
        let user_id = request.user_id;
        let kind = request.notification_type;
        match dispatcher.notify(request).await {
            Ok(()) => {
                counter!("windowworks_notifications.sent", 1);
            }
            Err(e) => {
                error!(%user_id, notification_type = %kind, error = %e, "Notification dispatch failed");
                counter!("windowworks_notifications.failed", 1);
            }
        }
    }
}

/// Stores notifications in the `notifications` table and announces them on
/// the event channel.
#[derive(Clone)]
pub struct DbNotificationDispatcher {
    db: Arc<DatabaseConnection>,
    event_sender: Option<Arc<EventSender>>,
}

impl DbNotificationDispatcher {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }
}

#[async_trait]
impl NotificationDispatcher for DbNotificationDispatcher {
    #[instrument(skip(self, request), fields(user_id = %request.user_id, kind = %request.notification_type))]
    async fn notify(&self, request: NotificationRequest) -> Result<(), NotificationError> {
        let now = Utc::now();
        let model = notification::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(request.user_id),
            title: Set(request.title),
            message: Set(request.message),
            notification_type: Set(request.notification_type),
            is_read: Set(false),
            related_job_id: Set(request.related_job_id),
            related_order_id: Set(request.related_order_id),
            created_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        debug!(notification_id = %model.id, "Notification stored");

        if let Some(sender) = &self.event_sender {
            sender
                .send(Event::NotificationCreated {
                    notification_id: model.id,
                    user_id: model.user_id,
                    notification_type: model.notification_type,
                    title: model.title,
                    created_at: model.created_at,
                })
                .await
                .map_err(NotificationError::Delivery)?;
        }

        Ok(())
    }
}

//! A user's in-app notification inbox.

use std::sync::Arc;

use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use tracing::{debug, error, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::notification::{self, Entity as NotificationEntity},
    errors::ServiceError,
    PaginatedResponse,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationPage {
    #[serde(flatten)]
    pub page: PaginatedResponse<notification::Model>,
    pub unread_count: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MarkAllReadResult {
    pub updated: u64,
}

#[derive(Clone)]
pub struct NotificationService {
    db: Arc<DatabaseConnection>,
}

impl NotificationService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Newest first.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list(
        &self,
        user_id: Uuid,
        unread_only: bool,
        page: u64,
        limit: u64,
    ) -> Result<NotificationPage, ServiceError> {
        let mut query = NotificationEntity::find().filter(notification::Column::UserId.eq(user_id));
        if unread_only {
            query = query.filter(notification::Column::IsRead.eq(false));
        }

        let (page, limit) = crate::clamp_page(page, limit);
        let paginator = query
            .order_by_desc(notification::Column::CreatedAt)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await.map_err(|e| {
            error!(error = %e, "Failed to fetch notifications");
            ServiceError::DatabaseError(e)
        })?;

        let unread_count = NotificationEntity::find()
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::IsRead.eq(false))
            .count(&*self.db)
            .await?;

        Ok(NotificationPage {
            page: PaginatedResponse::new(items, total, page, limit),
            unread_count,
        })
    }

    /// Another user's notification is reported as missing.
    #[instrument(skip(self), fields(user_id = %user_id, notification_id = %notification_id))]
    pub async fn mark_read(
        &self,
        user_id: Uuid,
        notification_id: Uuid,
    ) -> Result<notification::Model, ServiceError> {
        let existing = NotificationEntity::find_by_id(notification_id)
            .one(&*self.db)
            .await?
            .filter(|n| n.user_id == user_id)
            .ok_or_else(|| ServiceError::not_found("Notification", notification_id))?;

        if existing.is_read {
            return Ok(existing);
        }

        let mut active: notification::ActiveModel = existing.into();
        active.is_read = Set(true);
        let updated = active.update(&*self.db).await?;
        debug!("Notification marked as read");
        Ok(updated)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<MarkAllReadResult, ServiceError> {
        let result = NotificationEntity::update_many()
            .col_expr(notification::Column::IsRead, Expr::value(true))
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::IsRead.eq(false))
            .exec(&*self.db)
            .await?;

        debug!(updated = result.rows_affected, "Notifications marked as read");
        Ok(MarkAllReadResult {
            updated: result.rows_affected,
        })
    }
}

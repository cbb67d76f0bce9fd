use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::client::{self, ActiveModel as ClientActiveModel, Entity as ClientEntity},
    errors::ServiceError,
    events::{Event, EventSender},
    PaginatedResponse,
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateClientRequest {
    /// Links the client to a `client` role account for in-app notifications.
    pub user_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
}

#[derive(Clone)]
pub struct ClientService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<Arc<EventSender>>,
}

impl ClientService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_client(&self, request: CreateClientRequest) -> Result<client::Model, ServiceError> {
        request.validate()?;

        let now = Utc::now();
        let created = ClientActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(request.user_id),
            name: Set(request.name.trim().to_string()),
            email: Set(request.email),
            phone: Set(request.phone),
            address: Set(request.address),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create client");
            ServiceError::DatabaseError(e)
        })?;

        info!(client_id = %created.id, "Client created");
        if let Some(sender) = &self.event_sender {
            sender.send_or_log(Event::ClientCreated(created.id)).await;
        }
        Ok(created)
    }

    #[instrument(skip(self), fields(client_id = %client_id))]
    pub async fn get_client(&self, client_id: Uuid) -> Result<client::Model, ServiceError> {
        ClientEntity::find_by_id(client_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Client", client_id))
    }

    /// Alphabetical; `search` matches name or email.
    #[instrument(skip(self))]
    pub async fn list_clients(
        &self,
        search: Option<String>,
        page: u64,
        limit: u64,
    ) -> Result<PaginatedResponse<client::Model>, ServiceError> {
        let mut query = ClientEntity::find();
        if let Some(term) = search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(client::Column::Name.contains(term))
                    .add(client::Column::Email.contains(term)),
            );
        }

        let (page, limit) = crate::clamp_page(page, limit);
        let paginator = query
            .order_by_asc(client::Column::Name)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let clients = paginator.fetch_page(page - 1).await?;

        Ok(PaginatedResponse::new(clients, total, page, limit))
    }
}

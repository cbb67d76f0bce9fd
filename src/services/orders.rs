use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Query, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DbBackend, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Select, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    auth::AuthUser,
    config::AppConfig,
    db::for_update,
    entities::{
        client, job,
        notification::NotificationType,
        order::{self, ActiveModel as OrderActiveModel, Entity as OrderEntity, Model as OrderModel},
        order_item,
        order_status_update::{self, StatusChangeSource},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    models::OrderStatus,
    notifications::{dispatch_all, NotificationDispatcher, NotificationRequest},
    services::sequences::{format_document_number, next_number, DocumentScope},
    PaginatedResponse,
};

fn validate_non_negative(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_negative() {
        return Err(ValidationError::new("negative_amount"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderItem {
    #[validate(length(min = 1, max = 64, message = "Product type is required"))]
    pub product_type: String,
    pub description: Option<String>,
    #[validate(range(min = 1, message = "Width must be positive"))]
    pub width_mm: Option<i32>,
    #[validate(range(min = 1, message = "Height must be positive"))]
    pub height_mm: Option<i32>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(custom = "validate_non_negative")]
    pub unit_price: Decimal,
}

impl CreateOrderItem {
    /// `None` when the line total does not fit in a `Decimal`.
    pub fn total_price(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Selects the order row for a status write. Manual updates and derivation
/// both go through this, so they serialize on the row.
pub(crate) fn order_for_update(order_id: Uuid, backend: DbBackend) -> Select<OrderEntity> {
    for_update(OrderEntity::find_by_id(order_id), backend)
}

/// Per-item totals and their sum; an amount out of `Decimal` range is a 400.
fn item_totals(items: &[CreateOrderItem]) -> Result<(Vec<Decimal>, Decimal), ServiceError> {
    let mut totals = Vec::with_capacity(items.len());
    let mut sum = Decimal::ZERO;
    for (index, item) in items.iter().enumerate() {
        let line = item.total_price().ok_or_else(|| {
            ServiceError::ValidationError(format!("items[{index}]: Item total is out of range"))
        })?;
        sum = sum.checked_add(line).ok_or_else(|| {
            ServiceError::ValidationError("items: Order total is out of range".to_string())
        })?;
        totals.push(line);
    }
    Ok((totals, sum))
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    pub client_id: Uuid,
    pub manager_id: Option<Uuid>,
    /// Defaults to the sum of item totals.
    #[validate(custom = "validate_non_negative")]
    pub total_amount: Option<Decimal>,
    #[validate(length(equal = 3, message = "Currency must be 3 characters"))]
    pub currency: Option<String>,
    pub estimated_completion_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub crm_reference: Option<String>,
    #[serde(default)]
    #[validate]
    pub items: Vec<CreateOrderItem>,
}

/// Order with its derived presentation fields.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderSummary {
    #[serde(flatten)]
    pub order: OrderModel,
    pub status_display: String,
    pub status_color: String,
    pub progress_percentage: u8,
}

impl From<OrderModel> for OrderSummary {
    fn from(order: OrderModel) -> Self {
        Self {
            status_display: order.status.display_name().to_string(),
            status_color: order.status.color().to_string(),
            progress_percentage: order.status.progress_percentage(),
            order,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub summary: OrderSummary,
    pub client: Option<client::Model>,
    pub items: Vec<order_item::Model>,
    pub jobs: Vec<job::Model>,
}

impl OrderDetails {
    pub fn order(&self) -> &OrderModel {
        &self.summary.order
    }

    /// Jobs on this order assigned to `worker_id`.
    pub fn job_ids_for_worker(&self, worker_id: Uuid) -> Vec<Uuid> {
        self.jobs
            .iter()
            .filter(|j| j.is_assigned_to(worker_id))
            .map(|j| j.id)
            .collect()
    }
}

/// Which orders a caller may list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderScope {
    All,
    /// Orders of clients linked to this user.
    ClientUser(Uuid),
    /// Orders with at least one job assigned to this worker.
    Worker(Uuid),
}

impl OrderScope {
    pub fn for_user(user: &AuthUser) -> Self {
        if user.is_management() {
            OrderScope::All
        } else if user.has_role(crate::auth::Role::Client) {
            OrderScope::ClientUser(user.user_id)
        } else {
            OrderScope::Worker(user.user_id)
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub client_id: Option<Uuid>,
    /// Substring match on the order number.
    pub search: Option<String>,
}

/// Numbering and currency defaults for new orders.
#[derive(Debug, Clone)]
pub struct OrderDefaults {
    pub number_prefix: String,
    pub currency: String,
}

impl Default for OrderDefaults {
    fn default() -> Self {
        Self {
            number_prefix: "WM".to_string(),
            currency: "EUR".to_string(),
        }
    }
}

impl From<&AppConfig> for OrderDefaults {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            number_prefix: cfg.order_number_prefix.clone(),
            currency: cfg.default_currency.clone(),
        }
    }
}

/// Who changed an order's status and how.
#[derive(Debug, Clone)]
pub(crate) struct OrderStatusChange {
    pub changed_by: Option<Uuid>,
    pub source: StatusChangeSource,
    pub related_job_id: Option<Uuid>,
    pub notes: Option<String>,
}

/// Writes `new_status` to `order` and appends the audit row. Shared by the
/// direct management update and job-completion derivation; runs in the
/// caller's transaction.
pub(crate) async fn apply_order_status<C>(
    conn: &C,
    order: OrderModel,
    new_status: OrderStatus,
    change: OrderStatusChange,
) -> Result<OrderModel, ServiceError>
where
    C: ConnectionTrait,
{
    let order_id = order.id;
    let old_status = order.status;
    let now = Utc::now();

    let mut active: OrderActiveModel = order.into();
    active.status = Set(new_status);
    if new_status == OrderStatus::Completed {
        active.actual_completion_date = Set(Some(now));
    }
    if change.source == StatusChangeSource::Manual {
        if let Some(notes) = &change.notes {
            active.notes = Set(Some(notes.clone()));
        }
    }
    let current_version = *active.version.as_ref();
    active.version = Set(current_version + 1);

    let updated = active.update(conn).await.map_err(|e| {
        error!(%order_id, error = %e, "Failed to update order status");
        ServiceError::DatabaseError(e)
    })?;

    order_status_update::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        previous_status: Set(Some(old_status)),
        new_status: Set(new_status),
        changed_by: Set(change.changed_by),
        source: Set(change.source),
        related_job_id: Set(change.related_job_id),
        notes: Set(change.notes),
        created_at: Set(now),
    }
    .insert(conn)
    .await
    .map_err(|e| {
        error!(%order_id, error = %e, "Failed to record order status update");
        ServiceError::DatabaseError(e)
    })?;

    Ok(updated)
}

/// The user account linked to a client, if any.
pub(crate) async fn client_user_id<C>(conn: &C, client_id: Uuid) -> Result<Option<Uuid>, ServiceError>
where
    C: ConnectionTrait,
{
    let client = client::Entity::find_by_id(client_id)
        .one(conn)
        .await
        .map_err(ServiceError::DatabaseError)?;
    Ok(client.and_then(|c| c.user_id))
}

pub(crate) fn order_status_notification(user_id: Uuid, order: &OrderModel) -> NotificationRequest {
    NotificationRequest::new(
        user_id,
        NotificationType::StatusUpdate,
        "Order status updated",
        format!(
            "Order {} is now {} ({}% complete)",
            order.order_number,
            order.status.display_name(),
            order.status.progress_percentage()
        ),
    )
    .for_order(order.id)
}

/// Orders, their items and the management-side status override.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    notifier: Arc<dyn NotificationDispatcher>,
    event_sender: Option<Arc<EventSender>>,
    defaults: OrderDefaults,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        notifier: Arc<dyn NotificationDispatcher>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db,
            notifier,
            event_sender,
            defaults: OrderDefaults::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: OrderDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Creates a pending order, its items and the creation audit row.
    #[instrument(skip(self, request), fields(client_id = %request.client_id, items = request.items.len()))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
        actor: Uuid,
    ) -> Result<OrderDetails, ServiceError> {
        request.validate()?;
        let (line_totals, items_total) = item_totals(&request.items)?;

        let db = &*self.db;
        let client = client::Entity::find_by_id(request.client_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch client");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::not_found("Client", request.client_id))?;

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let total_amount = request.total_amount.unwrap_or(items_total);
        let currency = request
            .currency
            .clone()
            .unwrap_or_else(|| self.defaults.currency.clone())
            .to_uppercase();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        let seq = next_number(&txn, DocumentScope::Order, now.year()).await?;
        let order_number = format_document_number(&self.defaults.number_prefix, now.year(), seq);

        let order = OrderActiveModel {
            id: Set(order_id),
            order_number: Set(order_number.clone()),
            client_id: Set(client.id),
            manager_id: Set(request.manager_id),
            status: Set(OrderStatus::Pending),
            total_amount: Set(total_amount),
            currency: Set(currency),
            order_date: Set(now),
            estimated_completion_date: Set(request.estimated_completion_date),
            actual_completion_date: Set(None),
            notes: Set(request.notes),
            crm_reference: Set(request.crm_reference),
            version: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, %order_id, "Failed to create order in database");
            ServiceError::DatabaseError(e)
        })?;

        let mut items = Vec::with_capacity(request.items.len());
        for (item, total_price) in request.items.into_iter().zip(line_totals) {
            let saved = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_type: Set(item.product_type),
                description: Set(item.description),
                width_mm: Set(item.width_mm),
                height_mm: Set(item.height_mm),
                quantity: Set(item.quantity),
                unit_price: Set(item.unit_price),
                total_price: Set(total_price),
                created_at: Set(now),
            }
            .insert(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, %order_id, "Failed to create order item");
                ServiceError::DatabaseError(e)
            })?;
            items.push(saved);
        }

        order_status_update::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            previous_status: Set(None),
            new_status: Set(OrderStatus::Pending),
            changed_by: Set(Some(actor)),
            source: Set(StatusChangeSource::Created),
            related_job_id: Set(None),
            notes: Set(None),
            created_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, %order_id, "Failed to record order creation");
            ServiceError::DatabaseError(e)
        })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, %order_id, "Failed to commit order creation transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(%order_id, order_number = %order_number, "Order created successfully");
        counter!("windowworks_orders.created", 1);

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::OrderCreated {
                    order_id,
                    order_number,
                })
                .await;
        }

        Ok(OrderDetails {
            summary: order.into(),
            client: Some(client),
            items,
            jobs: Vec::new(),
        })
    }

    async fn find_order(&self, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await
            .map_err(|e| {
                error!(%order_id, error = %e, "Failed to fetch order");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::not_found("Order", order_id))
    }

    /// Order with client, items and jobs.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderDetails, ServiceError> {
        let db = &*self.db;
        let order = self.find_order(order_id).await?;

        let client = order
            .find_related(client::Entity)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        let items = order
            .find_related(order_item::Entity)
            .order_by_asc(order_item::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        let jobs = order
            .find_related(job::Entity)
            .order_by_asc(job::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(OrderDetails {
            summary: order.into(),
            client,
            items,
            jobs,
        })
    }

    /// Newest first, restricted to `scope`.
    #[instrument(skip(self, filter))]
    pub async fn list_orders(
        &self,
        scope: OrderScope,
        filter: OrderFilter,
        page: u64,
        limit: u64,
    ) -> Result<PaginatedResponse<OrderSummary>, ServiceError> {
        let mut query = OrderEntity::find();

        match scope {
            OrderScope::All => {}
            OrderScope::ClientUser(user_id) => {
                query = query.filter(
                    order::Column::ClientId.in_subquery(
                        Query::select()
                            .column(client::Column::Id)
                            .from(client::Entity)
                            .and_where(client::Column::UserId.eq(user_id))
                            .to_owned(),
                    ),
                );
            }
            OrderScope::Worker(worker_id) => {
                query = query.filter(
                    order::Column::Id.in_subquery(
                        Query::select()
                            .column(job::Column::OrderId)
                            .from(job::Entity)
                            .and_where(job::Column::AssignedWorkerId.eq(worker_id))
                            .to_owned(),
                    ),
                );
            }
        }

        if let Some(status) = filter.status {
            query = query.filter(order::Column::Status.eq(status));
        }
        if let Some(client_id) = filter.client_id {
            query = query.filter(order::Column::ClientId.eq(client_id));
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
            query = query.filter(order::Column::OrderNumber.contains(search));
        }

        let (page, limit) = crate::clamp_page(page, limit);
        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, limit);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count orders");
            ServiceError::DatabaseError(e)
        })?;
        let orders = paginator.fetch_page(page - 1).await.map_err(|e| {
            error!(error = %e, page, limit, "Failed to fetch orders page");
            ServiceError::DatabaseError(e)
        })?;

        Ok(PaginatedResponse::new(
            orders.into_iter().map(OrderSummary::from).collect(),
            total,
            page,
            limit,
        ))
    }

    /// Management override: any status from any status, no graph check.
    #[instrument(skip(self, notes), fields(order_id = %order_id, new_status = %new_status))]
    pub async fn set_order_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
        notes: Option<String>,
        actor: Uuid,
    ) -> Result<OrderSummary, ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, %order_id, "Failed to start transaction for status update");
            ServiceError::DatabaseError(e)
        })?;

        let order = order_for_update(order_id, txn.get_database_backend())
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::not_found("Order", order_id))?;

        let old_status = order.status;
        if old_status.is_terminal() && old_status != new_status {
            warn!(%order_id, from = %old_status, to = %new_status, "Order leaving terminal status");
        }
        let client_id = order.client_id;

        let updated = apply_order_status(
            &txn,
            order,
            new_status,
            OrderStatusChange {
                changed_by: Some(actor),
                source: StatusChangeSource::Manual,
                related_job_id: None,
                notes,
            },
        )
        .await?;

        let recipient = client_user_id(&txn, client_id).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, %order_id, "Failed to commit order status update");
            ServiceError::DatabaseError(e)
        })?;

        info!(%order_id, from = %old_status, to = %new_status, "Order status updated");
        counter!("windowworks_orders.status_changed", 1, "source" => "manual");

        if let Some(user_id) = recipient {
            dispatch_all(
                self.notifier.as_ref(),
                vec![order_status_notification(user_id, &updated)],
            )
            .await;
        }
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::OrderStatusChanged {
                    order_id,
                    old_status,
                    new_status,
                    changed_by: actor,
                })
                .await;
        }

        Ok(updated.into())
    }

    /// Only pending orders may be deleted.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn delete_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let order = self.find_order(order_id).await?;
        if order.status != OrderStatus::Pending {
            return Err(ServiceError::InvalidOperation(format!(
                "Only pending orders can be deleted (order {} is {})",
                order.order_number, order.status
            )));
        }

        order.delete(&*self.db).await.map_err(|e| {
            error!(%order_id, error = %e, "Failed to delete order");
            ServiceError::DatabaseError(e)
        })?;

        info!(%order_id, "Order deleted");
        if let Some(sender) = &self.event_sender {
            sender.send_or_log(Event::OrderDeleted(order_id)).await;
        }
        Ok(())
    }

    /// Status audit trail, oldest first.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn order_history(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<order_status_update::Model>, ServiceError> {
        let order = self.find_order(order_id).await?;
        order
            .find_related(order_status_update::Entity)
            .order_by_asc(order_status_update::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn item(quantity: i32, unit_price: Decimal) -> CreateOrderItem {
        CreateOrderItem {
            product_type: "window".into(),
            description: None,
            width_mm: Some(1200),
            height_mm: Some(1400),
            quantity,
            unit_price,
        }
    }

    #[test]
    fn item_total_is_quantity_times_price() {
        assert_eq!(item(3, dec!(250.50)).total_price(), Some(dec!(751.50)));
    }

    #[test]
    fn overflowing_amounts_are_rejected_not_panicking() {
        let huge = item(2_000_000_000, dec!(70000000000000000000));
        assert_eq!(huge.total_price(), None);
        assert_matches!(
            item_totals(&[item(1, dec!(10)), huge]),
            Err(ServiceError::ValidationError(msg)) if msg.starts_with("items[1]")
        );

        let near_max = item(1, Decimal::MAX);
        assert_matches!(
            item_totals(&[near_max.clone(), near_max]),
            Err(ServiceError::ValidationError(msg)) if msg.starts_with("items:")
        );

        let (lines, sum) = item_totals(&[item(2, dec!(450)), item(1, dec!(99.99))]).unwrap();
        assert_eq!(lines, vec![dec!(900), dec!(99.99)]);
        assert_eq!(sum, dec!(999.99));
    }

    #[test]
    fn negative_prices_and_bad_currency_fail_validation() {
        let mut request = CreateOrderRequest {
            client_id: Uuid::new_v4(),
            manager_id: None,
            total_amount: None,
            currency: Some("EURO".into()),
            estimated_completion_date: None,
            notes: None,
            crm_reference: None,
            items: vec![item(1, dec!(-1))],
        };
        assert!(request.validate().is_err());

        request.currency = Some("PLN".into());
        request.items = vec![item(2, dec!(10))];
        assert!(request.validate().is_ok());
    }

    #[test]
    fn status_writes_lock_the_order_row() {
        use sea_orm::QueryTrait;

        let id = Uuid::new_v4();
        let postgres = order_for_update(id, DbBackend::Postgres)
            .build(DbBackend::Postgres)
            .to_string();
        assert!(postgres.contains("FOR UPDATE"), "{postgres}");

        let sqlite = order_for_update(id, DbBackend::Sqlite)
            .build(DbBackend::Sqlite)
            .to_string();
        assert!(!sqlite.contains("FOR UPDATE"), "{sqlite}");
    }

    #[test]
    fn scope_follows_roles() {
        use crate::auth::Role;
        let mk = |role| AuthUser {
            user_id: Uuid::new_v4(),
            name: None,
            roles: vec![role],
            token_id: "t".into(),
        };
        assert_eq!(OrderScope::for_user(&mk(Role::Director)), OrderScope::All);
        let client = mk(Role::Client);
        assert_eq!(OrderScope::for_user(&client), OrderScope::ClientUser(client.user_id));
        let installer = mk(Role::Installer);
        assert_eq!(OrderScope::for_user(&installer), OrderScope::Worker(installer.user_id));
    }
}

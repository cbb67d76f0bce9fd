use std::sync::Arc;

use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::with_transaction,
    entities::{
        contract::{self, ActiveModel as ContractActiveModel, ContractStatus, Entity as ContractEntity},
        order::Entity as OrderEntity,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::sequences::{format_document_number, next_number, DocumentScope},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateContractRequest {
    /// Defaults to the order total.
    pub total_amount: Option<Decimal>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Contract records. Document rendering happens elsewhere.
#[derive(Clone)]
pub struct ContractService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<Arc<EventSender>>,
    number_prefix: String,
}

impl ContractService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db,
            event_sender,
            number_prefix: "CT".to_string(),
        }
    }

    pub fn with_number_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.number_prefix = prefix.into();
        self
    }

    /// Drafts a contract with the next `CT-<year>-<seq>` number.
    #[instrument(skip(self, request), fields(order_id = %order_id))]
    pub async fn create_contract(
        &self,
        order_id: Uuid,
        request: CreateContractRequest,
    ) -> Result<contract::Model, ServiceError> {
        request.validate()?;
        if request.total_amount.is_some_and(|a| a.is_sign_negative()) {
            return Err(ServiceError::ValidationError(
                "Contract amount cannot be negative".to_string(),
            ));
        }

        let prefix = self.number_prefix.clone();
        let created = with_transaction(&self.db, move |txn| {
            Box::pin(async move {
                let order = OrderEntity::find_by_id(order_id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Order", order_id))?;

                let now = Utc::now();
                let seq = next_number(txn, DocumentScope::Contract, now.year()).await?;

                ContractActiveModel {
                    id: Set(Uuid::new_v4()),
                    order_id: Set(order.id),
                    contract_number: Set(format_document_number(&prefix, now.year(), seq)),
                    status: Set(ContractStatus::Draft),
                    total_amount: Set(request.total_amount.unwrap_or(order.total_amount)),
                    signed_at: Set(None),
                    notes: Set(request.notes),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(txn)
                .await
                .map_err(|e| {
                    error!(error = %e, "Failed to create contract");
                    ServiceError::DatabaseError(e)
                })
            })
        })
        .await?;

        info!(contract_id = %created.id, contract_number = %created.contract_number, "Contract created");

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::ContractCreated {
                    contract_id: created.id,
                    order_id,
                    contract_number: created.contract_number.clone(),
                })
                .await;
        }
        Ok(created)
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn list_contracts(&self, order_id: Uuid) -> Result<Vec<contract::Model>, ServiceError> {
        OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", order_id))?;

        ContractEntity::find()
            .filter(contract::Column::OrderId.eq(order_id))
            .order_by_asc(contract::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Draft to signed; stamps `signed_at`.
    #[instrument(skip(self), fields(contract_id = %contract_id))]
    pub async fn sign_contract(&self, contract_id: Uuid) -> Result<contract::Model, ServiceError> {
        let existing = ContractEntity::find_by_id(contract_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Contract", contract_id))?;

        if existing.status != ContractStatus::Draft {
            return Err(ServiceError::InvalidOperation(format!(
                "Contract {} is {} and cannot be signed",
                existing.contract_number, existing.status
            )));
        }

        let mut active: ContractActiveModel = existing.into();
        active.status = Set(ContractStatus::Signed);
        active.signed_at = Set(Some(Utc::now()));
        let signed = active.update(&*self.db).await.map_err(|e| {
            error!(error = %e, "Failed to sign contract");
            ServiceError::DatabaseError(e)
        })?;

        info!(contract_number = %signed.contract_number, "Contract signed");
        Ok(signed)
    }
}

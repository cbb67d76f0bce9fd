pub mod clients;
pub mod common;
pub mod health;
pub mod jobs;
pub mod notifications;
pub mod orders;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    notifications::{DbNotificationDispatcher, NotificationDispatcher},
    services::{
        clients::ClientService, contracts::ContractService, jobs::JobService,
        notifications::NotificationService,
        orders::{OrderDefaults, OrderService},
    },
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub jobs: Arc<JobService>,
    pub orders: Arc<OrderService>,
    pub clients: Arc<ClientService>,
    pub contracts: Arc<ContractService>,
    pub notifications: Arc<NotificationService>,
}

impl AppServices {
    /// Services backed by the in-app notification table.
    pub fn new(db_pool: Arc<DbPool>, config: &AppConfig, event_sender: Arc<EventSender>) -> Self {
        let notifier: Arc<dyn NotificationDispatcher> = Arc::new(DbNotificationDispatcher::new(
            db_pool.clone(),
            Some(event_sender.clone()),
        ));
        Self::with_notifier(db_pool, config, event_sender, notifier)
    }

    /// Same as [`AppServices::new`] with a caller-supplied dispatcher.
    pub fn with_notifier(
        db_pool: Arc<DbPool>,
        config: &AppConfig,
        event_sender: Arc<EventSender>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        let jobs = Arc::new(JobService::new(
            db_pool.clone(),
            notifier.clone(),
            Some(event_sender.clone()),
        ));
        let orders = Arc::new(
            OrderService::new(db_pool.clone(), notifier, Some(event_sender.clone()))
                .with_defaults(OrderDefaults::from(config)),
        );
        let clients = Arc::new(ClientService::new(
            db_pool.clone(),
            Some(event_sender.clone()),
        ));
        let contracts = Arc::new(
            ContractService::new(db_pool.clone(), Some(event_sender))
                .with_number_prefix(config.contract_number_prefix.clone()),
        );
        let notifications = Arc::new(NotificationService::new(db_pool));

        Self {
            jobs,
            orders,
            clients,
            contracts,
            notifications,
        }
    }
}

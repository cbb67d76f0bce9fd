use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::notification::NotificationType;
use crate::models::{JobStatus, JobType, OrderStatus};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is closed.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "Dropping event");
            counter!("windowworks_events.dropped", 1);
        }
    }
}

/// Domain events published after a transaction commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    ClientCreated(Uuid),
    OrderCreated {
        order_id: Uuid,
        order_number: String,
    },
    OrderDeleted(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
        changed_by: Uuid,
    },
    OrderStatusDerived {
        order_id: Uuid,
        job_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    JobCreated {
        job_id: Uuid,
        order_id: Uuid,
        job_type: JobType,
    },
    JobAssigned {
        job_id: Uuid,
        worker_id: Uuid,
    },
    JobStatusChanged {
        job_id: Uuid,
        order_id: Uuid,
        old_status: JobStatus,
        new_status: JobStatus,
        changed_by: Uuid,
    },
    JobDeleted(Uuid),
    ContractCreated {
        contract_id: Uuid,
        order_id: Uuid,
        contract_number: String,
    },
    NotificationCreated {
        notification_id: Uuid,
        user_id: Uuid,
        notification_type: NotificationType,
        title: String,
        created_at: DateTime<Utc>,
    },
}

impl Event {
    /// Metric label for this event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::ClientCreated(_) => "client_created",
            Event::OrderCreated { .. } => "order_created",
            Event::OrderDeleted(_) => "order_deleted",
            Event::OrderStatusChanged { .. } => "order_status_changed",
            Event::OrderStatusDerived { .. } => "order_status_derived",
            Event::JobCreated { .. } => "job_created",
            Event::JobAssigned { .. } => "job_assigned",
            Event::JobStatusChanged { .. } => "job_status_changed",
            Event::JobDeleted(_) => "job_deleted",
            Event::ContractCreated { .. } => "contract_created",
            Event::NotificationCreated { .. } => "notification_created",
        }
    }
}

/// Drains the event channel, logging each event. External channels (email,
/// push) would hang off `NotificationCreated`; the loop never mutates state.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        counter!("windowworks_events.processed", 1, "kind" => event.kind());

        match &event {
            Event::NotificationCreated {
                notification_id,
                user_id,
                notification_type,
                title,
                ..
            } => {
                info!(
                    %notification_id,
                    %user_id,
                    notification_type = %notification_type,
                    title = %title,
                    "Notification ready for external fan-out"
                );
            }
            Event::OrderStatusDerived {
                order_id,
                job_id,
                old_status,
                new_status,
            } => {
                info!(
                    %order_id,
                    %job_id,
                    old_status = %old_status,
                    new_status = %new_status,
                    "Order status derived from job completion"
                );
            }
            Event::JobStatusChanged {
                job_id,
                old_status,
                new_status,
                ..
            } => {
                info!(
                    %job_id,
                    old_status = %old_status,
                    new_status = %new_status,
                    "Job status changed"
                );
            }
            other => {
                info!(kind = other.kind(), "Received event: {:?}", other);
            }
        }
    }

    warn!("Event processing loop has ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sender_delivers_in_order() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        let id = Uuid::new_v4();

        sender.send(Event::ClientCreated(id)).await.unwrap();
        sender.send(Event::JobDeleted(id)).await.unwrap();

        assert!(matches!(rx.recv().await, Some(Event::ClientCreated(got)) if got == id));
        assert!(matches!(rx.recv().await, Some(Event::JobDeleted(got)) if got == id));
    }

    #[tokio::test]
    async fn send_fails_once_receiver_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        assert!(sender.send(Event::OrderDeleted(Uuid::new_v4())).await.is_err());
        // Must not panic.
        sender.send_or_log(Event::OrderDeleted(Uuid::new_v4())).await;
    }

    #[tokio::test]
    async fn process_events_ends_when_senders_drop() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(Event::JobStatusChanged {
            job_id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            old_status: JobStatus::Assigned,
            new_status: JobStatus::EnRoute,
            changed_by: Uuid::new_v4(),
        })
        .await
        .unwrap();
        drop(tx);
        process_events(rx).await;
    }
}

//! Order lifecycle statuses and their static projections.
//!
//! Orders follow a fifteen-step pipeline. Unlike jobs, direct status changes
//! by management are not validated against a graph; the canonical order below
//! only drives progress and display.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

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
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "measuring_scheduled")]
    MeasuringScheduled,
    #[sea_orm(string_value = "measuring_completed")]
    MeasuringCompleted,
    #[sea_orm(string_value = "contract_signed")]
    ContractSigned,
    #[sea_orm(string_value = "in_production")]
    InProduction,
    #[sea_orm(string_value = "production_completed")]
    ProductionCompleted,
    #[sea_orm(string_value = "ready_for_delivery")]
    ReadyForDelivery,
    #[sea_orm(string_value = "delivery_scheduled")]
    DeliveryScheduled,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "installation_scheduled")]
    InstallationScheduled,
    #[sea_orm(string_value = "installation_in_progress")]
    InstallationInProgress,
    #[sea_orm(string_value = "installation_completed")]
    InstallationCompleted,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl OrderStatus {
    /// Pipeline order, `cancelled` last.
    pub const CANONICAL_ORDER: [OrderStatus; 15] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::MeasuringScheduled,
        OrderStatus::MeasuringCompleted,
        OrderStatus::ContractSigned,
        OrderStatus::InProduction,
        OrderStatus::ProductionCompleted,
        OrderStatus::ReadyForDelivery,
        OrderStatus::DeliveryScheduled,
        OrderStatus::Delivered,
        OrderStatus::InstallationScheduled,
        OrderStatus::InstallationInProgress,
        OrderStatus::InstallationCompleted,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn progress_percentage(self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Confirmed => 5,
            OrderStatus::MeasuringScheduled => 10,
            OrderStatus::MeasuringCompleted => 20,
            OrderStatus::ContractSigned => 30,
            OrderStatus::InProduction => 40,
            OrderStatus::ProductionCompleted => 55,
            OrderStatus::ReadyForDelivery => 60,
            OrderStatus::DeliveryScheduled => 65,
            OrderStatus::Delivered => 75,
            OrderStatus::InstallationScheduled => 80,
            OrderStatus::InstallationInProgress => 90,
            OrderStatus::InstallationCompleted => 95,
            OrderStatus::Completed => 100,
            OrderStatus::Cancelled => 0,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::MeasuringScheduled => "Measuring Scheduled",
            OrderStatus::MeasuringCompleted => "Measuring Completed",
            OrderStatus::ContractSigned => "Contract Signed",
            OrderStatus::InProduction => "In Production",
            OrderStatus::ProductionCompleted => "Production Completed",
            OrderStatus::ReadyForDelivery => "Ready for Delivery",
            OrderStatus::DeliveryScheduled => "Delivery Scheduled",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::InstallationScheduled => "Installation Scheduled",
            OrderStatus::InstallationInProgress => "Installation in Progress",
            OrderStatus::InstallationCompleted => "Installation Completed",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    /// Badge color tag for UI clients.
    pub fn color(self) -> &'static str {
        match self {
            OrderStatus::Pending => "gray",
            OrderStatus::Confirmed | OrderStatus::MeasuringScheduled => "blue",
            OrderStatus::MeasuringCompleted | OrderStatus::ContractSigned => "indigo",
            OrderStatus::InProduction | OrderStatus::ProductionCompleted => "orange",
            OrderStatus::ReadyForDelivery
            | OrderStatus::DeliveryScheduled
            | OrderStatus::Delivered => "purple",
            OrderStatus::InstallationScheduled
            | OrderStatus::InstallationInProgress
            | OrderStatus::InstallationCompleted => "teal",
            OrderStatus::Completed => "green",
            OrderStatus::Cancelled => "red",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use std::str::FromStr;

    #[rstest]
    #[case(OrderStatus::Pending, 0)]
    #[case(OrderStatus::MeasuringCompleted, 20)]
    #[case(OrderStatus::ProductionCompleted, 55)]
    #[case(OrderStatus::Delivered, 75)]
    #[case(OrderStatus::InstallationCompleted, 95)]
    #[case(OrderStatus::Completed, 100)]
    #[case(OrderStatus::Cancelled, 0)]
    fn progress_table(#[case] status: OrderStatus, #[case] expected: u8) {
        assert_eq!(status.progress_percentage(), expected);
    }

    #[test]
    fn progress_is_non_decreasing_along_pipeline() {
        let pipeline = &OrderStatus::CANONICAL_ORDER[..14];
        for pair in pipeline.windows(2) {
            assert!(
                pair[0].progress_percentage() <= pair[1].progress_percentage(),
                "{} regressed after {}",
                pair[1],
                pair[0]
            );
        }
    }

    #[test]
    fn canonical_order_covers_every_status_once() {
        use sea_orm::Iterable;
        let all: Vec<OrderStatus> = OrderStatus::iter().collect();
        assert_eq!(all.len(), OrderStatus::CANONICAL_ORDER.len());
        for status in all {
            assert_eq!(
                OrderStatus::CANONICAL_ORDER
                    .iter()
                    .filter(|s| **s == status)
                    .count(),
                1
            );
        }
    }

    #[test]
    fn only_completed_and_cancelled_are_terminal() {
        for status in OrderStatus::CANONICAL_ORDER {
            assert_eq!(
                status.is_terminal(),
                matches!(status, OrderStatus::Completed | OrderStatus::Cancelled)
            );
        }
    }

    #[test]
    fn display_names_and_wire_names() {
        assert_eq!(OrderStatus::ReadyForDelivery.display_name(), "Ready for Delivery");
        assert_eq!(OrderStatus::ReadyForDelivery.to_string(), "ready_for_delivery");
        assert_eq!(
            OrderStatus::from_str("installation_in_progress").unwrap(),
            OrderStatus::InstallationInProgress
        );
    }

    proptest! {
        #[test]
        fn progress_is_bounded(idx in 0usize..15) {
            let status = OrderStatus::CANONICAL_ORDER[idx];
            prop_assert!(status.progress_percentage() <= 100);
            prop_assert!(!status.color().is_empty());
        }
    }
}

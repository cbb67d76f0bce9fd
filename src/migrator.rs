use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_clients_and_orders::Migration),
            Box::new(m20240601_000002_create_jobs::Migration),
            Box::new(m20240601_000003_create_order_status_updates::Migration),
            Box::new(m20240601_000004_create_notifications::Migration),
            Box::new(m20240601_000005_create_contracts_and_sequences::Migration),
        ]
    }
}

mod m20240601_000001_create_clients_and_orders {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000001_create_clients_and_orders"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Clients::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Clients::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Clients::UserId).uuid().null())
                        .col(ColumnDef::new(Clients::Name).string().not_null())
                        .col(ColumnDef::new(Clients::Email).string().null())
                        .col(ColumnDef::new(Clients::Phone).string().null())
                        .col(ColumnDef::new(Clients::Address).text().null())
                        .col(
                            ColumnDef::new(Clients::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Clients::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_clients_user_id")
                        .table(Clients::Table)
                        .col(Clients::UserId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Orders::OrderNumber).string_len(32).not_null())
                        .col(ColumnDef::new(Orders::ClientId).uuid().not_null())
                        .col(ColumnDef::new(Orders::ManagerId).uuid().null())
                        .col(ColumnDef::new(Orders::Status).string_len(32).not_null())
                        .col(
                            ColumnDef::new(Orders::TotalAmount)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::Currency).string_len(3).not_null())
                        .col(
                            ColumnDef::new(Orders::OrderDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::EstimatedCompletionDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Orders::ActualCompletionDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Orders::Notes).text().null())
                        .col(ColumnDef::new(Orders::CrmReference).string().null())
                        .col(
                            ColumnDef::new(Orders::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_client_id")
                                .from(Orders::Table, Orders::ClientId)
                                .to(Clients::Table, Clients::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // Numbering backstop: a duplicate from the sequence would fail here.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_order_number")
                        .table(Orders::Table)
                        .col(Orders::OrderNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_client_id")
                        .table(Orders::Table)
                        .col(Orders::ClientId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_status")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(OrderItems::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductType).string_len(64).not_null())
                        .col(ColumnDef::new(OrderItems::Description).text().null())
                        .col(ColumnDef::new(OrderItems::WidthMm).integer().null())
                        .col(ColumnDef::new(OrderItems::HeightMm).integer().null())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OrderItems::UnitPrice)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::TotalPrice)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order_id")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Clients::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Clients {
        Table,
        Id,
        UserId,
        Name,
        Email,
        Phone,
        Address,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub enum Orders {
        Table,
        Id,
        OrderNumber,
        ClientId,
        ManagerId,
        Status,
        TotalAmount,
        Currency,
        OrderDate,
        EstimatedCompletionDate,
        ActualCompletionDate,
        Notes,
        CrmReference,
        Version,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        ProductType,
        Description,
        WidthMm,
        HeightMm,
        Quantity,
        UnitPrice,
        TotalPrice,
        CreatedAt,
    }
}

mod m20240601_000002_create_jobs {
    use super::m20240601_000001_create_clients_and_orders::Orders;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000002_create_jobs"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Jobs::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Jobs::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Jobs::OrderId).uuid().not_null())
                        .col(ColumnDef::new(Jobs::JobType).string_len(32).not_null())
                        .col(ColumnDef::new(Jobs::Status).string_len(32).not_null())
                        .col(ColumnDef::new(Jobs::AssignedWorkerId).uuid().null())
                        .col(
                            ColumnDef::new(Jobs::ScheduledDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Jobs::LocationAddress).text().null())
                        .col(ColumnDef::new(Jobs::Latitude).double().null())
                        .col(ColumnDef::new(Jobs::Longitude).double().null())
                        .col(
                            ColumnDef::new(Jobs::EstimatedDurationMinutes)
                                .integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Jobs::ActualStartTime)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Jobs::ActualEndTime)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Jobs::Notes).text().null())
                        .col(
                            ColumnDef::new(Jobs::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(Jobs::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Jobs::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_jobs_order_id")
                                .from(Jobs::Table, Jobs::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            for (name, column) in [
                ("idx_jobs_order_id", Jobs::OrderId),
                ("idx_jobs_assigned_worker_id", Jobs::AssignedWorkerId),
                ("idx_jobs_status", Jobs::Status),
            ] {
                manager
                    .create_index(
                        Index::create()
                            .if_not_exists()
                            .name(name)
                            .table(Jobs::Table)
                            .col(column)
                            .to_owned(),
                    )
                    .await?;
            }

            manager
                .create_table(
                    Table::create()
                        .table(JobStatusUpdates::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(JobStatusUpdates::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(JobStatusUpdates::JobId).uuid().not_null())
                        .col(
                            ColumnDef::new(JobStatusUpdates::PreviousStatus)
                                .string_len(32)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(JobStatusUpdates::NewStatus)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(JobStatusUpdates::ChangedBy).uuid().not_null())
                        .col(ColumnDef::new(JobStatusUpdates::Notes).text().null())
                        .col(ColumnDef::new(JobStatusUpdates::Latitude).double().null())
                        .col(ColumnDef::new(JobStatusUpdates::Longitude).double().null())
                        .col(
                            ColumnDef::new(JobStatusUpdates::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_job_status_updates_job_id")
                                .from(JobStatusUpdates::Table, JobStatusUpdates::JobId)
                                .to(Jobs::Table, Jobs::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_job_status_updates_job_id")
                        .table(JobStatusUpdates::Table)
                        .col(JobStatusUpdates::JobId)
                        .col(JobStatusUpdates::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(JobStatusUpdates::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Jobs::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden, Clone, Copy)]
    enum Jobs {
        Table,
        Id,
        OrderId,
        JobType,
        Status,
        AssignedWorkerId,
        ScheduledDate,
        LocationAddress,
        Latitude,
        Longitude,
        EstimatedDurationMinutes,
        ActualStartTime,
        ActualEndTime,
        Notes,
        Version,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum JobStatusUpdates {
        Table,
        Id,
        JobId,
        PreviousStatus,
        NewStatus,
        ChangedBy,
        Notes,
        Latitude,
        Longitude,
        CreatedAt,
    }
}

mod m20240601_000003_create_order_status_updates {
    use super::m20240601_000001_create_clients_and_orders::Orders;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000003_create_order_status_updates"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OrderStatusUpdates::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderStatusUpdates::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(OrderStatusUpdates::OrderId).uuid().not_null())
                        .col(
                            ColumnDef::new(OrderStatusUpdates::PreviousStatus)
                                .string_len(32)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(OrderStatusUpdates::NewStatus)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderStatusUpdates::ChangedBy).uuid().null())
                        .col(
                            ColumnDef::new(OrderStatusUpdates::Source)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderStatusUpdates::RelatedJobId).uuid().null())
                        .col(ColumnDef::new(OrderStatusUpdates::Notes).text().null())
                        .col(
                            ColumnDef::new(OrderStatusUpdates::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_status_updates_order_id")
                                .from(OrderStatusUpdates::Table, OrderStatusUpdates::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_status_updates_order_id")
                        .table(OrderStatusUpdates::Table)
                        .col(OrderStatusUpdates::OrderId)
                        .col(OrderStatusUpdates::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderStatusUpdates::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum OrderStatusUpdates {
        Table,
        Id,
        OrderId,
        PreviousStatus,
        NewStatus,
        ChangedBy,
        Source,
        RelatedJobId,
        Notes,
        CreatedAt,
    }
}

mod m20240601_000004_create_notifications {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000004_create_notifications"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Notifications::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Notifications::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Notifications::UserId).uuid().not_null())
                        .col(ColumnDef::new(Notifications::Title).string().not_null())
                        .col(ColumnDef::new(Notifications::Message).text().not_null())
                        .col(
                            ColumnDef::new(Notifications::NotificationType)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Notifications::IsRead)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Notifications::RelatedJobId).uuid().null())
                        .col(ColumnDef::new(Notifications::RelatedOrderId).uuid().null())
                        .col(
                            ColumnDef::new(Notifications::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_notifications_user_id_is_read")
                        .table(Notifications::Table)
                        .col(Notifications::UserId)
                        .col(Notifications::IsRead)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Notifications::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Notifications {
        Table,
        Id,
        UserId,
        Title,
        Message,
        NotificationType,
        IsRead,
        RelatedJobId,
        RelatedOrderId,
        CreatedAt,
    }
}

mod m20240601_000005_create_contracts_and_sequences {
    use super::m20240601_000001_create_clients_and_orders::Orders;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000005_create_contracts_and_sequences"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Contracts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Contracts::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Contracts::OrderId).uuid().not_null())
                        .col(
                            ColumnDef::new(Contracts::ContractNumber)
                                .string_len(32)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Contracts::Status).string_len(16).not_null())
                        .col(
                            ColumnDef::new(Contracts::TotalAmount)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Contracts::SignedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Contracts::Notes).text().null())
                        .col(
                            ColumnDef::new(Contracts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Contracts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_contracts_order_id")
                                .from(Contracts::Table, Contracts::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(DocumentSequences::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DocumentSequences::Scope)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(DocumentSequences::Year).integer().not_null())
                        .col(
                            ColumnDef::new(DocumentSequences::LastValue)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .primary_key(
                            Index::create()
                                .col(DocumentSequences::Scope)
                                .col(DocumentSequences::Year),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DocumentSequences::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Contracts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Contracts {
        Table,
        Id,
        OrderId,
        ContractNumber,
        Status,
        TotalAmount,
        SignedAt,
        Notes,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum DocumentSequences {
        Table,
        Scope,
        Year,
        LastValue,
    }
}

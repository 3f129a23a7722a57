use sea_orm_migration::prelude::*;

use super::m20240601_000003_create_subscriptions::Subscriptions;

#[derive(DeriveIden)]
enum PaymentTransactions {
    Table,
    Id,
    Provider,
    ExternalId,
    SubscriptionId,
    Amount,
    State,
    Reason,
    CreateTime,
    PerformTime,
    CancelTime,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PaymentTransactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PaymentTransactions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PaymentTransactions::Provider)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentTransactions::ExternalId)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentTransactions::SubscriptionId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentTransactions::Amount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentTransactions::State)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(PaymentTransactions::Reason).integer().null())
                    .col(
                        ColumnDef::new(PaymentTransactions::CreateTime)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentTransactions::PerformTime)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PaymentTransactions::CancelTime)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PaymentTransactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp())
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PaymentTransactions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp())
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payment_transactions_subscription")
                            .from(PaymentTransactions::Table, PaymentTransactions::SubscriptionId)
                            .to(Subscriptions::Table, Subscriptions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_payment_transactions_provider_external")
                    .table(PaymentTransactions::Table)
                    .col(PaymentTransactions::Provider)
                    .col(PaymentTransactions::ExternalId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_payment_transactions_subscription")
                    .table(PaymentTransactions::Table)
                    .col(PaymentTransactions::SubscriptionId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(PaymentTransactions::Table)
                    .to_owned(),
            )
            .await
    }
}

use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum ScheduledJobs {
    Table,
    Id,
    JobName,
    Payload,
    RunAt,
    Status,
    Attempts,
    LastError,
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
                    .table(ScheduledJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ScheduledJobs::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ScheduledJobs::JobName).string_len(64).not_null())
                    .col(ColumnDef::new(ScheduledJobs::Payload).json().not_null())
                    .col(
                        ColumnDef::new(ScheduledJobs::RunAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledJobs::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(ScheduledJobs::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(ScheduledJobs::LastError).text().null())
                    .col(
                        ColumnDef::new(ScheduledJobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp())
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledJobs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp())
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_scheduled_jobs_status_run_at")
                    .table(ScheduledJobs::Table)
                    .col(ScheduledJobs::Status)
                    .col(ScheduledJobs::RunAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().if_exists().table(ScheduledJobs::Table).to_owned())
            .await
    }
}

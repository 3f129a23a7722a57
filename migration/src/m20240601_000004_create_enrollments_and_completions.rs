use sea_orm_migration::prelude::*;

use super::m20240601_000001_create_users::Users;
use super::m20240601_000002_create_catalog::{Exercises, Meals, Programs, Sessions};

#[derive(DeriveIden)]
enum UserPrograms {
    Table,
    Id,
    UserId,
    ProgramId,
    StartDate,
    EndDate,
    Progress,
    IsActive,
    CreatedAt,
}

#[derive(DeriveIden)]
enum SessionCompletions {
    Table,
    Id,
    UserId,
    SessionId,
    PlannedDate,
    IsCompleted,
    CompletedAt,
}

#[derive(DeriveIden)]
enum MealCompletions {
    Table,
    Id,
    UserId,
    SessionId,
    MealId,
    PlannedDate,
    IsCompleted,
    CompletedAt,
}

#[derive(DeriveIden)]
enum ExerciseCompletions {
    Table,
    Id,
    UserId,
    SessionId,
    ExerciseId,
    PlannedDate,
    IsCompleted,
    CompletedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserPrograms::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserPrograms::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UserPrograms::UserId).big_integer().not_null())
                    .col(ColumnDef::new(UserPrograms::ProgramId).big_integer().not_null())
                    .col(ColumnDef::new(UserPrograms::StartDate).date().not_null())
                    .col(ColumnDef::new(UserPrograms::EndDate).date().null())
                    .col(
                        ColumnDef::new(UserPrograms::Progress)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UserPrograms::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(UserPrograms::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp())
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_programs_user")
                            .from(UserPrograms::Table, UserPrograms::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_programs_program")
                            .from(UserPrograms::Table, UserPrograms::ProgramId)
                            .to(Programs::Table, Programs::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_user_programs_user_program")
                    .table(UserPrograms::Table)
                    .col(UserPrograms::UserId)
                    .col(UserPrograms::ProgramId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SessionCompletions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SessionCompletions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SessionCompletions::UserId).big_integer().not_null())
                    .col(
                        ColumnDef::new(SessionCompletions::SessionId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SessionCompletions::PlannedDate).date().not_null())
                    .col(
                        ColumnDef::new(SessionCompletions::IsCompleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(SessionCompletions::CompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_session_completions_user")
                            .from(SessionCompletions::Table, SessionCompletions::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_session_completions_session")
                            .from(SessionCompletions::Table, SessionCompletions::SessionId)
                            .to(Sessions::Table, Sessions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_session_completions_user_session")
                    .table(SessionCompletions::Table)
                    .col(SessionCompletions::UserId)
                    .col(SessionCompletions::SessionId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MealCompletions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MealCompletions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MealCompletions::UserId).big_integer().not_null())
                    .col(ColumnDef::new(MealCompletions::SessionId).big_integer().not_null())
                    .col(ColumnDef::new(MealCompletions::MealId).big_integer().not_null())
                    .col(ColumnDef::new(MealCompletions::PlannedDate).date().not_null())
                    .col(
                        ColumnDef::new(MealCompletions::IsCompleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(MealCompletions::CompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_meal_completions_user")
                            .from(MealCompletions::Table, MealCompletions::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_meal_completions_session")
                            .from(MealCompletions::Table, MealCompletions::SessionId)
                            .to(Sessions::Table, Sessions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_meal_completions_meal")
                            .from(MealCompletions::Table, MealCompletions::MealId)
                            .to(Meals::Table, Meals::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_meal_completions_user_session_meal")
                    .table(MealCompletions::Table)
                    .col(MealCompletions::UserId)
                    .col(MealCompletions::SessionId)
                    .col(MealCompletions::MealId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ExerciseCompletions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ExerciseCompletions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ExerciseCompletions::UserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExerciseCompletions::SessionId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExerciseCompletions::ExerciseId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ExerciseCompletions::PlannedDate).date().not_null())
                    .col(
                        ColumnDef::new(ExerciseCompletions::IsCompleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ExerciseCompletions::CompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_exercise_completions_user")
                            .from(ExerciseCompletions::Table, ExerciseCompletions::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_exercise_completions_session")
                            .from(ExerciseCompletions::Table, ExerciseCompletions::SessionId)
                            .to(Sessions::Table, Sessions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_exercise_completions_exercise")
                            .from(ExerciseCompletions::Table, ExerciseCompletions::ExerciseId)
                            .to(Exercises::Table, Exercises::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_exercise_completions_user_session_exercise")
                    .table(ExerciseCompletions::Table)
                    .col(ExerciseCompletions::UserId)
                    .col(ExerciseCompletions::SessionId)
                    .col(ExerciseCompletions::ExerciseId)
                    .unique()
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
                    .table(ExerciseCompletions::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(MealCompletions::Table).to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(SessionCompletions::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(UserPrograms::Table).to_owned())
            .await?;
        Ok(())
    }
}

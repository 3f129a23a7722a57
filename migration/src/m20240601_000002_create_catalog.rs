use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
pub enum Programs {
    Table,
    Id,
    Name,
    NameTranslations,
    Description,
    Goal,
    TotalSessions,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum Sessions {
    Table,
    Id,
    ProgramId,
    SessionNumber,
    Name,
    NameTranslations,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum Exercises {
    Table,
    Id,
    Name,
    NameTranslations,
    Description,
    DurationMinutes,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum Meals {
    Table,
    Id,
    Name,
    NameTranslations,
    MealType,
    Calories,
    CreatedAt,
}

#[derive(DeriveIden)]
enum SessionExercises {
    Table,
    SessionId,
    ExerciseId,
}

#[derive(DeriveIden)]
enum SessionMeals {
    Table,
    SessionId,
    MealId,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Programs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Programs::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Programs::Name).string_len(255).not_null())
                    .col(ColumnDef::new(Programs::NameTranslations).json().null())
                    .col(ColumnDef::new(Programs::Description).text().null())
                    .col(ColumnDef::new(Programs::Goal).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Programs::TotalSessions)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Programs::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp())
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Sessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Sessions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Sessions::ProgramId).big_integer().not_null())
                    .col(ColumnDef::new(Sessions::SessionNumber).integer().not_null())
                    .col(ColumnDef::new(Sessions::Name).string_len(255).not_null())
                    .col(ColumnDef::new(Sessions::NameTranslations).json().null())
                    .col(
                        ColumnDef::new(Sessions::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp())
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sessions_program")
                            .from(Sessions::Table, Sessions::ProgramId)
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
                    .name("uq_sessions_program_number")
                    .table(Sessions::Table)
                    .col(Sessions::ProgramId)
                    .col(Sessions::SessionNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Exercises::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Exercises::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Exercises::Name).string_len(255).not_null())
                    .col(ColumnDef::new(Exercises::NameTranslations).json().null())
                    .col(ColumnDef::new(Exercises::Description).text().null())
                    .col(
                        ColumnDef::new(Exercises::DurationMinutes)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Exercises::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp())
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Meals::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Meals::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Meals::Name).string_len(255).not_null())
                    .col(ColumnDef::new(Meals::NameTranslations).json().null())
                    .col(ColumnDef::new(Meals::MealType).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Meals::Calories)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Meals::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp())
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SessionExercises::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SessionExercises::SessionId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SessionExercises::ExerciseId)
                            .big_integer()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(SessionExercises::SessionId)
                            .col(SessionExercises::ExerciseId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_session_exercises_session")
                            .from(SessionExercises::Table, SessionExercises::SessionId)
                            .to(Sessions::Table, Sessions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_session_exercises_exercise")
                            .from(SessionExercises::Table, SessionExercises::ExerciseId)
                            .to(Exercises::Table, Exercises::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SessionMeals::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SessionMeals::SessionId).big_integer().not_null())
                    .col(ColumnDef::new(SessionMeals::MealId).big_integer().not_null())
                    .primary_key(
                        Index::create()
                            .col(SessionMeals::SessionId)
                            .col(SessionMeals::MealId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_session_meals_session")
                            .from(SessionMeals::Table, SessionMeals::SessionId)
                            .to(Sessions::Table, Sessions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_session_meals_meal")
                            .from(SessionMeals::Table, SessionMeals::MealId)
                            .to(Meals::Table, Meals::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().if_exists().table(SessionMeals::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(SessionExercises::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(Meals::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(Exercises::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(Sessions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(Programs::Table).to_owned())
            .await?;
        Ok(())
    }
}

mod common;

use chrono::{Duration, NaiveDate, Utc};
use common::TestApp;
use fitsub_backend::entities::{
    JobStatus, PlanType, exercise_completion_entity as exercise_completion,
    meal_completion_entity as meal_completion, scheduled_job_entity as job,
    session_completion_entity as session_completion, session_entity as session,
    user_program_entity as user_program,
};
use fitsub_backend::error::AppError;
use fitsub_backend::models::{CreateSessionRequest, EnrollRequest};
use fitsub_backend::services::payment::settlement::now_millis;
use fitsub_backend::services::payment::{CheckRequest, CommitRequest};
use fitsub_backend::services::subscription_service::today;
use fitsub_backend::services::PaymentProvider;
use fitsub_backend::tasks::run_due_jobs;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};

fn jan(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

async fn session_rows(app: &TestApp, user_id: i64) -> Vec<session_completion::Model> {
    session_completion::Entity::find()
        .filter(session_completion::Column::UserId.eq(user_id))
        .order_by_asc(session_completion::Column::PlannedDate)
        .all(&app.pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_three_session_program_from_new_year() {
    let app = TestApp::new().await;
    let user = app.create_user("+998903333331").await;
    let (program, _, _) = app.create_program(3).await;
    assert_eq!(program.total_sessions, 3);

    let enrollment = app
        .progress
        .enroll(
            user.id,
            EnrollRequest {
                program_id: program.id,
                start_date: Some(jan(1)),
            },
        )
        .await
        .unwrap();
    // no paid subscription yet
    assert!(!enrollment.materialized);
    assert!(session_rows(&app, user.id).await.is_empty());

    let report = app.schedule.materialize(user.id, program.id).await.unwrap();
    assert_eq!(report.created, 9);
    assert_eq!(report.failed, 0);

    let rows = session_rows(&app, user.id).await;
    let dates: Vec<NaiveDate> = rows.iter().map(|r| r.planned_date).collect();
    assert_eq!(dates, vec![jan(1), jan(2), jan(3)]);
    assert!(rows.iter().all(|r| !r.is_completed));

    let stored = user_program::Entity::find_by_id(enrollment.id)
        .one(&app.pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.end_date, Some(jan(4)));

    let progress = app
        .progress
        .complete_session(user.id, rows[0].session_id)
        .await
        .unwrap();
    assert_eq!(progress.completed_sessions, 1);
    assert_eq!(progress.progress, 33);

    let rows = session_rows(&app, user.id).await;
    assert!(rows[0].is_completed);
    assert!(rows[0].completed_at.is_some());
    assert!(!rows[1].is_completed);
    assert!(!rows[2].is_completed);
}

#[tokio::test]
async fn test_materialize_twice_is_noop() {
    let app = TestApp::new().await;
    let user = app.create_user("+998903333332").await;
    let (program, _, _) = app.create_program(2).await;
    app.progress
        .enroll(
            user.id,
            EnrollRequest {
                program_id: program.id,
                start_date: Some(jan(1)),
            },
        )
        .await
        .unwrap();

    let first = app.schedule.materialize(user.id, program.id).await.unwrap();
    let second = app.schedule.materialize(user.id, program.id).await.unwrap();
    assert_eq!(first.created, 6);
    assert_eq!(second.created, 0);
    assert_eq!(second.skipped, 6);
    assert_eq!(second.failed, 0);

    assert_eq!(session_rows(&app, user.id).await.len(), 2);
    let meals = meal_completion::Entity::find()
        .filter(meal_completion::Column::UserId.eq(user.id))
        .count(&app.pool)
        .await
        .unwrap();
    assert_eq!(meals, 2);
}

#[tokio::test]
async fn test_payment_materializes_enrollment() {
    let app = TestApp::new().await;
    let user = app.create_user("+998903333333").await;
    let (program, _, _) = app.create_program(2).await;
    app.progress
        .enroll(
            user.id,
            EnrollRequest {
                program_id: program.id,
                start_date: None,
            },
        )
        .await
        .unwrap();

    let order = app
        .subscriptions
        .get_or_create_pending(user.id, PlanType::Month)
        .await
        .unwrap();
    app.click
        .check(CheckRequest {
            order_id: order.id,
            amount_minor: order.amount_minor(),
            external_id: Some("click-sched".to_string()),
            provider_time: Some(now_millis()),
        })
        .await
        .unwrap();
    app.click
        .commit(CommitRequest {
            external_id: "click-sched".to_string(),
            order_id: Some(order.id),
            amount_minor: Some(order.amount_minor()),
        })
        .await
        .unwrap();

    let rows = session_rows(&app, user.id).await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].planned_date, today());
    assert_eq!(rows[1].planned_date, today() + Duration::days(1));

    let schedule = app.progress.schedule_for_date(user.id, today()).await.unwrap();
    assert_eq!(schedule.len(), 1);
    assert_eq!(schedule[0].meals.len(), 1);
    assert_eq!(schedule[0].exercises.len(), 1);

    // a program enrolled while subscribed is materialized right away
    let (second_program, _, _) = app.create_program(1).await;
    let enrollment = app
        .progress
        .enroll(
            user.id,
            EnrollRequest {
                program_id: second_program.id,
                start_date: None,
            },
        )
        .await
        .unwrap();
    assert!(enrollment.materialized);
    assert_eq!(enrollment.end_date, Some(today() + Duration::days(1)));
}

#[tokio::test]
async fn test_started_exercise_completes_when_due() {
    let app = TestApp::new().await;
    let user = app.create_user("+998903333334").await;
    let (program, exercise, meal) = app.create_program(1).await;
    app.progress
        .enroll(
            user.id,
            EnrollRequest {
                program_id: program.id,
                start_date: Some(jan(1)),
            },
        )
        .await
        .unwrap();
    app.schedule.materialize(user.id, program.id).await.unwrap();
    let session_id = session_rows(&app, user.id).await[0].session_id;

    let started = app
        .progress
        .start_exercise(user.id, session_id, exercise.id)
        .await
        .unwrap();
    let now = Utc::now();
    assert!(started.completes_at > now + Duration::minutes(9));

    let early = run_due_jobs(&app.queue, &app.progress, now, 10).await.unwrap();
    assert_eq!(early.done, 0);

    let later = now + Duration::minutes(11);
    let report = run_due_jobs(&app.queue, &app.progress, later, 10).await.unwrap();
    assert_eq!(report.done, 1);
    assert_eq!(report.failed, 0);

    let row = exercise_completion::Entity::find()
        .filter(exercise_completion::Column::UserId.eq(user.id))
        .filter(exercise_completion::Column::ExerciseId.eq(exercise.id))
        .one(&app.pool)
        .await
        .unwrap()
        .unwrap();
    assert!(row.is_completed);

    let stored = job::Entity::find_by_id(started.job_id)
        .one(&app.pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, JobStatus::Done);

    // once done it cannot be started again
    let err = app
        .progress
        .start_exercise(user.id, session_id, exercise.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    app.progress
        .complete_meal(user.id, session_id, meal.id)
        .await
        .unwrap();
    let meal_row = meal_completion::Entity::find()
        .filter(meal_completion::Column::UserId.eq(user.id))
        .one(&app.pool)
        .await
        .unwrap()
        .unwrap();
    assert!(meal_row.is_completed);
}

#[tokio::test]
async fn test_unknown_job_is_retried_then_parked() {
    use fitsub_backend::services::TaskQueue;

    let app = TestApp::new().await;
    let now = Utc::now();
    let id = app
        .queue
        .enqueue("rebuild_everything", serde_json::json!({}), now)
        .await
        .unwrap();

    let mut at = now;
    for _ in 0..5 {
        at += Duration::hours(1);
        let report = run_due_jobs(&app.queue, &app.progress, at, 10).await.unwrap();
        assert_eq!(report.failed, 1);
    }

    let stored = job::Entity::find_by_id(id)
        .one(&app.pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.attempts, 5);
    assert!(stored.last_error.is_some());
}

#[tokio::test]
async fn test_catalog_sessions_keep_counter_in_sync() {
    let app = TestApp::new().await;
    let (program, exercise, meal) = app.create_program(2).await;

    let sessions = session::Entity::find()
        .filter(session::Column::ProgramId.eq(program.id))
        .order_by_asc(session::Column::SessionNumber)
        .all(&app.pool)
        .await
        .unwrap();
    let numbers: Vec<i32> = sessions.iter().map(|s| s.session_number).collect();
    assert_eq!(numbers, vec![1, 2]);
    assert_eq!(program.total_sessions, 2);
    assert_eq!(
        program.name_translations,
        Some(serde_json::json!({ "uz": "Starter", "ru": "Starter" }))
    );

    let duplicate = app
        .catalog
        .create_session(CreateSessionRequest {
            program_id: program.id,
            name: "Again".to_string(),
            session_number: Some(2),
            exercise_ids: vec![exercise.id],
            meal_ids: vec![meal.id],
        })
        .await;
    assert!(matches!(duplicate, Err(AppError::ValidationError(_))));

    let unknown = app
        .catalog
        .create_session(CreateSessionRequest {
            program_id: program.id,
            name: "Ghost".to_string(),
            session_number: None,
            exercise_ids: vec![exercise.id, 9_999],
            meal_ids: vec![],
        })
        .await;
    assert!(matches!(unknown, Err(AppError::ValidationError(_))));

    let missing_program = app
        .catalog
        .create_session(CreateSessionRequest {
            program_id: 9_999,
            name: "Nowhere".to_string(),
            session_number: None,
            exercise_ids: vec![],
            meal_ids: vec![],
        })
        .await;
    assert!(matches!(missing_program, Err(AppError::NotFound(_))));

    let after = fitsub_backend::entities::program_entity::Entity::find_by_id(program.id)
        .one(&app.pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.total_sessions, 2);
}

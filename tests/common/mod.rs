#![allow(dead_code)]

use fitsub_backend::config::{ClickConfig, PaymeConfig, PricingConfig};
use fitsub_backend::entities::{
    MealType, ProgramGoal, exercise_entity as exercise, meal_entity as meal,
    program_entity as program, user_entity as user,
};
use fitsub_backend::external::IdentityTranslator;
use fitsub_backend::models::{CreateProgramRequest, CreateSessionRequest};
use fitsub_backend::services::*;
use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use std::sync::Arc;

pub const PAYME_KEY: &str = "payme-test-key";
pub const CLICK_SECRET: &str = "click-test-secret";
pub const CLICK_SERVICE_ID: &str = "4321";

pub async fn setup_db() -> DatabaseConnection {
    let mut opts = ConnectOptions::new("sqlite::memory:".to_string());
    opts.max_connections(1).sqlx_logging(false);
    let pool = Database::connect(opts).await.expect("connect sqlite");
    Migrator::up(&pool, None).await.expect("migrate");
    pool
}

pub fn payme_config() -> PaymeConfig {
    PaymeConfig {
        merchant_id: "5e730e8e0b852a417aa49ceb".to_string(),
        secret_key: PAYME_KEY.to_string(),
        checkout_url: "https://checkout.paycom.uz".to_string(),
        return_url: None,
    }
}

pub fn click_config() -> ClickConfig {
    ClickConfig {
        service_id: CLICK_SERVICE_ID.to_string(),
        merchant_id: "1234".to_string(),
        secret_key: CLICK_SECRET.to_string(),
        checkout_url: "https://my.click.uz/services/pay".to_string(),
        return_url: None,
    }
}

/// Every service wired the way `main` wires them.
#[derive(Clone)]
pub struct TestApp {
    pub pool: DatabaseConnection,
    pub subscriptions: SubscriptionService,
    pub schedule: ScheduleService,
    pub queue: DbTaskQueue,
    pub progress: ProgressService,
    pub catalog: CatalogService,
    pub settlement: Settlement,
    pub payme: Arc<PaymeGateway>,
    pub click: Arc<ClickGateway>,
    pub dispatcher: PaymentDispatcher,
}

impl TestApp {
    pub async fn new() -> Self {
        let pool = setup_db().await;
        let pricing = PricingConfig::default();
        let subscriptions = SubscriptionService::new(pool.clone(), pricing.clone());
        let schedule = ScheduleService::new(pool.clone());
        let queue = DbTaskQueue::new(pool.clone());
        let progress = ProgressService::new(
            pool.clone(),
            schedule.clone(),
            subscriptions.clone(),
            Arc::new(queue.clone()),
        );
        let catalog = CatalogService::new(
            pool.clone(),
            Arc::new(IdentityTranslator::new(vec!["uz".to_string(), "ru".to_string()])),
        );
        let settlement = Settlement::new(pool.clone(), pricing, schedule.clone());
        let payme = Arc::new(PaymeGateway::new(payme_config(), settlement.clone()));
        let click = Arc::new(ClickGateway::new(click_config(), settlement.clone()));
        let dispatcher = PaymentDispatcher::new(subscriptions.clone())
            .with_provider(payme.clone())
            .with_provider(click.clone());

        Self {
            pool,
            subscriptions,
            schedule,
            queue,
            progress,
            catalog,
            settlement,
            payme,
            click,
            dispatcher,
        }
    }

    pub async fn create_user(&self, phone: &str) -> user::Model {
        user::ActiveModel {
            phone: Set(phone.to_string()),
            full_name: Set("Test User".to_string()),
            password_hash: Set("not-a-real-hash".to_string()),
            is_premium: Set(false),
            is_staff: Set(false),
            created_at: Set(Some(Utc::now())),
            updated_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .insert(&self.pool)
        .await
        .expect("insert user")
    }

    pub async fn reload_user(&self, user_id: i64) -> user::Model {
        use sea_orm::EntityTrait;
        user::Entity::find_by_id(user_id)
            .one(&self.pool)
            .await
            .expect("query user")
            .expect("user exists")
    }

    /// A program with `sessions` sessions, each linked to one exercise and one meal.
    pub async fn create_program(&self, sessions: usize) -> (program::Model, exercise::Model, meal::Model) {
        let created = self
            .catalog
            .create_program(CreateProgramRequest {
                name: "Starter".to_string(),
                description: None,
                goal: ProgramGoal::LoseWeight,
            })
            .await
            .expect("create program");

        let ex = exercise::ActiveModel {
            name: Set("Squats".to_string()),
            duration_minutes: Set(10),
            created_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .insert(&self.pool)
        .await
        .expect("insert exercise");
        let ml = meal::ActiveModel {
            name: Set("Oatmeal".to_string()),
            meal_type: Set(MealType::Breakfast),
            calories: Set(350),
            created_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .insert(&self.pool)
        .await
        .expect("insert meal");

        for i in 0..sessions {
            self.catalog
                .create_session(CreateSessionRequest {
                    program_id: created.id,
                    name: format!("Day {}", i + 1),
                    session_number: None,
                    exercise_ids: vec![ex.id],
                    meal_ids: vec![ml.id],
                })
                .await
                .expect("create session");
        }

        use sea_orm::EntityTrait;
        let program = program::Entity::find_by_id(created.id)
            .one(&self.pool)
            .await
            .expect("query program")
            .expect("program exists");
        (program, ex, ml)
    }
}

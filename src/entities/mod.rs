pub mod exercise_completions;
pub mod exercises;
pub mod meal_completions;
pub mod meals;
pub mod payment_transactions;
pub mod programs;
pub mod scheduled_jobs;
pub mod session_completions;
pub mod session_exercises;
pub mod session_meals;
pub mod sessions;
pub mod subscriptions;
pub mod user_programs;
pub mod users;

pub use exercise_completions as exercise_completion_entity;
pub use exercises as exercise_entity;
pub use meal_completions as meal_completion_entity;
pub use meals as meal_entity;
pub use payment_transactions as payment_transaction_entity;
pub use programs as program_entity;
pub use scheduled_jobs as scheduled_job_entity;
pub use session_completions as session_completion_entity;
pub use session_exercises as session_exercise_entity;
pub use session_meals as session_meal_entity;
pub use sessions as session_entity;
pub use subscriptions as subscription_entity;
pub use user_programs as user_program_entity;
pub use users as user_entity;

pub use meals::MealType;
pub use payment_transactions::{PaymentProviderKind, TransactionState};
pub use programs::ProgramGoal;
pub use scheduled_jobs::JobStatus;
pub use subscriptions::PlanType;

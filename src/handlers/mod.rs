pub mod admin;
pub mod auth;
pub mod program;
pub mod subscription;
pub mod user;
pub mod webhook;

pub use admin::admin_config;
pub use auth::auth_config;
pub use program::program_config;
pub use subscription::subscription_config;
pub use user::user_config;
pub use webhook::webhook_config;

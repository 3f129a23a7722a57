pub mod auth;
pub mod cors;

pub use auth::{AuthMiddleware, AuthUser, current_user, require_staff};
pub use cors::create_cors;

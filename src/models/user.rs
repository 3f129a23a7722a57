use crate::entities::user_entity;
use crate::models::SubscriptionResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub phone: String,
    pub full_name: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub phone: String,
    pub full_name: String,
    pub is_premium: bool,
    pub is_staff: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<user_entity::Model> for UserResponse {
    fn from(u: user_entity::Model) -> Self {
        Self {
            id: u.id,
            phone: u.phone,
            full_name: u.full_name,
            is_premium: u.is_premium,
            is_staff: u.is_staff,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserProfile {
    pub user: UserResponse,
    pub subscription: Option<SubscriptionResponse>,
}

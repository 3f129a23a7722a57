use crate::entities::user_entity as user;
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::SubscriptionService;
use crate::services::subscription_service::today;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, IntoActiveModel, Set};

#[derive(Clone)]
pub struct UserService {
    pool: DatabaseConnection,
    subscriptions: SubscriptionService,
}

impl UserService {
    pub fn new(pool: DatabaseConnection, subscriptions: SubscriptionService) -> Self {
        Self {
            pool,
            subscriptions,
        }
    }

    pub async fn get_user_profile(&self, user_id: i64) -> AppResult<UserProfile> {
        let u = user::Entity::find_by_id(user_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let today = today();
        let subscription = self
            .subscriptions
            .current_for_user(user_id)
            .await?
            .map(|s| SubscriptionResponse::from_model(s, today));

        Ok(UserProfile {
            user: UserResponse::from(u),
            subscription,
        })
    }

    pub async fn update_user_profile(
        &self,
        user_id: i64,
        request: UpdateUserRequest,
    ) -> AppResult<UserResponse> {
        let u = user::Entity::find_by_id(user_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let Some(full_name) = request.full_name else {
            return Ok(UserResponse::from(u));
        };
        let full_name = full_name.trim().to_string();
        if full_name.is_empty() || full_name.chars().count() > 128 {
            return Err(AppError::ValidationError(
                "Full name must be between 1 and 128 characters".to_string(),
            ));
        }

        let mut am = u.into_active_model();
        am.full_name = Set(full_name);
        am.updated_at = Set(Some(Utc::now()));
        let updated = am.update(&self.pool).await?;
        Ok(UserResponse::from(updated))
    }
}

use crate::database::is_unique_violation;
use crate::entities::user_entity as user;
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::utils::*;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

#[derive(Clone)]
pub struct AuthService {
    pool: DatabaseConnection,
    jwt_service: JwtService,
}

impl AuthService {
    pub fn new(pool: DatabaseConnection, jwt_service: JwtService) -> Self {
        Self { pool, jwt_service }
    }

    pub async fn register(&self, request: RegisterRequest) -> AppResult<AuthResponse> {
        let phone = format_uz_phone(&request.phone);
        validate_uz_phone(&phone)?;
        validate_password(&request.password)?;

        let full_name = request.full_name.trim();
        if full_name.is_empty() || full_name.chars().count() > 128 {
            return Err(AppError::ValidationError(
                "Full name must be between 1 and 128 characters".to_string(),
            ));
        }

        if self.find_by_phone(&phone).await?.is_some() {
            return Err(AppError::ValidationError(
                "Phone number already registered".to_string(),
            ));
        }

        let password_hash = hash_password(&request.password)?;
        let inserted = user::ActiveModel {
            phone: Set(phone.clone()),
            full_name: Set(full_name.to_string()),
            password_hash: Set(password_hash),
            is_premium: Set(false),
            is_staff: Set(false),
            created_at: Set(Some(Utc::now())),
            updated_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .insert(&self.pool)
        .await;

        let created = match inserted {
            Ok(u) => u,
            Err(e) if is_unique_violation(&e) => {
                return Err(AppError::ValidationError(
                    "Phone number already registered".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        log::info!("Registered user {} ({phone})", created.id);
        self.issue_tokens(created)
    }

    pub async fn login(&self, request: LoginRequest) -> AppResult<AuthResponse> {
        let phone = format_uz_phone(&request.phone);
        let found = self
            .find_by_phone(&phone)
            .await?
            .ok_or_else(|| AppError::AuthError("Invalid phone or password".to_string()))?;

        if !verify_password(&request.password, &found.password_hash)? {
            return Err(AppError::AuthError("Invalid phone or password".to_string()));
        }

        self.issue_tokens(found)
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> AppResult<AuthResponse> {
        let claims = self.jwt_service.verify_refresh_token(refresh_token)?;
        let found = user::Entity::find_by_id(claims.user_id()?)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::AuthError("User no longer exists".to_string()))?;

        self.issue_tokens(found)
    }

    pub async fn me(&self, user_id: i64) -> AppResult<UserResponse> {
        user::Entity::find_by_id(user_id)
            .one(&self.pool)
            .await?
            .map(UserResponse::from)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    async fn find_by_phone(&self, phone: &str) -> AppResult<Option<user::Model>> {
        Ok(user::Entity::find()
            .filter(user::Column::Phone.eq(phone))
            .one(&self.pool)
            .await?)
    }

    fn issue_tokens(&self, u: user::Model) -> AppResult<AuthResponse> {
        let access_token = self.jwt_service.generate_access_token(u.id, u.is_staff)?;
        let refresh_token = self.jwt_service.generate_refresh_token(u.id, u.is_staff)?;
        Ok(AuthResponse {
            user: UserResponse::from(u),
            access_token,
            refresh_token,
            expires_in: self.jwt_service.access_token_expires_in(),
        })
    }
}

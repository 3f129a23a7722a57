use crate::error::{AppError, AppResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

const ACCESS: &str = "access";
const REFRESH: &str = "refresh";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub staff: bool,
    pub exp: i64,
    pub iat: i64,
    pub token_type: String,
}

impl Claims {
    pub fn user_id(&self) -> AppResult<i64> {
        self.sub
            .parse()
            .map_err(|_| AppError::AuthError("Malformed token subject".to_string()))
    }
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expires_in: i64,
    refresh_token_expires_in: i64,
}

impl JwtService {
    pub fn new(secret: &str, access_expires_in: i64, refresh_expires_in: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_expires_in: access_expires_in,
            refresh_token_expires_in: refresh_expires_in,
        }
    }

    fn issue(&self, user_id: i64, staff: bool, token_type: &str, ttl: i64) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            staff,
            exp: (now + Duration::seconds(ttl)).timestamp(),
            iat: now.timestamp(),
            token_type: token_type.to_string(),
        };

        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }

    pub fn generate_access_token(&self, user_id: i64, staff: bool) -> AppResult<String> {
        self.issue(user_id, staff, ACCESS, self.access_token_expires_in)
    }

    pub fn generate_refresh_token(&self, user_id: i64, staff: bool) -> AppResult<String> {
        self.issue(user_id, staff, REFRESH, self.refresh_token_expires_in)
    }

    pub fn verify_token(&self, token: &str) -> AppResult<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        Ok(decode::<Claims>(token, &self.decoding_key, &validation)?.claims)
    }

    pub fn verify_access_token(&self, token: &str) -> AppResult<Claims> {
        let claims = self.verify_token(token)?;
        if claims.token_type != ACCESS {
            return Err(AppError::AuthError("Invalid access token type".to_string()));
        }
        Ok(claims)
    }

    pub fn verify_refresh_token(&self, token: &str) -> AppResult<Claims> {
        let claims = self.verify_token(token)?;
        if claims.token_type != REFRESH {
            return Err(AppError::AuthError("Invalid refresh token type".to_string()));
        }
        Ok(claims)
    }

    pub fn access_token_expires_in(&self) -> i64 {
        self.access_token_expires_in
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_and_refresh_are_not_interchangeable() {
        let jwt = JwtService::new("secret", 60, 600);
        let access = jwt.generate_access_token(7, false).unwrap();
        let refresh = jwt.generate_refresh_token(7, true).unwrap();

        let claims = jwt.verify_access_token(&access).unwrap();
        assert_eq!(claims.user_id().unwrap(), 7);
        assert!(!claims.staff);

        assert!(jwt.verify_access_token(&refresh).is_err());
        assert!(jwt.verify_refresh_token(&access).is_err());
        assert!(jwt.verify_refresh_token(&refresh).unwrap().staff);
    }

    #[test]
    fn test_foreign_signature_is_rejected() {
        let ours = JwtService::new("secret", 60, 600);
        let theirs = JwtService::new("other", 60, 600);
        let token = theirs.generate_access_token(1, false).unwrap();
        assert!(matches!(
            ours.verify_access_token(&token),
            Err(AppError::JwtError(_))
        ));
    }
}

use std::sync::Arc;

use bcrypt::{DEFAULT_COST, hash, verify};
use sqlx::SqlitePool;

use crate::models::{LoginRequest, LoginResponse, RegisterRequest, User, UserResponse};
use crate::utils::{ApiError, ApiResult, JwtUtil};

#[derive(Clone)]
pub struct AuthService {
    pool: SqlitePool,
    jwt_util: Arc<JwtUtil>,
}

impl AuthService {
    pub fn new(pool: SqlitePool, jwt_util: Arc<JwtUtil>) -> Self {
        Self { pool, jwt_util }
    }

    pub async fn register(&self, req: RegisterRequest) -> ApiResult<UserResponse> {
        if req.username.trim().is_empty() {
            return Err(ApiError::validation_error("Username cannot be empty"));
        }
        if req.password.len() < 6 {
            return Err(ApiError::validation_error("Password must be at least 6 characters"));
        }

        let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE username = ?")
            .bind(&req.username)
            .fetch_optional(&self.pool)
            .await?;
        if existing.is_some() {
            return Err(ApiError::conflict("Username already taken"));
        }

        let password_hash = hash(&req.password, DEFAULT_COST)
            .map_err(|e| ApiError::internal_error(format!("Failed to hash password: {}", e)))?;

        let result = sqlx::query("INSERT INTO users (username, password_hash, email) VALUES (?, ?, ?)")
            .bind(&req.username)
            .bind(&password_hash)
            .bind(&req.email)
            .execute(&self.pool)
            .await?;

        let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await?;

        tracing::info!("Registered user '{}' (id {})", user.username, user.id);
        Ok(user.into())
    }

    pub async fn login(&self, req: LoginRequest) -> ApiResult<LoginResponse> {
        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = ?")
            .bind(&req.username)
            .fetch_optional(&self.pool)
            .await?;

        let user = user.ok_or_else(|| ApiError::unauthorized("Invalid username or password"))?;

        let valid = verify(&req.password, &user.password_hash)
            .map_err(|e| ApiError::internal_error(format!("Password verification failed: {}", e)))?;
        if !valid {
            return Err(ApiError::unauthorized("Invalid username or password"));
        }

        let token = self.jwt_util.generate_token(user.id, &user.username)?;
        Ok(LoginResponse { token, user: user.into() })
    }

    pub async fn get_user(&self, user_id: i64) -> ApiResult<UserResponse> {
        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        user.map(UserResponse::from)
            .ok_or_else(|| ApiError::not_found("User not found"))
    }
}

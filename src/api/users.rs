//! Profile endpoints for the authenticated user.

use axum::extract::State;
use std::sync::Arc;

use crate::db::{ChangePasswordRequest, UpdateProfileRequest, User, UserResponse};
use crate::AppState;

use super::auth::{hash_password, verify_password};
use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::Json;
use super::validation::{sanitize_text, validate_age, validate_name, validate_password};

/// GET /api/users/me
pub async fn me(user: User) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}

/// PATCH /api/users/profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    let name = req.name.as_deref().map(sanitize_text);
    if let Some(ref name) = name {
        if let Err(e) = validate_name(name) {
            errors.add("name", e);
        }
    }
    if let Some(age) = req.age {
        if let Err(e) = validate_age(age) {
            errors.add("age", e);
        }
    }
    errors.finish()?;

    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE users
        SET name = COALESCE(?, name),
            gender = COALESCE(?, gender),
            age = COALESCE(?, age),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&name)
    .bind(req.gender)
    .bind(req.age)
    .bind(&now)
    .bind(&user.id)
    .execute(&state.db)
    .await?;

    let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&user.id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(UserResponse::from(user)))
}

/// PATCH /api/users/change-password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    if !verify_password(&req.current_password, &user.password_hash) {
        return Err(ApiError::unauthorized("Current password is incorrect"));
    }

    if let Err(e) = validate_password(&req.new_password) {
        return Err(ApiError::validation_field("new_password", e));
    }

    let password_hash = hash_password(&req.new_password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::internal("Failed to change password")
    })?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(&password_hash)
        .bind(&now)
        .bind(&user.id)
        .execute(&state.db)
        .await?;

    tracing::info!(user = %user.id, "Password changed");

    Ok(Json(UserResponse::from(user)))
}

//! Account administration endpoints.

use axum::extract::{Path, State};
use std::sync::Arc;

use crate::db::{AccountStatus, Role, UpdateUserStatusRequest, User, UserResponse};
use crate::AppState;

use super::auth::require_role;
use super::error::ApiError;
use super::extract::Json;
use super::validation::validate_uuid;

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    require_role(&user, Role::Admin)?;

    let users: Vec<User> = sqlx::query_as("SELECT * FROM users ORDER BY created_at DESC")
        .fetch_all(&state.db)
        .await?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Activate or deactivate an account
///
/// PATCH /api/admin/users/:id/status
pub async fn update_user_status(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserStatusRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    require_role(&user, Role::Admin)?;

    if let Err(e) = validate_uuid(&id, "user_id") {
        return Err(ApiError::validation_field("user_id", e));
    }

    if id == user.id && req.status == AccountStatus::Inactive {
        return Err(ApiError::bad_request("Admins cannot deactivate their own account"));
    }

    let target: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    if target.is_none() {
        return Err(ApiError::not_found("User not found"));
    }

    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query("UPDATE users SET status = ?, updated_at = ? WHERE id = ?")
        .bind(req.status)
        .bind(&now)
        .bind(&id)
        .execute(&state.db)
        .await?;

    let target: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    tracing::info!(admin = %user.id, target = %target.id, status = ?target.status, "Account status changed");

    Ok(Json(UserResponse::from(target)))
}

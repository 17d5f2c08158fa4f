//! Medical-staff views: own profile and the student directory.

use axum::extract::{Path, State};
use std::sync::Arc;

use crate::db::{Role, User, UserResponse};
use crate::AppState;

use super::auth::require_role;
use super::error::ApiError;
use super::extract::Json;
use super::validation::validate_uuid;

/// GET /api/medical-staff/profile
pub async fn staff_profile(user: User) -> Result<Json<UserResponse>, ApiError> {
    require_role(&user, Role::MedicalStaff)?;
    Ok(Json(UserResponse::from(user)))
}

/// GET /api/medical-staff/students
pub async fn list_students(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    require_role(&user, Role::MedicalStaff)?;

    let students: Vec<User> = sqlx::query_as(
        "SELECT * FROM users WHERE role = 'student' AND status = 'active' ORDER BY name",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(students.into_iter().map(UserResponse::from).collect()))
}

/// GET /api/medical-staff/students/:id
pub async fn get_student(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    require_role(&user, Role::MedicalStaff)?;

    if let Err(e) = validate_uuid(&id, "student_id") {
        return Err(ApiError::validation_field("student_id", e));
    }

    let student: Option<User> =
        sqlx::query_as("SELECT * FROM users WHERE id = ? AND role = 'student'")
            .bind(&id)
            .fetch_optional(&state.db)
            .await?;

    match student {
        Some(student) => Ok(Json(UserResponse::from(student))),
        None => Err(ApiError::not_found("Student not found")),
    }
}

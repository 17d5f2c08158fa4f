//! Advice channel: free-text advisory messages attached to an appointment,
//! visible only to the authoring staff member and the owning student.

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{AdviceMessage, Appointment, Role, SendAdviceRequest, User};
use crate::AppState;

use super::auth::require_role;
use super::error::ApiError;
use super::extract::Json;
use super::validation::{validate_message, validate_uuid};

/// Send advice on an appointment; assigned staff only
///
/// POST /api/advice/appointments/:id
pub async fn send_advice(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<SendAdviceRequest>,
) -> Result<(StatusCode, Json<AdviceMessage>), ApiError> {
    require_role(&user, Role::MedicalStaff)?;

    if let Err(e) = validate_message(&req.message, "Message") {
        return Err(ApiError::validation_field("message", e));
    }
    if let Err(e) = validate_uuid(&id, "appointment_id") {
        return Err(ApiError::validation_field("appointment_id", e));
    }

    let appointment: Appointment =
        sqlx::query_as("SELECT * FROM appointments WHERE id = ?")
            .bind(&id)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| ApiError::not_found("Appointment not found"))?;

    if appointment.staff_id.as_deref() != Some(user.id.as_str()) {
        return Err(ApiError::forbidden(
            "Only the assigned staff may send advice on this appointment",
        ));
    }

    let message_id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO advice_messages (id, appointment_id, staff_id, student_id, message, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&message_id)
    .bind(&appointment.id)
    .bind(&user.id)
    .bind(&appointment.student_id)
    .bind(req.message.trim())
    .bind(&now)
    .execute(&state.db)
    .await?;

    let advice: AdviceMessage = sqlx::query_as("SELECT * FROM advice_messages WHERE id = ?")
        .bind(&message_id)
        .fetch_one(&state.db)
        .await?;

    tracing::info!(appointment = %appointment.id, staff = %user.id, "Advice sent");

    Ok((StatusCode::CREATED, Json(advice)))
}

/// List advice authored by the calling staff member
///
/// GET /api/advice/sent
pub async fn list_sent_advice(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<AdviceMessage>>, ApiError> {
    require_role(&user, Role::MedicalStaff)?;

    let messages: Vec<AdviceMessage> = sqlx::query_as(
        "SELECT * FROM advice_messages WHERE staff_id = ? ORDER BY created_at DESC",
    )
    .bind(&user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(messages))
}

/// List advice received by the calling student
///
/// GET /api/advice/student
pub async fn list_received_advice(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<AdviceMessage>>, ApiError> {
    require_role(&user, Role::Student)?;

    let messages: Vec<AdviceMessage> = sqlx::query_as(
        "SELECT * FROM advice_messages WHERE student_id = ? ORDER BY created_at DESC",
    )
    .bind(&user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(messages))
}

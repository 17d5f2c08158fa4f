//! Abuse reports.
//!
//! Reporting is gated on the appointment lifecycle: only the staff member
//! who was assigned to a *completed* appointment may file a report on it.

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{
    AbuseReport, AbuseReportWithStudent, Appointment, CreateAbuseReportRequest, ReportType, Role,
    UpdateAbuseReportRequest, User,
};
use crate::AppState;

use super::auth::require_role;
use super::error::ApiError;
use super::extract::Json;
use super::validation::{validate_message, validate_uuid};

/// The report gate: true iff the appointment is completed and the given
/// staff member was the one assigned to it.
pub fn can_report_on_appointment(staff_id: &str, appointment: &Appointment) -> bool {
    appointment.status.is_completed() && appointment.staff_id.as_deref() == Some(staff_id)
}

/// File an abuse report against a completed appointment
///
/// POST /api/abuse-reports
pub async fn create_report(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateAbuseReportRequest>,
) -> Result<(StatusCode, Json<AbuseReport>), ApiError> {
    require_role(&user, Role::MedicalStaff)?;

    if let Err(e) = validate_uuid(&req.appointment_id, "appointment_id") {
        return Err(ApiError::validation_field("appointment_id", e));
    }
    if let Err(e) = validate_message(&req.description, "Description") {
        return Err(ApiError::validation_field("description", e));
    }

    let appointment: Appointment =
        sqlx::query_as("SELECT * FROM appointments WHERE id = ?")
            .bind(&req.appointment_id)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| ApiError::not_found("Appointment not found"))?;

    if !can_report_on_appointment(&user.id, &appointment) {
        return Err(ApiError::forbidden(
            "Reports are only allowed on completed appointments you were assigned to",
        ));
    }

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO abuse_reports (id, appointment_id, staff_id, description, report_type, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 'open', ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&appointment.id)
    .bind(&user.id)
    .bind(req.description.trim())
    .bind(req.report_type.unwrap_or(ReportType::Other))
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let report: AbuseReport = sqlx::query_as("SELECT * FROM abuse_reports WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    tracing::info!(report = %report.id, appointment = %appointment.id, staff = %user.id, "Abuse report filed");

    Ok((StatusCode::CREATED, Json(report)))
}

/// Update a report; author only, others see 404
///
/// PATCH /api/abuse-reports/:id
pub async fn update_report(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<UpdateAbuseReportRequest>,
) -> Result<Json<AbuseReport>, ApiError> {
    require_role(&user, Role::MedicalStaff)?;

    if let Err(e) = validate_uuid(&id, "report_id") {
        return Err(ApiError::validation_field("report_id", e));
    }

    if let Some(description) = &req.description {
        if let Err(e) = validate_message(description, "Description") {
            return Err(ApiError::validation_field("description", e));
        }
    }

    // Author scoping happens in the query itself, so someone else's report
    // is indistinguishable from a missing one
    let existing: Option<AbuseReport> =
        sqlx::query_as("SELECT * FROM abuse_reports WHERE id = ? AND staff_id = ?")
            .bind(&id)
            .bind(&user.id)
            .fetch_optional(&state.db)
            .await?;
    if existing.is_none() {
        return Err(ApiError::not_found("Report not found"));
    }

    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE abuse_reports
        SET description = COALESCE(?, description),
            status = COALESCE(?, status),
            updated_at = ?
        WHERE id = ? AND staff_id = ?
        "#,
    )
    .bind(req.description.as_deref().map(str::trim))
    .bind(req.status)
    .bind(&now)
    .bind(&id)
    .bind(&user.id)
    .execute(&state.db)
    .await?;

    let report: AbuseReport = sqlx::query_as("SELECT * FROM abuse_reports WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(report))
}

/// List the caller's reports, enriched with the reported student's name
///
/// GET /api/abuse-reports/my
pub async fn list_my_reports(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<AbuseReportWithStudent>>, ApiError> {
    require_role(&user, Role::MedicalStaff)?;

    let reports: Vec<AbuseReportWithStudent> = sqlx::query_as(
        r#"
        SELECT r.id, r.appointment_id, r.staff_id, r.description, r.report_type,
               r.status, u.name AS student_name, r.created_at, r.updated_at
        FROM abuse_reports r
        JOIN appointments a ON a.id = r.appointment_id
        JOIN users u ON u.id = a.student_id
        WHERE r.staff_id = ?
        ORDER BY r.created_at DESC
        "#,
    )
    .bind(&user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(reports))
}

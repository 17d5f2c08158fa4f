//! Appointment lifecycle endpoints.
//!
//! All status movement funnels through `AppointmentStatus::transition_to`,
//! and every status-advancing UPDATE is a compare-and-set on the previous
//! status so concurrent transitions on the same appointment cannot both win.

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{
    Appointment, AppointmentStatus, ApproveAppointmentRequest, CreateAppointmentRequest, Priority,
    Role, UpdateAppointmentRequest, User,
};
use crate::AppState;

use super::auth::{is_admin, require_role};
use super::error::ApiError;
use super::extract::Json;
use super::validation::{
    validate_message, validate_scheduled_at, validate_symptoms, validate_uuid,
};

/// States in which the owning student may still edit symptoms/priority.
fn student_may_edit(status: AppointmentStatus) -> bool {
    matches!(
        status,
        AppointmentStatus::Pending | AppointmentStatus::Approved
    )
}

async fn fetch_appointment(state: &AppState, id: &str) -> Result<Appointment, ApiError> {
    if let Err(e) = validate_uuid(id, "appointment_id") {
        return Err(ApiError::validation_field("appointment_id", e));
    }

    sqlx::query_as::<_, Appointment>("SELECT * FROM appointments WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Appointment not found"))
}

/// Create a new care request, always starting in `pending`
///
/// POST /api/appointments
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    require_role(&user, Role::Student)?;

    if let Err(e) = validate_symptoms(&req.symptoms) {
        return Err(ApiError::validation_field("symptoms", e));
    }

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO appointments (id, student_id, staff_id, symptoms, priority, status, scheduled_at, created_at, updated_at)
        VALUES (?, ?, NULL, ?, ?, 'pending', NULL, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&user.id)
    .bind(req.symptoms.trim())
    .bind(req.priority.unwrap_or(Priority::Medium))
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let appointment: Appointment = sqlx::query_as("SELECT * FROM appointments WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    tracing::info!(appointment = %appointment.id, student = %user.id, "Appointment created");

    Ok((StatusCode::CREATED, Json(appointment)))
}

/// List appointments, scoped by role: students see their own, staff see
/// their assigned plus the unassigned pending queue, admins see all
///
/// GET /api/appointments
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    let appointments: Vec<Appointment> = match user.role {
        Role::Student => {
            sqlx::query_as(
                "SELECT * FROM appointments WHERE student_id = ? ORDER BY created_at DESC",
            )
            .bind(&user.id)
            .fetch_all(&state.db)
            .await?
        }
        Role::MedicalStaff => {
            sqlx::query_as(
                r#"
                SELECT * FROM appointments
                WHERE staff_id = ? OR (staff_id IS NULL AND status = 'pending')
                ORDER BY created_at DESC
                "#,
            )
            .bind(&user.id)
            .fetch_all(&state.db)
            .await?
        }
        Role::Admin => {
            sqlx::query_as("SELECT * FROM appointments ORDER BY created_at DESC")
                .fetch_all(&state.db)
                .await?
        }
    };

    Ok(Json(appointments))
}

/// Get a single appointment; owner, assigned staff or admin only
///
/// GET /api/appointments/:id
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, ApiError> {
    let appointment = fetch_appointment(&state, &id).await?;

    let is_owner = appointment.student_id == user.id;
    let is_assigned = appointment.staff_id.as_deref() == Some(user.id.as_str());
    // Staff may inspect the unassigned pending queue they triage from
    let is_triageable = user.role == Role::MedicalStaff
        && appointment.staff_id.is_none()
        && appointment.status == AppointmentStatus::Pending;
    if !is_owner && !is_assigned && !is_triageable && !is_admin(&user) {
        return Err(ApiError::forbidden("Not a participant in this appointment"));
    }

    Ok(Json(appointment))
}

/// Approve a pending appointment, binding the calling staff member to it.
/// Optionally attaches an initial advice message and a proposed date.
///
/// POST /api/appointments/:id/approve
pub async fn approve_appointment(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<ApproveAppointmentRequest>,
) -> Result<Json<Appointment>, ApiError> {
    require_role(&user, Role::MedicalStaff)?;

    if let Some(advice) = &req.advice {
        if let Err(e) = validate_message(advice, "Advice") {
            return Err(ApiError::validation_field("advice", e));
        }
    }
    if let Some(scheduled_at) = &req.scheduled_at {
        if let Err(e) = validate_scheduled_at(scheduled_at) {
            return Err(ApiError::validation_field("scheduled_at", e));
        }
    }

    let appointment = fetch_appointment(&state, &id).await?;

    // Surfaces the rejected edge as a 409 before attempting the write
    appointment
        .status
        .transition_to(AppointmentStatus::Approved)?;

    let now = chrono::Utc::now().to_rfc3339();

    // Compare-and-set: two staff racing on the same pending appointment
    // cannot both bind themselves
    let result = sqlx::query(
        r#"
        UPDATE appointments
        SET staff_id = ?, status = 'approved', scheduled_at = COALESCE(?, scheduled_at), updated_at = ?
        WHERE id = ? AND status = 'pending' AND staff_id IS NULL
        "#,
    )
    .bind(&user.id)
    .bind(&req.scheduled_at)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::conflict("Appointment is no longer pending"));
    }

    if let Some(advice) = &req.advice {
        sqlx::query(
            r#"
            INSERT INTO advice_messages (id, appointment_id, staff_id, student_id, message, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&id)
        .bind(&user.id)
        .bind(&appointment.student_id)
        .bind(advice.trim())
        .bind(&now)
        .execute(&state.db)
        .await?;
    }

    let appointment: Appointment = sqlx::query_as("SELECT * FROM appointments WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    tracing::info!(appointment = %appointment.id, staff = %user.id, "Appointment approved");

    Ok(Json(appointment))
}

/// Patch an appointment.
///
/// The owning student may edit symptoms/priority while the appointment is
/// still pending or approved, and may never touch status or the schedule.
/// The assigned staff member (or an admin) advances status along the legal
/// edges and manages the scheduled date. Approval itself must go through
/// the approve endpoint because it binds the staff identity.
///
/// PATCH /api/appointments/:id
pub async fn update_appointment(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<UpdateAppointmentRequest>,
) -> Result<Json<Appointment>, ApiError> {
    let appointment = fetch_appointment(&state, &id).await?;

    let is_owner = appointment.student_id == user.id;
    let is_assigned = appointment.staff_id.as_deref() == Some(user.id.as_str());
    let admin = is_admin(&user);

    if !is_owner && !is_assigned && !admin {
        return Err(ApiError::forbidden("Not a participant in this appointment"));
    }

    if let Some(symptoms) = &req.symptoms {
        if let Err(e) = validate_symptoms(symptoms) {
            return Err(ApiError::validation_field("symptoms", e));
        }
    }

    // Status movement: assigned staff or admin only, along legal edges
    let mut status_change: Option<(AppointmentStatus, AppointmentStatus)> = None;
    if let Some(next) = req.status {
        if next != appointment.status {
            if !is_assigned && !admin {
                return Err(ApiError::forbidden(
                    "Only the assigned staff may change the appointment status",
                ));
            }
            appointment.status.transition_to(next)?;
            if next == AppointmentStatus::Approved {
                return Err(ApiError::conflict(
                    "Approval must go through the approve endpoint",
                ));
            }
            status_change = Some((appointment.status, next));
        }
    }

    if let Some(scheduled_at) = &req.scheduled_at {
        if !is_assigned && !admin {
            return Err(ApiError::forbidden(
                "Only the assigned staff may set the scheduled date",
            ));
        }
        if let Err(e) = validate_scheduled_at(scheduled_at) {
            return Err(ApiError::validation_field("scheduled_at", e));
        }
    }

    if is_owner
        && !admin
        && (req.symptoms.is_some() || req.priority.is_some())
        && !student_may_edit(appointment.status)
    {
        return Err(ApiError::conflict(format!(
            "Appointment can no longer be edited in the {} state",
            appointment.status
        )));
    }

    let now = chrono::Utc::now().to_rfc3339();

    let result = match status_change {
        Some((from, to)) => {
            sqlx::query(
                r#"
                UPDATE appointments
                SET symptoms = COALESCE(?, symptoms),
                    priority = COALESCE(?, priority),
                    status = ?,
                    scheduled_at = COALESCE(?, scheduled_at),
                    updated_at = ?
                WHERE id = ? AND status = ?
                "#,
            )
            .bind(&req.symptoms)
            .bind(req.priority)
            .bind(to)
            .bind(&req.scheduled_at)
            .bind(&now)
            .bind(&id)
            .bind(from)
            .execute(&state.db)
            .await?
        }
        None => {
            sqlx::query(
                r#"
                UPDATE appointments
                SET symptoms = COALESCE(?, symptoms),
                    priority = COALESCE(?, priority),
                    scheduled_at = COALESCE(?, scheduled_at),
                    updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&req.symptoms)
            .bind(req.priority)
            .bind(&req.scheduled_at)
            .bind(&now)
            .bind(&id)
            .execute(&state.db)
            .await?
        }
    };

    if status_change.is_some() && result.rows_affected() == 0 {
        return Err(ApiError::conflict(
            "Appointment status changed concurrently, retry",
        ));
    }

    let appointment: Appointment = sqlx::query_as("SELECT * FROM appointments WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    if let Some((from, to)) = status_change {
        tracing::info!(
            appointment = %appointment.id,
            from = %from,
            to = %to,
            by = %user.id,
            "Appointment status advanced"
        );
    }

    Ok(Json(appointment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{insert_appointment, insert_user, test_state};

    fn patch(status: Option<AppointmentStatus>) -> UpdateAppointmentRequest {
        UpdateAppointmentRequest {
            symptoms: None,
            priority: None,
            status,
            scheduled_at: None,
        }
    }

    #[tokio::test]
    async fn test_create_requires_symptoms() {
        let state = test_state().await;
        let student = insert_user(&state.db, "s1@vgu.edu.vn", Role::Student).await;

        let err = create_appointment(
            State(state.clone()),
            student,
            Json(CreateAppointmentRequest {
                symptoms: "   ".to_string(),
                priority: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_starts_pending() {
        let state = test_state().await;
        let student = insert_user(&state.db, "s1@vgu.edu.vn", Role::Student).await;

        let (code, Json(appt)) = create_appointment(
            State(state.clone()),
            student.clone(),
            Json(CreateAppointmentRequest {
                symptoms: "fever".to_string(),
                priority: Some(Priority::High),
            }),
        )
        .await
        .unwrap();
        assert_eq!(code, StatusCode::CREATED);
        assert_eq!(appt.status, AppointmentStatus::Pending);
        assert_eq!(appt.student_id, student.id);
        assert!(appt.staff_id.is_none());
    }

    #[tokio::test]
    async fn test_staff_cannot_create() {
        let state = test_state().await;
        let staff = insert_user(&state.db, "d1@vgu.edu.vn", Role::MedicalStaff).await;

        let err = create_appointment(
            State(state.clone()),
            staff,
            Json(CreateAppointmentRequest {
                symptoms: "fever".to_string(),
                priority: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_approve_binds_staff() {
        let state = test_state().await;
        let student = insert_user(&state.db, "s1@vgu.edu.vn", Role::Student).await;
        let staff = insert_user(&state.db, "d1@vgu.edu.vn", Role::MedicalStaff).await;
        let appt =
            insert_appointment(&state.db, &student, None, AppointmentStatus::Pending).await;

        let Json(updated) = approve_appointment(
            State(state.clone()),
            staff.clone(),
            Path(appt.id.clone()),
            Json(ApproveAppointmentRequest::default()),
        )
        .await
        .unwrap();
        assert_eq!(updated.status, AppointmentStatus::Approved);
        assert_eq!(updated.staff_id.as_deref(), Some(staff.id.as_str()));
    }

    #[tokio::test]
    async fn test_second_approve_conflicts() {
        let state = test_state().await;
        let student = insert_user(&state.db, "s1@vgu.edu.vn", Role::Student).await;
        let staff_a = insert_user(&state.db, "d1@vgu.edu.vn", Role::MedicalStaff).await;
        let staff_b = insert_user(&state.db, "d2@vgu.edu.vn", Role::MedicalStaff).await;
        let appt =
            insert_appointment(&state.db, &student, None, AppointmentStatus::Pending).await;

        approve_appointment(
            State(state.clone()),
            staff_a,
            Path(appt.id.clone()),
            Json(ApproveAppointmentRequest::default()),
        )
        .await
        .unwrap();

        let err = approve_appointment(
            State(state.clone()),
            staff_b,
            Path(appt.id.clone()),
            Json(ApproveAppointmentRequest::default()),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_approve_unknown_and_malformed_ids() {
        let state = test_state().await;
        let staff = insert_user(&state.db, "d1@vgu.edu.vn", Role::MedicalStaff).await;

        let err = approve_appointment(
            State(state.clone()),
            staff.clone(),
            Path(uuid::Uuid::new_v4().to_string()),
            Json(ApproveAppointmentRequest::default()),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = approve_appointment(
            State(state.clone()),
            staff,
            Path("not-a-uuid".to_string()),
            Json(ApproveAppointmentRequest::default()),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_approve_with_advice_attaches_message() {
        let state = test_state().await;
        let student = insert_user(&state.db, "s1@vgu.edu.vn", Role::Student).await;
        let staff = insert_user(&state.db, "d1@vgu.edu.vn", Role::MedicalStaff).await;
        let appt =
            insert_appointment(&state.db, &student, None, AppointmentStatus::Pending).await;

        approve_appointment(
            State(state.clone()),
            staff.clone(),
            Path(appt.id.clone()),
            Json(ApproveAppointmentRequest {
                advice: Some("drink water and rest".to_string()),
                scheduled_at: Some("2026-09-01T09:00:00Z".to_string()),
            }),
        )
        .await
        .unwrap();

        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM advice_messages WHERE appointment_id = ?")
                .bind(&appt.id)
                .fetch_one(&state.db)
                .await
                .unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn test_scheduled_date_must_be_rfc3339() {
        let state = test_state().await;
        let student = insert_user(&state.db, "s1@vgu.edu.vn", Role::Student).await;
        let staff = insert_user(&state.db, "d1@vgu.edu.vn", Role::MedicalStaff).await;
        let pending =
            insert_appointment(&state.db, &student, None, AppointmentStatus::Pending).await;

        let err = approve_appointment(
            State(state.clone()),
            staff.clone(),
            Path(pending.id.clone()),
            Json(ApproveAppointmentRequest {
                advice: None,
                scheduled_at: Some("next tuesday".to_string()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        // Rejected before the write, so the appointment is still pending
        let appt = fetch_appointment(&state, &pending.id).await.unwrap();
        assert_eq!(appt.status, AppointmentStatus::Pending);

        let assigned = insert_appointment(
            &state.db,
            &student,
            Some(&staff),
            AppointmentStatus::Approved,
        )
        .await;
        let mut req = patch(None);
        req.scheduled_at = Some("2026-09-01".to_string());
        let err = update_appointment(State(state.clone()), staff, Path(assigned.id.clone()), Json(req))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_student_cannot_change_status() {
        let state = test_state().await;
        let student = insert_user(&state.db, "s1@vgu.edu.vn", Role::Student).await;
        let staff = insert_user(&state.db, "d1@vgu.edu.vn", Role::MedicalStaff).await;
        let appt = insert_appointment(
            &state.db,
            &student,
            Some(&staff),
            AppointmentStatus::Approved,
        )
        .await;

        let err = update_appointment(
            State(state.clone()),
            student,
            Path(appt.id.clone()),
            Json(patch(Some(AppointmentStatus::Completed))),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_assigned_staff_completes() {
        let state = test_state().await;
        let student = insert_user(&state.db, "s1@vgu.edu.vn", Role::Student).await;
        let staff = insert_user(&state.db, "d1@vgu.edu.vn", Role::MedicalStaff).await;
        let appt = insert_appointment(
            &state.db,
            &student,
            Some(&staff),
            AppointmentStatus::Scheduled,
        )
        .await;

        let Json(updated) = update_appointment(
            State(state.clone()),
            staff,
            Path(appt.id.clone()),
            Json(patch(Some(AppointmentStatus::Completed))),
        )
        .await
        .unwrap();
        assert_eq!(updated.status, AppointmentStatus::Completed);
    }

    #[tokio::test]
    async fn test_unassigned_staff_cannot_advance() {
        let state = test_state().await;
        let student = insert_user(&state.db, "s1@vgu.edu.vn", Role::Student).await;
        let staff = insert_user(&state.db, "d1@vgu.edu.vn", Role::MedicalStaff).await;
        let other = insert_user(&state.db, "d2@vgu.edu.vn", Role::MedicalStaff).await;
        let appt = insert_appointment(
            &state.db,
            &student,
            Some(&staff),
            AppointmentStatus::Approved,
        )
        .await;

        let err = update_appointment(
            State(state.clone()),
            other,
            Path(appt.id.clone()),
            Json(patch(Some(AppointmentStatus::Completed))),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_illegal_edge_rejected() {
        let state = test_state().await;
        let student = insert_user(&state.db, "s1@vgu.edu.vn", Role::Student).await;
        let staff = insert_user(&state.db, "d1@vgu.edu.vn", Role::MedicalStaff).await;
        let appt = insert_appointment(
            &state.db,
            &student,
            Some(&staff),
            AppointmentStatus::Completed,
        )
        .await;

        let err = update_appointment(
            State(state.clone()),
            staff,
            Path(appt.id.clone()),
            Json(patch(Some(AppointmentStatus::Scheduled))),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_student_edits_only_in_early_states() {
        let state = test_state().await;
        let student = insert_user(&state.db, "s1@vgu.edu.vn", Role::Student).await;
        let staff = insert_user(&state.db, "d1@vgu.edu.vn", Role::MedicalStaff).await;

        let pending =
            insert_appointment(&state.db, &student, None, AppointmentStatus::Pending).await;
        let done = insert_appointment(
            &state.db,
            &student,
            Some(&staff),
            AppointmentStatus::Completed,
        )
        .await;

        let mut req = patch(None);
        req.symptoms = Some("worse headache".to_string());
        let Json(updated) = update_appointment(
            State(state.clone()),
            student.clone(),
            Path(pending.id.clone()),
            Json(req),
        )
        .await
        .unwrap();
        assert_eq!(updated.symptoms, "worse headache");

        let mut req = patch(None);
        req.symptoms = Some("too late".to_string());
        let err = update_appointment(
            State(state.clone()),
            student,
            Path(done.id.clone()),
            Json(req),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_get_scoped_to_participants() {
        let state = test_state().await;
        let student = insert_user(&state.db, "s1@vgu.edu.vn", Role::Student).await;
        let outsider = insert_user(&state.db, "s2@vgu.edu.vn", Role::Student).await;
        let admin = insert_user(&state.db, "a1@vgu.edu.vn", Role::Admin).await;
        let appt =
            insert_appointment(&state.db, &student, None, AppointmentStatus::Pending).await;

        assert!(get_appointment(State(state.clone()), student, Path(appt.id.clone()))
            .await
            .is_ok());
        assert!(get_appointment(State(state.clone()), admin, Path(appt.id.clone()))
            .await
            .is_ok());

        let err = get_appointment(State(state.clone()), outsider, Path(appt.id.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_list_scopes_by_role() {
        let state = test_state().await;
        let student = insert_user(&state.db, "s1@vgu.edu.vn", Role::Student).await;
        let other_student = insert_user(&state.db, "s2@vgu.edu.vn", Role::Student).await;
        let staff = insert_user(&state.db, "d1@vgu.edu.vn", Role::MedicalStaff).await;
        let admin = insert_user(&state.db, "a1@vgu.edu.vn", Role::Admin).await;

        insert_appointment(&state.db, &student, None, AppointmentStatus::Pending).await;
        insert_appointment(
            &state.db,
            &other_student,
            Some(&staff),
            AppointmentStatus::Approved,
        )
        .await;

        let Json(mine) = list_appointments(State(state.clone()), student).await.unwrap();
        assert_eq!(mine.len(), 1);

        // Staff sees the unassigned pending queue plus their own assignment
        let Json(staff_view) = list_appointments(State(state.clone()), staff).await.unwrap();
        assert_eq!(staff_view.len(), 2);

        let Json(all) = list_appointments(State(state.clone()), admin).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}

//! Appointment model and its status state machine.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;

/// Appointment lifecycle. The only legal path is
/// pending -> approved -> scheduled -> completed, with approved -> completed
/// allowed when the staff member closes out without a scheduled slot.
/// No edge skips past `approved` and nothing moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Scheduled,
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Approved => "approved",
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
        }
    }

    /// Whether the public API may move an appointment from `self` to `next`.
    pub fn can_transition_to(self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        matches!(
            (self, next),
            (Pending, Approved) | (Approved, Scheduled) | (Approved, Completed) | (Scheduled, Completed)
        )
    }

    /// Validate a transition, surfacing the rejected edge.
    pub fn transition_to(self, next: AppointmentStatus) -> Result<AppointmentStatus, InvalidTransition> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(InvalidTransition { from: self, to: next })
        }
    }

    /// Terminal state: unlocks abuse reporting.
    pub fn is_completed(self) -> bool {
        self == AppointmentStatus::Completed
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("appointment cannot move from {from} to {to}")]
pub struct InvalidTransition {
    pub from: AppointmentStatus,
    pub to: AppointmentStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Appointment {
    pub id: String,
    pub student_id: String,
    /// Bound at approval time; the only staff member allowed to advance
    /// or report on this appointment.
    pub staff_id: Option<String>,
    pub symptoms: String,
    pub priority: Priority,
    pub status: AppointmentStatus,
    pub scheduled_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    #[serde(default)]
    pub symptoms: String,
    pub priority: Option<Priority>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub symptoms: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<AppointmentStatus>,
    pub scheduled_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApproveAppointmentRequest {
    /// Optional advice message attached at approval time.
    pub advice: Option<String>,
    /// Optional proposed date for the visit.
    pub scheduled_at: Option<String>,
}

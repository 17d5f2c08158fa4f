//! Abuse reports filed by medical staff against completed appointments.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ReportType {
    Misconduct,
    Harassment,
    Fraud,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ReportStatus {
    Open,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AbuseReport {
    pub id: String,
    pub appointment_id: String,
    pub staff_id: String,
    pub description: String,
    pub report_type: ReportType,
    pub status: ReportStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// Report row joined with the reported appointment's student name,
/// for the author's listing view.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AbuseReportWithStudent {
    pub id: String,
    pub appointment_id: String,
    pub staff_id: String,
    pub description: String,
    pub report_type: ReportType,
    pub status: ReportStatus,
    pub student_name: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateAbuseReportRequest {
    #[serde(default)]
    pub appointment_id: String,
    #[serde(default)]
    pub description: String,
    pub report_type: Option<ReportType>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAbuseReportRequest {
    pub description: Option<String>,
    pub status: Option<ReportStatus>,
}

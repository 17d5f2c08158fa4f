//! Advice messages attached to appointments.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AdviceMessage {
    pub id: String,
    pub appointment_id: String,
    pub staff_id: String,
    pub student_id: String,
    pub message: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct SendAdviceRequest {
    #[serde(default)]
    pub message: String,
}

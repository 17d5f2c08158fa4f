mod abuse_reports;
mod admin;
mod advice;
mod appointments;
pub mod auth;
pub mod error;
pub mod extract;
mod staff;
mod users;
mod validation;

use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Public routes (no principal required)
    let public_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/signup", post(auth::signup));

    // Protected routes; each handler authenticates through the User extractor
    let api_routes = Router::new()
        // Profile
        .route("/users/me", get(users::me))
        .route("/users/profile", patch(users::update_profile))
        .route("/users/change-password", patch(users::change_password))
        // Appointments
        .route("/appointments", post(appointments::create_appointment))
        .route("/appointments", get(appointments::list_appointments))
        .route("/appointments/:id", get(appointments::get_appointment))
        .route("/appointments/:id", patch(appointments::update_appointment))
        .route("/appointments/:id/approve", post(appointments::approve_appointment))
        // Advice channel
        .route("/advice/appointments/:id", post(advice::send_advice))
        .route("/advice/sent", get(advice::list_sent_advice))
        .route("/advice/student", get(advice::list_received_advice))
        // Abuse reports
        .route("/abuse-reports", post(abuse_reports::create_report))
        .route("/abuse-reports/my", get(abuse_reports::list_my_reports))
        .route("/abuse-reports/:id", patch(abuse_reports::update_report))
        // Medical staff views
        .route("/medical-staff/profile", get(staff::staff_profile))
        .route("/medical-staff/students", get(staff::list_students))
        .route("/medical-staff/students/:id", get(staff::get_student))
        // Account administration
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/:id/status", patch(admin::update_user_status));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", public_routes.merge(api_routes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

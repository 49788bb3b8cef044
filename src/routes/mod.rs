use axum::{Json, Router, routing::get};

use crate::models::AppState;

pub mod appointment_routes;
pub mod auth_routes;
pub mod doctor_routes;
pub mod document_routes;
pub mod pharmacy_routes;
pub mod reminder_routes;
pub mod visit_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/auth", auth_routes::router())
        .nest("/api/doctors", doctor_routes::router())
        .nest("/api/documents", document_routes::router())
        .nest("/api/appointments", appointment_routes::router())
        .nest("/api/visits", visit_routes::router())
        .nest("/api/pharmacy", pharmacy_routes::router())
        .nest("/api/reminders", reminder_routes::router())
        .route("/api/health", get(health))
        .with_state(state)
}

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        message: "HealthSync API is running",
    })
}

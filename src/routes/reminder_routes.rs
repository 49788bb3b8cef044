// src/routes/reminder_routes.rs
//
// Manual trigger for the reminder dispatcher; the cron-style loop in
// src/jobs does the same thing on a fixed interval.

use axum::{Json, Router, extract::State, routing::post};
use chrono::Utc;
use serde::Serialize;

use crate::{
    error::ApiError,
    jobs::reminders,
    middleware::auth_context::AuthContext,
    models::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/send", post(send_reminders))
}

#[derive(Debug, Serialize)]
pub struct SendRemindersResponse {
    pub data: SentCount,
}

#[derive(Debug, Serialize)]
pub struct SentCount {
    pub sent: u64,
}

pub async fn send_reminders(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<SendRemindersResponse>, ApiError> {
    let sent = reminders::send_due_reminders(&state, Utc::now())
        .await
        .map_err(|e| ApiError::Internal(format!("reminder dispatch failed: {e}")))?;

    Ok(Json(SendRemindersResponse {
        data: SentCount { sent },
    }))
}

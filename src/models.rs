use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::drug_info::DrugInfoClient;
use crate::mailer::Mailer;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub mailer: Arc<dyn Mailer>,
    pub drug_info: DrugInfoClient,
    pub session_ttl_hours: i64,
    pub missed_grace_minutes: i64,
}

/* -------------------------
   Appointment status
--------------------------*/

/// Lifecycle states of an appointment. `Scheduled` is the only state the
/// background jobs act on; everything else is terminal for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
    Rescheduled,
    Missed,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Rescheduled => "rescheduled",
            AppointmentStatus::Missed => "missed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(AppointmentStatus::Scheduled),
            "completed" => Some(AppointmentStatus::Completed),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            "rescheduled" => Some(AppointmentStatus::Rescheduled),
            "missed" => Some(AppointmentStatus::Missed),
            _ => None,
        }
    }

    /// Transitions a user or job may perform. Only `scheduled` goes
    /// anywhere; the four end states accept nothing further.
    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        match self {
            AppointmentStatus::Scheduled => matches!(
                next,
                AppointmentStatus::Completed
                    | AppointmentStatus::Cancelled
                    | AppointmentStatus::Rescheduled
                    | AppointmentStatus::Missed
            ),
            AppointmentStatus::Completed
            | AppointmentStatus::Cancelled
            | AppointmentStatus::Rescheduled
            | AppointmentStatus::Missed => false,
        }
    }
}

/* -------------------------
   Document types
--------------------------*/

pub const DOCUMENT_TYPES: &[&str] = &[
    "prescription",
    "lab_report",
    "xray",
    "scan",
    "medical_record",
    "other",
];

pub fn is_known_document_type(t: &str) -> bool {
    DOCUMENT_TYPES.contains(&t)
}

/* -------------------------
   API DTOs
--------------------------*/

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub data: AuthResponseData,
}

#[derive(Debug, Serialize)]
pub struct AuthResponseData {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub data: MeResponseData,
}

#[derive(Debug, Serialize)]
pub struct MeResponseData {
    pub user: UserProfile,
    pub session: SessionInfo,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub data: OkData,
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub session_token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/* -------------------------
   DB Row Models
--------------------------*/

#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, sqlx::FromRow)]
pub struct SessionTokenRow {
    pub session_token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DoctorRow {
    pub doctor_id: Uuid,
    pub name: String,
    pub specialty: String,
    pub clinic: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub working_hours: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DocumentRow {
    pub document_id: Uuid,
    pub title: String,
    pub doc_type: String,
    pub description: Option<String>,
    pub file_url: String,
    pub file_type: String,
    pub file_size: Option<i64>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for s in ["scheduled", "completed", "cancelled", "rescheduled", "missed"] {
            let parsed = AppointmentStatus::parse(s).unwrap();
            assert_eq!(parsed.as_str(), s);
        }
        assert!(AppointmentStatus::parse("no_show").is_none());
        assert!(AppointmentStatus::parse("").is_none());
    }

    #[test]
    fn scheduled_reaches_every_terminal_state() {
        let from = AppointmentStatus::Scheduled;
        assert!(from.can_transition_to(AppointmentStatus::Completed));
        assert!(from.can_transition_to(AppointmentStatus::Cancelled));
        assert!(from.can_transition_to(AppointmentStatus::Rescheduled));
        assert!(from.can_transition_to(AppointmentStatus::Missed));
    }

    #[test]
    fn terminal_states_accept_no_transitions() {
        let terminals = [
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
            AppointmentStatus::Rescheduled,
            AppointmentStatus::Missed,
        ];
        let all = [
            AppointmentStatus::Scheduled,
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
            AppointmentStatus::Rescheduled,
            AppointmentStatus::Missed,
        ];
        for from in terminals {
            for to in all {
                assert!(!from.can_transition_to(to), "{from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn document_type_whitelist() {
        assert!(is_known_document_type("prescription"));
        assert!(is_known_document_type("other"));
        assert!(!is_known_document_type("selfie"));
    }
}

// src/routes/appointment_routes.rs

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post, put},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, AppointmentStatus, OkData, OkResponse},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_appointments))
        .route("/", post(create_appointment))
        .route("/upcoming", get(upcoming_appointments))
        .route("/{appointment_id}", get(get_appointment))
        .route("/{appointment_id}", put(update_appointment))
        .route("/{appointment_id}", delete(delete_appointment))
        .route("/{appointment_id}/complete", post(complete_appointment))
        .route("/{appointment_id}/cancel", post(cancel_appointment))
        .route("/{appointment_id}/reschedule", post(reschedule_appointment))
}

/* ============================================================
   Response DTOs
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct DoctorBrief {
    pub doctor_id: Uuid,
    pub name: String,
    pub specialty: String,
    pub clinic: String,
}

#[derive(Debug, Serialize)]
pub struct DocumentBrief {
    pub document_id: Uuid,
    pub title: String,
    pub file_url: String,
}

#[derive(Debug, Serialize)]
pub struct AppointmentDto {
    pub appointment_id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub reason: String,
    pub notes: Option<String>,
    pub reminder_sent: bool,
    pub last_reminder_sent: Option<DateTime<Utc>>,
    pub missed_at: Option<DateTime<Utc>>,
    pub doctor: DoctorBrief,
    pub documents: Vec<DocumentBrief>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/* ============================================================
   Helpers: fetch + ownership checks
   ============================================================ */

async fn fetch_appointment(
    state: &AppState,
    user_id: Uuid,
    appointment_id: Uuid,
) -> Result<AppointmentDto, ApiError> {
    let row = sqlx::query(
        r#"
        SELECT
          a.appointment_id,
          a.starts_at,
          a.status,
          a.reason,
          a.notes,
          a.reminder_sent,
          a.last_reminder_sent,
          a.missed_at,
          a.document_ids,
          a.created_at,
          a.updated_at,

          d.doctor_id,
          d.name AS d_name,
          d.specialty AS d_specialty,
          d.clinic AS d_clinic

        FROM appointment a
        JOIN doctor d ON d.doctor_id = a.doctor_id
        WHERE a.appointment_id = $1
          AND a.user_id = $2
        "#,
    )
    .bind(appointment_id)
    .bind(user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?;

    let Some(r) = row else {
        return Err(ApiError::not_found("appointment"));
    };

    let status: String = r.try_get("status").map_err(internal_row)?;
    let status = AppointmentStatus::parse(&status)
        .ok_or_else(|| ApiError::Internal(format!("unknown appointment status: {status}")))?;
    let document_ids: Vec<Uuid> = r.try_get("document_ids").map_err(internal_row)?;

    let documents = fetch_document_briefs(state, user_id, &document_ids).await?;

    Ok(AppointmentDto {
        appointment_id: r.try_get("appointment_id").map_err(internal_row)?,
        starts_at: r.try_get("starts_at").map_err(internal_row)?,
        status,
        reason: r.try_get("reason").map_err(internal_row)?,
        notes: r.try_get("notes").ok(),
        reminder_sent: r.try_get("reminder_sent").map_err(internal_row)?,
        last_reminder_sent: r.try_get("last_reminder_sent").ok(),
        missed_at: r.try_get("missed_at").ok(),
        doctor: DoctorBrief {
            doctor_id: r.try_get("doctor_id").map_err(internal_row)?,
            name: r.try_get("d_name").map_err(internal_row)?,
            specialty: r.try_get("d_specialty").map_err(internal_row)?,
            clinic: r.try_get("d_clinic").map_err(internal_row)?,
        },
        documents,
        created_at: r.try_get("created_at").map_err(internal_row)?,
        updated_at: r.try_get("updated_at").map_err(internal_row)?,
    })
}

async fn fetch_document_briefs(
    state: &AppState,
    user_id: Uuid,
    document_ids: &[Uuid],
) -> Result<Vec<DocumentBrief>, ApiError> {
    if document_ids.is_empty() {
        return Ok(vec![]);
    }
    let rows = sqlx::query(
        r#"
        SELECT document_id, title, file_url
        FROM document
        WHERE document_id = ANY($1)
          AND user_id = $2
        ORDER BY created_at ASC
        "#,
    )
    .bind(document_ids)
    .bind(user_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    let mut out = Vec::with_capacity(rows.len());
    for r in rows {
        out.push(DocumentBrief {
            document_id: r.try_get("document_id").map_err(internal_row)?,
            title: r.try_get("title").map_err(internal_row)?,
            file_url: r.try_get("file_url").map_err(internal_row)?,
        });
    }
    Ok(out)
}

async fn ensure_owned_doctor(
    state: &AppState,
    user_id: Uuid,
    doctor_id: Uuid,
) -> Result<(), ApiError> {
    let exists: Option<Uuid> = sqlx::query_scalar(
        r#"
        SELECT doctor_id
        FROM doctor
        WHERE doctor_id = $1
          AND user_id = $2
        "#,
    )
    .bind(doctor_id)
    .bind(user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?;

    if exists.is_none() {
        return Err(ApiError::BadRequest("UNKNOWN_DOCTOR", "doctor not found".into()));
    }
    Ok(())
}

async fn ensure_owned_documents(
    state: &AppState,
    user_id: Uuid,
    document_ids: &[Uuid],
) -> Result<(), ApiError> {
    if document_ids.is_empty() {
        return Ok(());
    }
    let owned: i64 = sqlx::query_scalar(
        r#"
        SELECT count(*)
        FROM document
        WHERE document_id = ANY($1)
          AND user_id = $2
        "#,
    )
    .bind(document_ids)
    .bind(user_id)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    if owned as usize != document_ids.len() {
        return Err(ApiError::BadRequest(
            "UNKNOWN_DOCUMENT",
            "one or more attached documents not found".into(),
        ));
    }
    Ok(())
}

/* ============================================================
   GET / (all) and GET /upcoming
   ============================================================ */

pub async fn list_appointments(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<AppointmentDto>>>, ApiError> {
    let ids: Vec<Uuid> = sqlx::query_scalar(
        r#"
        SELECT appointment_id
        FROM appointment
        WHERE user_id = $1
        ORDER BY starts_at ASC
        "#,
    )
    .bind(auth.user_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        out.push(fetch_appointment(&state, auth.user_id, id).await?);
    }
    Ok(Json(ApiOk { data: out }))
}

pub async fn upcoming_appointments(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<AppointmentDto>>>, ApiError> {
    let ids: Vec<Uuid> = sqlx::query_scalar(
        r#"
        SELECT appointment_id
        FROM appointment
        WHERE user_id = $1
          AND status = 'scheduled'
          AND starts_at >= now()
        ORDER BY starts_at ASC
        LIMIT 5
        "#,
    )
    .bind(auth.user_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        out.push(fetch_appointment(&state, auth.user_id, id).await?);
    }
    Ok(Json(ApiOk { data: out }))
}

/* ============================================================
   GET /{id}
   ============================================================ */

pub async fn get_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    let dto = fetch_appointment(&state, auth.user_id, appointment_id).await?;
    Ok(Json(ApiOk { data: dto }))
}

/* ============================================================
   POST / (create)
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub doctor_id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub reason: String,
    pub notes: Option<String>,
    pub document_ids: Option<Vec<Uuid>>,
}

pub async fn create_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    if req.reason.trim().is_empty() {
        return Err(ApiError::BadRequest("VALIDATION_ERROR", "reason is required".into()));
    }

    ensure_owned_doctor(&state, auth.user_id, req.doctor_id).await?;
    let document_ids = req.document_ids.unwrap_or_default();
    ensure_owned_documents(&state, auth.user_id, &document_ids).await?;

    let appointment_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO appointment (user_id, doctor_id, starts_at, reason, notes, document_ids)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING appointment_id
        "#,
    )
    .bind(auth.user_id)
    .bind(req.doctor_id)
    .bind(req.starts_at)
    .bind(req.reason.trim())
    .bind(req.notes)
    .bind(&document_ids)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::BadRequest("APPOINTMENT_CREATE_FAILED", format!("{e}")))?;

    let dto = fetch_appointment(&state, auth.user_id, appointment_id).await?;
    Ok(Json(ApiOk { data: dto }))
}

/* ============================================================
   PUT /{id}
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub doctor_id: Option<Uuid>,
    pub starts_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub notes: Option<Option<String>>,
    pub document_ids: Option<Vec<Uuid>>,
}

pub async fn update_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<UpdateAppointmentRequest>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    let current = fetch_appointment(&state, auth.user_id, appointment_id).await?;

    // Field edits are only allowed while the appointment is still open.
    if current.status != AppointmentStatus::Scheduled {
        return Err(ApiError::Conflict(
            "APPOINTMENT_NOT_EDITABLE",
            format!("cannot edit a {} appointment", current.status.as_str()),
        ));
    }

    if let Some(reason) = &req.reason {
        if reason.trim().is_empty() {
            return Err(ApiError::BadRequest("VALIDATION_ERROR", "reason must not be empty".into()));
        }
    }
    if let Some(doctor_id) = req.doctor_id {
        ensure_owned_doctor(&state, auth.user_id, doctor_id).await?;
    }
    if let Some(document_ids) = &req.document_ids {
        ensure_owned_documents(&state, auth.user_id, document_ids).await?;
    }

    sqlx::query(
        r#"
        UPDATE appointment
        SET
          doctor_id    = COALESCE($3, doctor_id),
          starts_at    = COALESCE($4, starts_at),
          reason       = COALESCE($5, reason),
          notes        = COALESCE($6, notes),
          document_ids = COALESCE($7, document_ids),
          updated_at   = now()
        WHERE appointment_id = $1
          AND user_id = $2
        "#,
    )
    .bind(appointment_id)
    .bind(auth.user_id)
    .bind(req.doctor_id)
    .bind(req.starts_at)
    .bind(req.reason.as_deref().map(str::trim))
    .bind(req.notes.unwrap_or(None))
    .bind(req.document_ids)
    .execute(&state.db)
    .await
    .map_err(|e| ApiError::BadRequest("APPOINTMENT_UPDATE_FAILED", format!("{e}")))?;

    let dto = fetch_appointment(&state, auth.user_id, appointment_id).await?;
    Ok(Json(ApiOk { data: dto }))
}

/* ============================================================
   Status transitions
   ============================================================ */

/// Complete an appointment and materialize the visit-history record, in one
/// transaction. The `status = 'scheduled'` guard on the update makes the
/// conversion exactly-once: a second complete call updates zero rows and
/// skips the insert entirely.
pub async fn complete_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    let current = fetch_appointment(&state, auth.user_id, appointment_id).await?;

    if current.status == AppointmentStatus::Completed {
        // Redundant complete: no second visit record.
        return Ok(Json(ApiOk { data: current }));
    }
    if !current.status.can_transition_to(AppointmentStatus::Completed) {
        return Err(ApiError::Conflict(
            "INVALID_STATUS_TRANSITION",
            format!("cannot complete a {} appointment", current.status.as_str()),
        ));
    }

    let mut tx = state.db.begin().await.map_err(ApiError::db)?;

    let row = sqlx::query(
        r#"
        UPDATE appointment
        SET status = 'completed',
            updated_at = now()
        WHERE appointment_id = $1
          AND user_id = $2
          AND status = 'scheduled'
        RETURNING doctor_id, starts_at, reason, notes, document_ids
        "#,
    )
    .bind(appointment_id)
    .bind(auth.user_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(ApiError::db)?;

    let Some(row) = row else {
        // Raced with another transition since the fetch above.
        return Err(ApiError::Conflict(
            "INVALID_STATUS_TRANSITION",
            "appointment is no longer scheduled".into(),
        ));
    };

    let doctor_id: Uuid = row.try_get("doctor_id").map_err(internal_row)?;
    let starts_at: DateTime<Utc> = row.try_get("starts_at").map_err(internal_row)?;
    let reason: String = row.try_get("reason").map_err(internal_row)?;
    let notes: Option<String> = row.try_get("notes").ok();
    let document_ids: Vec<Uuid> = row.try_get("document_ids").map_err(internal_row)?;

    sqlx::query(
        r#"
        INSERT INTO visit_history (user_id, doctor_id, visit_date, reason, notes, document_ids)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(auth.user_id)
    .bind(doctor_id)
    .bind(starts_at)
    .bind(&reason)
    .bind(provenance_notes(notes.as_deref()))
    .bind(&document_ids)
    .execute(&mut *tx)
    .await
    .map_err(ApiError::db)?;

    tx.commit().await.map_err(ApiError::db)?;

    let dto = fetch_appointment(&state, auth.user_id, appointment_id).await?;
    Ok(Json(ApiOk { data: dto }))
}

pub async fn cancel_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    let current = fetch_appointment(&state, auth.user_id, appointment_id).await?;

    if current.status == AppointmentStatus::Cancelled {
        return Ok(Json(ApiOk { data: current }));
    }
    if !current.status.can_transition_to(AppointmentStatus::Cancelled) {
        return Err(ApiError::Conflict(
            "INVALID_STATUS_TRANSITION",
            format!("cannot cancel a {} appointment", current.status.as_str()),
        ));
    }

    sqlx::query(
        r#"
        UPDATE appointment
        SET status = 'cancelled',
            updated_at = now()
        WHERE appointment_id = $1
          AND user_id = $2
          AND status = 'scheduled'
        "#,
    )
    .bind(appointment_id)
    .bind(auth.user_id)
    .execute(&state.db)
    .await
    .map_err(|e| ApiError::BadRequest("APPOINTMENT_UPDATE_FAILED", format!("{e}")))?;

    let dto = fetch_appointment(&state, auth.user_id, appointment_id).await?;
    Ok(Json(ApiOk { data: dto }))
}

#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    pub starts_at: DateTime<Utc>,
}

/// Rescheduling marks the old record and creates a fresh `scheduled` one;
/// the reminder flag starts clean so the new slot gets its own reminder.
pub async fn reschedule_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<RescheduleRequest>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    let current = fetch_appointment(&state, auth.user_id, appointment_id).await?;

    if !current.status.can_transition_to(AppointmentStatus::Rescheduled) {
        return Err(ApiError::Conflict(
            "INVALID_STATUS_TRANSITION",
            format!("cannot reschedule a {} appointment", current.status.as_str()),
        ));
    }

    let mut tx = state.db.begin().await.map_err(ApiError::db)?;

    let row = sqlx::query(
        r#"
        UPDATE appointment
        SET status = 'rescheduled',
            updated_at = now()
        WHERE appointment_id = $1
          AND user_id = $2
          AND status = 'scheduled'
        RETURNING doctor_id, reason, notes, document_ids
        "#,
    )
    .bind(appointment_id)
    .bind(auth.user_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(ApiError::db)?;

    let Some(row) = row else {
        return Err(ApiError::Conflict(
            "INVALID_STATUS_TRANSITION",
            "appointment is no longer scheduled".into(),
        ));
    };

    let doctor_id: Uuid = row.try_get("doctor_id").map_err(internal_row)?;
    let reason: String = row.try_get("reason").map_err(internal_row)?;
    let notes: Option<String> = row.try_get("notes").ok();
    let document_ids: Vec<Uuid> = row.try_get("document_ids").map_err(internal_row)?;

    let new_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO appointment (user_id, doctor_id, starts_at, reason, notes, document_ids)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING appointment_id
        "#,
    )
    .bind(auth.user_id)
    .bind(doctor_id)
    .bind(req.starts_at)
    .bind(&reason)
    .bind(notes)
    .bind(&document_ids)
    .fetch_one(&mut *tx)
    .await
    .map_err(ApiError::db)?;

    tx.commit().await.map_err(ApiError::db)?;

    let dto = fetch_appointment(&state, auth.user_id, new_id).await?;
    Ok(Json(ApiOk { data: dto }))
}

/* ============================================================
   DELETE /{id}
   ============================================================ */

pub async fn delete_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiError> {
    let done = sqlx::query(
        r#"
        DELETE FROM appointment
        WHERE appointment_id = $1
          AND user_id = $2
        "#,
    )
    .bind(appointment_id)
    .bind(auth.user_id)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if done.rows_affected() == 0 {
        return Err(ApiError::not_found("appointment"));
    }
    Ok(Json(OkResponse { data: OkData { ok: true } }))
}

/* ============================================================
   misc
   ============================================================ */

/// Visit notes carry a marker showing they came from a completed
/// appointment rather than a hand-entered visit.
fn provenance_notes(notes: Option<&str>) -> String {
    match notes {
        Some(n) if !n.trim().is_empty() => format!("[from appointment] {n}"),
        _ => "[from appointment]".to_string(),
    }
}

fn internal_row(e: sqlx::Error) -> ApiError {
    ApiError::Internal(format!("row decode error: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provenance_marker_prefixes_existing_notes() {
        assert_eq!(
            provenance_notes(Some("BP slightly elevated")),
            "[from appointment] BP slightly elevated"
        );
    }

    #[test]
    fn provenance_marker_stands_alone_without_notes() {
        assert_eq!(provenance_notes(None), "[from appointment]");
        assert_eq!(provenance_notes(Some("   ")), "[from appointment]");
    }
}

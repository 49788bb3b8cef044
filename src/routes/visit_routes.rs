// src/routes/visit_routes.rs

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
    models::{AppState, OkData, OkResponse},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_visits))
        .route("/", post(create_visit))
        .route("/{visit_id}", get(get_visit))
        .route("/{visit_id}", put(update_visit))
        .route("/{visit_id}", delete(delete_visit))
}

/* ============================================================
   DTOs
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
pub struct VisitDto {
    pub visit_id: Uuid,
    pub visit_date: DateTime<Utc>,
    pub reason: String,
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
    pub notes: Option<String>,
    pub symptoms: Vec<String>,
    pub follow_up_date: Option<DateTime<Utc>>,
    pub doctor: DoctorBrief,
    pub documents: Vec<DocumentBrief>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/* ============================================================
   Helpers
   ============================================================ */

async fn fetch_visit(
    state: &AppState,
    user_id: Uuid,
    visit_id: Uuid,
) -> Result<VisitDto, ApiError> {
    let row = sqlx::query(
        r#"
        SELECT
          v.visit_id,
          v.visit_date,
          v.reason,
          v.diagnosis,
          v.prescription,
          v.notes,
          v.symptoms,
          v.follow_up_date,
          v.document_ids,
          v.created_at,
          v.updated_at,

          d.doctor_id,
          d.name AS d_name,
          d.specialty AS d_specialty,
          d.clinic AS d_clinic

        FROM visit_history v
        JOIN doctor d ON d.doctor_id = v.doctor_id
        WHERE v.visit_id = $1
          AND v.user_id = $2
        "#,
    )
    .bind(visit_id)
    .bind(user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?;

    let Some(r) = row else {
        return Err(ApiError::not_found("visit"));
    };

    let document_ids: Vec<Uuid> = r.try_get("document_ids").map_err(internal_row)?;
    let documents = fetch_document_briefs(state, user_id, &document_ids).await?;

    Ok(VisitDto {
        visit_id: r.try_get("visit_id").map_err(internal_row)?,
        visit_date: r.try_get("visit_date").map_err(internal_row)?,
        reason: r.try_get("reason").map_err(internal_row)?,
        diagnosis: r.try_get("diagnosis").ok(),
        prescription: r.try_get("prescription").ok(),
        notes: r.try_get("notes").ok(),
        symptoms: r.try_get("symptoms").map_err(internal_row)?,
        follow_up_date: r.try_get("follow_up_date").ok(),
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

/* ============================================================
   Handlers
   ============================================================ */

pub async fn list_visits(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<VisitDto>>>, ApiError> {
    let ids: Vec<Uuid> = sqlx::query_scalar(
        r#"
        SELECT visit_id
        FROM visit_history
        WHERE user_id = $1
        ORDER BY visit_date DESC
        "#,
    )
    .bind(auth.user_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        out.push(fetch_visit(&state, auth.user_id, id).await?);
    }
    Ok(Json(ApiOk { data: out }))
}

pub async fn get_visit(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(visit_id): Path<Uuid>,
) -> Result<Json<ApiOk<VisitDto>>, ApiError> {
    let dto = fetch_visit(&state, auth.user_id, visit_id).await?;
    Ok(Json(ApiOk { data: dto }))
}

#[derive(Debug, Deserialize)]
pub struct CreateVisitRequest {
    pub doctor_id: Uuid,
    pub visit_date: Option<DateTime<Utc>>,
    pub reason: String,
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
    pub notes: Option<String>,
    pub symptoms: Option<Vec<String>>,
    pub follow_up_date: Option<DateTime<Utc>>,
    pub document_ids: Option<Vec<Uuid>>,
}

pub async fn create_visit(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateVisitRequest>,
) -> Result<Json<ApiOk<VisitDto>>, ApiError> {
    if req.reason.trim().is_empty() {
        return Err(ApiError::BadRequest("VALIDATION_ERROR", "reason is required".into()));
    }
    ensure_owned_doctor(&state, auth.user_id, req.doctor_id).await?;

    let visit_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO visit_history
          (user_id, doctor_id, visit_date, reason, diagnosis, prescription,
           notes, symptoms, follow_up_date, document_ids)
        VALUES ($1, $2, COALESCE($3, now()), $4, $5, $6, $7,
                COALESCE($8, '{}'), $9, COALESCE($10, '{}'))
        RETURNING visit_id
        "#,
    )
    .bind(auth.user_id)
    .bind(req.doctor_id)
    .bind(req.visit_date)
    .bind(req.reason.trim())
    .bind(req.diagnosis)
    .bind(req.prescription)
    .bind(req.notes)
    .bind(req.symptoms)
    .bind(req.follow_up_date)
    .bind(req.document_ids)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::BadRequest("VISIT_CREATE_FAILED", format!("{e}")))?;

    let dto = fetch_visit(&state, auth.user_id, visit_id).await?;
    Ok(Json(ApiOk { data: dto }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateVisitRequest {
    pub doctor_id: Option<Uuid>,
    pub visit_date: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub diagnosis: Option<Option<String>>,
    pub prescription: Option<Option<String>>,
    pub notes: Option<Option<String>>,
    pub symptoms: Option<Vec<String>>,
    pub follow_up_date: Option<Option<DateTime<Utc>>>,
    pub document_ids: Option<Vec<Uuid>>,
}

pub async fn update_visit(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(visit_id): Path<Uuid>,
    Json(req): Json<UpdateVisitRequest>,
) -> Result<Json<ApiOk<VisitDto>>, ApiError> {
    if let Some(reason) = &req.reason {
        if reason.trim().is_empty() {
            return Err(ApiError::BadRequest("VALIDATION_ERROR", "reason must not be empty".into()));
        }
    }
    if let Some(doctor_id) = req.doctor_id {
        ensure_owned_doctor(&state, auth.user_id, doctor_id).await?;
    }

    let updated = sqlx::query(
        r#"
        UPDATE visit_history
        SET
          doctor_id      = COALESCE($3, doctor_id),
          visit_date     = COALESCE($4, visit_date),
          reason         = COALESCE($5, reason),
          diagnosis      = COALESCE($6, diagnosis),
          prescription   = COALESCE($7, prescription),
          notes          = COALESCE($8, notes),
          symptoms       = COALESCE($9, symptoms),
          follow_up_date = COALESCE($10, follow_up_date),
          document_ids   = COALESCE($11, document_ids),
          updated_at = now()
        WHERE visit_id = $1
          AND user_id = $2
        "#,
    )
    .bind(visit_id)
    .bind(auth.user_id)
    .bind(req.doctor_id)
    .bind(req.visit_date)
    .bind(req.reason.as_deref().map(str::trim))
    .bind(req.diagnosis.unwrap_or(None))
    .bind(req.prescription.unwrap_or(None))
    .bind(req.notes.unwrap_or(None))
    .bind(req.symptoms)
    .bind(req.follow_up_date.unwrap_or(None))
    .bind(req.document_ids)
    .execute(&state.db)
    .await
    .map_err(|e| ApiError::BadRequest("VISIT_UPDATE_FAILED", format!("{e}")))?;

    if updated.rows_affected() == 0 {
        return Err(ApiError::not_found("visit"));
    }

    let dto = fetch_visit(&state, auth.user_id, visit_id).await?;
    Ok(Json(ApiOk { data: dto }))
}

pub async fn delete_visit(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(visit_id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiError> {
    let done = sqlx::query(
        r#"
        DELETE FROM visit_history
        WHERE visit_id = $1
          AND user_id = $2
        "#,
    )
    .bind(visit_id)
    .bind(auth.user_id)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if done.rows_affected() == 0 {
        return Err(ApiError::not_found("visit"));
    }
    Ok(Json(OkResponse { data: OkData { ok: true } }))
}

fn internal_row(e: sqlx::Error) -> ApiError {
    ApiError::Internal(format!("row decode error: {e}"))
}

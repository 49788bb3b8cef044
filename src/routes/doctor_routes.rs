// src/routes/doctor_routes.rs

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post, put},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, DoctorRow, OkData, OkResponse},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_doctors))
        .route("/", post(create_doctor))
        .route("/{doctor_id}", get(get_doctor))
        .route("/{doctor_id}", put(update_doctor))
        .route("/{doctor_id}", delete(delete_doctor))
}

const DOCTOR_COLUMNS: &str = r#"
    doctor_id, name, specialty, clinic, address, phone, email,
    working_hours, created_at, updated_at
"#;

pub async fn list_doctors(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<DoctorRow>>, ApiError> {
    let rows: Vec<DoctorRow> = sqlx::query_as::<_, DoctorRow>(&format!(
        r#"
        SELECT {DOCTOR_COLUMNS}
        FROM doctor
        WHERE user_id = $1
        ORDER BY name ASC
        "#
    ))
    .bind(auth.user_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(rows))
}

pub async fn get_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<DoctorRow>, ApiError> {
    let row: DoctorRow = sqlx::query_as::<_, DoctorRow>(&format!(
        r#"
        SELECT {DOCTOR_COLUMNS}
        FROM doctor
        WHERE doctor_id = $1
          AND user_id = $2
        "#
    ))
    .bind(doctor_id)
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("doctor"))?;

    Ok(Json(row))
}

#[derive(Debug, Deserialize)]
pub struct CreateDoctorRequest {
    pub name: String,
    pub specialty: String,
    pub clinic: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub working_hours: Option<String>,
}

pub async fn create_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateDoctorRequest>,
) -> Result<Json<DoctorRow>, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("VALIDATION_ERROR", "name is required".into()));
    }

    let row: DoctorRow = sqlx::query_as::<_, DoctorRow>(&format!(
        r#"
        INSERT INTO doctor (user_id, name, specialty, clinic, address, phone, email, working_hours)
        VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, '9:00 AM - 5:00 PM'))
        RETURNING {DOCTOR_COLUMNS}
        "#
    ))
    .bind(auth.user_id)
    .bind(req.name.trim())
    .bind(req.specialty.trim())
    .bind(req.clinic.trim())
    .bind(req.address)
    .bind(req.phone)
    .bind(req.email)
    .bind(req.working_hours)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::BadRequest("DOCTOR_CREATE_FAILED", format!("{e}")))?;

    Ok(Json(row))
}

#[derive(Debug, Deserialize)]
pub struct UpdateDoctorRequest {
    pub name: Option<String>,
    pub specialty: Option<String>,
    pub clinic: Option<String>,
    pub address: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub email: Option<Option<String>>,
    pub working_hours: Option<String>,
}

pub async fn update_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(doctor_id): Path<Uuid>,
    Json(req): Json<UpdateDoctorRequest>,
) -> Result<Json<DoctorRow>, ApiError> {
    if let Some(name) = &req.name {
        if name.trim().is_empty() {
            return Err(ApiError::BadRequest("VALIDATION_ERROR", "name must not be empty".into()));
        }
    }

    let row: Option<DoctorRow> = sqlx::query_as::<_, DoctorRow>(&format!(
        r#"
        UPDATE doctor
        SET
          name          = COALESCE($3, name),
          specialty     = COALESCE($4, specialty),
          clinic        = COALESCE($5, clinic),
          address       = COALESCE($6, address),
          phone         = COALESCE($7, phone),
          email         = COALESCE($8, email),
          working_hours = COALESCE($9, working_hours),
          updated_at = now()
        WHERE doctor_id = $1
          AND user_id = $2
        RETURNING {DOCTOR_COLUMNS}
        "#
    ))
    .bind(doctor_id)
    .bind(auth.user_id)
    .bind(req.name.as_deref().map(str::trim))
    .bind(req.specialty.as_deref().map(str::trim))
    .bind(req.clinic.as_deref().map(str::trim))
    .bind(req.address.unwrap_or(None))
    .bind(req.phone.unwrap_or(None))
    .bind(req.email.unwrap_or(None))
    .bind(req.working_hours)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::BadRequest("DOCTOR_UPDATE_FAILED", format!("{e}")))?;

    let Some(row) = row else {
        return Err(ApiError::not_found("doctor"));
    };
    Ok(Json(row))
}

pub async fn delete_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiError> {
    // Appointments keep a doctor reference; refuse to orphan them.
    let in_use: i64 = sqlx::query_scalar(
        r#"
        SELECT count(*)
        FROM appointment
        WHERE doctor_id = $1
          AND user_id = $2
        "#,
    )
    .bind(doctor_id)
    .bind(auth.user_id)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    if in_use > 0 {
        return Err(ApiError::Conflict(
            "DOCTOR_IN_USE",
            "doctor still has appointments; delete or reassign them first".into(),
        ));
    }

    let done = sqlx::query(
        r#"
        DELETE FROM doctor
        WHERE doctor_id = $1
          AND user_id = $2
        "#,
    )
    .bind(doctor_id)
    .bind(auth.user_id)
    .execute(&state.db)
    .await
    .map_err(|e| ApiError::BadRequest("DOCTOR_DELETE_FAILED", format!("{e}")))?;

    if done.rows_affected() == 0 {
        return Err(ApiError::not_found("doctor"));
    }
    Ok(Json(OkResponse { data: OkData { ok: true } }))
}

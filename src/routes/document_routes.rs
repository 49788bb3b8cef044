// src/routes/document_routes.rs
//
// Metadata only: the file itself lives in external storage and file_url is
// treated as opaque.

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
    models::{AppState, DocumentRow, OkData, OkResponse, is_known_document_type},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_documents))
        .route("/", post(create_document))
        .route("/{document_id}", get(get_document))
        .route("/{document_id}", put(update_document))
        .route("/{document_id}", delete(delete_document))
}

const DOCUMENT_COLUMNS: &str = r#"
    document_id, title, doc_type, description, file_url, file_type,
    file_size, tags, created_at, updated_at
"#;

pub async fn list_documents(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<DocumentRow>>, ApiError> {
    let rows: Vec<DocumentRow> = sqlx::query_as::<_, DocumentRow>(&format!(
        r#"
        SELECT {DOCUMENT_COLUMNS}
        FROM document
        WHERE user_id = $1
        ORDER BY created_at DESC
        "#
    ))
    .bind(auth.user_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(rows))
}

pub async fn get_document(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(document_id): Path<Uuid>,
) -> Result<Json<DocumentRow>, ApiError> {
    let row: DocumentRow = sqlx::query_as::<_, DocumentRow>(&format!(
        r#"
        SELECT {DOCUMENT_COLUMNS}
        FROM document
        WHERE document_id = $1
          AND user_id = $2
        "#
    ))
    .bind(document_id)
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("document"))?;

    Ok(Json(row))
}

#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    pub title: String,
    pub doc_type: String,
    pub description: Option<String>,
    pub file_url: String,
    pub file_type: String,
    pub file_size: Option<i64>,
    pub tags: Option<Vec<String>>,
}

pub async fn create_document(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateDocumentRequest>,
) -> Result<Json<DocumentRow>, ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::BadRequest("VALIDATION_ERROR", "title is required".into()));
    }
    if !is_known_document_type(&req.doc_type) {
        return Err(ApiError::BadRequest("VALIDATION_ERROR", "unknown document type".into()));
    }
    if req.file_url.trim().is_empty() {
        return Err(ApiError::BadRequest("VALIDATION_ERROR", "file_url is required".into()));
    }

    let row: DocumentRow = sqlx::query_as::<_, DocumentRow>(&format!(
        r#"
        INSERT INTO document (user_id, title, doc_type, description, file_url, file_type, file_size, tags)
        VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, '{{}}'))
        RETURNING {DOCUMENT_COLUMNS}
        "#
    ))
    .bind(auth.user_id)
    .bind(req.title.trim())
    .bind(&req.doc_type)
    .bind(req.description)
    .bind(req.file_url.trim())
    .bind(&req.file_type)
    .bind(req.file_size)
    .bind(req.tags)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::BadRequest("DOCUMENT_CREATE_FAILED", format!("{e}")))?;

    Ok(Json(row))
}

#[derive(Debug, Deserialize)]
pub struct UpdateDocumentRequest {
    pub title: Option<String>,
    pub doc_type: Option<String>,
    pub description: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
}

pub async fn update_document(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(document_id): Path<Uuid>,
    Json(req): Json<UpdateDocumentRequest>,
) -> Result<Json<DocumentRow>, ApiError> {
    if let Some(title) = &req.title {
        if title.trim().is_empty() {
            return Err(ApiError::BadRequest("VALIDATION_ERROR", "title must not be empty".into()));
        }
    }
    if let Some(doc_type) = &req.doc_type {
        if !is_known_document_type(doc_type) {
            return Err(ApiError::BadRequest("VALIDATION_ERROR", "unknown document type".into()));
        }
    }

    let row: Option<DocumentRow> = sqlx::query_as::<_, DocumentRow>(&format!(
        r#"
        UPDATE document
        SET
          title       = COALESCE($3, title),
          doc_type    = COALESCE($4, doc_type),
          description = COALESCE($5, description),
          tags        = COALESCE($6, tags),
          updated_at = now()
        WHERE document_id = $1
          AND user_id = $2
        RETURNING {DOCUMENT_COLUMNS}
        "#
    ))
    .bind(document_id)
    .bind(auth.user_id)
    .bind(req.title.as_deref().map(str::trim))
    .bind(req.doc_type)
    .bind(req.description.unwrap_or(None))
    .bind(req.tags)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::BadRequest("DOCUMENT_UPDATE_FAILED", format!("{e}")))?;

    let Some(row) = row else {
        return Err(ApiError::not_found("document"));
    };
    Ok(Json(row))
}

pub async fn delete_document(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(document_id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiError> {
    let done = sqlx::query(
        r#"
        DELETE FROM document
        WHERE document_id = $1
          AND user_id = $2
        "#,
    )
    .bind(document_id)
    .bind(auth.user_id)
    .execute(&state.db)
    .await
    .map_err(|e| ApiError::BadRequest("DOCUMENT_DELETE_FAILED", format!("{e}")))?;

    if done.rows_affected() == 0 {
        return Err(ApiError::not_found("document"));
    }

    // Detach the document from any appointment or visit that references it.
    let _ = sqlx::query(
        r#"
        UPDATE appointment
        SET document_ids = array_remove(document_ids, $1),
            updated_at = now()
        WHERE user_id = $2
          AND $1 = ANY(document_ids)
        "#,
    )
    .bind(document_id)
    .bind(auth.user_id)
    .execute(&state.db)
    .await;
    let _ = sqlx::query(
        r#"
        UPDATE visit_history
        SET document_ids = array_remove(document_ids, $1),
            updated_at = now()
        WHERE user_id = $2
          AND $1 = ANY(document_ids)
        "#,
    )
    .bind(document_id)
    .bind(auth.user_id)
    .execute(&state.db)
    .await;

    Ok(Json(OkResponse { data: OkData { ok: true } }))
}

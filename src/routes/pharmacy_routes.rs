// src/routes/pharmacy_routes.rs
//
// Drug-information lookups, proxied to the openFDA label API.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use serde::Serialize;

use crate::{
    drug_info::{DrugAlternative, DrugInfoError, DrugSummary},
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/search/{drug_name}", get(search_drug))
        .route("/alternatives/{drug_name}", get(drug_alternatives))
}

fn lookup_error(e: DrugInfoError, drug_name: &str) -> ApiError {
    match e {
        DrugInfoError::NotFound => ApiError::NotFound(
            "DRUG_NOT_FOUND",
            format!("no information found for \"{drug_name}\"; try a different spelling or the generic name"),
        ),
        DrugInfoError::Transport(e) => ApiError::Internal(format!("drug lookup failed: {e}")),
        DrugInfoError::Upstream(status) => {
            ApiError::Internal(format!("drug database returned HTTP {status}"))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DrugSearchResponse {
    pub data: DrugSearchData,
}

#[derive(Debug, Serialize)]
pub struct DrugSearchData {
    pub query: String,
    pub results: Vec<DrugSummary>,
}

pub async fn search_drug(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(drug_name): Path<String>,
) -> Result<Json<DrugSearchResponse>, ApiError> {
    let drug_name = drug_name.trim().to_string();
    if drug_name.is_empty() {
        return Err(ApiError::BadRequest("VALIDATION_ERROR", "drug name is required".into()));
    }

    let results = state
        .drug_info
        .search(&drug_name)
        .await
        .map_err(|e| lookup_error(e, &drug_name))?;

    Ok(Json(DrugSearchResponse {
        data: DrugSearchData {
            query: drug_name,
            results,
        },
    }))
}

#[derive(Debug, Serialize)]
pub struct DrugAlternativesResponse {
    pub data: DrugAlternativesData,
}

#[derive(Debug, Serialize)]
pub struct DrugAlternativesData {
    pub original_drug: String,
    pub generic_name: String,
    pub alternatives: Vec<DrugAlternative>,
}

pub async fn drug_alternatives(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(drug_name): Path<String>,
) -> Result<Json<DrugAlternativesResponse>, ApiError> {
    let drug_name = drug_name.trim().to_string();
    if drug_name.is_empty() {
        return Err(ApiError::BadRequest("VALIDATION_ERROR", "drug name is required".into()));
    }

    let (generic_name, alternatives) = state
        .drug_info
        .alternatives(&drug_name)
        .await
        .map_err(|e| lookup_error(e, &drug_name))?;

    Ok(Json(DrugAlternativesResponse {
        data: DrugAlternativesData {
            original_drug: drug_name,
            generic_name,
            alternatives,
        },
    }))
}

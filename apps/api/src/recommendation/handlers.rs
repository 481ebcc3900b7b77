//! Axum route handlers for the Recommendation API.

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::recommendation::RecommendationItem;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendResponse {
    pub recommended_assessments: Vec<RecommendationItem>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /recommend
///
/// Retrieves candidate assessments for the query, asks the model for a
/// shortlist and returns the validated rows.
pub async fn handle_recommend(
    State(state): State<AppState>,
    payload: Result<Json<RecommendRequest>, JsonRejection>,
) -> Result<Json<RecommendResponse>, AppError> {
    let Json(request) = payload?;
    let query = request
        .query
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Query field is required".to_string()))?;

    let request_id = Uuid::new_v4();
    let span = info_span!("recommend", %request_id);

    async move {
        info!("Recommending for query {:?}", query);
        let recommended_assessments = state.service.recommend(&query).await?;
        Ok::<_, AppError>(Json(RecommendResponse {
            recommended_assessments,
        }))
    }
    .instrument(span)
    .await
}

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use crate::{error::AppResult, middleware::RequestId, models::LibrarySummary};

use super::AppState;

/// Handler for the aggregated library of one user
pub async fn get_library(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Extension(request_id): Extension<RequestId>,
) -> AppResult<Json<LibrarySummary>> {
    tracing::info!(request_id = %request_id, user_id = %user_id, "Library requested");

    let summary = state.pipeline.aggregate(&user_id).await?;
    Ok(Json(summary))
}

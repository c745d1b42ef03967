use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppResult,
    middleware::RequestId,
    models::{ProviderMetrics, Recommendation},
    services::{CandidateFilter, RecommendOptions},
};

use super::AppState;

/// Body shared by both recommendation endpoints; every field is optional
#[derive(Debug, Default, Deserialize)]
pub struct RecommendationBody {
    #[serde(default)]
    pub user_prompt: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Payload ceiling in bytes; falls back to the configured default
    #[serde(default)]
    pub budget: Option<usize>,
    #[serde(flatten)]
    pub filter: CandidateFilter,
}

#[derive(Debug, Serialize)]
pub struct RecommendationsResponse {
    pub user_id: String,
    pub provider: &'static str,
    pub recommendations: Vec<Recommendation>,
    pub metrics: ProviderMetrics,
}

#[derive(Debug, Serialize)]
pub struct SurpriseResponse {
    pub user_id: String,
    pub provider: &'static str,
    pub recommendation: Recommendation,
    pub metrics: ProviderMetrics,
}

impl RecommendationBody {
    fn into_parts(self, state: &AppState) -> (usize, RecommendOptions) {
        let budget = self.budget.unwrap_or(state.default_budget);
        let options = RecommendOptions {
            user_prompt: self.user_prompt,
            model: self.model,
            filter: self.filter,
            timeout: state.provider_timeout,
        };
        (budget, options)
    }
}

/// Handler for ranked recommendations
///
/// Provider failures fail only this request. The aggregated library stays available
/// from `GET /users/:user_id/library`, which never calls the recommender.
pub async fn recommend(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Extension(request_id): Extension<RequestId>,
    Json(body): Json<RecommendationBody>,
) -> AppResult<Json<RecommendationsResponse>> {
    tracing::info!(request_id = %request_id, user_id = %user_id, "Recommendations requested");

    let (budget, options) = body.into_parts(&state);
    let summary = state.pipeline.aggregate(&user_id).await?;
    let set = state
        .pipeline
        .recommend(&summary, budget, state.provider.as_ref(), options)
        .await?;

    Ok(Json(RecommendationsResponse {
        user_id,
        provider: state.provider.name(),
        recommendations: set.recommendations,
        metrics: set.metrics,
    }))
}

/// Handler for a single surprise pick
pub async fn surprise_me(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Extension(request_id): Extension<RequestId>,
    Json(body): Json<RecommendationBody>,
) -> AppResult<Json<SurpriseResponse>> {
    tracing::info!(request_id = %request_id, user_id = %user_id, "Surprise pick requested");

    let (budget, options) = body.into_parts(&state);
    let summary = state.pipeline.aggregate(&user_id).await?;
    let pick = state
        .pipeline
        .surprise_me(&summary, budget, state.provider.as_ref(), options)
        .await?;

    Ok(Json(SurpriseResponse {
        user_id,
        provider: state.provider.name(),
        recommendation: pick.recommendation,
        metrics: pick.metrics,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_defaults() {
        let body: RecommendationBody = serde_json::from_str("{}").unwrap();
        assert!(body.user_prompt.is_none());
        assert!(body.budget.is_none());
        assert!(body.filter.excluded_ids.is_empty());
        assert!(!body.filter.include_unplayed);
    }

    #[test]
    fn test_body_flattens_filter_fields() {
        let body: RecommendationBody = serde_json::from_str(
            r#"{"budget": 2000, "excluded_ids": ["620"], "max_playtime_hours": 5, "exclude_completed": true}"#,
        )
        .unwrap();
        assert_eq!(body.budget, Some(2000));
        assert!(body.filter.excluded_ids.contains("620"));
        assert_eq!(body.filter.max_playtime_hours, Some(5));
        assert!(body.filter.exclude_completed);
    }
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// Ownership data could not be interpreted as a list of records
    #[error("[{stage}] malformed ownership data: {message}")]
    DataShape {
        stage: &'static str,
        message: String,
    },

    /// A single completion-source lookup failed; absorbed by the matcher
    #[error("completion lookup failed for '{title}': {message}")]
    LookupFailure { title: String, message: String },

    #[error("recommender '{provider}' timed out after {timeout_secs}s")]
    ProviderTimeout {
        provider: &'static str,
        timeout_secs: u64,
    },

    #[error("recommender '{provider}' transport error: {message}")]
    ProviderTransport {
        provider: &'static str,
        message: String,
    },

    #[error("could not parse recommendations: {0}")]
    RecommendationParse(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn data_shape(stage: &'static str, message: impl Into<String>) -> Self {
        AppError::DataShape {
            stage,
            message: message.into(),
        }
    }

    /// Short machine-readable label used in logs and error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::DataShape { .. } => "data_shape",
            AppError::LookupFailure { .. } => "lookup_failure",
            AppError::ProviderTimeout { .. } => "provider_timeout",
            AppError::ProviderTransport { .. } => "provider_transport",
            AppError::RecommendationParse(_) => "recommendation_parse",
            AppError::HttpClient(_) => "http_client",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::ExternalApi(_) => "external_api",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::ProviderTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            AppError::DataShape { .. }
            | AppError::LookupFailure { .. }
            | AppError::ProviderTransport { .. }
            | AppError::RecommendationParse(_)
            | AppError::HttpClient(_)
            | AppError::ExternalApi(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

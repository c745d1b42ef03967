/// Recommender backend abstraction
///
/// Each backend turns a `RecommendationRequest` into the raw text of the model's reply.
/// Parsing that text is not a backend concern; see `services::recommendation_parser`.
use crate::{
    config::Config,
    error::{AppError, AppResult},
    models::{RecommendationRequest, TokenUsage},
};
use std::sync::Arc;

mod chat;
pub mod azure_openai;
pub mod openai;
pub mod openrouter;

pub use azure_openai::AzureOpenAiProvider;
pub use openai::OpenAiProvider;
pub use openrouter::OpenRouterProvider;

/// Raw reply text plus whatever usage accounting the backend reported
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderReply {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

impl ProviderReply {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Trait for AI recommendation backends
///
/// Implementations must not retry internally. The caller owns the timeout.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RecommenderProvider: Send + Sync {
    /// Sends the request and returns the model's raw reply
    async fn generate(&self, request: &RecommendationRequest) -> AppResult<ProviderReply>;

    /// Provider name for logging and error reporting
    fn name(&self) -> &'static str;
}

/// Builds the backend selected by `RECOMMENDER_PROVIDER`.
///
/// Missing credentials for the selected backend are a startup error.
pub fn from_config(config: &Config) -> AppResult<Arc<dyn RecommenderProvider>> {
    let selected = config.recommender_provider.trim().to_lowercase();
    let provider: Arc<dyn RecommenderProvider> = match selected.as_str() {
        "openrouter" => Arc::new(OpenRouterProvider::new(
            required(&config.openrouter_api_key, "OPENROUTER_API_KEY")?,
            config.openrouter_model.clone(),
        )),
        "openai" => Arc::new(OpenAiProvider::new(
            required(&config.openai_api_key, "OPENAI_API_KEY")?,
            config.openai_model.clone(),
        )),
        "azureopenai" | "azure_openai" | "azure" => Arc::new(AzureOpenAiProvider::new(
            required(&config.azure_openai_endpoint, "AZURE_OPENAI_ENDPOINT")?,
            required(&config.azure_openai_api_key, "AZURE_OPENAI_API_KEY")?,
            required(&config.azure_openai_deployment, "AZURE_OPENAI_DEPLOYMENT")?,
            config.azure_openai_api_version.clone(),
        )),
        other => {
            return Err(AppError::InvalidInput(format!(
                "Unknown recommender provider: {}",
                other
            )))
        }
    };

    tracing::info!(provider = provider.name(), "Recommender provider configured");
    Ok(provider)
}

fn required(value: &Option<String>, var: &str) -> AppResult<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::InvalidInput(format!("{} is not set", var)))
}

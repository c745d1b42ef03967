/// OpenRouter chat-completions backend
use crate::{
    error::AppResult,
    models::RecommendationRequest,
    services::providers::{chat, ProviderReply, RecommenderProvider},
};
use reqwest::Client as HttpClient;

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

#[derive(Clone)]
pub struct OpenRouterProvider {
    http_client: HttpClient,
    api_key: String,
    default_model: String,
    api_url: String,
}

impl OpenRouterProvider {
    pub fn new(api_key: String, default_model: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            default_model,
            api_url: OPENROUTER_URL.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl RecommenderProvider for OpenRouterProvider {
    async fn generate(&self, request: &RecommendationRequest) -> AppResult<ProviderReply> {
        let model = request.model.as_deref().unwrap_or(&self.default_model);
        tracing::debug!(model, "Calling OpenRouter");

        let body = chat::chat_body(Some(model), request, true);
        chat::send_chat(
            &self.http_client,
            self.name(),
            &self.api_url,
            ("Authorization", format!("Bearer {}", self.api_key)),
            &body,
        )
        .await
    }

    fn name(&self) -> &'static str {
        "openrouter"
    }
}

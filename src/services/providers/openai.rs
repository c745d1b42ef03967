use crate::{
    error::AppResult,
    models::RecommendationRequest,
    services::providers::{chat, ProviderReply, RecommenderProvider},
};
use reqwest::Client as HttpClient;

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Clone)]
pub struct OpenAiProvider {
    http_client: HttpClient,
    api_key: String,
    default_model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, default_model: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            default_model,
        }
    }
}

#[async_trait::async_trait]
impl RecommenderProvider for OpenAiProvider {
    async fn generate(&self, request: &RecommendationRequest) -> AppResult<ProviderReply> {
        let model = request.model.as_deref().unwrap_or(&self.default_model);
        let body = chat::chat_body(Some(model), request, true);
        chat::send_chat(
            &self.http_client,
            self.name(),
            OPENAI_URL,
            ("Authorization", format!("Bearer {}", self.api_key)),
            &body,
        )
        .await
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

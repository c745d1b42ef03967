/// Azure OpenAI backend
///
/// The deployment fixes the model, so per-request model overrides are ignored here.
use crate::{
    error::AppResult,
    models::RecommendationRequest,
    services::providers::{chat, ProviderReply, RecommenderProvider},
};
use reqwest::Client as HttpClient;

#[derive(Clone)]
pub struct AzureOpenAiProvider {
    http_client: HttpClient,
    api_key: String,
    completions_url: String,
}

impl AzureOpenAiProvider {
    pub fn new(endpoint: String, api_key: String, deployment: String, api_version: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            completions_url: completions_url(&endpoint, &deployment, &api_version),
        }
    }
}

fn completions_url(endpoint: &str, deployment: &str, api_version: &str) -> String {
    format!(
        "{}/openai/deployments/{}/chat/completions?api-version={}",
        endpoint.trim_end_matches('/'),
        deployment,
        api_version
    )
}

#[async_trait::async_trait]
impl RecommenderProvider for AzureOpenAiProvider {
    async fn generate(&self, request: &RecommendationRequest) -> AppResult<ProviderReply> {
        if let Some(model) = &request.model {
            tracing::debug!(model = %model, "Model override ignored for Azure deployment");
        }

        let body = chat::chat_body(None, request, true);
        chat::send_chat(
            &self.http_client,
            self.name(),
            &self.completions_url,
            ("api-key", self.api_key.clone()),
            &body,
        )
        .await
    }

    fn name(&self) -> &'static str {
        "azure_openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completions_url() {
        assert_eq!(
            completions_url("https://games.openai.azure.com/", "picks", "2024-06-01"),
            "https://games.openai.azure.com/openai/deployments/picks/chat/completions?api-version=2024-06-01"
        );
    }
}

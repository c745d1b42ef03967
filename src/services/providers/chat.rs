/// OpenAI-style chat-completions plumbing shared by every backend
///
/// Backends differ only in URL, auth header and whether the model is named in the body.
use crate::{
    error::{AppError, AppResult},
    models::{RecommendationRequest, TokenUsage},
    services::providers::ProviderReply,
};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Debug, Serialize)]
pub(super) struct ChatBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: std::borrow::Cow<'a, str>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Builds the request body: instruction as the system turn, library payload as the user turn
pub(super) fn chat_body<'a>(
    model: Option<&'a str>,
    request: &'a RecommendationRequest,
    json_mode: bool,
) -> ChatBody<'a> {
    ChatBody {
        model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: request.instruction.into(),
            },
            ChatMessage {
                role: "user",
                content: request.user_message().into(),
            },
        ],
        response_format: json_mode.then_some(ResponseFormat {
            kind: "json_object",
        }),
    }
}

/// Pulls the first choice's message text and the usage block out of a response
pub(super) fn into_reply(provider: &'static str, response: ChatResponse) -> AppResult<ProviderReply> {
    let usage = response.usage;
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| AppError::ProviderTransport {
            provider,
            message: "response contained no message content".to_string(),
        })?;

    Ok(ProviderReply { text, usage })
}

/// POSTs a chat-completions body and returns the reply text.
///
/// `auth` is the header name and value carrying the credential.
pub(super) async fn send_chat(
    http_client: &HttpClient,
    provider: &'static str,
    url: &str,
    auth: (&'static str, String),
    body: &ChatBody<'_>,
) -> AppResult<ProviderReply> {
    let transport = |message: String| AppError::ProviderTransport { provider, message };
    let started = Instant::now();

    let response = http_client
        .post(url)
        .header(auth.0, auth.1)
        .json(body)
        .send()
        .await
        .map_err(|e| transport(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        tracing::error!(provider, status = %status, "Recommender request failed");
        return Err(transport(format!("status {}: {}", status, body)));
    }

    let parsed: ChatResponse = response
        .json()
        .await
        .map_err(|e| transport(format!("undecodable response: {}", e)))?;

    if let Some(usage) = &parsed.usage {
        tracing::info!(
            provider,
            elapsed_ms = started.elapsed().as_millis() as u64,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            total_tokens = usage.total_tokens,
            "Recommender call completed"
        );
    } else {
        tracing::info!(
            provider,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Recommender call completed"
        );
    }

    into_reply(provider, parsed)
}

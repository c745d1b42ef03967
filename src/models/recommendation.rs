use serde::{Deserialize, Serialize};

use super::EnrichedTitle;

/// A bounded, serialized slice of the library ready for a recommender backend
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationRequest {
    /// Titles included in the payload, in selection order
    pub candidate_titles: Vec<EnrichedTitle>,
    /// Ceiling for `payload.len()`
    pub prompt_budget: usize,
    /// Serialized candidate JSON array
    pub payload: String,
    /// Fixed system-role instruction text
    pub instruction: &'static str,
    pub template_version: &'static str,
    pub user_prompt: Option<String>,
    /// Backend model override
    pub model: Option<String>,
    /// Ask the backend for exactly one pick
    pub single_pick: bool,
}

/// One ranked recommendation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub title: String,
    /// 1-based, contiguous across the list
    pub rank: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// Token counts reported by a chat-completions backend
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

/// Cost of one recommender call, returned alongside its results
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderMetrics {
    /// Wall-clock seconds spent waiting on the backend
    pub response_time: f64,
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationSet {
    pub recommendations: Vec<Recommendation>,
    pub metrics: ProviderMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SurprisePick {
    pub recommendation: Recommendation,
    pub metrics: ProviderMetrics,
}

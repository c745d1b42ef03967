use serde::Deserialize;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Steam Web API key
    pub steam_api_key: String,

    /// Steam Web API base URL
    #[serde(default = "default_steam_api_url")]
    pub steam_api_url: String,

    /// Steam store API base URL (genre/category lookups)
    #[serde(default = "default_steam_store_url")]
    pub steam_store_url: String,

    /// How many of the most played titles get store tags fetched
    #[serde(default = "default_steam_tag_lookup_limit")]
    pub steam_tag_lookup_limit: usize,

    /// HowLongToBeat search endpoint
    #[serde(default = "default_hltb_api_url")]
    pub hltb_api_url: String,

    /// Which recommender backend to use: openrouter, openai or azureopenai
    #[serde(default = "default_recommender_provider")]
    pub recommender_provider: String,

    pub openrouter_api_key: Option<String>,

    #[serde(default = "default_openrouter_model")]
    pub openrouter_model: String,

    pub openai_api_key: Option<String>,

    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    pub azure_openai_endpoint: Option<String>,
    pub azure_openai_api_key: Option<String>,
    pub azure_openai_deployment: Option<String>,

    #[serde(default = "default_azure_api_version")]
    pub azure_openai_api_version: String,

    /// Minimum name similarity for accepting a completion-time match
    #[serde(default = "default_match_confidence_threshold")]
    pub match_confidence_threshold: f64,

    /// Maximum concurrent completion-source lookups per request
    #[serde(default = "default_lookup_concurrency")]
    pub lookup_concurrency: usize,

    #[serde(default = "default_lookup_timeout_secs")]
    pub lookup_timeout_secs: u64,

    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    /// Default ceiling (bytes) for the serialized candidate payload
    #[serde(default = "default_prompt_budget")]
    pub prompt_budget: usize,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_steam_api_url() -> String {
    "https://api.steampowered.com".to_string()
}

fn default_steam_store_url() -> String {
    "https://store.steampowered.com".to_string()
}

fn default_steam_tag_lookup_limit() -> usize {
    10
}

fn default_hltb_api_url() -> String {
    "https://howlongtobeat.com/api/search".to_string()
}

fn default_recommender_provider() -> String {
    "openrouter".to_string()
}

fn default_openrouter_model() -> String {
    "gryphe/mythomax-l2-13b".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_azure_api_version() -> String {
    "2024-06-01".to_string()
}

fn default_match_confidence_threshold() -> f64 {
    0.6
}

fn default_lookup_concurrency() -> usize {
    4
}

fn default_lookup_timeout_secs() -> u64 {
    10
}

fn default_provider_timeout_secs() -> u64 {
    300
}

fn default_prompt_budget() -> usize {
    6000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<Config>()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&self.match_confidence_threshold) {
            anyhow::bail!(
                "MATCH_CONFIDENCE_THRESHOLD must be within [0, 1], got {}",
                self.match_confidence_threshold
            );
        }
        if self.lookup_concurrency == 0 {
            anyhow::bail!("LOOKUP_CONCURRENCY must be at least 1");
        }
        Ok(())
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }
}

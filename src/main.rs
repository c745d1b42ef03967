use std::sync::Arc;

use anyhow::Context;
use backlog_advisor::{
    config::Config,
    routes::{create_router, AppState},
    services::{providers, CompletionMatcher, HltbClient, LibraryPipeline, MatcherSettings, SteamClient},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("backlog_advisor=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = Config::from_env()?;

    let steam = SteamClient::new(
        config.steam_api_key.clone(),
        config.steam_api_url.clone(),
        config.steam_store_url.clone(),
        config.steam_tag_lookup_limit,
    );
    let hltb = HltbClient::new(config.hltb_api_url.clone());
    let matcher = CompletionMatcher::new(
        Arc::new(hltb),
        MatcherSettings {
            confidence_threshold: config.match_confidence_threshold,
            concurrency_limit: config.lookup_concurrency,
            lookup_timeout: config.lookup_timeout(),
        },
    );
    let provider = providers::from_config(&config).context("Failed to configure recommender")?;

    let state = AppState {
        pipeline: Arc::new(LibraryPipeline::new(Arc::new(steam), matcher)),
        provider,
        default_budget: config.prompt_budget,
        provider_timeout: config.provider_timeout(),
    };
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

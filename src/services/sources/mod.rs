/// External data sources feeding the aggregation pipeline
///
/// The ownership source supplies the raw library payload; the completion source answers
/// name searches with hours-to-beat candidates. Both are traits so the pipeline can be
/// driven by fakes in tests and by the reqwest clients in production.
use crate::{error::AppResult, models::CompletionCandidate};
use serde_json::Value;

pub mod hltb;
pub mod steam;

pub use hltb::HltbClient;
pub use steam::SteamClient;

/// Source of a user's owned titles
#[async_trait::async_trait]
pub trait OwnershipSource: Send + Sync {
    /// Fetches the raw ownership payload for a user.
    ///
    /// The payload is returned untyped; the normalizer is responsible for validating it.
    async fn fetch_owned_titles(&self, user_id: &str) -> AppResult<Value>;

    /// Source name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Source of completion-time statistics, searched by title name
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CompletionSource: Send + Sync {
    /// Searches for a title by name.
    ///
    /// Candidates come back in the source's own relevance order, capped in size.
    async fn search_title(&self, name: &str) -> AppResult<Vec<CompletionCandidate>>;

    /// Identifies the shape/version of the data this source returns.
    ///
    /// Lookups are only shared when both the normalized name and this value agree.
    fn source_version(&self) -> &'static str;

    /// Source name for logging and debugging
    fn name(&self) -> &'static str;
}

pub mod library;
pub mod recommendation;
pub mod title;

pub use library::{LibrarySummary, PlaytimeDistribution};
pub use recommendation::{
    ProviderMetrics, Recommendation, RecommendationRequest, RecommendationSet, SurprisePick,
    TokenUsage,
};
pub use title::{
    CompletionCandidate, CompletionStats, EnrichedTitle, MatchOutcome, OwnedTitle,
};

pub mod aggregator;
pub mod matcher;
pub mod normalizer;
pub mod pipeline;
pub mod prompt_builder;
pub mod providers;
pub mod recommendation_parser;
pub mod sources;

pub use matcher::{CompletionMatcher, MatcherSettings};
pub use pipeline::{LibraryPipeline, RecommendOptions};
pub use prompt_builder::CandidateFilter;
pub use providers::{ProviderReply, RecommenderProvider};
pub use sources::{CompletionSource, HltbClient, OwnershipSource, SteamClient};

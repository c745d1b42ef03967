use crate::{
    error::{AppError, AppResult},
    models::{LibrarySummary, ProviderMetrics, RecommendationSet, SurprisePick},
    services::{
        aggregator::aggregate_library,
        matcher::CompletionMatcher,
        normalizer::normalize_records,
        prompt_builder::{build_request, CandidateFilter, PromptOptions},
        providers::RecommenderProvider,
        recommendation_parser::parse_recommendations,
        sources::OwnershipSource,
    },
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument;

/// Per-call knobs for `recommend` and `surprise_me`
#[derive(Debug, Clone)]
pub struct RecommendOptions {
    pub user_prompt: Option<String>,
    pub model: Option<String>,
    pub filter: CandidateFilter,
    /// Upper bound on the provider call
    pub timeout: Duration,
}

impl Default for RecommendOptions {
    fn default() -> Self {
        Self {
            user_prompt: None,
            model: None,
            filter: CandidateFilter::default(),
            timeout: Duration::from_secs(300),
        }
    }
}

/// The library operations: fetch, normalize, match, aggregate, recommend.
///
/// Holds no per-user state; every call is independent.
#[derive(Clone)]
pub struct LibraryPipeline {
    ownership: Arc<dyn OwnershipSource>,
    matcher: CompletionMatcher,
}

impl LibraryPipeline {
    pub fn new(ownership: Arc<dyn OwnershipSource>, matcher: CompletionMatcher) -> Self {
        Self { ownership, matcher }
    }

    /// Builds the enriched library summary for a user.
    ///
    /// Ownership and data-shape errors abort; completion lookup problems only leave
    /// individual titles unmatched.
    #[instrument(skip(self), fields(source = self.ownership.name()))]
    pub async fn aggregate(&self, user_id: &str) -> AppResult<LibrarySummary> {
        let raw = self.ownership.fetch_owned_titles(user_id).await?;
        let titles = normalize_records(&raw)?;
        let outcomes = self.matcher.match_titles(&titles).await;
        aggregate_library(titles, outcomes, self.matcher.settings().confidence_threshold)
    }

    /// Ranked recommendations drawn from the summary's titles
    #[instrument(skip_all, fields(provider = provider.name(), budget = budget))]
    pub async fn recommend(
        &self,
        summary: &LibrarySummary,
        budget: usize,
        provider: &dyn RecommenderProvider,
        options: RecommendOptions,
    ) -> AppResult<RecommendationSet> {
        self.run_recommendation(summary, budget, provider, options, false)
            .await
    }

    /// A single top pick
    #[instrument(skip_all, fields(provider = provider.name(), budget = budget))]
    pub async fn surprise_me(
        &self,
        summary: &LibrarySummary,
        budget: usize,
        provider: &dyn RecommenderProvider,
        options: RecommendOptions,
    ) -> AppResult<SurprisePick> {
        let set = self
            .run_recommendation(summary, budget, provider, options, true)
            .await?;

        let mut recommendation = set.recommendations.into_iter().next().ok_or_else(|| {
            AppError::RecommendationParse("provider returned no recommendation".to_string())
        })?;
        recommendation.rank = 1;
        Ok(SurprisePick {
            recommendation,
            metrics: set.metrics,
        })
    }

    async fn run_recommendation(
        &self,
        summary: &LibrarySummary,
        budget: usize,
        provider: &dyn RecommenderProvider,
        options: RecommendOptions,
        single_pick: bool,
    ) -> AppResult<RecommendationSet> {
        let candidates = options.filter.apply(summary);
        tracing::debug!(
            library_size = summary.title_count,
            candidates = candidates.len(),
            "Candidate filter applied"
        );

        let request = build_request(
            &candidates,
            budget,
            PromptOptions {
                user_prompt: options.user_prompt,
                model: options.model,
                single_pick,
            },
        )?;

        let started = Instant::now();
        let reply = match tokio::time::timeout(options.timeout, provider.generate(&request)).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(
                    provider = provider.name(),
                    timeout_secs = options.timeout.as_secs(),
                    "Recommender call timed out"
                );
                return Err(AppError::ProviderTimeout {
                    provider: provider.name(),
                    timeout_secs: options.timeout.as_secs(),
                });
            }
        };

        let metrics = ProviderMetrics {
            response_time: started.elapsed().as_secs_f64(),
            usage: reply.usage,
        };

        let recommendations = parse_recommendations(&reply.text, &request)?;
        tracing::info!(
            provider = provider.name(),
            count = recommendations.len(),
            single_pick,
            response_time = metrics.response_time,
            "Recommendations produced"
        );
        Ok(RecommendationSet {
            recommendations,
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompletionCandidate, RecommendationRequest};
    use crate::services::matcher::MatcherSettings;
    use crate::models::TokenUsage;
    use crate::services::providers::{MockRecommenderProvider, ProviderReply};
    use crate::services::sources::MockCompletionSource;
    use serde_json::{json, Value};

    struct FakeSteam(Value);

    #[async_trait::async_trait]
    impl OwnershipSource for FakeSteam {
        async fn fetch_owned_titles(&self, _user_id: &str) -> AppResult<Value> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }

    fn library_payload() -> Value {
        json!({
            "response": {
                "game_count": 3,
                "games": [
                    { "appid": 620, "name": "Portal 2", "playtime_forever": 1260 },
                    { "appid": 1145360, "name": "Hades", "playtime_forever": 3000 },
                    { "appid": 504230, "name": "Celeste", "playtime_forever": 600 }
                ]
            }
        })
    }

    fn pipeline(payload: Value) -> LibraryPipeline {
        let mut source = MockCompletionSource::new();
        source.expect_source_version().return_const("test-v1");
        source.expect_name().return_const("mock");
        source.expect_search_title().returning(|name| {
            let candidates = match name {
                "Portal 2" => vec![CompletionCandidate {
                    candidate_name: "Portal 2".to_string(),
                    main_hours: Some(8.5),
                    main_plus_extra_hours: Some(13.5),
                    completionist_hours: Some(22.0),
                }],
                "Hades" => vec![CompletionCandidate {
                    candidate_name: "Hades II".to_string(),
                    main_hours: Some(30.0),
                    main_plus_extra_hours: None,
                    completionist_hours: None,
                }],
                _ => vec![],
            };
            Ok(candidates)
        });

        LibraryPipeline::new(
            Arc::new(FakeSteam(payload)),
            CompletionMatcher::new(Arc::new(source), MatcherSettings::default()),
        )
    }

    fn provider_replying(reply: &'static str) -> MockRecommenderProvider {
        let mut provider = MockRecommenderProvider::new();
        provider.expect_name().return_const("mock-ai");
        provider
            .expect_generate()
            .returning(move |_| Ok(ProviderReply::new(reply)));
        provider
    }

    #[tokio::test]
    async fn test_aggregate_end_to_end() {
        let summary = pipeline(library_payload()).aggregate("76561197960287930").await.unwrap();

        assert_eq!(summary.title_count, 3);
        assert_eq!(summary.total_playtime_minutes, 4860);
        assert_eq!(summary.matched_count, 1);
        assert_eq!(summary.titles[0].completion.as_ref().unwrap().main_story_hours, Some(8.5));
        // "Hades II" is a different sequel, so Hades stays unmatched
        assert!(summary.titles[1].completion.is_none());
        assert_eq!(summary.most_played().unwrap().title.name, "Hades");
    }

    #[tokio::test]
    async fn test_aggregate_rejects_malformed_payload() {
        let result = pipeline(json!({ "response": { "games": "nope" } }))
            .aggregate("1")
            .await;
        assert!(matches!(result, Err(AppError::DataShape { .. })));
    }

    #[tokio::test]
    async fn test_recommend_ranks_candidates() {
        let pipeline = pipeline(library_payload());
        let summary = pipeline.aggregate("1").await.unwrap();
        let provider = provider_replying(
            r#"{"recommendations": [{"title": "Celeste", "rationale": "Short"}, {"title": "Minecraft"}, {"title": "Hades"}]}"#,
        );

        let set = pipeline
            .recommend(&summary, 6000, &provider, RecommendOptions::default())
            .await
            .unwrap();

        let titles: Vec<&str> = set.recommendations.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Celeste", "Hades"]);
        assert_eq!(set.recommendations[1].rank, 2);
        assert!(set.metrics.response_time >= 0.0);
        assert_eq!(set.metrics.usage, None);
    }

    #[tokio::test]
    async fn test_recommend_respects_exclusions() {
        let pipeline = pipeline(library_payload());
        let summary = pipeline.aggregate("1").await.unwrap();

        let mut provider = MockRecommenderProvider::new();
        provider.expect_name().return_const("mock-ai");
        provider
            .expect_generate()
            .withf(|request: &RecommendationRequest| {
                request.candidate_titles.len() == 2
                    && !request.payload.contains("Hades")
                    && request.user_message().ends_with("Something co-op")
            })
            .times(1)
            .returning(|_| Ok(ProviderReply::new(r#"["Portal 2"]"#)));

        let options = RecommendOptions {
            user_prompt: Some("Something co-op".to_string()),
            filter: CandidateFilter {
                excluded_ids: ["1145360".to_string()].into_iter().collect(),
                ..CandidateFilter::default()
            },
            ..RecommendOptions::default()
        };
        let set = pipeline.recommend(&summary, 6000, &provider, options).await.unwrap();
        assert_eq!(set.recommendations[0].title, "Portal 2");
    }

    #[tokio::test]
    async fn test_surprise_me_returns_single_pick() {
        let pipeline = pipeline(library_payload());
        let summary = pipeline.aggregate("1").await.unwrap();

        let mut provider = MockRecommenderProvider::new();
        provider.expect_name().return_const("mock-ai");
        provider
            .expect_generate()
            .withf(|request: &RecommendationRequest| request.single_pick)
            .returning(|_| {
                Ok(
                    ProviderReply::new(r#"{"recommendations": [{"title": "Portal 2"}, {"title": "Hades"}]}"#)
                        .with_usage(TokenUsage {
                            prompt_tokens: Some(120),
                            completion_tokens: Some(30),
                            total_tokens: Some(150),
                        }),
                )
            });

        let pick = pipeline
            .surprise_me(&summary, 6000, &provider, RecommendOptions::default())
            .await
            .unwrap();
        assert_eq!(pick.recommendation.title, "Portal 2");
        assert_eq!(pick.recommendation.rank, 1);
        let usage = pick.metrics.usage.unwrap();
        assert_eq!(usage.total_tokens, Some(150));
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_parse_error() {
        let pipeline = pipeline(library_payload());
        let summary = pipeline.aggregate("1").await.unwrap();
        let provider = provider_replying("I recommend: Portal 2 (best), then Celeste");

        let result = pipeline
            .recommend(&summary, 6000, &provider, RecommendOptions::default())
            .await;
        assert!(matches!(result, Err(AppError::RecommendationParse(_))));
    }

    struct StalledProvider;

    #[async_trait::async_trait]
    impl RecommenderProvider for StalledProvider {
        async fn generate(&self, _request: &RecommendationRequest) -> AppResult<ProviderReply> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(ProviderReply::new("[]"))
        }

        fn name(&self) -> &'static str {
            "stalled"
        }
    }

    #[tokio::test]
    async fn test_provider_timeout() {
        let pipeline = pipeline(library_payload());
        let summary = pipeline.aggregate("1").await.unwrap();
        let options = RecommendOptions {
            timeout: Duration::from_millis(20),
            ..RecommendOptions::default()
        };

        let result = pipeline.recommend(&summary, 6000, &StalledProvider, options).await;
        assert!(matches!(
            result,
            Err(AppError::ProviderTimeout { provider: "stalled", .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_candidate_set_never_calls_provider() {
        let pipeline = pipeline(json!({ "response": { "game_count": 0 } }));
        let summary = pipeline.aggregate("1").await.unwrap();

        let mut provider = MockRecommenderProvider::new();
        provider.expect_name().return_const("mock-ai");
        provider.expect_generate().never();

        let result = pipeline
            .recommend(&summary, 6000, &provider, RecommendOptions::default())
            .await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }
}

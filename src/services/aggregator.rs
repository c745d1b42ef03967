use crate::{
    error::{AppError, AppResult},
    models::{EnrichedTitle, LibrarySummary, MatchOutcome, OwnedTitle, PlaytimeDistribution},
};
use std::cmp::Ordering;

/// Joins owned titles with their match outcomes into a `LibrarySummary`.
///
/// Outcomes are correlated by position, never by name. Completion stats are attached
/// only for `Matched` outcomes whose confidence reaches `threshold`. Pure: no I/O.
pub fn aggregate_library(
    titles: Vec<OwnedTitle>,
    outcomes: Vec<MatchOutcome>,
    threshold: f64,
) -> AppResult<LibrarySummary> {
    if titles.len() != outcomes.len() {
        return Err(AppError::Internal(format!(
            "aggregator received {} titles but {} match outcomes",
            titles.len(),
            outcomes.len()
        )));
    }

    let mut enriched = Vec::with_capacity(titles.len());
    let mut total_playtime_minutes = 0u64;
    let mut matched_count = 0usize;
    let mut lookup_failures = 0usize;
    let mut playtime_distribution = PlaytimeDistribution::default();

    for (title, outcome) in titles.into_iter().zip(outcomes) {
        total_playtime_minutes = total_playtime_minutes.saturating_add(title.total_playtime_minutes);
        playtime_distribution.record(title.total_playtime_minutes);

        let completion = match outcome {
            MatchOutcome::Matched(stats) if stats.match_confidence >= threshold => {
                matched_count += 1;
                Some(stats)
            }
            MatchOutcome::LookupFailed { .. } => {
                lookup_failures += 1;
                None
            }
            _ => None,
        };

        enriched.push(EnrichedTitle { title, completion });
    }

    let playtime_rank = rank_by_playtime(&enriched);
    let title_count = enriched.len();

    tracing::info!(
        title_count,
        matched_count,
        lookup_failures,
        total_playtime_minutes,
        "Library aggregated"
    );

    Ok(LibrarySummary {
        titles: enriched,
        total_playtime_minutes,
        title_count,
        matched_count,
        lookup_failures,
        playtime_rank,
        playtime_distribution,
    })
}

/// Orders two titles by playtime (desc), then more recent last-played first
pub fn compare_by_engagement(a: &EnrichedTitle, b: &EnrichedTitle) -> Ordering {
    b.title
        .total_playtime_minutes
        .cmp(&a.title.total_playtime_minutes)
        // `None` sorts below any timestamp, so reversing puts never-played last
        .then_with(|| b.title.last_played.cmp(&a.title.last_played))
}

/// Indices of `titles` ordered by engagement; input order breaks remaining ties
pub fn rank_by_playtime(titles: &[EnrichedTitle]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..titles.len()).collect();
    // stable sort keeps input order for full ties
    indices.sort_by(|&a, &b| compare_by_engagement(&titles[a], &titles[b]));
    indices
}

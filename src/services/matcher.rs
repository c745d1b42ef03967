/// Completion-time matching
///
/// Catalog names and completion-source names rarely agree verbatim ("Portal 2" vs
/// "Portal 2 (2011)", "DOOM Eternal - Deluxe Edition" vs "Doom Eternal"). Both sides are
/// normalized with `normalize_title` and scored with `similarity`:
///
/// - identical normalized names score 1.0
/// - otherwise the mean of normalized Levenshtein similarity and token-set Dice overlap
/// - the score is halved when the two names carry different sequel markers (digits or
///   roman numerals), so "Hades" does not resolve to "Hades II"
///
/// The best candidate wins; ties go to the shorter raw candidate name, then to the
/// source's own order. Anything below the confidence threshold is "no match".
use crate::{
    error::AppError,
    models::{CompletionCandidate, CompletionStats, MatchOutcome, OwnedTitle},
    services::sources::CompletionSource,
};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::instrument;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.6;
const DEFAULT_CONCURRENCY_LIMIT: usize = 4;
const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Trailing words that describe an edition or platform rather than the game
const QUALIFIER_TOKENS: &[&str] = &[
    "edition",
    "goty",
    "definitive",
    "deluxe",
    "remastered",
    "remaster",
    "special",
    "ultimate",
    "complete",
    "enhanced",
    "anniversary",
    "directors",
    "cut",
    "premium",
    "collectors",
    "legendary",
    "hd",
    "pc",
    "windows",
    "mac",
    "linux",
    "steam",
];

const ROMAN_NUMERALS: &[&str] = &[
    "ii", "iii", "iv", "v", "vi", "vii", "viii", "ix", "x", "xi", "xii", "xiii",
];

/// Canonical form of a title name used for matching on both sides.
pub fn normalize_title(name: &str) -> String {
    let mut text: String = name
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '™' | '®' | '©'))
        .collect();
    text = text.replace("game of the year", "goty");

    // "(2013)", "[PC]"
    loop {
        let trimmed = text.trim_end();
        let open = match trimmed.chars().last() {
            Some(')') => '(',
            Some(']') => '[',
            _ => break,
        };
        match trimmed.rfind(open) {
            Some(pos) if !trimmed[..pos].trim().is_empty() => text.truncate(pos),
            _ => break,
        }
    }

    // "- Definitive Edition", ": Game of the Year"
    for separator in [" - ", " – ", ": "] {
        if let Some(pos) = text.rfind(separator) {
            let tail: String = text[pos + separator.len()..]
                .chars()
                .filter(|c| *c != '\'' && *c != '’')
                .collect();
            let mut tail_tokens = tail
                .split(|c: char| !c.is_alphanumeric())
                .filter(|token| !token.is_empty())
                .peekable();
            let only_qualifiers = tail_tokens.peek().is_some()
                && tail_tokens.all(|token| QUALIFIER_TOKENS.contains(&token));
            if only_qualifiers && !text[..pos].trim().is_empty() {
                text.truncate(pos);
            }
        }
    }

    let cleaned: String = text
        .chars()
        .filter(|c| *c != '\'' && *c != '’')
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();
    while tokens.len() > 1 && tokens.last().is_some_and(|t| QUALIFIER_TOKENS.contains(t)) {
        tokens.pop();
    }

    tokens.join(" ")
}

fn sequel_markers(normalized: &str) -> BTreeSet<&str> {
    normalized
        .split_whitespace()
        .filter(|t| t.chars().all(|c| c.is_ascii_digit()) || ROMAN_NUMERALS.contains(t))
        .collect()
}

fn token_dice(a: &str, b: &str) -> f64 {
    let left: BTreeSet<&str> = a.split_whitespace().collect();
    let right: BTreeSet<&str> = b.split_whitespace().collect();
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let shared = left.intersection(&right).count();
    2.0 * shared as f64 / (left.len() + right.len()) as f64
}

/// Similarity in [0, 1] between two already-normalized names
pub fn similarity(query: &str, candidate: &str) -> f64 {
    if query.is_empty() || candidate.is_empty() {
        return 0.0;
    }
    if query == candidate {
        return 1.0;
    }

    let edit = strsim::normalized_levenshtein(query, candidate);
    let overlap = token_dice(query, candidate);
    let mut score = (edit + overlap) / 2.0;

    if sequel_markers(query) != sequel_markers(candidate) {
        score *= 0.5;
    }

    score.clamp(0.0, 1.0)
}

/// Picks the best candidate for `query`, or reports why none was accepted.
///
/// Pure and deterministic: the same inputs always produce the same outcome.
pub fn select_best(query: &str, candidates: &[CompletionCandidate], threshold: f64) -> MatchOutcome {
    let normalized_query = normalize_title(query);

    let best = candidates
        .iter()
        .enumerate()
        .map(|(index, candidate)| {
            let score = similarity(&normalized_query, &normalize_title(&candidate.candidate_name));
            (index, candidate, score)
        })
        .min_by(|a, b| {
            b.2.partial_cmp(&a.2)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    a.1.candidate_name
                        .chars()
                        .count()
                        .cmp(&b.1.candidate_name.chars().count())
                })
                .then_with(|| a.0.cmp(&b.0))
        });

    match best {
        None => MatchOutcome::NoCandidates,
        Some((_, candidate, score)) if score >= threshold => {
            MatchOutcome::Matched(CompletionStats::from_candidate(candidate, score))
        }
        Some((_, _, score)) => MatchOutcome::BelowThreshold {
            best_confidence: score,
        },
    }
}

/// Tuning knobs for the matcher
#[derive(Debug, Clone)]
pub struct MatcherSettings {
    pub confidence_threshold: f64,
    /// Maximum lookups in flight at once
    pub concurrency_limit: usize,
    pub lookup_timeout: Duration,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }
}

/// Resolves owned titles to completion statistics via a `CompletionSource`
#[derive(Clone)]
pub struct CompletionMatcher {
    source: Arc<dyn CompletionSource>,
    settings: MatcherSettings,
}

impl CompletionMatcher {
    pub fn new(source: Arc<dyn CompletionSource>, settings: MatcherSettings) -> Self {
        Self { source, settings }
    }

    pub fn settings(&self) -> &MatcherSettings {
        &self.settings
    }

    /// Matches every title, returning one outcome per title in input order.
    ///
    /// Lookups run concurrently up to the configured limit. Titles that normalize to the
    /// same name share one lookup. A failed or timed-out lookup degrades to
    /// `MatchOutcome::LookupFailed` for the affected titles only.
    #[instrument(skip(self, titles), fields(title_count = titles.len(), source = self.source.name()))]
    pub async fn match_titles(&self, titles: &[OwnedTitle]) -> Vec<MatchOutcome> {
        let version = self.source.source_version();

        let mut slot_by_key: HashMap<String, usize> = HashMap::new();
        let mut queries: Vec<String> = Vec::new();
        let slots: Vec<usize> = titles
            .iter()
            .map(|title| {
                let key = format!("{}::{}", version, normalize_title(&title.name));
                *slot_by_key.entry(key).or_insert_with(|| {
                    queries.push(title.name.clone());
                    queries.len() - 1
                })
            })
            .collect();

        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency_limit.max(1)));
        let mut tasks = Vec::with_capacity(queries.len());

        for query in &queries {
            let source = Arc::clone(&self.source);
            let semaphore = Arc::clone(&semaphore);
            let settings = self.settings.clone();
            let query = query.clone();

            let task = tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return MatchOutcome::LookupFailed {
                            reason: e.to_string(),
                        }
                    }
                };
                lookup_one(source.as_ref(), &query, &settings).await
            });
            tasks.push(task);
        }

        let mut resolved = Vec::with_capacity(tasks.len());
        for (task, query) in tasks.into_iter().zip(&queries) {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(title = %query, error = %e, "Completion lookup task join error");
                    MatchOutcome::LookupFailed {
                        reason: format!("task join error: {}", e),
                    }
                }
            };
            resolved.push(outcome);
        }

        let outcomes: Vec<MatchOutcome> = slots.iter().map(|&slot| resolved[slot].clone()).collect();

        let matched = outcomes
            .iter()
            .filter(|o| matches!(o, MatchOutcome::Matched(_)))
            .count();
        let failures = outcomes.iter().filter(|o| o.is_lookup_failure()).count();

        if failures > 0 {
            tracing::warn!(
                matched,
                failures,
                lookups = queries.len(),
                "Partial completion lookup failure"
            );
        }

        tracing::info!(
            matched,
            unmatched = outcomes.len() - matched,
            lookups = queries.len(),
            "Completion matching finished"
        );

        outcomes
    }
}

async fn lookup_one(
    source: &dyn CompletionSource,
    query: &str,
    settings: &MatcherSettings,
) -> MatchOutcome {
    let result = match tokio::time::timeout(settings.lookup_timeout, source.search_title(query)).await {
        Ok(result) => result,
        Err(_) => Err(AppError::LookupFailure {
            title: query.to_string(),
            message: format!("timed out after {:?}", settings.lookup_timeout),
        }),
    };

    match result {
        Ok(candidates) => {
            let outcome = select_best(query, &candidates, settings.confidence_threshold);
            if let MatchOutcome::BelowThreshold { best_confidence } = &outcome {
                tracing::debug!(
                    title = %query,
                    best_confidence,
                    threshold = settings.confidence_threshold,
                    "No confident completion match"
                );
            }
            outcome
        }
        Err(e) => {
            tracing::warn!(title = %query, error = %e, "Completion lookup failed");
            MatchOutcome::LookupFailed {
                reason: e.to_string(),
            }
        }
    }
}

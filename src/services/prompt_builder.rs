/// Prompt construction
///
/// Turns the enriched library into a bounded `RecommendationRequest`. Selection is
/// deterministic:
///
/// 1. Rank titles by playtime (desc), then most recently played.
/// 2. If every title fits the budget in its detailed form, send them all.
/// 3. Otherwise drop last-played dates and matched names (minimal form) and try again.
///    Name, playtime, completion estimates and tags are always kept.
/// 4. Otherwise take minimal titles in rank order until the next one would not fit.
///
/// The budget covers the serialized candidate array only; the instruction template is
/// fixed per `TEMPLATE_VERSION` and always sent.
use crate::{
    error::{AppError, AppResult},
    models::{EnrichedTitle, LibrarySummary, RecommendationRequest},
    services::aggregator::compare_by_engagement,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const TEMPLATE_VERSION: &str = "library-picks/v1";

pub const INSTRUCTION_TEMPLATE: &str = "\
You are a video game recommendation assistant. The user shares part of their game \
library as a JSON array. Each entry has the game's name, hours played, optional \
HowLongToBeat completion estimates in hours, and genre tags.

Recommend which of these games the user should play next, best pick first. Only \
recommend games that appear in the provided library and use their names exactly as given.

Respond with JSON only, no prose, using this schema:
{\"recommendations\": [{\"title\": \"<game name from the library>\", \"rationale\": \"<one or two sentences>\"}]}";

const SINGLE_PICK_SUFFIX: &str = "Please recommend only one game.";

/// Which titles may be offered to the recommender
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateFilter {
    /// External ids the user excluded by hand
    #[serde(default)]
    pub excluded_ids: HashSet<String>,
    /// Drop titles already played longer than this
    #[serde(default)]
    pub max_playtime_hours: Option<u32>,
    /// Drop titles whose playtime exceeds the main-story estimate
    #[serde(default)]
    pub exclude_completed: bool,
    /// Keep titles with no recorded playtime
    #[serde(default)]
    pub include_unplayed: bool,
}

impl CandidateFilter {
    pub fn allows(&self, title: &EnrichedTitle) -> bool {
        if self.excluded_ids.contains(&title.title.external_id) {
            return false;
        }
        if !self.include_unplayed && title.title.total_playtime_minutes == 0 {
            return false;
        }
        if let Some(hours) = self.max_playtime_hours.filter(|h| *h > 0) {
            if title.title.total_playtime_minutes > u64::from(hours) * 60 {
                return false;
            }
        }
        !(self.exclude_completed && title.is_likely_completed())
    }

    /// Titles from the summary that pass the filter, in library order
    pub fn apply(&self, summary: &LibrarySummary) -> Vec<EnrichedTitle> {
        summary
            .titles
            .iter()
            .filter(|t| self.allows(t))
            .cloned()
            .collect()
    }
}

/// Caller-supplied request details that do not affect selection
#[derive(Debug, Clone, Default)]
pub struct PromptOptions {
    pub user_prompt: Option<String>,
    pub model: Option<String>,
    pub single_pick: bool,
}

#[derive(Serialize)]
struct DetailedEntry<'a> {
    name: &'a str,
    playtime_hours: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    main_story_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    main_plus_extra_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    completionist_hours: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tags: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_played: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    completion_match: Option<&'a str>,
}

#[derive(Serialize)]
struct MinimalEntry<'a> {
    name: &'a str,
    playtime_hours: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    main_story_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    main_plus_extra_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    completionist_hours: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tags: Vec<&'a str>,
}

fn rounded_hours(minutes: u64) -> f64 {
    (minutes as f64 / 60.0 * 10.0).round() / 10.0
}

fn detailed_json(entry: &EnrichedTitle) -> AppResult<String> {
    let completion = entry.completion.as_ref();
    let detailed = DetailedEntry {
        name: &entry.title.name,
        playtime_hours: rounded_hours(entry.title.total_playtime_minutes),
        main_story_hours: completion.and_then(|c| c.main_story_hours),
        main_plus_extra_hours: completion.and_then(|c| c.main_plus_extra_hours),
        completionist_hours: completion.and_then(|c| c.completionist_hours),
        tags: entry.title.tags.iter().map(String::as_str).collect(),
        last_played: entry
            .title
            .last_played
            .map(|ts| ts.format("%Y-%m-%d").to_string()),
        completion_match: completion.map(|c| c.matched_name.as_str()),
    };
    serde_json::to_string(&detailed).map_err(|e| AppError::Internal(e.to_string()))
}

fn minimal_json(entry: &EnrichedTitle) -> AppResult<String> {
    let completion = entry.completion.as_ref();
    let minimal = MinimalEntry {
        name: &entry.title.name,
        playtime_hours: rounded_hours(entry.title.total_playtime_minutes),
        main_story_hours: completion.and_then(|c| c.main_story_hours),
        main_plus_extra_hours: completion.and_then(|c| c.main_plus_extra_hours),
        completionist_hours: completion.and_then(|c| c.completionist_hours),
        tags: entry.title.tags.iter().map(String::as_str).collect(),
    };
    serde_json::to_string(&minimal).map_err(|e| AppError::Internal(e.to_string()))
}

/// Size of `[a,b,c]` built from the given serialized entries
fn array_len(entries: &[String]) -> usize {
    2 + entries.iter().map(String::len).sum::<usize>() + entries.len().saturating_sub(1)
}

/// Builds a recommendation request whose candidate payload fits `prompt_budget` bytes.
pub fn build_request(
    titles: &[EnrichedTitle],
    prompt_budget: usize,
    options: PromptOptions,
) -> AppResult<RecommendationRequest> {
    if titles.is_empty() {
        return Err(AppError::InvalidInput(
            "no candidate titles to recommend from".to_string(),
        ));
    }

    let mut ranked: Vec<&EnrichedTitle> = titles.iter().collect();
    ranked.sort_by(|a, b| compare_by_engagement(a, b));

    let detailed = ranked
        .iter()
        .map(|t| detailed_json(t))
        .collect::<AppResult<Vec<_>>>()?;

    let (form, entries) = if array_len(&detailed) <= prompt_budget {
        ("detailed", detailed)
    } else {
        let minimal = ranked
            .iter()
            .map(|t| minimal_json(t))
            .collect::<AppResult<Vec<_>>>()?;

        if array_len(&minimal) <= prompt_budget {
            ("minimal", minimal)
        } else {
            let mut used = 2usize;
            let mut fitted = Vec::new();
            for entry in minimal {
                let cost = entry.len() + usize::from(!fitted.is_empty());
                if used + cost > prompt_budget {
                    break;
                }
                used += cost;
                fitted.push(entry);
            }
            ("truncated", fitted)
        }
    };

    if entries.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "prompt budget of {} bytes cannot fit a single title",
            prompt_budget
        )));
    }

    let payload = format!("[{}]", entries.join(","));
    debug_assert!(payload.len() <= prompt_budget);

    let candidate_titles: Vec<EnrichedTitle> = ranked
        .into_iter()
        .take(entries.len())
        .cloned()
        .collect();

    tracing::info!(
        candidates = candidate_titles.len(),
        available = titles.len(),
        payload_bytes = payload.len(),
        prompt_budget,
        form,
        template_version = TEMPLATE_VERSION,
        "Recommendation prompt built"
    );

    Ok(RecommendationRequest {
        candidate_titles,
        prompt_budget,
        payload,
        instruction: INSTRUCTION_TEMPLATE,
        template_version: TEMPLATE_VERSION,
        user_prompt: options
            .user_prompt
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty()),
        model: options.model.filter(|m| !m.trim().is_empty()),
        single_pick: options.single_pick,
    })
}

impl RecommendationRequest {
    /// The user-role message sent alongside the instruction template
    pub fn user_message(&self) -> String {
        let mut message = format!("My game library data: {}.", self.payload);
        if let Some(prompt) = &self.user_prompt {
            message.push(' ');
            message.push_str(prompt);
        }
        if self.single_pick {
            message.push(' ');
            message.push_str(SINGLE_PICK_SUFFIX);
        }
        message
    }
}

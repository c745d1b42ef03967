/// Recommendation response parsing
///
/// Backends are asked for strict JSON but frequently wrap it in prose or code fences.
/// The parser tries the raw text first, then the first balanced JSON object or array
/// embedded in it. Titles are resolved against the request's candidates only.
use crate::{
    error::{AppError, AppResult},
    models::{Recommendation, RecommendationRequest},
    services::matcher::normalize_title,
};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use tracing::instrument;

const TITLE_KEYS: [&str; 3] = ["title", "name", "game"];
const RATIONALE_KEYS: [&str; 3] = ["rationale", "reason", "explanation"];

/// Parses a raw backend response into ranked recommendations.
///
/// Unknown titles and repeats are dropped; ranks are 1..N in response order.
#[instrument(skip(raw, request), fields(raw_len = raw.len()))]
pub fn parse_recommendations(
    raw: &str,
    request: &RecommendationRequest,
) -> AppResult<Vec<Recommendation>> {
    let document = serde_json::from_str::<Value>(raw.trim())
        .ok()
        .or_else(|| extract_json_block(raw))
        .ok_or_else(|| {
            AppError::RecommendationParse(format!(
                "response contains no JSON: {}",
                preview(raw)
            ))
        })?;

    let items = recommendation_items(&document)?;

    let mut by_exact: HashMap<&str, &str> = HashMap::new();
    let mut by_normalized: HashMap<String, &str> = HashMap::new();
    for candidate in &request.candidate_titles {
        let name = candidate.title.name.as_str();
        by_exact.entry(name).or_insert(name);
        by_normalized.entry(normalize_title(name)).or_insert(name);
    }

    let mut seen = HashSet::new();
    let mut recommendations = Vec::new();
    let mut dropped = 0usize;

    for item in items {
        let Some((title, rationale)) = read_item(item) else {
            dropped += 1;
            continue;
        };

        let resolved = by_exact
            .get(title.trim())
            .or_else(|| by_normalized.get(&normalize_title(title)))
            .copied();

        match resolved {
            Some(name) if seen.insert(name) => {
                recommendations.push(Recommendation {
                    title: name.to_string(),
                    rank: recommendations.len() as u32 + 1,
                    rationale,
                });
            }
            Some(_) => {}
            None => {
                tracing::debug!(title = %title, "Dropping recommendation outside the candidate set");
                dropped += 1;
            }
        }
    }

    if recommendations.is_empty() {
        return Err(AppError::RecommendationParse(format!(
            "no recommended title matched the candidate set ({} entries dropped)",
            dropped
        )));
    }

    if dropped > 0 {
        tracing::warn!(
            kept = recommendations.len(),
            dropped,
            "Some recommendations could not be resolved"
        );
    }

    Ok(recommendations)
}

fn recommendation_items(document: &Value) -> AppResult<Vec<&Value>> {
    match document {
        Value::Array(items) => Ok(items.iter().collect()),
        Value::Object(map) => {
            if let Some(items) = map.get("recommendations").and_then(Value::as_array) {
                Ok(items.iter().collect())
            } else if first_text(map, &TITLE_KEYS).is_some() {
                Ok(vec![document])
            } else {
                Err(AppError::RecommendationParse(
                    "JSON object has no recommendations list".to_string(),
                ))
            }
        }
        other => Err(AppError::RecommendationParse(format!(
            "expected a JSON object or array, got {}",
            match other {
                Value::String(_) => "a string",
                Value::Number(_) => "a number",
                Value::Bool(_) => "a boolean",
                _ => "null",
            }
        ))),
    }
}

fn read_item(item: &Value) -> Option<(&str, Option<String>)> {
    match item {
        Value::String(title) => Some((title.as_str(), None)),
        Value::Object(map) => {
            let title = first_text(map, &TITLE_KEYS)?;
            let rationale = first_text(map, &RATIONALE_KEYS)
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string);
            Some((title, rationale))
        }
        _ => None,
    }
}

fn first_text<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| map.get(*key).and_then(Value::as_str))
        .find(|text| !text.trim().is_empty())
}

/// Finds the first balanced `{...}` or `[...]` in `text` that parses as JSON
fn extract_json_block(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    for (start, &b) in bytes.iter().enumerate() {
        if b != b'{' && b != b'[' {
            continue;
        }
        if let Some(end) = balanced_end(bytes, start) {
            if let Ok(value) = serde_json::from_str::<Value>(&text[start..=end]) {
                return Some(value);
            }
        }
    }
    None
}

/// Index of the bracket closing the one at `start`, skipping string contents
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => stack.push(b'}'),
            b'[' => stack.push(b']'),
            b'}' | b']' => {
                if stack.pop() != Some(b) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn preview(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.char_indices().nth(80) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EnrichedTitle, OwnedTitle};
    use crate::services::prompt_builder::{build_request, PromptOptions};
    use std::collections::BTreeSet;

    fn request(names: &[&str]) -> RecommendationRequest {
        RecommendationRequest {
            candidate_titles: names
                .iter()
                .enumerate()
                .map(|(i, name)| EnrichedTitle {
                    title: OwnedTitle {
                        external_id: i.to_string(),
                        name: name.to_string(),
                        total_playtime_minutes: 60,
                        last_played: None,
                        tags: BTreeSet::new(),
                    },
                    completion: None,
                })
                .collect(),
            prompt_budget: 1000,
            payload: "[]".to_string(),
            instruction: "",
            template_version: "test",
            user_prompt: None,
            model: None,
            single_pick: false,
        }
    }

    fn titles(recs: &[Recommendation]) -> Vec<&str> {
        recs.iter().map(|r| r.title.as_str()).collect()
    }

    #[test]
    fn test_parses_canonical_response() {
        let req = request(&["Portal 2", "Celeste", "Hades"]);
        let raw = r#"{"recommendations": [
            {"title": "Celeste", "rationale": "Tight platforming"},
            {"title": "Portal 2", "rationale": "Great co-op"}
        ]}"#;

        let recs = parse_recommendations(raw, &req).unwrap();
        assert_eq!(titles(&recs), vec!["Celeste", "Portal 2"]);
        assert_eq!(recs[0].rank, 1);
        assert_eq!(recs[1].rank, 2);
        assert_eq!(recs[0].rationale.as_deref(), Some("Tight platforming"));
    }

    #[test]
    fn test_round_trips_builder_candidates() {
        let library: Vec<EnrichedTitle> = [
            ("620", "Portal 2", 1260),
            ("1145360", "Hades", 3000),
            ("292030", "The Witcher® 3: Wild Hunt - Game of the Year Edition", 2400),
        ]
        .into_iter()
        .map(|(id, name, minutes)| EnrichedTitle {
            title: OwnedTitle {
                external_id: id.to_string(),
                name: name.to_string(),
                total_playtime_minutes: minutes,
                last_played: None,
                tags: BTreeSet::new(),
            },
            completion: None,
        })
        .collect();
        let req = build_request(&library, 10_000, PromptOptions::default()).unwrap();

        let expected: Vec<Recommendation> = req
            .candidate_titles
            .iter()
            .enumerate()
            .map(|(i, t)| Recommendation {
                title: t.title.name.clone(),
                rank: i as u32 + 1,
                rationale: Some(format!("Pick {}", i + 1)),
            })
            .collect();
        let raw = serde_json::json!({ "recommendations": expected }).to_string();

        let parsed = parse_recommendations(&raw, &req).unwrap();
        assert_eq!(parsed, expected);
        assert_eq!(
            titles(&parsed),
            vec![
                "Hades",
                "The Witcher® 3: Wild Hunt - Game of the Year Edition",
                "Portal 2"
            ]
        );
    }

    #[test]
    fn test_scenario_prose_without_json_fails() {
        let req = request(&["Portal 2", "Celeste"]);
        let result = parse_recommendations("I recommend: Portal 2 (best), then Celeste", &req);
        assert!(matches!(result, Err(AppError::RecommendationParse(_))));
    }

    #[test]
    fn test_recovers_json_wrapped_in_prose() {
        let req = request(&["Portal 2", "Celeste"]);
        let raw = "Sure! Here are my picks:\n```json\n{\"recommendations\": [{\"name\": \"celeste\", \"reason\": \"brackets } in \\\"text\\\"\"}]}\n```\nEnjoy!";

        let recs = parse_recommendations(raw, &req).unwrap();
        assert_eq!(titles(&recs), vec!["Celeste"]);
        assert_eq!(recs[0].rationale.as_deref(), Some("brackets } in \"text\""));
    }

    #[test]
    fn test_drops_unknown_and_duplicate_titles() {
        let req = request(&["Portal 2", "The Witcher 3: Wild Hunt"]);
        let raw = r#"["Half-Life 3", "portal 2", "Portal 2", {"game": "The Witcher® 3: Wild Hunt"}]"#;

        let recs = parse_recommendations(raw, &req).unwrap();
        assert_eq!(titles(&recs), vec!["Portal 2", "The Witcher 3: Wild Hunt"]);
        assert_eq!(recs.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_single_object_response() {
        let req = request(&["Hades"]);
        let recs = parse_recommendations(r#"{"title": "Hades", "rationale": "  "}"#, &req).unwrap();
        assert_eq!(titles(&recs), vec!["Hades"]);
        assert_eq!(recs[0].rationale, None);
    }

    #[test]
    fn test_only_unknown_titles_fails() {
        let req = request(&["Hades"]);
        let result = parse_recommendations(r#"{"recommendations": ["Doom"]}"#, &req);
        assert!(matches!(result, Err(AppError::RecommendationParse(msg)) if msg.contains("1 entries dropped")));
    }

    #[test]
    fn test_balanced_end() {
        assert_eq!(balanced_end(br#"{"a": [1, 2]} tail"#, 0), Some(12));
        assert_eq!(balanced_end(br#"{"a": "]"}"#, 0), Some(9));
        assert_eq!(balanced_end(b"{[}", 0), None);
        assert_eq!(balanced_end(b"{ unterminated", 0), None);
    }
}

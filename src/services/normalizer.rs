/// Catalog record normalization
///
/// Converts loosely-typed ownership payloads into `OwnedTitle`s at the boundary, so
/// nothing past this module touches `serde_json::Value`. Field names differ between
/// the Steam Web API and generic exports; each record is classified into a tagged
/// `RawRecord` variant that knows which keys to read.
use crate::{
    error::{AppError, AppResult},
    models::OwnedTitle,
};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};
use tracing::instrument;

const STAGE: &str = "normalizer";

/// Keys consulted, in priority order, for each canonical field
struct FieldKeys {
    id: &'static [&'static str],
    name: &'static [&'static str],
    playtime: &'static [&'static str],
    last_played: &'static [&'static str],
    tags: &'static [&'static str],
}

static STEAM_KEYS: FieldKeys = FieldKeys {
    id: &["appid"],
    name: &["name"],
    playtime: &["playtime_forever"],
    last_played: &["rtime_last_played"],
    tags: &["genres", "categories", "tags"],
};

static GENERIC_KEYS: FieldKeys = FieldKeys {
    id: &["externalId", "external_id", "id"],
    name: &["name", "title"],
    playtime: &["playtimeMinutes", "playtime_minutes", "playtime_forever", "playtime"],
    last_played: &["lastPlayed", "last_played", "lastPlayedTimestamp"],
    tags: &["tags", "genres", "categories"],
};

/// A raw ownership entry, tagged by the shape it arrived in
#[derive(Debug, Clone, Copy)]
pub enum RawRecord<'a> {
    /// Steam `GetOwnedGames` entry (carries an `appid`)
    Steam(&'a Map<String, Value>),
    /// Any other export with name/playtime style fields
    Generic(&'a Map<String, Value>),
}

impl<'a> RawRecord<'a> {
    /// Classifies one element of the ownership list
    pub fn classify(index: usize, value: &'a Value) -> AppResult<Self> {
        let fields = value.as_object().ok_or_else(|| {
            AppError::data_shape(
                STAGE,
                format!("record {} is not an object (found {})", index, kind_of(value)),
            )
        })?;

        if fields.contains_key("appid") {
            Ok(RawRecord::Steam(fields))
        } else {
            Ok(RawRecord::Generic(fields))
        }
    }

    fn parts(&self) -> (&'a Map<String, Value>, &'static FieldKeys) {
        match *self {
            RawRecord::Steam(fields) => (fields, &STEAM_KEYS),
            RawRecord::Generic(fields) => (fields, &GENERIC_KEYS),
        }
    }

    /// Converts to an `OwnedTitle`, or `None` when the record has no usable name
    pub fn into_owned_title(self) -> Option<OwnedTitle> {
        let (fields, keys) = self.parts();

        let name = lookup(fields, keys.name).and_then(as_text)?;
        let external_id = lookup(fields, keys.id)
            .and_then(as_text)
            .unwrap_or_else(|| name.clone());
        let total_playtime_minutes = lookup(fields, keys.playtime)
            .and_then(as_minutes)
            .unwrap_or(0);
        let last_played = lookup(fields, keys.last_played).and_then(as_timestamp);

        let mut tags = BTreeSet::new();
        for key in keys.tags {
            if let Some(value) = fields.get(*key) {
                collect_tags(value, &mut tags);
            }
        }

        Some(OwnedTitle {
            external_id,
            name,
            total_playtime_minutes,
            last_played,
            tags,
        })
    }
}

/// Normalizes an ownership payload into owned titles.
///
/// Accepts a bare array of records or the Steam envelope (`{"response": {"games": [..]}}`).
/// Records without a usable name are skipped; duplicate ids keep the first occurrence.
#[instrument(skip(input))]
pub fn normalize_records(input: &Value) -> AppResult<Vec<OwnedTitle>> {
    let records = records_of(input)?;

    let mut titles = Vec::with_capacity(records.len());
    let mut seen_ids = HashSet::new();
    let mut skipped = 0usize;

    for (index, value) in records.iter().enumerate() {
        let record = RawRecord::classify(index, value)?;
        match record.into_owned_title() {
            Some(title) => {
                if seen_ids.insert(title.external_id.clone()) {
                    titles.push(title);
                } else {
                    tracing::debug!(
                        index,
                        external_id = %title.external_id,
                        "Skipping duplicate ownership record"
                    );
                    skipped += 1;
                }
            }
            None => {
                tracing::warn!(index, "Skipping ownership record with empty name");
                skipped += 1;
            }
        }
    }

    tracing::info!(
        input_count = records.len(),
        title_count = titles.len(),
        skipped,
        "Ownership records normalized"
    );

    Ok(titles)
}

fn records_of(input: &Value) -> AppResult<&[Value]> {
    match input {
        Value::Array(items) => Ok(items.as_slice()),
        Value::Object(map) => {
            if let Some(games) = map.get("games") {
                return games.as_array().map(Vec::as_slice).ok_or_else(|| {
                    AppError::data_shape(
                        STAGE,
                        format!("'games' is not a list (found {})", kind_of(games)),
                    )
                });
            }
            if let Some(response) = map.get("response").filter(|r| r.is_object()) {
                // Steam omits `games` entirely for empty or private libraries
                if response.get("games").is_none() {
                    return Ok(&[][..]);
                }
                return records_of(response);
            }
            if map.get("game_count").and_then(Value::as_u64) == Some(0) {
                return Ok(&[][..]);
            }
            Err(AppError::data_shape(
                STAGE,
                "object payload carries no list of records",
            ))
        }
        other => Err(AppError::data_shape(
            STAGE,
            format!("expected a list of records, found {}", kind_of(other)),
        )),
    }
}

fn lookup<'v>(fields: &'v Map<String, Value>, keys: &[&str]) -> Option<&'v Value> {
    keys.iter()
        .filter_map(|key| fields.get(*key))
        .find(|value| !value.is_null())
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_minutes(value: &Value) -> Option<u64> {
    let minutes = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !minutes.is_finite() {
        return None;
    }
    Some(minutes.max(0.0).round() as u64)
}

fn as_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let seconds = match value {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => match s.trim().parse::<i64>() {
            Ok(secs) => secs,
            Err(_) => {
                return DateTime::parse_from_rfc3339(s.trim())
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc))
            }
        },
        _ => return None,
    };
    // Steam reports 0 for never played
    if seconds <= 0 {
        return None;
    }
    Utc.timestamp_opt(seconds, 0).single()
}

fn collect_tags(value: &Value, tags: &mut BTreeSet<String>) {
    let Some(items) = value.as_array() else {
        return;
    };
    for item in items {
        let tag = match item {
            Value::String(s) => Some(s.as_str()),
            Value::Object(obj) => obj
                .get("description")
                .or_else(|| obj.get("name"))
                .and_then(Value::as_str),
            _ => None,
        };
        if let Some(tag) = tag.map(str::trim).filter(|t| !t.is_empty()) {
            tags.insert(tag.to_string());
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_steam_envelope() {
        let payload = json!({
            "response": {
                "game_count": 2,
                "games": [
                    {
                        "appid": 620,
                        "name": "Portal 2",
                        "playtime_forever": 1260,
                        "rtime_last_played": 1700000000,
                        "genres": [{"id": "1", "description": "Puzzle"}]
                    },
                    {
                        "appid": 1145360,
                        "name": "Hades",
                        "playtime_forever": 0,
                        "rtime_last_played": 0
                    }
                ]
            }
        });

        let titles = normalize_records(&payload).unwrap();
        assert_eq!(titles.len(), 2);

        assert_eq!(titles[0].external_id, "620");
        assert_eq!(titles[0].name, "Portal 2");
        assert_eq!(titles[0].total_playtime_minutes, 1260);
        assert_eq!(
            titles[0].last_played,
            Utc.timestamp_opt(1700000000, 0).single()
        );
        assert!(titles[0].tags.contains("Puzzle"));

        assert_eq!(titles[1].total_playtime_minutes, 0);
        assert_eq!(titles[1].last_played, None);
    }

    #[test]
    fn test_normalize_generic_records() {
        let payload = json!([
            {
                "externalId": "cel",
                "title": "Celeste",
                "playtimeMinutes": "95.6",
                "lastPlayed": "2024-03-01T10:00:00Z",
                "tags": ["Platformer", " ", "Indie"]
            },
            { "name": "No Playtime Field" }
        ]);

        let titles = normalize_records(&payload).unwrap();
        assert_eq!(titles.len(), 2);
        assert_eq!(titles[0].external_id, "cel");
        assert_eq!(titles[0].name, "Celeste");
        assert_eq!(titles[0].total_playtime_minutes, 96);
        assert!(titles[0].last_played.is_some());
        assert_eq!(titles[0].tags.len(), 2);

        assert_eq!(titles[1].external_id, "No Playtime Field");
        assert_eq!(titles[1].total_playtime_minutes, 0);
        assert_eq!(titles[1].last_played, None);
    }

    #[test]
    fn test_skips_empty_and_null_names() {
        let payload = json!([
            { "appid": 1, "name": "" },
            { "appid": 2, "name": null },
            { "appid": 3, "name": "   " },
            { "appid": 4 },
            { "appid": 5, "name": "Celeste" }
        ]);

        let titles = normalize_records(&payload).unwrap();
        assert_eq!(titles.len(), 1);
        assert_eq!(titles[0].name, "Celeste");
    }

    #[test]
    fn test_output_never_longer_than_input() {
        let payload = json!([
            { "appid": 1, "name": "Portal 2" },
            { "appid": 1, "name": "Portal 2" },
            { "name": "" },
            { "name": "Hades" }
        ]);

        let titles = normalize_records(&payload).unwrap();
        assert!(titles.len() <= 4);
        assert_eq!(titles.len(), 2);
        assert!(titles.iter().all(|t| !t.name.is_empty()));
    }

    #[test]
    fn test_empty_steam_library() {
        let payload = json!({ "response": { "game_count": 0 } });
        assert!(normalize_records(&payload).unwrap().is_empty());
    }

    #[test]
    fn test_private_steam_profile_is_empty_library() {
        assert!(normalize_records(&json!({ "response": {} })).unwrap().is_empty());

        let err = normalize_records(&json!({ "response": { "games": "hidden" } })).unwrap_err();
        assert!(matches!(err, AppError::DataShape { stage: "normalizer", .. }));
    }

    #[test]
    fn test_rejects_non_list_input() {
        let err = normalize_records(&json!("not a list")).unwrap_err();
        assert!(matches!(err, AppError::DataShape { stage: "normalizer", .. }));

        let err = normalize_records(&json!({ "unexpected": true })).unwrap_err();
        assert!(matches!(err, AppError::DataShape { .. }));

        let err = normalize_records(&json!({ "games": 42 })).unwrap_err();
        assert!(err.to_string().contains("'games' is not a list"));
    }

    #[test]
    fn test_rejects_non_object_record() {
        let err = normalize_records(&json!([{ "name": "Hades" }, 7])).unwrap_err();
        assert!(err.to_string().contains("record 1 is not an object"));
    }

    #[test]
    fn test_negative_playtime_coerced_to_zero() {
        let titles = normalize_records(&json!([{ "name": "Hades", "playtime": -5 }])).unwrap();
        assert_eq!(titles[0].total_playtime_minutes, 0);
    }
}

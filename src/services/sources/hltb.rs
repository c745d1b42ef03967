/// HowLongToBeat completion-time source
///
/// Uses the site's search endpoint (POST, JSON body). Durations come back in seconds;
/// a zero duration means the site has no estimate for that category.
use crate::{
    error::{AppError, AppResult},
    models::CompletionCandidate,
    services::sources::CompletionSource,
};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;

const SOURCE_VERSION: &str = "hltb-search-v1";
const DEFAULT_MAX_CANDIDATES: usize = 5;
const USER_AGENT: &str = "Mozilla/5.0 (compatible; backlog-advisor)";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<HltbGame>,
}

#[derive(Debug, Clone, Deserialize)]
struct HltbGame {
    game_name: String,
    #[serde(default)]
    comp_main: u64,
    #[serde(default)]
    comp_plus: u64,
    #[serde(default)]
    comp_100: u64,
}

impl From<HltbGame> for CompletionCandidate {
    fn from(game: HltbGame) -> Self {
        CompletionCandidate {
            candidate_name: game.game_name,
            main_hours: seconds_to_hours(game.comp_main),
            main_plus_extra_hours: seconds_to_hours(game.comp_plus),
            completionist_hours: seconds_to_hours(game.comp_100),
        }
    }
}

#[derive(Clone)]
pub struct HltbClient {
    http_client: HttpClient,
    api_url: String,
    max_candidates: usize,
}

impl HltbClient {
    pub fn new(api_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }
}

#[async_trait::async_trait]
impl CompletionSource for HltbClient {
    async fn search_title(&self, name: &str) -> AppResult<Vec<CompletionCandidate>> {
        let terms: Vec<&str> = name.split_whitespace().collect();
        if terms.is_empty() {
            return Err(AppError::InvalidInput(
                "Search query cannot be empty".to_string(),
            ));
        }

        let body = json!({
            "searchType": "games",
            "searchTerms": terms,
            "searchPage": 1,
            "size": self.max_candidates,
            "searchOptions": {
                "games": {
                    "userId": 0,
                    "platform": "",
                    "sortCategory": "popular",
                    "rangeCategory": "main",
                    "rangeTime": { "min": null, "max": null },
                    "gameplay": { "perspective": "", "flow": "", "genre": "" },
                    "modifier": ""
                },
                "users": { "sortCategory": "postcount" },
                "filter": "",
                "sort": 0,
                "randomizer": 0
            }
        });

        let response = self
            .http_client
            .post(&self.api_url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::REFERER, "https://howlongtobeat.com")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "HowLongToBeat returned status {}: {}",
                status, body
            )));
        }

        let search: SearchResponse = response.json().await?;
        let candidates: Vec<CompletionCandidate> = search
            .data
            .into_iter()
            .take(self.max_candidates)
            .map(CompletionCandidate::from)
            .collect();

        tracing::debug!(
            query = %name,
            results = candidates.len(),
            source = "hltb",
            "Completion search completed"
        );

        Ok(candidates)
    }

    fn source_version(&self) -> &'static str {
        SOURCE_VERSION
    }

    fn name(&self) -> &'static str {
        "hltb"
    }
}

/// Seconds to hours, rounded to one decimal; zero means "no estimate"
fn seconds_to_hours(seconds: u64) -> Option<f64> {
    if seconds == 0 {
        return None;
    }
    Some((seconds as f64 / 3600.0 * 10.0).round() / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_to_hours() {
        assert_eq!(seconds_to_hours(0), None);
        assert_eq!(seconds_to_hours(3600), Some(1.0));
        assert_eq!(seconds_to_hours(30_960), Some(8.6));
    }

    #[test]
    fn test_search_response_deserialization() {
        let json = r#"{
            "count": 2,
            "data": [
                { "game_id": 2271, "game_name": "Portal 2", "comp_main": 30960, "comp_plus": 49500, "comp_100": 80640 },
                { "game_id": 9999, "game_name": "Portal 2: Lab Rat", "comp_main": 0 }
            ]
        }"#;

        let response: SearchResponse = serde_json::from_str(json).unwrap();
        let candidates: Vec<CompletionCandidate> =
            response.data.into_iter().map(CompletionCandidate::from).collect();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].candidate_name, "Portal 2");
        assert_eq!(candidates[0].main_hours, Some(8.6));
        assert_eq!(candidates[0].main_plus_extra_hours, Some(13.8));
        assert_eq!(candidates[0].completionist_hours, Some(22.4));
        assert_eq!(candidates[1].main_hours, None);
        assert_eq!(candidates[1].completionist_hours, None);
    }

    #[test]
    fn test_missing_data_is_empty() {
        let response: SearchResponse = serde_json::from_str(r#"{ "count": 0 }"#).unwrap();
        assert!(response.data.is_empty());
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let client = HltbClient::new("http://test.local/api/search".to_string());
        let result = client.search_title("   ").await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }
}

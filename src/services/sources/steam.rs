/// Steam Web API ownership source
///
/// API Flow:
/// 1. Owned games: /IPlayerService/GetOwnedGames/v1/ → appid, name, playtime, last played
/// 2. Store tags: store /api/appdetails?appids={appid} → genres and categories
///
/// Store lookups are only issued for the most played titles and are merged into the raw
/// records under `genres` / `categories`. A failed store lookup leaves the record untagged.
use crate::{
    error::{AppError, AppResult},
    services::sources::OwnershipSource,
};
use reqwest::Client as HttpClient;
use serde_json::Value;

#[derive(Clone)]
pub struct SteamClient {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    store_url: String,
    tag_lookup_limit: usize,
}

impl SteamClient {
    pub fn new(api_key: String, api_url: String, store_url: String, tag_lookup_limit: usize) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url,
            store_url,
            tag_lookup_limit,
        }
    }

    async fn get_owned_games(&self, steam_id: &str) -> AppResult<Value> {
        let url = format!("{}/IPlayerService/GetOwnedGames/v1/", self.api_url);

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("steamid", steam_id),
                ("include_appinfo", "1"),
                ("include_played_free_games", "1"),
                ("format", "json"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                steam_id = %steam_id,
                status = %status,
                "Steam GetOwnedGames request failed"
            );
            return Err(AppError::ExternalApi(format!(
                "Steam API returned status {}: {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }

    /// Fetches genres and categories for one app from the store API
    async fn get_app_tags(&self, appid: u64) -> AppResult<Option<(Value, Value)>> {
        let url = format!("{}/api/appdetails", self.store_url);
        let appid_param = appid.to_string();

        let response = self
            .http_client
            .get(&url)
            .query(&[("appids", appid_param.as_str()), ("l", "english")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::ExternalApi(format!(
                "Steam store returned status {} for appid {}",
                response.status(),
                appid
            )));
        }

        let body: Value = response.json().await?;
        Ok(extract_app_tags(&body, appid))
    }

    /// Adds store tags to the most played games, in place
    async fn attach_store_tags(&self, payload: &mut Value) {
        let Some(games) = payload
            .pointer_mut("/response/games")
            .and_then(Value::as_array_mut)
        else {
            return;
        };

        let targets = most_played_appids(games, self.tag_lookup_limit);
        if targets.is_empty() {
            return;
        }

        let mut tasks = Vec::new();
        for (index, appid) in targets {
            let client = self.clone();
            let task = tokio::spawn(async move { (index, appid, client.get_app_tags(appid).await) });
            tasks.push(task);
        }

        let mut failures = 0usize;
        for task in tasks {
            match task.await {
                Ok((index, _, Ok(Some((genres, categories))))) => {
                    if let Some(game) = games.get_mut(index).and_then(Value::as_object_mut) {
                        game.insert("genres".to_string(), genres);
                        game.insert("categories".to_string(), categories);
                    }
                }
                Ok((_, _, Ok(None))) => {}
                Ok((_, appid, Err(e))) => {
                    tracing::warn!(appid, error = %e, "Store tag lookup failed");
                    failures += 1;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Store tag task join error");
                    failures += 1;
                }
            }
        }

        if failures > 0 {
            tracing::warn!(failures, "Some titles left without store tags");
        }
    }
}

#[async_trait::async_trait]
impl OwnershipSource for SteamClient {
    async fn fetch_owned_titles(&self, user_id: &str) -> AppResult<Value> {
        let steam_id = user_id.trim();
        if steam_id.is_empty() || !steam_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(AppError::InvalidInput(format!(
                "'{}' is not a numeric Steam ID",
                user_id
            )));
        }

        let mut payload = self.get_owned_games(steam_id).await?;
        self.attach_store_tags(&mut payload).await;

        let game_count = reported_game_count(&payload);
        tracing::info!(
            steam_id = %steam_id,
            game_count,
            source = "steam",
            "Owned games fetched"
        );

        Ok(payload)
    }

    fn name(&self) -> &'static str {
        "steam"
    }
}

/// `game_count` from the GetOwnedGames envelope, absent for private profiles
fn reported_game_count(payload: &Value) -> Option<u64> {
    payload.pointer("/response/game_count").and_then(Value::as_u64)
}

/// Indices and appids of the `limit` most played games
fn most_played_appids(games: &[Value], limit: usize) -> Vec<(usize, u64)> {
    let mut ranked: Vec<(usize, u64, u64)> = games
        .iter()
        .enumerate()
        .filter_map(|(index, game)| {
            let appid = game.get("appid")?.as_u64()?;
            let playtime = game
                .get("playtime_forever")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            Some((index, appid, playtime))
        })
        .collect();

    ranked.sort_by(|a, b| b.2.cmp(&a.2).then(a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(index, appid, _)| (index, appid))
        .collect()
}

/// Pulls `genres` and `categories` out of an appdetails response
fn extract_app_tags(body: &Value, appid: u64) -> Option<(Value, Value)> {
    let entry = body.get(appid.to_string())?;
    if !entry.get("success").and_then(Value::as_bool).unwrap_or(false) {
        return None;
    }
    let data = entry.get("data")?;
    let genres = data.get("genres").cloned().unwrap_or(Value::Array(vec![]));
    let categories = data
        .get("categories")
        .cloned()
        .unwrap_or(Value::Array(vec![]));
    Some((genres, categories))
}

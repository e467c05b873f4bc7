//! X (Twitter) intelligence collection.
//!
//! Pages recent posts for a target handle across three streams (own
//! timeline, mentions, interaction search) within a bounded request plan.
//! Stream failures degrade to collection notes; only a failed handle
//! resolution aborts the run.

use std::time::Duration;

use chrono::Utc;
use provtrack_core::error::CoreError;
use provtrack_core::estimate;
use serde_json::Value;

/// Collector configuration.
#[derive(Debug, Clone)]
pub struct XIntelConfig {
    pub bearer_token: Option<String>,
    pub api_base_url: String,
    pub max_pages: u32,
    pub request_timeout: Duration,
}

impl Default for XIntelConfig {
    fn default() -> Self {
        Self {
            bearer_token: None,
            api_base_url: "https://api.x.com/2".to_string(),
            max_pages: 3,
            request_timeout: Duration::from_secs(15),
        }
    }
}

/// Output of one collection run.
#[derive(Debug, Clone)]
pub struct CollectedIntel {
    pub handle: String,
    pub user_id: String,
    pub posts: Vec<String>,
    pub requests_used: u32,
    pub notes: Vec<String>,
}

/// Paging client for the upstream API.
pub struct XIntelCollector {
    client: reqwest::Client,
    config: XIntelConfig,
}

impl XIntelCollector {
    pub fn new(config: XIntelConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("failed to build intel HTTP client");
        Self { client, config }
    }

    /// Collect recent posts around `handle`.
    pub async fn collect(
        &self,
        handle: &str,
        window_days: u32,
        max_posts: u32,
        query: Option<&str>,
    ) -> Result<CollectedIntel, CoreError> {
        let Some(token) = self.config.bearer_token.as_deref() else {
            return Err(CoreError::validation(
                "X bearer token is not configured; set X_BEARER_TOKEN before collecting",
            ));
        };
        let handle = normalize_handle(handle);
        if handle.is_empty() {
            return Err(CoreError::validation("target handle must not be empty"));
        }

        let mut requests_used = 0u32;
        let mut notes: Vec<String> = Vec::new();

        let user_id = self
            .resolve_user(token, &handle, &mut requests_used)
            .await?;

        let plan = estimate::request_plan(max_posts, self.config.max_pages);
        let start_time = (Utc::now() - chrono::Duration::days(i64::from(window_days)))
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        let search_query = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("@{handle}"));

        let mut posts: Vec<String> = Vec::new();
        let streams: [(&str, String, Vec<(String, String)>, u32); 3] = [
            (
                "target_posts",
                format!("/users/{user_id}/tweets"),
                Vec::new(),
                plan.target_limit,
            ),
            (
                "mentions",
                format!("/users/{user_id}/mentions"),
                Vec::new(),
                plan.mention_limit,
            ),
            (
                "interaction_search",
                "/tweets/search/recent".to_string(),
                vec![
                    ("query".to_string(), search_query.clone()),
                    ("start_time".to_string(), start_time.clone()),
                ],
                plan.interaction_limit,
            ),
        ];

        for (stream, path, params, limit) in streams {
            match self
                .fetch_paginated(token, &path, &params, limit, &mut requests_used)
                .await
            {
                Ok(texts) => posts.extend(texts),
                Err(error) => notes.push(format!("{stream} fetch failed: {error}")),
            }
        }

        Ok(CollectedIntel {
            handle,
            user_id,
            posts,
            requests_used,
            notes,
        })
    }

    async fn resolve_user(
        &self,
        token: &str,
        handle: &str,
        requests_used: &mut u32,
    ) -> Result<String, CoreError> {
        let url = format!("{}/users/by/username/{handle}", self.config.api_base_url);
        *requests_used += 1;
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| CoreError::Internal(format!("failed to resolve @{handle}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::Internal(format!(
                "failed to resolve @{handle}: HTTP {}",
                status.as_u16()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| CoreError::Internal(format!("invalid user payload: {e}")))?;
        payload
            .get("data")
            .and_then(|d| d.get("id"))
            .and_then(value_as_id)
            .ok_or_else(|| {
                CoreError::Internal(format!("target user id missing for @{handle}"))
            })
    }

    async fn fetch_paginated(
        &self,
        token: &str,
        path: &str,
        extra_params: &[(String, String)],
        limit: u32,
        requests_used: &mut u32,
    ) -> Result<Vec<String>, String> {
        let url = format!("{}{path}", self.config.api_base_url);
        let mut texts: Vec<String> = Vec::new();
        let mut next_token: Option<String> = None;
        let mut pages = 0u32;

        while (texts.len() as u32) < limit && pages < self.config.max_pages {
            let page_size = (limit - texts.len() as u32).clamp(10, 100);
            let mut params: Vec<(String, String)> = extra_params.to_vec();
            params.push(("max_results".to_string(), page_size.to_string()));
            if let Some(token_value) = &next_token {
                params.push(("pagination_token".to_string(), token_value.clone()));
            }

            *requests_used += 1;
            pages += 1;

            let response = self
                .client
                .get(&url)
                .bearer_auth(token)
                .query(&params)
                .send()
                .await
                .map_err(|e| format!("transport error: {e}"))?;
            let status = response.status();
            if !status.is_success() {
                return Err(format!("HTTP {}", status.as_u16()));
            }
            let payload: Value = response
                .json()
                .await
                .map_err(|e| format!("invalid JSON: {e}"))?;

            if let Some(items) = payload.get("data").and_then(Value::as_array) {
                texts.extend(
                    items
                        .iter()
                        .filter_map(|item| item.get("text"))
                        .filter_map(Value::as_str)
                        .map(str::to_string),
                );
            }

            next_token = payload
                .get("meta")
                .and_then(|m| m.get("next_token"))
                .and_then(Value::as_str)
                .map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }

        texts.truncate(limit as usize);
        Ok(texts)
    }
}

/// Strip the `@` prefix and surrounding whitespace.
pub fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_string()
}

fn value_as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_normalized() {
        assert_eq!(normalize_handle("  @SomeBrand "), "SomeBrand");
        assert_eq!(normalize_handle("plain"), "plain");
        assert_eq!(normalize_handle("@"), "");
    }

    #[tokio::test]
    async fn missing_token_fails_validation() {
        let collector = XIntelCollector::new(XIntelConfig::default());
        let err = collector.collect("@brand", 14, 100, None).await.unwrap_err();
        assert_eq!(err.name(), "ValidationFailed");
    }

    #[tokio::test]
    async fn unreachable_api_fails_resolution() {
        let collector = XIntelCollector::new(XIntelConfig {
            bearer_token: Some("token".to_string()),
            api_base_url: "http://127.0.0.1:1".to_string(),
            request_timeout: Duration::from_millis(200),
            ..Default::default()
        });
        let err = collector.collect("brand", 7, 50, None).await.unwrap_err();
        assert_eq!(err.name(), "InternalError");
    }
}

use async_trait::async_trait;
use moka::future::Cache;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::{Tool, ToolError};
use crate::config::SearchConfig;
use crate::generation::ToolDefinition;
use crate::http::RateLimitedHttpClient;

pub const SEARCH_TOOL_NAME: &str = "search";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    title: Option<String>,
    content: Option<String>,
    snippet: Option<String>,
    url: Option<String>,
}

impl SearchResult {
    fn render(&self) -> String {
        let title = self.title.as_deref().unwrap_or("No title");
        let content = self
            .content
            .as_deref()
            .or(self.snippet.as_deref())
            .unwrap_or("No content");
        let url = self.url.as_deref().unwrap_or_default();
        format!("**{title}**\n{content}\nURL: {url}\n")
    }
}

/// Web search through the Tavily API, with per-query result caching
pub struct SearchTool {
    http: RateLimitedHttpClient,
    endpoint: String,
    api_key: String,
    max_results: u32,
    cache: Cache<String, String>,
}

impl std::fmt::Debug for SearchTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchTool")
            .field("endpoint", &self.endpoint)
            .field("max_results", &self.max_results)
            .finish()
    }
}

impl SearchTool {
    pub fn new(config: &SearchConfig) -> Result<Self, ToolError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ToolError::Execution("no search API key configured".to_string()))?;

        let http = RateLimitedHttpClient::new(&config.http)
            .map_err(|e| ToolError::Execution(e.to_string()))?;

        let cache = Cache::builder()
            .max_capacity(256)
            .time_to_live(Duration::from_secs(config.cache_ttl_seconds))
            .build();

        Ok(Self {
            http,
            endpoint: format!("{}/search", config.base_url.trim_end_matches('/')),
            api_key,
            max_results: config.max_results,
            cache,
        })
    }

    async fn search(&self, query: &str) -> Result<String, String> {
        let body = json!({
            "query": query,
            "max_results": self.max_results,
        });
        let authorization = format!("Bearer {}", self.api_key);

        let response = self
            .http
            .post_json(&self.endpoint, &[("Authorization", authorization.as_str())], &body)
            .await
            .map_err(|e| e.to_string())?;

        if !response.is_success() {
            return Err(format!("HTTP {}: {}", response.status, response.body));
        }

        let parsed: SearchResponse =
            serde_json::from_str(&response.body).map_err(|e| format!("invalid response: {e}"))?;

        if parsed.results.is_empty() {
            return Ok("No results found.".to_string());
        }

        Ok(parsed
            .results
            .iter()
            .map(SearchResult::render)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: SEARCH_TOOL_NAME.to_string(),
            description: "Search the web for information.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "The search query."}
                },
                "required": ["query"]
            }),
        }
    }

    async fn invoke(&self, arguments: &Value) -> Result<String, ToolError> {
        let query = arguments
            .get("query")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|query| !query.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("missing 'query' string".to_string()))?;

        if let Some(cached) = self.cache.get(query).await {
            debug!(query = %query, "Search cache hit");
            return Ok(cached);
        }

        match self.search(query).await {
            Ok(output) => {
                self.cache.insert(query.to_string(), output.clone()).await;
                Ok(output)
            }
            // failures are reported to the model, not cached
            Err(message) => Ok(format!("Search error: {message}")),
        }
    }
}

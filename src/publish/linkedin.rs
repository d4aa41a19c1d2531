use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{PublishError, PublishOutcome, Publisher};
use crate::config::LinkedInConfig;
use crate::http::RateLimitedHttpClient;

pub const POST_CREATED_MESSAGE: &str = "Post created successfully";

/// Publishes text posts through the LinkedIn REST `posts` endpoint
#[derive(Debug)]
pub struct LinkedInPublisher {
    http: RateLimitedHttpClient,
    endpoint: String,
    access_token: String,
    author_urn: String,
    api_version: String,
}

impl LinkedInPublisher {
    pub fn new(config: &LinkedInConfig) -> Result<Self, PublishError> {
        let access_token = non_empty(&config.access_token).ok_or_else(|| {
            PublishError::NotConfigured(
                "LinkedIn access token missing (set LINKEDIN_ACCESS_TOKEN)".to_string(),
            )
        })?;
        let author_urn = non_empty(&config.author_urn).ok_or_else(|| {
            PublishError::NotConfigured("LinkedIn author URN missing (set PROFILE_URN)".to_string())
        })?;

        // publishing is a single attempt
        let http_config = crate::http::HttpClientConfig {
            max_retries: 0,
            ..config.http.clone()
        };
        let http =
            RateLimitedHttpClient::new(&http_config).map_err(|e| PublishError::Build(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!("{}/rest/posts", config.base_url.trim_end_matches('/')),
            access_token,
            author_urn,
            api_version: config.api_version.clone(),
        })
    }

    /// Request body for a public, main-feed text post
    pub fn post_body(&self, text: &str) -> Value {
        json!({
            "author": self.author_urn,
            "commentary": text,
            "visibility": "PUBLIC",
            "distribution": {
                "feedDistribution": "MAIN_FEED",
                "targetEntities": [],
                "thirdPartyDistributionChannels": []
            },
            "lifecycleState": "PUBLISHED",
            "isReshareDisabledByAuthor": false
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.trim().is_empty())
}

#[async_trait]
impl Publisher for LinkedInPublisher {
    async fn publish(&self, text: &str) -> PublishOutcome {
        let authorization = format!("Bearer {}", self.access_token);
        let headers = [
            ("Authorization", authorization.as_str()),
            ("X-Restli-Protocol-Version", "2.0.0"),
            ("LinkedIn-Version", self.api_version.as_str()),
            ("Content-Type", "application/json"),
        ];

        let response = match self
            .http
            .post_json(&self.endpoint, &headers, &self.post_body(text))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "LinkedIn publish request failed");
                return PublishOutcome::Failed {
                    error: e.to_string(),
                    status_code: None,
                };
            }
        };

        if response.status == 201 {
            let post_id = response.header("x-restli-id");
            info!(status = response.status, post_id = ?post_id, "LinkedIn post created");
            PublishOutcome::Published {
                content: POST_CREATED_MESSAGE.to_string(),
                status_code: response.status,
                post_id,
            }
        } else {
            warn!(status = response.status, "LinkedIn rejected the post");
            PublishOutcome::Failed {
                error: response.body,
                status_code: Some(response.status),
            }
        }
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Deserialize;

use crate::config::CodeHostConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::types::ExampleProject;
use crate::providers::{CodeHostProvider, RepositorySearch};

/// GitHub 仓库搜索客户端
#[derive(Clone)]
pub struct GitHubSearch {
    client: Client,
    token: String,
    api_base_url: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total_count: u64,
    #[serde(default)]
    items: Vec<RepositoryItem>,
}

#[derive(Deserialize)]
struct RepositoryItem {
    full_name: String,
    html_url: String,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
    description: Option<String>,
    pushed_at: Option<DateTime<Utc>>,
}

impl From<RepositoryItem> for ExampleProject {
    fn from(item: RepositoryItem) -> Self {
        ExampleProject {
            name: item.full_name,
            url: item.html_url,
            star_count: item.stargazers_count,
            description: item.description.unwrap_or_default(),
            fork_count: item.forks_count,
            updated_at: item.pushed_at,
        }
    }
}

impl GitHubSearch {
    pub fn new(client: Client, config: &CodeHostConfig) -> Self {
        Self {
            client,
            token: config.token.clone(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl CodeHostProvider for GitHubSearch {
    fn name(&self) -> &str {
        "github"
    }

    async fn search_repositories(
        &self,
        query: &str,
        limit: usize,
    ) -> PipelineResult<RepositorySearch> {
        let per_page = limit.clamp(1, 100).to_string();
        let mut request = self
            .client
            .get(format!("{}/search/repositories", self.api_base_url))
            .query(&[
                ("q", query),
                ("sort", "stars"),
                ("order", "desc"),
                ("per_page", per_page.as_str()),
            ])
            .header(USER_AGENT, "skillpath")
            .header(ACCEPT, "application/vnd.github+json");

        // 匿名访问同样可用，只是限流更严格
        if !self.token.trim().is_empty() {
            request = request.header(AUTHORIZATION, format!("Bearer {}", self.token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| PipelineError::call_failed(self.name(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::call_failed(
                self.name(),
                format!("HTTP {}", status),
            ));
        }

        let payload: SearchResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::call_failed(self.name(), e))?;

        Ok(RepositorySearch {
            total_count: payload.total_count,
            items: payload.items.into_iter().map(ExampleProject::from).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_item_maps_to_example() {
        let raw = r#"{
            "total_count": 1,
            "items": [{
                "full_name": "tokio-rs/mini-redis",
                "html_url": "https://github.com/tokio-rs/mini-redis",
                "stargazers_count": 4200,
                "forks_count": 480,
                "description": null,
                "pushed_at": "2025-06-01T10:00:00Z"
            }]
        }"#;
        let payload: SearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(payload.total_count, 1);

        let example = ExampleProject::from(payload.items.into_iter().next().unwrap());
        assert_eq!(example.name, "tokio-rs/mini-redis");
        assert_eq!(example.star_count, 4200);
        assert_eq!(example.fork_count, 480);
        assert!(example.description.is_empty());
        assert!(example.updated_at.is_some());
    }
}

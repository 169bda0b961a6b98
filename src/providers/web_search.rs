use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::CacheManager;
use crate::config::SearchConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::providers::{SearchHit, WebSearchProvider};

/// Tavily 搜索接口客户端
#[derive(Clone)]
pub struct TavilySearch {
    client: Client,
    api_key: String,
    api_base_url: String,
}

#[derive(Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'static str,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl TavilySearch {
    pub fn new(client: Client, config: &SearchConfig) -> Self {
        Self {
            client,
            api_key: config.api_key.clone(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl WebSearchProvider for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(&self, query: &str, limit: usize) -> PipelineResult<Vec<SearchHit>> {
        if self.api_key.trim().is_empty() {
            return Err(PipelineError::unavailable(self.name()));
        }

        let body = TavilyRequest {
            api_key: &self.api_key,
            query,
            max_results: limit,
            search_depth: "basic",
        };

        let response = self
            .client
            .post(format!("{}/search", self.api_base_url))
            .json(&body)
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

        let payload: TavilyResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::call_failed(self.name(), e))?;

        Ok(payload
            .results
            .into_iter()
            .map(|r| SearchHit {
                title: r.title,
                url: r.url,
                description: r.content,
            })
            .collect())
    }
}

/// 为任意网页搜索服务加一层磁盘缓存
pub struct CachedWebSearch {
    inner: Arc<dyn WebSearchProvider>,
    cache: CacheManager,
}

const CACHE_CATEGORY: &str = "web_search";

impl CachedWebSearch {
    pub fn new(inner: Arc<dyn WebSearchProvider>, cache: CacheManager) -> Self {
        Self { inner, cache }
    }

    fn cache_key(&self, query: &str, limit: usize) -> String {
        format!("{}:{}:{}", self.inner.name(), limit, query.to_lowercase())
    }
}

#[async_trait]
impl WebSearchProvider for CachedWebSearch {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn search(&self, query: &str, limit: usize) -> PipelineResult<Vec<SearchHit>> {
        let key = self.cache_key(query, limit);
        match self.cache.get::<Vec<SearchHit>>(CACHE_CATEGORY, &key).await {
            Ok(Some(hits)) => {
                debug!(query, "命中搜索缓存");
                return Ok(hits);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "读取搜索缓存失败"),
        }

        let hits = self.inner.search(query, limit).await?;
        if let Err(e) = self.cache.set(CACHE_CATEGORY, &key, &hits).await {
            warn!(error = %e, "写入搜索缓存失败");
        }
        Ok(hits)
    }
}

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::CacheManager;
use crate::config::Config;
use crate::llm::LanguageModel;
use crate::llm::client::LLMClient;
use crate::providers::{
    CachedWebSearch, CodeHostProvider, GitHubSearch, TavilySearch, WebSearchProvider,
};
use crate::storage::{FileSeedStore, SeedStore};

/// 流水线共享的供应商句柄与配置
///
/// 各客户端无状态或内部池化，可以在不同用户的并发运行之间共享。
#[derive(Clone)]
pub struct PipelineContext {
    pub config: Config,
    pub llm: Arc<dyn LanguageModel>,
    pub web_search: Arc<dyn WebSearchProvider>,
    pub code_host: Arc<dyn CodeHostProvider>,
    pub seed_store: Arc<dyn SeedStore>,
}

impl PipelineContext {
    pub fn new(
        config: Config,
        llm: Arc<dyn LanguageModel>,
        web_search: Arc<dyn WebSearchProvider>,
        code_host: Arc<dyn CodeHostProvider>,
        seed_store: Arc<dyn SeedStore>,
    ) -> Self {
        Self {
            config,
            llm,
            web_search,
            code_host,
            seed_store,
        }
    }

    /// 按配置构造真实的供应商客户端
    pub fn from_config(config: Config) -> Result<Self> {
        // 连接层超时略大于单次调用超时，真正的超时由阶段内的组合子控制
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.pipeline.call_timeout_secs + 5))
            .build()?;

        let llm = Arc::new(LLMClient::new(config.llm.clone())?);

        let tavily: Arc<dyn WebSearchProvider> =
            Arc::new(TavilySearch::new(http.clone(), &config.search));
        let web_search: Arc<dyn WebSearchProvider> = if config.cache.enabled {
            Arc::new(CachedWebSearch::new(
                tavily,
                CacheManager::new(config.cache.clone()),
            ))
        } else {
            tavily
        };

        let code_host = Arc::new(GitHubSearch::new(http, &config.code_host));
        let seed_store = Arc::new(FileSeedStore::new(config.storage.seed_dir.clone()));

        Ok(Self::new(config, llm, web_search, code_host, seed_store))
    }

    pub fn call_timeout(&self) -> Duration {
        self.config.pipeline.call_timeout()
    }
}

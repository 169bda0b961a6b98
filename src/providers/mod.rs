//! 外部数据源：通用网页搜索与代码托管平台搜索

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PipelineResult;
use crate::pipeline::types::ExampleProject;

pub mod code_host;
pub mod web_search;

pub use code_host::GitHubSearch;
pub use web_search::{CachedWebSearch, TavilySearch};

/// 网页搜索的单条命中
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub description: String,
}

/// 代码仓库搜索结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositorySearch {
    pub total_count: u64,
    pub items: Vec<ExampleProject>,
}

/// 通用网页搜索服务
#[async_trait]
pub trait WebSearchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str, limit: usize) -> PipelineResult<Vec<SearchHit>>;
}

/// 代码托管平台的仓库搜索服务，查询中内嵌语言、热度、活跃度等限定条件
#[async_trait]
pub trait CodeHostProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search_repositories(&self, query: &str, limit: usize)
    -> PipelineResult<RepositorySearch>;
}

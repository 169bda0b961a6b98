//! LLM客户端 - 基于rig的结构化生成服务

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::config::{LLMConfig, LLMProvider};
use crate::error::{PipelineError, PipelineResult};
use crate::llm::{GenerationRequest, LanguageModel};

mod providers;

use providers::ProviderClient;

/// LLM客户端
///
/// 没有配置API KEY时仍可构造，此时所有调用都返回 `ProviderUnavailable`，由各阶段走降级分支。
/// 本客户端不做重试：降级分支本身就是流水线的重试策略。
#[derive(Clone)]
pub struct LLMClient {
    config: LLMConfig,
    client: Option<ProviderClient>,
}

impl LLMClient {
    /// 创建新的LLM客户端
    pub fn new(config: LLMConfig) -> Result<Self> {
        let client = if Self::has_credentials(&config) {
            Some(ProviderClient::new(&config)?)
        } else {
            None
        };
        Ok(Self { config, client })
    }

    /// 本地Ollama不需要凭证
    fn has_credentials(config: &LLMConfig) -> bool {
        config.provider == LLMProvider::Ollama || !config.api_key.trim().is_empty()
    }

    pub fn is_available(&self) -> bool {
        self.client.is_some()
    }
}

#[async_trait]
impl LanguageModel for LLMClient {
    fn name(&self) -> &str {
        "llm"
    }

    async fn generate(&self, request: &GenerationRequest) -> PipelineResult<String> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| PipelineError::unavailable(self.name()))?;

        debug!(
            schema = request.schema,
            provider = %self.config.provider,
            model = %self.config.model,
            "调用结构化生成"
        );

        let agent = client.create_agent(&request.instruction, &self.config);
        agent
            .prompt(&request.payload)
            .await
            .map_err(|e| PipelineError::call_failed(self.name(), e))
    }
}

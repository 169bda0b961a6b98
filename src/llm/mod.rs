use async_trait::async_trait;

use crate::error::PipelineResult;

pub mod client;
pub mod structured;

/// 一次结构化生成请求
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// 期望输出所遵循的结构名称，仅用于日志与路由
    pub schema: &'static str,
    /// 系统指令（包含输出结构说明）
    pub instruction: String,
    /// 用户侧负载
    pub payload: String,
}

/// 语言模型服务
///
/// 返回原始文本，其中应包含一个JSON对象（可能被代码块包裹），由调用方负责解析与校验。
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> PipelineResult<String>;
}

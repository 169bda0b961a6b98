use thiserror::Error;

/// 调研流水线错误分类
///
/// 供应商层面的错误（不可用、调用失败、超时、结构化输出不合法）都属于软失败，
/// 由各阶段自行吞掉并走降级分支；只有 `StateContract` 与 `Cancelled` 会到达调用方。
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    /// 缺少凭证，供应商无法使用
    #[error("provider `{provider}` is unavailable: missing credentials")]
    ProviderUnavailable { provider: String },

    /// 网络或HTTP错误
    #[error("provider `{provider}` call failed: {message}")]
    ProviderCallFailed { provider: String, message: String },

    /// 单次外部调用超时
    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    /// 结构化输出无法解析或不符合约定的结构
    #[error("structured output for `{schema}` rejected: {message}")]
    SchemaValidation { schema: String, message: String },

    /// 存储中没有对应用户的种子状态
    #[error("no stored seed for user `{user_id}`")]
    SeedNotFound { user_id: String },

    /// 种子存储读取失败
    #[error("seed storage error: {0}")]
    Storage(String),

    /// 流水线自身的状态结构约束被破坏，属于程序缺陷
    #[error("research state contract violated: {0}")]
    StateContract(String),

    /// 调用方取消了本次运行
    #[error("research run was cancelled")]
    Cancelled,
}

impl PipelineError {
    pub fn call_failed(provider: &str, message: impl std::fmt::Display) -> Self {
        Self::ProviderCallFailed {
            provider: provider.to_string(),
            message: message.to_string(),
        }
    }

    pub fn unavailable(provider: &str) -> Self {
        Self::ProviderUnavailable {
            provider: provider.to_string(),
        }
    }

    pub fn schema(schema: &str, message: impl std::fmt::Display) -> Self {
        Self::SchemaValidation {
            schema: schema.to_string(),
            message: message.to_string(),
        }
    }

    /// 是否属于可以在阶段内部降级处理的软失败
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable { .. }
                | Self::ProviderCallFailed { .. }
                | Self::Timeout { .. }
                | Self::SchemaValidation { .. }
                | Self::SeedNotFound { .. }
                | Self::Storage(_)
        )
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

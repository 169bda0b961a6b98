//! 主路径失败时切换到降级路径的通用组合子
//!
//! 资料搜索、质量评估、推荐合成三个阶段共用这里的超时与降级处理。

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};

/// 结果来自哪条路径
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Path {
    Primary,
    Fallback,
}

/// 组合子的输出，附带走降级分支的原因
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub path: Path,
    pub cause: Option<PipelineError>,
}

impl<T> Outcome<T> {
    pub fn is_fallback(&self) -> bool {
        self.path == Path::Fallback
    }
}

/// 为单次外部调用加上超时，超时被视为软失败
pub async fn bounded<T, Fut>(operation: &str, timeout: Duration, call: Fut) -> PipelineResult<T>
where
    Fut: Future<Output = PipelineResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(PipelineError::Timeout {
            operation: operation.to_string(),
            seconds: timeout.as_secs(),
        }),
    }
}

/// 先执行主路径，软失败时调用降级函数
///
/// 非软失败（状态约束、取消）同样会走降级分支，但会以更高级别记录，
/// 阶段签名保证错误不会越过阶段边界。
pub async fn primary_or_fallback<T, Fut, F>(
    operation: &str,
    timeout: Duration,
    primary: Fut,
    fallback: F,
) -> Outcome<T>
where
    Fut: Future<Output = PipelineResult<T>>,
    F: FnOnce(&PipelineError) -> T,
{
    match bounded(operation, timeout, primary).await {
        Ok(value) => {
            debug!(operation, "主路径成功");
            Outcome {
                value,
                path: Path::Primary,
                cause: None,
            }
        }
        Err(err) => {
            if err.is_soft() {
                warn!(operation, error = %err, "主路径失败，切换到降级路径");
            } else {
                tracing::error!(operation, error = %err, "主路径出现非预期错误，切换到降级路径");
            }
            let value = fallback(&err);
            Outcome {
                value,
                path: Path::Fallback,
                cause: Some(err),
            }
        }
    }
}

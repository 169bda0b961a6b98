use async_trait::async_trait;

use crate::pipeline::state::{ResearchState, StateUpdate};

pub mod example_search;
pub mod quality_evaluation;
pub mod resource_search;
pub mod seed_loader;
pub mod synthesis;

pub use example_search::ExampleSearchStage;
pub use quality_evaluation::QualityEvaluationStage;
pub use resource_search::ResourceSearchStage;
pub use seed_loader::StateSeedLoader;
pub use synthesis::SynthesisStage;

/// 流水线中的一个阶段
///
/// 阶段读取当前状态并返回部分状态，由编排器按字段合并。
/// 签名不带错误：供应商层面的失败必须在阶段内部降级为部分或空结果。
#[async_trait]
pub trait ResearchStage: Send + Sync {
    async fn run(&self, state: &ResearchState) -> StateUpdate;
}

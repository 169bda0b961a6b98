//! 技能差距调研流水线
//!
//! 固定的阶段图：加载种子 → 资料搜索 → 示例搜索 →（回环或继续）→ 质量评估 → 推荐综合。

pub mod context;
pub mod fallback;
pub mod orchestrator;
pub mod stages;
pub mod state;
pub mod types;
pub mod workflow;

pub use context::PipelineContext;
pub use orchestrator::{ResearchPipeline, StageId, StageSet};
pub use state::{ReducerRegistry, ResearchState, StateUpdate};
pub use workflow::{ResearchReport, ResearchRequest, launch, run_research};

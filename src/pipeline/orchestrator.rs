use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::stages::{
    ExampleSearchStage, QualityEvaluationStage, ResearchStage, ResourceSearchStage,
    StateSeedLoader, SynthesisStage,
};
use crate::pipeline::state::{ReducerRegistry, ResearchState};

/// 图中的节点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageId {
    LoadSeed,
    SearchResources,
    SearchExamples,
    EvaluateQuality,
    Synthesize,
}

impl StageId {
    pub const ENTRY: StageId = StageId::LoadSeed;

    pub fn name(&self) -> &'static str {
        match self {
            StageId::LoadSeed => "load_seed",
            StageId::SearchResources => "search_resources",
            StageId::SearchExamples => "search_examples",
            StageId::EvaluateQuality => "evaluate_quality",
            StageId::Synthesize => "synthesize",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 条件边：示例足够或迭代次数用尽则进入评估，否则回到资料搜索
pub fn route_after_examples(state: &ResearchState, config: &PipelineConfig) -> StageId {
    if state.examples.len() >= config.min_examples
        || state.iteration_count >= config.max_iterations
    {
        StageId::EvaluateQuality
    } else {
        StageId::SearchResources
    }
}

/// 固定的有向边；`None` 表示终点
pub fn next_stage(current: StageId, state: &ResearchState, config: &PipelineConfig) -> Option<StageId> {
    match current {
        StageId::LoadSeed => Some(StageId::SearchResources),
        StageId::SearchResources => Some(StageId::SearchExamples),
        StageId::SearchExamples => Some(route_after_examples(state, config)),
        StageId::EvaluateQuality => Some(StageId::Synthesize),
        StageId::Synthesize => None,
    }
}

/// 图中各节点对应的阶段实现
#[derive(Clone)]
pub struct StageSet {
    pub load_seed: Arc<dyn ResearchStage>,
    pub search_resources: Arc<dyn ResearchStage>,
    pub search_examples: Arc<dyn ResearchStage>,
    pub evaluate_quality: Arc<dyn ResearchStage>,
    pub synthesize: Arc<dyn ResearchStage>,
}

impl StageSet {
    pub fn from_context(context: &PipelineContext) -> Self {
        Self {
            load_seed: Arc::new(StateSeedLoader::new(context)),
            search_resources: Arc::new(ResourceSearchStage::new(context)),
            search_examples: Arc::new(ExampleSearchStage::new(context)),
            evaluate_quality: Arc::new(QualityEvaluationStage::new(context)),
            synthesize: Arc::new(SynthesisStage::new(context)),
        }
    }

    fn get(&self, id: StageId) -> &Arc<dyn ResearchStage> {
        match id {
            StageId::LoadSeed => &self.load_seed,
            StageId::SearchResources => &self.search_resources,
            StageId::SearchExamples => &self.search_examples,
            StageId::EvaluateQuality => &self.evaluate_quality,
            StageId::Synthesize => &self.synthesize,
        }
    }
}

/// 调研流水线编排器
///
/// 图与合并规则在构造时固定，不同运行之间不共享可变状态。
pub struct ResearchPipeline {
    config: PipelineConfig,
    stages: StageSet,
    reducers: ReducerRegistry,
}

impl ResearchPipeline {
    pub fn new(context: &PipelineContext) -> Self {
        Self::from_parts(
            context.config.pipeline.clone(),
            StageSet::from_context(context),
            ReducerRegistry::default(),
        )
    }

    pub fn from_parts(mut config: PipelineConfig, stages: StageSet, reducers: ReducerRegistry) -> Self {
        // 示例搜索至少执行一次
        config.max_iterations = config.max_iterations.max(1);
        Self {
            config,
            stages,
            reducers,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 单次运行允许的最大步数
    fn step_limit(&self) -> usize {
        // 入口 + 每轮迭代两步 + 评估 + 综合
        1 + 2 * self.config.max_iterations as usize + 2
    }

    /// 从入口执行到终点，返回最终状态
    ///
    /// 只有状态约束被破坏或运行被取消时返回错误。
    pub async fn run(
        &self,
        initial: ResearchState,
        cancel: &CancellationToken,
    ) -> PipelineResult<ResearchState> {
        let run_id = Uuid::new_v4();
        let span = info_span!("research", %run_id, skill_gap = %initial.skill_gap);
        self.drive(initial, cancel).instrument(span).await
    }

    async fn drive(
        &self,
        mut state: ResearchState,
        cancel: &CancellationToken,
    ) -> PipelineResult<ResearchState> {
        let mut current = Some(StageId::ENTRY);
        let mut steps = 0usize;

        while let Some(id) = current {
            steps += 1;
            if steps > self.step_limit() {
                return Err(PipelineError::StateContract(format!(
                    "step limit {} exceeded at {}",
                    self.step_limit(),
                    id
                )));
            }
            if cancel.is_cancelled() {
                info!(stage = %id, "运行已取消");
                return Err(PipelineError::Cancelled);
            }

            let stage = self.stages.get(id);
            let update = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(stage = %id, "运行已取消");
                    return Err(PipelineError::Cancelled);
                }
                update = stage.run(&state).instrument(info_span!("stage", name = id.name())) => update,
            };

            debug!(stage = %id, fields = ?update.pending_fields(), "合并阶段输出");
            self.reducers.apply(&mut state, update)?;
            state.check_contract(&self.config)?;

            current = next_stage(id, &state, &self.config);
        }

        info!(
            iterations = state.iteration_count,
            confidence = state.confidence,
            recommendations = state.recommendations.len(),
            "调研流程完成"
        );
        Ok(state)
    }
}

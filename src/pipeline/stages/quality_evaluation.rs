use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::error::{PipelineError, PipelineResult};
use crate::llm::structured::{Validate, parse_structured, schema_instruction};
use crate::llm::{GenerationRequest, LanguageModel};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::fallback::primary_or_fallback;
use crate::pipeline::stages::ResearchStage;
use crate::pipeline::state::{ResearchState, StateUpdate};
use crate::pipeline::types::{CriteriaScores, RecencyClass, Resource, ScoredResource};

pub const EVALUATION_BATCH_SCHEMA: &str = "evaluation_batch";

/// 各评分项权重，合计为1
pub const RELEVANCE_WEIGHT: f64 = 0.35;
pub const AUTHORITY_WEIGHT: f64 = 0.20;
pub const RECENCY_WEIGHT: f64 = 0.15;
pub const COMPREHENSIVENESS_WEIGHT: f64 = 0.20;
pub const PRACTICALITY_WEIGHT: f64 = 0.10;

/// 聚合置信度的乐观系数
pub const CONFIDENCE_BIAS: f64 = 1.1;

const RECENT_THRESHOLD: f64 = 0.7;

impl CriteriaScores {
    /// 评估服务不可用时所有候选使用的基线评分
    pub const BASELINE: CriteriaScores = CriteriaScores {
        relevance: 0.7,
        authority: 0.6,
        recency: 0.7,
        comprehensiveness: 0.6,
        practicality: 0.6,
    };

    /// 加权综合分
    pub fn composite(&self) -> f64 {
        RELEVANCE_WEIGHT * self.relevance
            + AUTHORITY_WEIGHT * self.authority
            + RECENCY_WEIGHT * self.recency
            + COMPREHENSIVENESS_WEIGHT * self.comprehensiveness
            + PRACTICALITY_WEIGHT * self.practicality
    }

    pub fn clamped(self) -> Self {
        Self {
            relevance: self.relevance.clamp(0.0, 1.0),
            authority: self.authority.clamp(0.0, 1.0),
            recency: self.recency.clamp(0.0, 1.0),
            comprehensiveness: self.comprehensiveness.clamp(0.0, 1.0),
            practicality: self.practicality.clamp(0.0, 1.0),
        }
    }
}

/// 评估服务的输出结构：按输入顺序每个候选一条记录
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EvaluationBatch {
    pub evaluations: Vec<CriteriaScores>,
}

impl Validate for EvaluationBatch {
    fn validate(&self) -> Result<(), String> {
        if self.evaluations.is_empty() {
            return Err("evaluations is empty".to_string());
        }
        Ok(())
    }
}

/// 候选与评分一一配对后排序截断
///
/// 按综合分降序，分数相同时保持输入顺序。
pub fn rank(candidates: &[Resource], scores: &[CriteriaScores], limit: usize) -> Vec<ScoredResource> {
    let mut ranked: Vec<ScoredResource> = candidates
        .iter()
        .zip(scores)
        .map(|(resource, criteria)| {
            let criteria = criteria.clamped();
            let score = criteria.composite().clamp(0.0, 1.0);
            ScoredResource {
                resource: resource.clone(),
                score,
                rating: (score * 5.0).round() as u8,
                recency_class: if criteria.recency > RECENT_THRESHOLD {
                    RecencyClass::Recent
                } else {
                    RecencyClass::Older
                },
                criteria,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(limit);
    ranked
}

/// 聚合置信度：前列平均分乘以乐观系数，封顶为1
pub fn aggregate_confidence(ranked: &[ScoredResource]) -> f64 {
    if ranked.is_empty() {
        return 0.0;
    }
    let mean = ranked.iter().map(|r| r.score).sum::<f64>() / ranked.len() as f64;
    (mean * CONFIDENCE_BIAS).min(1.0)
}

#[derive(Serialize)]
struct EvaluationPayload<'a> {
    skill_gap: &'a str,
    language: &'a str,
    target_role: Option<&'a str>,
    candidates: Vec<IndexedResource<'a>>,
}

#[derive(Serialize)]
struct IndexedResource<'a> {
    index: usize,
    title: &'a str,
    url: &'a str,
    description: &'a str,
}

/// 学习资料质量评估阶段
pub struct QualityEvaluationStage {
    llm: Arc<dyn LanguageModel>,
    max_evaluated: usize,
    timeout: Duration,
}

impl QualityEvaluationStage {
    pub fn new(context: &PipelineContext) -> Self {
        Self {
            llm: context.llm.clone(),
            max_evaluated: context.config.pipeline.max_evaluated,
            timeout: context.call_timeout(),
        }
    }

    async fn evaluate(&self, state: &ResearchState) -> PipelineResult<Vec<CriteriaScores>> {
        let candidates = &state.search_results;
        let payload = EvaluationPayload {
            skill_gap: &state.skill_gap,
            language: &state.detected_language,
            target_role: state.target_role.as_deref(),
            candidates: candidates
                .iter()
                .enumerate()
                .map(|(index, r)| IndexedResource {
                    index,
                    title: &r.title,
                    url: &r.url,
                    description: &r.description,
                })
                .collect(),
        };
        let request = GenerationRequest {
            schema: EVALUATION_BATCH_SCHEMA,
            instruction: format!(
                "You evaluate learning resources for a learner. For every candidate, in input \
                 order, score relevance to the skill gap, authority of the source, recency, \
                 comprehensiveness and practicality, each between 0 and 1. Return exactly one \
                 evaluation per candidate.\n\n{}",
                schema_instruction::<EvaluationBatch>()
            ),
            payload: serde_json::to_string_pretty(&payload).unwrap_or_default(),
        };

        let text = self.llm.generate(&request).await?;
        let batch: EvaluationBatch = parse_structured(EVALUATION_BATCH_SCHEMA, &text)?;
        if batch.evaluations.len() != candidates.len() {
            return Err(PipelineError::schema(
                EVALUATION_BATCH_SCHEMA,
                format!(
                    "expected {} evaluations, got {}",
                    candidates.len(),
                    batch.evaluations.len()
                ),
            ));
        }
        Ok(batch.evaluations)
    }
}

#[async_trait]
impl ResearchStage for QualityEvaluationStage {
    async fn run(&self, state: &ResearchState) -> StateUpdate {
        let candidates = &state.search_results;
        if candidates.is_empty() {
            info!("没有候选资料，跳过质量评估");
            return StateUpdate {
                evaluated_results: Some(Vec::new()),
                confidence: Some(0.0),
                ..StateUpdate::default()
            };
        }

        let outcome = primary_or_fallback(
            "quality_evaluation",
            self.timeout,
            self.evaluate(state),
            |_| vec![CriteriaScores::BASELINE; candidates.len()],
        )
        .await;

        let ranked = rank(candidates, &outcome.value, self.max_evaluated);
        let confidence = aggregate_confidence(&ranked);
        info!(
            candidates = candidates.len(),
            kept = ranked.len(),
            confidence,
            fallback = outcome.is_fallback(),
            "质量评估完成"
        );

        StateUpdate {
            evaluated_results: Some(ranked),
            confidence: Some(confidence),
            ..StateUpdate::default()
        }
    }
}

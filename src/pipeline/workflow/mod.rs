use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, PipelineConfig};
use crate::error::PipelineResult;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::orchestrator::ResearchPipeline;
use crate::pipeline::state::ResearchState;
use crate::pipeline::types::{ExampleProject, Recommendation, ScoredResource, UNKNOWN_LANGUAGE};
use crate::skills::{SkillGapSummary, SkillObservation, aggregate};

/// 一次调研请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResearchRequest {
    pub user_id: Option<String>,
    pub skill_gap: String,
    pub language: Option<String>,
    pub user_context: String,
    pub target_role: Option<String>,
    pub target_industry: Option<String>,
    pub domain_keywords: Vec<String>,
    pub learning_objectives: Vec<String>,
    pub queries: Vec<String>,
    /// 技能自评观测，非空时聚合为关注技能
    pub skills: Vec<SkillObservation>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ResearchRequest {
    pub fn new(skill_gap: impl Into<String>) -> Self {
        Self {
            skill_gap: skill_gap.into(),
            ..Self::default()
        }
    }

    /// 构造初始状态，同时返回技能聚合结果（如果有）
    pub fn into_state(self, config: &PipelineConfig) -> (ResearchState, Option<SkillGapSummary>) {
        let summary = (!self.skills.is_empty()).then(|| aggregate(&self.skills));

        let state = ResearchState {
            user_id: non_empty(self.user_id),
            skill_gap: self.skill_gap.trim().to_string(),
            detected_language: non_empty(self.language)
                .unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string()),
            user_context: self.user_context,
            target_role: non_empty(self.target_role),
            target_industry: non_empty(self.target_industry),
            domain_keywords: self.domain_keywords,
            focus_skills: summary
                .as_ref()
                .map(|s| s.focus_skills(config.max_focus_skills))
                .unwrap_or_default(),
            learning_objectives: self.learning_objectives,
            queries: self.queries,
            ..ResearchState::default()
        };
        (state, summary)
    }
}

/// 调研输出报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchReport {
    pub skill_gap: String,
    pub detected_language: String,
    pub recommendations: Vec<Recommendation>,
    pub confidence: f64,
    pub evaluated_resources: Vec<ScoredResource>,
    pub examples: Vec<ExampleProject>,
    pub queries: Vec<String>,
    pub iterations: u32,
    pub loaded_from_storage: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_score: Option<u8>,
}

impl ResearchReport {
    pub fn from_state(state: ResearchState, summary: Option<&SkillGapSummary>) -> Self {
        Self {
            skill_gap: state.skill_gap,
            detected_language: state.detected_language,
            recommendations: state.recommendations,
            confidence: state.confidence,
            evaluated_resources: state.evaluated_results,
            examples: state.examples,
            queries: state.queries,
            iterations: state.iteration_count,
            loaded_from_storage: state.loaded_from_storage,
            skill_score: summary.map(|s| s.overall_score),
        }
    }
}

/// 在给定上下文上执行一次完整调研
pub async fn run_research(
    context: &PipelineContext,
    request: ResearchRequest,
    cancel: &CancellationToken,
) -> PipelineResult<ResearchReport> {
    let (initial, summary) = request.into_state(&context.config.pipeline);
    let pipeline = ResearchPipeline::new(context);
    let state = pipeline.run(initial, cancel).await?;
    Ok(ResearchReport::from_state(state, summary.as_ref()))
}

/// 启动调研工作流
pub async fn launch(config: &Config, request: ResearchRequest, cancel: CancellationToken) -> Result<()> {
    let context = PipelineContext::from_config(config.clone())?;

    println!("🚀 开始调研技能差距: {}", request.skill_gap);
    let report = run_research(&context, request, &cancel).await?;

    println!(
        "✓ 调研完成: {} 条推荐，置信度 {:.2}，迭代 {} 次",
        report.recommendations.len(),
        report.confidence,
        report.iterations
    );

    let json = serde_json::to_string_pretty(&report)?;
    match &config.output_path {
        Some(path) => {
            write_report(path, &json)?;
            println!("💾 报告已写入 {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn write_report(path: &Path, json: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }
    std::fs::write(path, json).with_context(|| format!("Failed to write report {:?}", path))
}

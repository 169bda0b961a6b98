use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::error::PipelineResult;
use crate::llm::structured::{Validate, parse_structured, schema_instruction};
use crate::llm::{GenerationRequest, LanguageModel};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::fallback::primary_or_fallback;
use crate::pipeline::stages::ResearchStage;
use crate::pipeline::state::{ResearchState, StateUpdate};
use crate::pipeline::types::{
    ExampleProject, Priority, Recommendation, RecommendationType, ScoredResource,
};

pub const RECOMMENDATION_LIST_SCHEMA: &str = "recommendation_list";

/// 参与综合的资料数与示例数
pub const TOP_RESOURCES: usize = 3;
pub const TOP_EXAMPLES: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RecommendationBatch {
    pub recommendations: Vec<Recommendation>,
}

impl Validate for RecommendationBatch {
    fn validate(&self) -> Result<(), String> {
        if self.recommendations.is_empty() {
            return Err("recommendations is empty".to_string());
        }
        if let Some(i) = self
            .recommendations
            .iter()
            .position(|r| r.title.trim().is_empty())
        {
            return Err(format!("recommendations[{}].title is empty", i));
        }
        Ok(())
    }
}

fn rank_priority(index: usize) -> Priority {
    if index == 0 {
        Priority::High
    } else {
        Priority::Medium
    }
}

/// 确定性综合：每条资料、每个示例各一条，外加两条固定行动项
pub fn fallback_recommendations(
    resources: &[ScoredResource],
    examples: &[ExampleProject],
    skill_gap: &str,
    limit: usize,
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    for (i, scored) in resources.iter().take(TOP_RESOURCES).enumerate() {
        let resource = &scored.resource;
        let description = if resource.description.trim().is_empty() {
            format!("Study this resource to work on {}", skill_gap)
        } else {
            resource.description.clone()
        };
        recommendations.push(Recommendation {
            kind: RecommendationType::Resource,
            title: resource.title.clone(),
            description,
            url: Some(resource.url.clone()),
            priority: rank_priority(i),
        });
    }

    for (i, example) in examples.iter().take(TOP_EXAMPLES).enumerate() {
        recommendations.push(Recommendation {
            kind: RecommendationType::Example,
            title: format!("Explore {}", example.name),
            description: format!(
                "{} ({} stars)",
                example.description.trim(),
                example.star_count
            ),
            url: Some(example.url.clone()),
            priority: rank_priority(i),
        });
    }

    recommendations.push(Recommendation {
        kind: RecommendationType::Action,
        title: "Build a practice project".to_string(),
        description: format!("Apply {} in a small project of your own", skill_gap),
        url: None,
        priority: Priority::Medium,
    });
    recommendations.push(Recommendation {
        kind: RecommendationType::Action,
        title: "Review and refactor existing code".to_string(),
        description: format!("Revisit code you have written and apply {}", skill_gap),
        url: None,
        priority: Priority::Low,
    });

    recommendations.truncate(limit);
    recommendations
}

#[derive(Serialize)]
struct SynthesisPayload<'a> {
    skill_gap: &'a str,
    language: &'a str,
    user_context: &'a str,
    target_role: Option<&'a str>,
    learning_objectives: &'a [String],
    resources: &'a [ScoredResource],
    examples: &'a [ExampleProject],
}

/// 推荐综合阶段
pub struct SynthesisStage {
    llm: Arc<dyn LanguageModel>,
    max_recommendations: usize,
    timeout: Duration,
}

impl SynthesisStage {
    pub fn new(context: &PipelineContext) -> Self {
        Self {
            llm: context.llm.clone(),
            max_recommendations: context.config.pipeline.max_recommendations,
            timeout: context.call_timeout(),
        }
    }

    async fn synthesize(
        &self,
        state: &ResearchState,
        resources: &[ScoredResource],
        examples: &[ExampleProject],
    ) -> PipelineResult<Vec<Recommendation>> {
        let payload = SynthesisPayload {
            skill_gap: &state.skill_gap,
            language: &state.detected_language,
            user_context: &state.user_context,
            target_role: state.target_role.as_deref(),
            learning_objectives: &state.learning_objectives,
            resources,
            examples,
        };
        let request = GenerationRequest {
            schema: RECOMMENDATION_LIST_SCHEMA,
            instruction: format!(
                "You are a mentor writing a short, prioritized learning plan. Using the ranked \
                 resources and example repositories, produce at most {} recommendations. Each \
                 has a type (resource, example or action), a concrete title, a one-sentence \
                 description, an optional url and a priority (high, medium or low).\n\n{}",
                self.max_recommendations,
                schema_instruction::<RecommendationBatch>()
            ),
            payload: serde_json::to_string_pretty(&payload).unwrap_or_default(),
        };

        let text = self.llm.generate(&request).await?;
        let batch: RecommendationBatch = parse_structured(RECOMMENDATION_LIST_SCHEMA, &text)?;
        Ok(batch.recommendations)
    }
}

#[async_trait]
impl ResearchStage for SynthesisStage {
    async fn run(&self, state: &ResearchState) -> StateUpdate {
        let resources = &state.evaluated_results[..state.evaluated_results.len().min(TOP_RESOURCES)];
        let examples = &state.examples[..state.examples.len().min(TOP_EXAMPLES)];

        let outcome = primary_or_fallback(
            "synthesis",
            self.timeout,
            self.synthesize(state, resources, examples),
            |_| {
                fallback_recommendations(
                    resources,
                    examples,
                    &state.skill_gap,
                    self.max_recommendations,
                )
            },
        )
        .await;

        let fallback = outcome.is_fallback();
        let mut recommendations = outcome.value;
        recommendations.truncate(self.max_recommendations);
        info!(
            recommendations = recommendations.len(),
            fallback,
            "推荐综合完成"
        );

        StateUpdate {
            recommendations: Some(recommendations),
            ..StateUpdate::default()
        }
    }
}

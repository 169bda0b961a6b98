use async_trait::async_trait;
use futures::future::join_all;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::llm::structured::{Validate, parse_structured, schema_instruction};
use crate::llm::{GenerationRequest, LanguageModel};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::fallback::{bounded, primary_or_fallback};
use crate::pipeline::stages::ResearchStage;
use crate::pipeline::state::{ResearchState, StateUpdate};
use crate::pipeline::types::{Resource, is_known_language};
use crate::providers::{SearchHit, WebSearchProvider};
use crate::utils::queries::QuerySet;
use crate::utils::urls::dedupe_resources;

pub const RESOURCE_LIST_SCHEMA: &str = "resource_list";

const MIN_GENERATED: usize = 3;
const MAX_GENERATED: usize = 10;

/// 生成式补充的输出结构
#[derive(Debug, Default, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedResources {
    /// 3到10条学习资料
    pub resources: Vec<Resource>,
    /// 可选的补充查询，供下一轮迭代使用
    #[serde(default)]
    pub queries: Vec<String>,
}

impl Validate for GeneratedResources {
    fn validate(&self) -> Result<(), String> {
        let count = self.resources.len();
        if !(MIN_GENERATED..=MAX_GENERATED).contains(&count) {
            return Err(format!(
                "expected {}-{} resources, got {}",
                MIN_GENERATED, MAX_GENERATED, count
            ));
        }
        for (i, resource) in self.resources.iter().enumerate() {
            if resource.title.trim().is_empty() {
                return Err(format!("resources[{}].title is empty", i));
            }
            let url = resource.url.trim();
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(format!("resources[{}].url is not an http(s) url", i));
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct GenerationPayload<'a> {
    skill_gap: &'a str,
    language: &'a str,
    target_role: Option<&'a str>,
    target_industry: Option<&'a str>,
    learning_objectives: &'a [String],
    queries: &'a [String],
    already_found: Vec<&'a str>,
}

/// 构造去重后的查询集合
///
/// 顺序：技能差距原文、带语言的变体、调用方给出的查询、前几个关注技能（带角色/行业）、领域关键词。
pub fn build_queries(state: &ResearchState, config: &PipelineConfig) -> Vec<String> {
    let skill_gap = state.skill_gap.trim();
    let mut set = QuerySet::new();

    set.push(skill_gap);
    if is_known_language(&state.detected_language) {
        set.push(format!("{} {}", state.detected_language.trim(), skill_gap));
    }
    set.extend(&state.queries);

    let role = state.target_role.as_deref().filter(|r| !r.trim().is_empty());
    let industry = state
        .target_industry
        .as_deref()
        .filter(|i| !i.trim().is_empty());
    for skill in state.focus_skills.iter().take(config.max_focus_skills) {
        let query = match (role, industry) {
            (Some(role), Some(industry)) => {
                format!("{} for {} in {}", skill.name, role, industry)
            }
            (Some(role), None) => format!("{} for {}", skill.name, role),
            (None, Some(industry)) => format!("{} in {}", skill.name, industry),
            (None, None) => skill.name.clone(),
        };
        set.push(query);
    }

    for keyword in state.domain_keywords.iter().take(config.max_domain_keywords) {
        set.push(format!("{} {}", skill_gap, keyword));
    }

    set.into_vec()
}

/// 选出本轮发往网页搜索的查询
///
/// 尚未搜索过的查询（包括上一轮生成式补充反馈的查询）优先，名额不足时再用已搜索过的查询补齐。
pub fn schedule_round(queries: &[String], searched: &[String], limit: usize) -> Vec<String> {
    let mut issued = QuerySet::new();
    issued.extend(searched);

    let (fresh, repeated): (Vec<&String>, Vec<&String>) =
        queries.iter().partition(|q| !issued.contains(q));
    fresh
        .into_iter()
        .chain(repeated)
        .take(limit)
        .cloned()
        .collect()
}

fn normalize_hit(hit: SearchHit) -> Resource {
    let url = hit.url.trim().to_string();
    let title = match hit.title.trim() {
        "" => url.clone(),
        title => title.to_string(),
    };
    Resource {
        title,
        url,
        description: hit.description.trim().to_string(),
    }
}

/// 学习资料搜索阶段
///
/// 主路径：本轮选出的几条查询并发发往网页搜索；结果不足时用一次结构化生成补充。
/// 合并结果按规范化URL去重，已有结果先于本轮命中，命中先于生成结果，最终截断到上限。
pub struct ResourceSearchStage {
    web_search: Arc<dyn WebSearchProvider>,
    llm: Arc<dyn LanguageModel>,
    config: PipelineConfig,
}

impl ResourceSearchStage {
    pub fn new(context: &PipelineContext) -> Self {
        Self {
            web_search: context.web_search.clone(),
            llm: context.llm.clone(),
            config: context.config.pipeline.clone(),
        }
    }

    fn timeout(&self) -> Duration {
        self.config.call_timeout()
    }

    /// 并发查询；聚合按查询顺序进行，与完成顺序无关
    async fn search(&self, queries: &[String]) -> Vec<Resource> {
        let calls = queries.iter().map(|query| {
            bounded(
                "web_search",
                self.timeout(),
                self.web_search
                    .search(query, self.config.results_per_query),
            )
        });

        let mut resources = Vec::new();
        for (query, result) in queries.iter().zip(join_all(calls).await) {
            match result {
                Ok(hits) => {
                    debug!(query = %query, hits = hits.len(), "网页搜索完成");
                    resources.extend(hits.into_iter().map(normalize_hit));
                }
                Err(e) => warn!(query = %query, error = %e, "网页搜索失败"),
            }
        }
        dedupe_resources(resources)
    }

    async fn generate(
        &self,
        state: &ResearchState,
        queries: &[String],
        found: &[Resource],
    ) -> PipelineResult<GeneratedResources> {
        let payload = GenerationPayload {
            skill_gap: &state.skill_gap,
            language: &state.detected_language,
            target_role: state.target_role.as_deref(),
            target_industry: state.target_industry.as_deref(),
            learning_objectives: &state.learning_objectives,
            queries,
            already_found: found.iter().map(|r| r.url.as_str()).collect(),
        };
        let request = GenerationRequest {
            schema: RESOURCE_LIST_SCHEMA,
            instruction: format!(
                "You are a technical learning advisor. Recommend {}-{} high quality, publicly \
                 reachable learning resources (official docs, books, courses, tutorials) that \
                 close the user's skill gap. Do not repeat URLs listed in already_found. \
                 Optionally suggest extra search queries.\n\n{}",
                MIN_GENERATED,
                MAX_GENERATED,
                schema_instruction::<GeneratedResources>()
            ),
            payload: serde_json::to_string_pretty(&payload).unwrap_or_default(),
        };

        let text = self.llm.generate(&request).await?;
        parse_structured(RESOURCE_LIST_SCHEMA, &text)
    }
}

#[async_trait]
impl ResearchStage for ResourceSearchStage {
    async fn run(&self, state: &ResearchState) -> StateUpdate {
        let queries = build_queries(state, &self.config);
        let round_queries =
            schedule_round(&queries, &state.searched_queries, self.config.search_query_limit);

        // 上一轮的结果保留在前，本轮失败不会丢失已有召回
        let found = self.search(&round_queries).await;
        let mut resources = dedupe_resources(state.search_results.iter().cloned().chain(found));

        let mut query_set = QuerySet::new();
        query_set.extend(&queries);
        let mut searched = QuerySet::new();
        searched.extend(&state.searched_queries);
        searched.extend(&round_queries);

        if resources.len() < self.config.fallback_threshold {
            info!(
                found = resources.len(),
                threshold = self.config.fallback_threshold,
                "搜索结果不足，启用生成式补充"
            );
            let outcome = primary_or_fallback(
                "resource_search.generate",
                self.timeout(),
                self.generate(state, &queries, &resources),
                |_| GeneratedResources::default(),
            )
            .await;

            let generated = outcome.value;
            query_set.extend(&generated.queries);
            resources = dedupe_resources(resources.into_iter().chain(generated.resources));
        }

        resources.truncate(self.config.max_resources);
        info!(resources = resources.len(), "学习资料搜索完成");

        StateUpdate {
            queries: Some(query_set.into_vec()),
            searched_queries: Some(searched.into_vec()),
            search_results: Some(resources),
            ..StateUpdate::default()
        }
    }
}

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::types::{
    ExampleProject, FocusSkill, Recommendation, Resource, ScoredResource, UNKNOWN_LANGUAGE,
};
use crate::utils::urls::canonicalize_url;

/// 贯穿所有阶段的调研上下文
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchState {
    pub user_id: Option<String>,
    pub skill_gap: String,
    pub detected_language: String,
    pub user_context: String,
    pub target_role: Option<String>,
    pub target_industry: Option<String>,
    pub domain_keywords: Vec<String>,
    pub focus_skills: Vec<FocusSkill>,
    pub learning_objectives: Vec<String>,
    pub queries: Vec<String>,
    /// 已经发往网页搜索的查询，跨迭代累积
    pub searched_queries: Vec<String>,
    pub search_results: Vec<Resource>,
    pub evaluated_results: Vec<ScoredResource>,
    pub examples: Vec<ExampleProject>,
    pub confidence: f64,
    pub iteration_count: u32,
    pub recommendations: Vec<Recommendation>,
    pub loaded_from_storage: bool,
}

impl Default for ResearchState {
    fn default() -> Self {
        Self {
            user_id: None,
            skill_gap: String::new(),
            detected_language: UNKNOWN_LANGUAGE.to_string(),
            user_context: String::new(),
            target_role: None,
            target_industry: None,
            domain_keywords: Vec::new(),
            focus_skills: Vec::new(),
            learning_objectives: Vec::new(),
            queries: Vec::new(),
            searched_queries: Vec::new(),
            search_results: Vec::new(),
            evaluated_results: Vec::new(),
            examples: Vec::new(),
            confidence: 0.0,
            iteration_count: 0,
            recommendations: Vec::new(),
            loaded_from_storage: false,
        }
    }
}

impl ResearchState {
    pub fn new(skill_gap: impl Into<String>) -> Self {
        Self {
            skill_gap: skill_gap.into(),
            ..Self::default()
        }
    }

    /// 检查流水线自身维护的结构约束，违反即视为程序缺陷
    pub fn check_contract(&self, config: &PipelineConfig) -> PipelineResult<()> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return contract(format!("confidence {} outside [0,1]", self.confidence));
        }
        if self.iteration_count > config.max_iterations {
            return contract(format!(
                "iteration count {} exceeds bound {}",
                self.iteration_count, config.max_iterations
            ));
        }
        if self.evaluated_results.len() > config.max_evaluated {
            return contract(format!(
                "{} evaluated results exceed cap {}",
                self.evaluated_results.len(),
                config.max_evaluated
            ));
        }
        if self
            .evaluated_results
            .windows(2)
            .any(|pair| pair[0].score < pair[1].score)
        {
            return contract("evaluated results are not sorted by score".to_string());
        }
        if let Some(bad) = self
            .evaluated_results
            .iter()
            .find(|r| r.rating as f64 != (r.score * 5.0).round())
        {
            return contract(format!("rating {} does not match score {}", bad.rating, bad.score));
        }

        let mut seen = HashSet::new();
        if let Some(dup) = self
            .search_results
            .iter()
            .find(|r| !seen.insert(canonicalize_url(&r.url)))
        {
            return contract(format!("duplicate search result url {}", dup.url));
        }

        if self.recommendations.len() > config.max_recommendations {
            return contract(format!(
                "{} recommendations exceed cap {}",
                self.recommendations.len(),
                config.max_recommendations
            ));
        }
        if self
            .recommendations
            .iter()
            .any(|r| r.title.trim().is_empty())
        {
            return contract("recommendation with empty title".to_string());
        }
        Ok(())
    }
}

fn contract(message: String) -> PipelineResult<()> {
    Err(PipelineError::StateContract(message))
}

/// 阶段产出的部分状态，`None` 表示该字段未被写入
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub skill_gap: Option<String>,
    pub detected_language: Option<String>,
    pub user_context: Option<String>,
    pub target_role: Option<Option<String>>,
    pub target_industry: Option<Option<String>>,
    pub domain_keywords: Option<Vec<String>>,
    pub focus_skills: Option<Vec<FocusSkill>>,
    pub learning_objectives: Option<Vec<String>>,
    pub queries: Option<Vec<String>>,
    pub searched_queries: Option<Vec<String>>,
    pub search_results: Option<Vec<Resource>>,
    pub evaluated_results: Option<Vec<ScoredResource>>,
    pub examples: Option<Vec<ExampleProject>>,
    pub confidence: Option<f64>,
    pub iteration_count: Option<u32>,
    pub recommendations: Option<Vec<Recommendation>>,
    pub loaded_from_storage: Option<bool>,
}

impl StateUpdate {
    /// 仍未被任何合并函数消费的字段
    pub fn pending_fields(&self) -> Vec<&'static str> {
        let slots: [(&'static str, bool); 17] = [
            ("skill_gap", self.skill_gap.is_some()),
            ("detected_language", self.detected_language.is_some()),
            ("user_context", self.user_context.is_some()),
            ("target_role", self.target_role.is_some()),
            ("target_industry", self.target_industry.is_some()),
            ("domain_keywords", self.domain_keywords.is_some()),
            ("focus_skills", self.focus_skills.is_some()),
            ("learning_objectives", self.learning_objectives.is_some()),
            ("queries", self.queries.is_some()),
            ("searched_queries", self.searched_queries.is_some()),
            ("search_results", self.search_results.is_some()),
            ("evaluated_results", self.evaluated_results.is_some()),
            ("examples", self.examples.is_some()),
            ("confidence", self.confidence.is_some()),
            ("iteration_count", self.iteration_count.is_some()),
            ("recommendations", self.recommendations.is_some()),
            ("loaded_from_storage", self.loaded_from_storage.is_some()),
        ];
        slots
            .into_iter()
            .filter_map(|(name, pending)| pending.then_some(name))
            .collect()
    }
}

/// 单字段合并函数
pub type MergeFn = fn(&mut ResearchState, &mut StateUpdate);

struct FieldReducer {
    field: &'static str,
    merge: MergeFn,
}

/// 字段名到合并函数的注册表，在每个阶段之后统一应用
pub struct ReducerRegistry {
    reducers: Vec<FieldReducer>,
}

impl ReducerRegistry {
    pub fn empty() -> Self {
        Self {
            reducers: Vec::new(),
        }
    }

    /// 注册字段的合并函数，同名字段后注册者覆盖先注册者
    pub fn register(mut self, field: &'static str, merge: MergeFn) -> Self {
        self.reducers.retain(|r| r.field != field);
        self.reducers.push(FieldReducer { field, merge });
        self
    }

    pub fn fields(&self) -> Vec<&'static str> {
        self.reducers.iter().map(|r| r.field).collect()
    }

    /// 把阶段产出合并回状态；存在未注册字段即违反状态约束
    pub fn apply(&self, state: &mut ResearchState, mut update: StateUpdate) -> PipelineResult<()> {
        for reducer in &self.reducers {
            (reducer.merge)(state, &mut update);
        }

        let pending = update.pending_fields();
        if !pending.is_empty() {
            return Err(PipelineError::StateContract(format!(
                "no reducer registered for {}",
                pending.join(", ")
            )));
        }
        Ok(())
    }
}

/// 有值则替换，否则保留原值
pub fn replace<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn replace_deduped(slot: &mut Vec<String>, value: Option<Vec<String>>) {
    if let Some(values) = value {
        let mut seen = HashSet::new();
        *slot = values
            .into_iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty() && seen.insert(v.to_lowercase()))
            .collect();
    }
}

impl Default for ReducerRegistry {
    fn default() -> Self {
        Self::empty()
            .register("skill_gap", |s, u| replace(&mut s.skill_gap, u.skill_gap.take()))
            .register("detected_language", |s, u| {
                replace(&mut s.detected_language, u.detected_language.take())
            })
            .register("user_context", |s, u| {
                replace(&mut s.user_context, u.user_context.take())
            })
            .register("target_role", |s, u| {
                replace(&mut s.target_role, u.target_role.take())
            })
            .register("target_industry", |s, u| {
                replace(&mut s.target_industry, u.target_industry.take())
            })
            .register("domain_keywords", |s, u| {
                replace_deduped(&mut s.domain_keywords, u.domain_keywords.take())
            })
            .register("focus_skills", |s, u| {
                replace(&mut s.focus_skills, u.focus_skills.take())
            })
            .register("learning_objectives", |s, u| {
                replace(&mut s.learning_objectives, u.learning_objectives.take())
            })
            .register("queries", |s, u| replace(&mut s.queries, u.queries.take()))
            .register("searched_queries", |s, u| {
                replace(&mut s.searched_queries, u.searched_queries.take())
            })
            .register("search_results", |s, u| {
                replace(&mut s.search_results, u.search_results.take())
            })
            .register("evaluated_results", |s, u| {
                replace(&mut s.evaluated_results, u.evaluated_results.take())
            })
            .register("examples", |s, u| replace(&mut s.examples, u.examples.take()))
            .register("confidence", |s, u| replace(&mut s.confidence, u.confidence.take()))
            .register("iteration_count", |s, u| {
                if let Some(delta) = u.iteration_count.take() {
                    s.iteration_count = s.iteration_count.saturating_add(delta);
                }
            })
            .register("recommendations", |s, u| {
                replace(&mut s.recommendations, u.recommendations.take())
            })
            .register("loaded_from_storage", |s, u| {
                replace(&mut s.loaded_from_storage, u.loaded_from_storage.take())
            })
    }
}

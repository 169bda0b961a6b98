use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::stages::ResearchStage;
use crate::pipeline::state::{ResearchState, StateUpdate};
use crate::pipeline::types::{FocusSkill, is_known_language};
use crate::storage::SeedStore;

/// 存储中的上下文快照，所有字段可选
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeedSnapshot {
    pub skill_gap: Option<String>,
    pub detected_language: Option<String>,
    pub user_context: Option<String>,
    pub target_role: Option<String>,
    pub target_industry: Option<String>,
    pub domain_keywords: Vec<String>,
    pub focus_skills: Vec<FocusSkill>,
    pub learning_objectives: Vec<String>,
    pub queries: Vec<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl SeedSnapshot {
    /// 只填补调用方留空的字段
    pub fn fill_gaps(self, state: &ResearchState) -> StateUpdate {
        let mut update = StateUpdate {
            loaded_from_storage: Some(true),
            ..StateUpdate::default()
        };

        if state.skill_gap.trim().is_empty() {
            update.skill_gap = non_empty(self.skill_gap);
        }
        if !is_known_language(&state.detected_language) {
            update.detected_language =
                non_empty(self.detected_language).filter(|l| is_known_language(l));
        }
        if state.user_context.trim().is_empty() {
            update.user_context = non_empty(self.user_context);
        }
        if state.target_role.is_none() {
            update.target_role = non_empty(self.target_role).map(Some);
        }
        if state.target_industry.is_none() {
            update.target_industry = non_empty(self.target_industry).map(Some);
        }
        if state.domain_keywords.is_empty() && !self.domain_keywords.is_empty() {
            update.domain_keywords = Some(self.domain_keywords);
        }
        if state.focus_skills.is_empty() && !self.focus_skills.is_empty() {
            update.focus_skills = Some(self.focus_skills);
        }
        if state.learning_objectives.is_empty() && !self.learning_objectives.is_empty() {
            update.learning_objectives = Some(self.learning_objectives);
        }
        if state.queries.is_empty() && !self.queries.is_empty() {
            update.queries = Some(self.queries);
        }
        update
    }
}

/// 按用户ID加载此前保存的种子状态
///
/// 未命中或存储异常都不致命：记录日志、标记 `loaded_from_storage=false`，不重试。
pub struct StateSeedLoader {
    store: Arc<dyn SeedStore>,
}

impl StateSeedLoader {
    pub fn new(context: &PipelineContext) -> Self {
        Self::with_store(context.seed_store.clone())
    }

    pub fn with_store(store: Arc<dyn SeedStore>) -> Self {
        Self { store }
    }
}

fn not_loaded() -> StateUpdate {
    StateUpdate {
        loaded_from_storage: Some(false),
        ..StateUpdate::default()
    }
}

#[async_trait]
impl ResearchStage for StateSeedLoader {
    async fn run(&self, state: &ResearchState) -> StateUpdate {
        let Some(user_id) = state.user_id.as_deref().filter(|id| !id.trim().is_empty()) else {
            return not_loaded();
        };

        match self.store.lookup(user_id).await {
            Ok(document) => match serde_json::from_value::<SeedSnapshot>(document) {
                Ok(snapshot) => {
                    info!(user_id, "已加载种子状态");
                    snapshot.fill_gaps(state)
                }
                Err(e) => {
                    warn!(user_id, error = %e, "种子文档格式不正确，忽略");
                    not_loaded()
                }
            },
            Err(PipelineError::SeedNotFound { .. }) => {
                info!(user_id, "没有可用的种子状态");
                not_loaded()
            }
            Err(e) => {
                warn!(user_id, error = %e, "读取种子状态失败，忽略");
                not_loaded()
            }
        }
    }
}

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// 候选学习资料
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Resource {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
}

/// 资料的时效分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecencyClass {
    Recent,
    Older,
}

/// 五项质量评分，均在 [0,1] 内
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CriteriaScores {
    pub relevance: f64,
    pub authority: f64,
    pub recency: f64,
    pub comprehensiveness: f64,
    pub practicality: f64,
}

/// 评分并排序后的资料
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredResource {
    #[serde(flatten)]
    pub resource: Resource,
    pub score: f64,
    pub rating: u8,
    pub recency_class: RecencyClass,
    pub criteria: CriteriaScores,
}

/// 参考代码仓库
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExampleProject {
    pub name: String,
    pub url: String,
    pub star_count: u64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fork_count: u64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationType {
    Resource,
    Example,
    Action,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// 最终推荐项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationType,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub priority: Priority,
}

/// 流水线关注的技能
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusSkill {
    pub name: String,
    pub gap: f64,
    pub priority: f64,
}

/// 未识别语言时使用的占位值
pub const UNKNOWN_LANGUAGE: &str = "unknown";

pub fn is_known_language(language: &str) -> bool {
    let trimmed = language.trim();
    !trimmed.is_empty() && !trimmed.eq_ignore_ascii_case(UNKNOWN_LANGUAGE)
}

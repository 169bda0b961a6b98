//! 技能差距聚合
//!
//! 把原始的技能自评观测合并为按优先级排序的差距列表，作为流水线关注技能的来源。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::pipeline::types::FocusSkill;

pub const MIN_LEVEL: f64 = 1.0;
pub const MAX_LEVEL: f64 = 5.0;

/// 一次技能观测
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillObservation {
    pub id: String,
    pub current: f64,
    pub target: f64,
    pub importance: f64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// 合并后的单项技能差距
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillGap {
    pub id: String,
    pub category: String,
    pub current: f64,
    pub target: f64,
    pub importance: f64,
    pub gap: f64,
    pub priority: f64,
    pub recommendations: Vec<String>,
}

/// 聚合结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillGapSummary {
    /// 按优先级降序排列
    pub gaps: Vec<SkillGap>,
    /// 0..=100
    pub overall_score: u8,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// 把等级限制在 [1,5] 并保留一位小数，非数值按最低等级处理
pub fn clamp_level(value: f64) -> f64 {
    if value.is_nan() {
        return MIN_LEVEL;
    }
    round1(value.clamp(MIN_LEVEL, MAX_LEVEL))
}

/// 聚合技能观测
///
/// 同一id的多次观测保守合并：current取最小值，target取最大值，importance取最大值，建议取并集。
pub fn aggregate(observations: &[SkillObservation]) -> SkillGapSummary {
    let mut merged: Vec<SkillGap> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for obs in observations {
        let current = clamp_level(obs.current);
        let target = clamp_level(obs.target);
        let importance = clamp_level(obs.importance);

        match index.get(obs.id.as_str()) {
            Some(&i) => {
                let entry = &mut merged[i];
                entry.current = entry.current.min(current);
                entry.target = entry.target.max(target);
                entry.importance = entry.importance.max(importance);
                for rec in &obs.recommendations {
                    if !entry.recommendations.contains(rec) {
                        entry.recommendations.push(rec.clone());
                    }
                }
            }
            None => {
                index.insert(obs.id.as_str(), merged.len());
                let mut recommendations: Vec<String> = Vec::new();
                for rec in &obs.recommendations {
                    if !recommendations.contains(rec) {
                        recommendations.push(rec.clone());
                    }
                }
                merged.push(SkillGap {
                    id: obs.id.clone(),
                    category: obs.category.clone(),
                    current,
                    target,
                    importance,
                    gap: 0.0,
                    priority: 0.0,
                    recommendations,
                });
            }
        }
    }

    let mut achieved = 0.0;
    let mut wanted = 0.0;
    for entry in &mut merged {
        entry.gap = round1((entry.target - entry.current).max(0.0));
        entry.priority = round1(entry.gap * entry.importance);
        achieved += entry.current * entry.importance;
        wanted += entry.target * entry.importance;
    }

    let overall_score = if wanted <= 0.0 {
        100
    } else {
        (100.0 * (achieved / wanted).clamp(0.0, 1.0)).round() as u8
    };

    // 稳定排序，同优先级保持首次出现的顺序
    merged.sort_by(|a, b| {
        b.priority
            .partial_cmp(&a.priority)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    SkillGapSummary {
        gaps: merged,
        overall_score,
    }
}

impl SkillGapSummary {
    /// 取前 `limit` 个仍有差距的技能作为流水线的关注技能
    pub fn focus_skills(&self, limit: usize) -> Vec<FocusSkill> {
        self.gaps
            .iter()
            .filter(|g| g.gap > 0.0)
            .take(limit)
            .map(|g| FocusSkill {
                name: g.id.clone(),
                gap: g.gap,
                priority: g.priority,
            })
            .collect()
    }
}

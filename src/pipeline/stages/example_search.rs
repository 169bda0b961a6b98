use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::CodeHostConfig;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::fallback::bounded;
use crate::pipeline::stages::ResearchStage;
use crate::pipeline::state::{ResearchState, StateUpdate};
use crate::pipeline::types::{ExampleProject, is_known_language};
use crate::providers::CodeHostProvider;

/// 构造仓库搜索查询：技能差距 + 语言限定 + 热度与活跃度下限
pub fn build_query(state: &ResearchState, config: &CodeHostConfig, today: NaiveDate) -> String {
    let mut parts = vec![state.skill_gap.trim().to_string()];

    if is_known_language(&state.detected_language) {
        let language = state.detected_language.trim().to_lowercase();
        if language.contains(char::is_whitespace) {
            parts.push(format!("language:\"{}\"", language));
        } else {
            parts.push(format!("language:{}", language));
        }
    }

    parts.push(format!("stars:>={}", config.min_stars));

    // 窗口超出日期范围时不加活跃度限定
    let pushed_since = ChronoDuration::try_days(config.pushed_within_days.max(0))
        .and_then(|window| today.checked_sub_signed(window));
    if let Some(since) = pushed_since {
        parts.push(format!("pushed:>={}", since.format("%Y-%m-%d")));
    }
    parts.join(" ")
}

/// 对供应商返回结果再做一次质量过滤
pub fn retain_quality(items: Vec<ExampleProject>, min_stars: u64, limit: usize) -> Vec<ExampleProject> {
    items
        .into_iter()
        .filter(|p| !p.description.trim().is_empty() && p.star_count >= min_stars)
        .take(limit)
        .collect()
}

/// 示例仓库质量分（0..1）
///
/// 热度最多0.4，描述丰富度最多0.3，fork数最多0.2，近期活跃最多0.1。
/// 目前没有接入排序，供后续重排使用。
pub fn score_example(example: &ExampleProject, now: DateTime<Utc>) -> f64 {
    // 1万star、1000 fork 视为满分
    let popularity = ((example.star_count as f64 + 1.0).log10() / 4.0).min(1.0) * 0.4;
    let richness = (example.description.trim().chars().count() as f64 / 200.0).min(1.0) * 0.3;
    let forks = ((example.fork_count as f64 + 1.0).log10() / 3.0).min(1.0) * 0.2;
    let recency = match example.updated_at {
        Some(updated) => {
            let age_days = (now - updated).num_days();
            if age_days <= 180 {
                0.1
            } else if age_days <= 365 {
                0.05
            } else {
                0.0
            }
        }
        None => 0.0,
    };
    (popularity + richness + forks + recency).clamp(0.0, 1.0)
}

/// 参考仓库搜索阶段
///
/// 每次调用累加一次迭代计数；供应商失败时返回空列表，是否重试交给编排器的条件边决定。
pub struct ExampleSearchStage {
    code_host: Arc<dyn CodeHostProvider>,
    config: CodeHostConfig,
    timeout: Duration,
}

impl ExampleSearchStage {
    pub fn new(context: &PipelineContext) -> Self {
        Self {
            code_host: context.code_host.clone(),
            config: context.config.code_host.clone(),
            timeout: context.call_timeout(),
        }
    }
}

#[async_trait]
impl ResearchStage for ExampleSearchStage {
    async fn run(&self, state: &ResearchState) -> StateUpdate {
        let query = build_query(state, &self.config, Utc::now().date_naive());

        let examples = match bounded(
            "example_search",
            self.timeout,
            self.code_host
                .search_repositories(&query, self.config.max_results),
        )
        .await
        {
            Ok(result) => {
                let total = result.total_count;
                let kept = retain_quality(result.items, self.config.min_stars, self.config.max_results);
                info!(query = %query, total, kept = kept.len(), "示例仓库搜索完成");
                kept
            }
            Err(e) => {
                warn!(query = %query, error = %e, "示例仓库搜索失败");
                Vec::new()
            }
        };

        StateUpdate {
            examples: Some(examples),
            iteration_count: Some(1),
            ..StateUpdate::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(stars: u64, description: &str) -> ExampleProject {
        ExampleProject {
            name: format!("org/repo-{}", stars),
            url: format!("https://github.com/org/repo-{}", stars),
            star_count: stars,
            description: description.to_string(),
            fork_count: 0,
            updated_at: None,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    #[test]
    fn query_has_language_and_qualifiers() {
        let mut state = ResearchState::new("async runtime");
        state.detected_language = "Rust".to_string();
        let query = build_query(&state, &CodeHostConfig::default(), today());
        assert_eq!(
            query,
            "async runtime language:rust stars:>=100 pushed:>=2025-03-01"
        );
    }

    #[test]
    fn query_omits_unknown_language() {
        let state = ResearchState::new("graph algorithms");
        let query = build_query(&state, &CodeHostConfig::default(), today());
        assert!(!query.contains("language:"));
        assert!(query.starts_with("graph algorithms stars:>=100"));
    }

    #[test]
    fn oversized_window_drops_pushed_qualifier() {
        let state = ResearchState::new("parsers");
        for days in [i64::MAX, 200_000_000] {
            let config = CodeHostConfig {
                pushed_within_days: days,
                ..CodeHostConfig::default()
            };
            let query = build_query(&state, &config, today());
            assert_eq!(query, "parsers stars:>=100");
        }
    }

    #[test]
    fn filter_requires_description_and_stars() {
        let kept = retain_quality(
            vec![
                project(500, "a web framework"),
                project(50, "too small"),
                project(900, "   "),
                project(100, "exactly at floor"),
            ],
            100,
            10,
        );
        let stars: Vec<u64> = kept.iter().map(|p| p.star_count).collect();
        assert_eq!(stars, vec![500, 100]);
    }

    #[test]
    fn score_is_bounded_and_ordered() {
        let now = Utc::now();
        let mut strong = project(20_000, &"x".repeat(300));
        strong.fork_count = 5_000;
        strong.updated_at = Some(now - ChronoDuration::days(10));
        let weak = project(0, "");

        let strong_score = score_example(&strong, now);
        assert!((strong_score - 1.0).abs() < 1e-9);
        assert_eq!(score_example(&weak, now), 0.0);

        let mid = project(100, "a small but documented crate");
        let mid_score = score_example(&mid, now);
        assert!(mid_score > 0.0 && mid_score < strong_score);
    }

    #[test]
    fn recency_component_steps_down() {
        let now = Utc::now();
        let mut p = project(0, "");
        p.updated_at = Some(now - ChronoDuration::days(200));
        assert!((score_example(&p, now) - 0.05).abs() < 1e-9);
        p.updated_at = Some(now - ChronoDuration::days(400));
        assert_eq!(score_example(&p, now), 0.0);
    }
}

mod support;

use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use skillpath::error::PipelineError;
use skillpath::pipeline::stages::quality_evaluation::EVALUATION_BATCH_SCHEMA;
use skillpath::pipeline::stages::resource_search::RESOURCE_LIST_SCHEMA;
use skillpath::pipeline::stages::synthesis::RECOMMENDATION_LIST_SCHEMA;
use skillpath::pipeline::types::{Priority, RecommendationType};
use skillpath::pipeline::{ResearchRequest, run_research};
use skillpath::storage::MemorySeedStore;
use support::*;

const RECOMMENDATIONS: &str = r#"{
  "recommendations": [
    {"type": "resource", "title": "Read the async book", "description": "Core concepts", "url": "https://docs.dev/a1", "priority": "high"},
    {"type": "example", "title": "Study org/example-0", "description": "Real code", "url": "https://github.com/org/example-0", "priority": "medium"},
    {"type": "action", "title": "Write an async crawler", "description": "Practice", "priority": "medium"},
    {"type": "action", "title": "Profile your runtime usage", "description": "Measure", "priority": "low"}
  ]
}"#;

fn rust_request() -> ResearchRequest {
    ResearchRequest {
        language: Some("rust".to_string()),
        queries: vec!["tokio tutorial".to_string()],
        ..ResearchRequest::new("async programming")
    }
}

/// 三条查询共12条命中，其中2条与前面的URL规范化后重复
fn twelve_hits() -> FakeWebSearch {
    FakeWebSearch::new()
        .with_hits(
            "async programming",
            (1..=5).map(|i| hit(&format!("https://docs.dev/a{}", i))).collect(),
        )
        .with_hits(
            "rust async programming",
            vec![
                hit("https://docs.dev/b1"),
                hit("https://DOCS.dev/a1/"),
                hit("https://docs.dev/b2"),
                hit("https://docs.dev/a2?ref=search"),
                hit("https://docs.dev/b3"),
            ],
        )
        .with_hits(
            "tokio tutorial",
            vec![hit("https://docs.dev/c1"), hit("https://docs.dev/c2")],
        )
}

#[tokio::test]
async fn test_duplicate_hits_are_collapsed() {
    let harness = Harness::new(
        FakeLlm::new()
            .respond(EVALUATION_BATCH_SCHEMA, uniform_evaluations(0.8))
            .respond_text(RECOMMENDATION_LIST_SCHEMA, RECOMMENDATIONS),
        twelve_hits(),
        FakeCodeHost::always(examples(3)),
    );

    let report = run_research(&harness.context, rust_request(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.evaluated_resources.len(), 10);
    let urls: Vec<&str> = report
        .evaluated_resources
        .iter()
        .map(|r| r.resource.url.as_str())
        .collect();
    assert_eq!(urls[0], "https://docs.dev/a1");
    assert_eq!(urls[5], "https://docs.dev/b1");
    assert!(!urls.contains(&"https://DOCS.dev/a1/"));

    // 结果足够，不触发生成式补充
    assert_eq!(harness.llm.call_count(RESOURCE_LIST_SCHEMA), 0);
    assert_eq!(harness.llm.call_count(EVALUATION_BATCH_SCHEMA), 1);

    assert_eq!(report.iterations, 1);
    assert_eq!(report.examples.len(), 3);
    assert!((report.confidence - 0.88).abs() < 1e-9);
    assert_eq!(report.recommendations.len(), 4);
    assert_eq!(report.recommendations[0].priority, Priority::High);
}

#[tokio::test]
async fn test_few_examples_loop_back_once() {
    let harness = Harness::new(
        FakeLlm::new()
            .respond(EVALUATION_BATCH_SCHEMA, uniform_evaluations(0.8))
            .respond_text(RECOMMENDATION_LIST_SCHEMA, RECOMMENDATIONS),
        twelve_hits(),
        FakeCodeHost::always(examples(1)).then(examples(2)),
    );

    let report = run_research(&harness.context, rust_request(), &CancellationToken::new())
        .await
        .unwrap();

    // 第二轮仍不足3个示例，但迭代上限强制进入评估
    assert_eq!(harness.code_host.calls(), 2);
    assert_eq!(report.iterations, 2);
    assert_eq!(report.examples.len(), 1);
    assert_eq!(report.evaluated_resources.len(), 10);
    assert_eq!(report.recommendations.len(), 4);
    // 每轮资料搜索都发出三条查询
    assert_eq!(harness.web_search.queries().len(), 6);
}

#[tokio::test]
async fn test_second_round_searches_generated_queries() {
    let generated = json!({
        "resources": [
            {"title": "Async Book", "url": "https://rust-lang.github.io/async-book/", "description": "official"},
            {"title": "Tokio guide", "url": "https://tokio.rs/tokio/tutorial", "description": "tutorial"},
            {"title": "Futures explained", "url": "https://blog.dev/futures", "description": "deep dive"}
        ],
        "queries": ["rust futures explained"]
    })
    .to_string();
    // 只有第一次生成成功，第二轮的补充失败
    let generations = AtomicUsize::new(0);

    let harness = Harness::new(
        FakeLlm::new()
            .respond(RESOURCE_LIST_SCHEMA, move |_| {
                if generations.fetch_add(1, Ordering::SeqCst) == 0 {
                    Ok(generated.clone())
                } else {
                    Err(PipelineError::call_failed("fake-llm", "overloaded"))
                }
            })
            .respond(EVALUATION_BATCH_SCHEMA, uniform_evaluations(0.6)),
        FakeWebSearch::new().with_hits("async programming", vec![hit("https://docs.dev/only")]),
        FakeCodeHost::always(examples(2)),
    );

    let report = run_research(&harness.context, rust_request(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.iterations, 2);
    assert_eq!(harness.llm.call_count(RESOURCE_LIST_SCHEMA), 2);

    let queries = harness.web_search.queries();
    assert_eq!(
        queries,
        vec![
            "async programming",
            "rust async programming",
            "tokio tutorial",
            "rust futures explained",
            "async programming",
            "rust async programming",
        ]
    );

    // 第一轮生成的资料在第二轮补充失败后依然保留
    let urls: Vec<&str> = report
        .evaluated_resources
        .iter()
        .map(|r| r.resource.url.as_str())
        .collect();
    assert_eq!(
        urls,
        vec![
            "https://docs.dev/only",
            "https://rust-lang.github.io/async-book/",
            "https://tokio.rs/tokio/tutorial",
            "https://blog.dev/futures",
        ]
    );
}

#[tokio::test]
async fn test_iteration_bound_forces_progress() {
    let harness = Harness::new(
        FakeLlm::new()
            .respond(EVALUATION_BATCH_SCHEMA, uniform_evaluations(0.8))
            .respond_text(RECOMMENDATION_LIST_SCHEMA, RECOMMENDATIONS),
        twelve_hits(),
        FakeCodeHost::always(vec![]),
    );

    let report = run_research(&harness.context, rust_request(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(harness.code_host.calls(), 2);
    assert_eq!(report.iterations, 2);
    assert!(report.examples.is_empty());
    assert_eq!(report.recommendations.len(), 4);
}

#[tokio::test]
async fn test_malformed_evaluation_uses_baseline() {
    let harness = Harness::new(
        FakeLlm::new()
            .respond_text(
                EVALUATION_BATCH_SCHEMA,
                r#"{"evaluations": [{"relevance": 0.9, "authority": 0.9, "recency": 0.9, "comprehensiveness": 0.9, "practicality": 0.9}]}"#,
            )
            .respond_text(RECOMMENDATION_LIST_SCHEMA, RECOMMENDATIONS),
        twelve_hits(),
        FakeCodeHost::always(examples(3)),
    );

    let report = run_research(&harness.context, rust_request(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.evaluated_resources.len(), 10);
    for scored in &report.evaluated_resources {
        assert!((scored.score - 0.655).abs() < 1e-9);
        assert_eq!(scored.rating, 3);
    }
    // 同分保持输入顺序
    let urls: Vec<&str> = report
        .evaluated_resources
        .iter()
        .map(|r| r.resource.url.as_str())
        .collect();
    assert_eq!(
        &urls[..6],
        &[
            "https://docs.dev/a1",
            "https://docs.dev/a2",
            "https://docs.dev/a3",
            "https://docs.dev/a4",
            "https://docs.dev/a5",
            "https://docs.dev/b1",
        ]
    );
    assert!((report.confidence - 0.7205).abs() < 1e-9);
}

#[tokio::test]
async fn test_thin_search_is_supplemented_by_generation() {
    let generated = json!({
        "resources": [
            {"title": "Async Book", "url": "https://rust-lang.github.io/async-book/", "description": "official"},
            {"title": "Duplicate", "url": "https://docs.dev/only", "description": "already found"},
            {"title": "Tokio guide", "url": "https://tokio.rs/tokio/tutorial", "description": "tutorial"}
        ],
        "queries": ["rust futures explained"]
    })
    .to_string();

    let harness = Harness::new(
        FakeLlm::new()
            .respond_text(RESOURCE_LIST_SCHEMA, &generated)
            .respond(EVALUATION_BATCH_SCHEMA, uniform_evaluations(0.6)),
        FakeWebSearch::new().with_hits("async programming", vec![hit("https://docs.dev/only")]),
        FakeCodeHost::always(examples(3)),
    );

    let report = run_research(&harness.context, rust_request(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(harness.llm.call_count(RESOURCE_LIST_SCHEMA), 1);
    let urls: Vec<&str> = report
        .evaluated_resources
        .iter()
        .map(|r| r.resource.url.as_str())
        .collect();
    assert_eq!(
        urls,
        vec![
            "https://docs.dev/only",
            "https://rust-lang.github.io/async-book/",
            "https://tokio.rs/tokio/tutorial",
        ]
    );
    assert!(report.queries.contains(&"rust futures explained".to_string()));

    // 综合失败时走确定性降级：3条资料 + 3个示例 + 2条行动
    assert_eq!(report.recommendations.len(), 8);
}

#[tokio::test]
async fn test_zero_resources_skip_evaluation() {
    let harness = Harness::new(
        FakeLlm::new(),
        FakeWebSearch::new(),
        FakeCodeHost::always(examples(3)),
    );

    let report = run_research(&harness.context, rust_request(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.evaluated_resources.is_empty());
    assert_eq!(report.confidence, 0.0);
    assert_eq!(harness.llm.call_count(EVALUATION_BATCH_SCHEMA), 0);

    let kinds: Vec<RecommendationType> = report.recommendations.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            RecommendationType::Example,
            RecommendationType::Example,
            RecommendationType::Example,
            RecommendationType::Action,
            RecommendationType::Action,
        ]
    );
}

#[tokio::test]
async fn test_all_providers_down_still_recommends() {
    let harness = Harness::new(
        FakeLlm::new(),
        FakeWebSearch::failing(),
        FakeCodeHost::failing(),
    );

    let report = run_research(&harness.context, rust_request(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.iterations, 2);
    assert_eq!(report.confidence, 0.0);
    assert_eq!(report.recommendations.len(), 2);
    assert_eq!(report.recommendations[0].title, "Build a practice project");
    assert_eq!(report.recommendations[1].title, "Review and refactor existing code");
}

#[tokio::test]
async fn test_same_inputs_give_same_report() {
    let build = || {
        Harness::new(
            FakeLlm::new()
                .respond(EVALUATION_BATCH_SCHEMA, uniform_evaluations(0.7))
                .respond_text(RECOMMENDATION_LIST_SCHEMA, RECOMMENDATIONS),
            twelve_hits(),
            FakeCodeHost::always(examples(2)),
        )
    };

    let first = run_research(&build().context, rust_request(), &CancellationToken::new())
        .await
        .unwrap();
    let second = run_research(&build().context, rust_request(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_seed_fills_missing_context() {
    let store = MemorySeedStore::new();
    store
        .insert(
            "alice",
            json!({
                "detectedLanguage": "rust",
                "targetRole": "platform engineer",
                "domainKeywords": ["observability"]
            }),
        )
        .await;
    let harness = Harness::with_store(
        FakeLlm::new(),
        FakeWebSearch::new(),
        FakeCodeHost::always(examples(3)),
        store,
    );

    let request = ResearchRequest {
        user_id: Some("alice".to_string()),
        ..ResearchRequest::new("distributed tracing")
    };
    let report = run_research(&harness.context, request, &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.loaded_from_storage);
    assert_eq!(report.detected_language, "rust");
    assert!(
        report
            .queries
            .contains(&"distributed tracing observability".to_string())
    );
}

#[tokio::test]
async fn test_unknown_user_is_not_fatal() {
    let harness = Harness::new(
        FakeLlm::new(),
        FakeWebSearch::new(),
        FakeCodeHost::always(examples(3)),
    );
    let request = ResearchRequest {
        user_id: Some("nobody".to_string()),
        ..ResearchRequest::new("sql")
    };

    let report = run_research(&harness.context, request, &CancellationToken::new())
        .await
        .unwrap();
    assert!(!report.loaded_from_storage);
    assert_eq!(report.detected_language, "unknown");
}

#[tokio::test]
async fn test_cancellation_stops_the_run() {
    let harness = Harness::new(
        FakeLlm::new(),
        FakeWebSearch::slow(Duration::from_secs(10)),
        FakeCodeHost::always(examples(3)),
    );
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = run_research(&harness.context, rust_request(), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err, PipelineError::Cancelled);
    assert_eq!(harness.code_host.calls(), 0);
}

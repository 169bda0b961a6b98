//! 集成测试使用的确定性假供应商
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use skillpath::config::Config;
use skillpath::error::{PipelineError, PipelineResult};
use skillpath::llm::{GenerationRequest, LanguageModel};
use skillpath::pipeline::PipelineContext;
use skillpath::pipeline::types::ExampleProject;
use skillpath::providers::{CodeHostProvider, RepositorySearch, SearchHit, WebSearchProvider};
use skillpath::storage::{MemorySeedStore, SeedStore};

type Responder = Box<dyn Fn(&GenerationRequest) -> PipelineResult<String> + Send + Sync>;

/// 按结构名路由的语言模型，未配置的结构视为缺少凭证
#[derive(Default)]
pub struct FakeLlm {
    responders: HashMap<&'static str, Responder>,
    calls: Mutex<Vec<&'static str>>,
}

impl FakeLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(
        mut self,
        schema: &'static str,
        responder: impl Fn(&GenerationRequest) -> PipelineResult<String> + Send + Sync + 'static,
    ) -> Self {
        self.responders.insert(schema, Box::new(responder));
        self
    }

    pub fn respond_text(self, schema: &'static str, text: &str) -> Self {
        let text = text.to_string();
        self.respond(schema, move |_| Ok(text.clone()))
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, schema: &str) -> usize {
        self.calls().iter().filter(|s| **s == schema).count()
    }
}

#[async_trait]
impl LanguageModel for FakeLlm {
    fn name(&self) -> &str {
        "fake-llm"
    }

    async fn generate(&self, request: &GenerationRequest) -> PipelineResult<String> {
        self.calls.lock().unwrap().push(request.schema);
        match self.responders.get(request.schema) {
            Some(responder) => responder(request),
            None => Err(PipelineError::unavailable("fake-llm")),
        }
    }
}

/// 评估负载中的候选数量
pub fn candidate_count(request: &GenerationRequest) -> usize {
    serde_json::from_str::<Value>(&request.payload)
        .ok()
        .and_then(|v| v["candidates"].as_array().map(|a| a.len()))
        .unwrap_or(0)
}

/// 为每个候选给出同样的评分
pub fn uniform_evaluations(value: f64) -> impl Fn(&GenerationRequest) -> PipelineResult<String> {
    move |request| {
        let one = serde_json::json!({
            "relevance": value,
            "authority": value,
            "recency": value,
            "comprehensiveness": value,
            "practicality": value,
        });
        let evaluations = vec![one; candidate_count(request)];
        Ok(format!(
            "```json\n{}\n```",
            serde_json::json!({ "evaluations": evaluations })
        ))
    }
}

/// 按查询返回预设命中的网页搜索
#[derive(Default)]
pub struct FakeWebSearch {
    hits: HashMap<String, Vec<SearchHit>>,
    fail: bool,
    delay: Option<Duration>,
    queries: Mutex<Vec<String>>,
}

impl FakeWebSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn with_hits(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.hits.insert(query.to_string(), hits);
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebSearchProvider for FakeWebSearch {
    fn name(&self) -> &str {
        "fake-search"
    }

    async fn search(&self, query: &str, limit: usize) -> PipelineResult<Vec<SearchHit>> {
        self.queries.lock().unwrap().push(query.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(PipelineError::call_failed("fake-search", "HTTP 503"));
        }
        Ok(self
            .hits
            .get(query)
            .map(|hits| hits.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

/// 依次弹出预设结果的仓库搜索，队列耗尽后重复默认结果
pub struct FakeCodeHost {
    queue: Mutex<VecDeque<PipelineResult<Vec<ExampleProject>>>>,
    default: PipelineResult<Vec<ExampleProject>>,
    calls: Mutex<usize>,
}

impl FakeCodeHost {
    pub fn always(items: Vec<ExampleProject>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            default: Ok(items),
            calls: Mutex::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            default: Err(PipelineError::call_failed("fake-code-host", "rate limited")),
            calls: Mutex::new(0),
        }
    }

    pub fn then(self, items: Vec<ExampleProject>) -> Self {
        self.queue.lock().unwrap().push_back(Ok(items));
        self
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl CodeHostProvider for FakeCodeHost {
    fn name(&self) -> &str {
        "fake-code-host"
    }

    async fn search_repositories(
        &self,
        _query: &str,
        limit: usize,
    ) -> PipelineResult<RepositorySearch> {
        *self.calls.lock().unwrap() += 1;
        let next = self
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone());
        next.map(|items| RepositorySearch {
            total_count: items.len() as u64,
            items: items.into_iter().take(limit).collect(),
        })
    }
}

pub fn hit(url: &str) -> SearchHit {
    SearchHit {
        title: format!("Title for {}", url),
        url: url.to_string(),
        description: "learning material".to_string(),
    }
}

pub fn example(i: usize) -> ExampleProject {
    ExampleProject {
        name: format!("org/example-{}", i),
        url: format!("https://github.com/org/example-{}", i),
        star_count: 1_000 + i as u64,
        description: "reference implementation".to_string(),
        fork_count: 50,
        updated_at: None,
    }
}

pub fn examples(n: usize) -> Vec<ExampleProject> {
    (0..n).map(example).collect()
}

/// 组装上下文；返回具体类型的句柄以便断言调用记录
pub struct Harness {
    pub llm: Arc<FakeLlm>,
    pub web_search: Arc<FakeWebSearch>,
    pub code_host: Arc<FakeCodeHost>,
    pub seed_store: Arc<MemorySeedStore>,
    pub context: PipelineContext,
}

impl Harness {
    pub fn new(llm: FakeLlm, web_search: FakeWebSearch, code_host: FakeCodeHost) -> Self {
        Self::with_store(llm, web_search, code_host, MemorySeedStore::new())
    }

    pub fn with_store(
        llm: FakeLlm,
        web_search: FakeWebSearch,
        code_host: FakeCodeHost,
        seed_store: MemorySeedStore,
    ) -> Self {
        let llm = Arc::new(llm);
        let web_search = Arc::new(web_search);
        let code_host = Arc::new(code_host);
        let seed_store = Arc::new(seed_store);

        let context = PipelineContext::new(
            Config::default(),
            llm.clone(),
            web_search.clone(),
            code_host.clone(),
            seed_store.clone() as Arc<dyn SeedStore>,
        );

        Self {
            llm,
            web_search,
            code_host,
            seed_store,
            context,
        }
    }
}

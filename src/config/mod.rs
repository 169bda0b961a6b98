use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// LLM Provider类型
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub enum LLMProvider {
    #[serde(rename = "openai")]
    #[default]
    OpenAI,
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "ollama")]
    Ollama,
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::DeepSeek => write!(f, "deepseek"),
            LLMProvider::Anthropic => write!(f, "anthropic"),
            LLMProvider::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for LLMProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LLMProvider::OpenAI),
            "deepseek" => Ok(LLMProvider::DeepSeek),
            "anthropic" => Ok(LLMProvider::Anthropic),
            "ollama" => Ok(LLMProvider::Ollama),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// 应用程序配置
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// LLM模型配置
    pub llm: LLMConfig,

    /// 通用网页搜索配置
    pub search: SearchConfig,

    /// 代码托管平台搜索配置
    pub code_host: CodeHostConfig,

    /// 流水线参数
    pub pipeline: PipelineConfig,

    /// 种子状态存储
    pub storage: StorageConfig,

    /// 搜索结果缓存
    pub cache: CacheConfig,

    /// 是否启用详细日志
    pub verbose: bool,

    /// 报告输出路径，为空时打印到标准输出
    pub output_path: Option<PathBuf>,
}

/// LLM模型配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LLMConfig {
    /// LLM Provider类型
    pub provider: LLMProvider,

    /// LLM API KEY，为空时所有生成式调用都走降级分支
    pub api_key: String,

    /// LLM API基地址
    pub api_base_url: String,

    /// 结构化生成使用的模型
    pub model: String,

    /// 最大tokens
    pub max_tokens: u32,

    /// 温度
    pub temperature: f64,
}

/// 网页搜索配置（Tavily兼容接口）
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    pub api_key: String,
    pub api_base_url: String,
}

/// 代码托管平台搜索配置（GitHub兼容接口）
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CodeHostConfig {
    /// 访问令牌，可以为空（匿名访问，限流更严格）
    pub token: String,
    pub api_base_url: String,
    /// 最低star数
    pub min_stars: u64,
    /// 最近活跃时间窗口（天）
    pub pushed_within_days: i64,
    /// 单次查询最多返回的仓库数
    pub max_results: usize,
}

/// 流水线参数
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    /// 示例搜索后回环的迭代上限
    pub max_iterations: u32,
    /// 示例数量达到该值即进入评估
    pub min_examples: usize,
    /// 单次外部调用超时（秒）
    pub call_timeout_secs: u64,
    /// 发往网页搜索的查询条数
    pub search_query_limit: usize,
    /// 每条查询请求的结果数
    pub results_per_query: usize,
    /// 搜索结果少于该值时启用生成式补充
    pub fallback_threshold: usize,
    pub max_resources: usize,
    pub max_evaluated: usize,
    pub max_recommendations: usize,
    pub max_focus_skills: usize,
    pub max_domain_keywords: usize,
}

/// 种子状态存储配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub seed_dir: PathBuf,
}

/// 缓存配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// 是否启用缓存
    pub enabled: bool,

    /// 缓存目录
    pub cache_dir: PathBuf,

    /// 缓存过期时间（小时）
    pub expire_hours: u64,
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut file =
            File::open(path).context(format!("Failed to open config file: {:?}", path))?;
        let mut content = String::new();
        file.read_to_string(&mut content)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }
}

impl PipelineConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::default(),
            api_key: std::env::var("SKILLPATH_LLM_API_KEY").unwrap_or_default(),
            api_base_url: String::from("https://api.openai.com/v1"),
            model: String::from("gpt-4o-mini"),
            max_tokens: 4096,
            temperature: 0.2,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("SKILLPATH_SEARCH_API_KEY").unwrap_or_default(),
            api_base_url: String::from("https://api.tavily.com"),
        }
    }
}

impl Default for CodeHostConfig {
    fn default() -> Self {
        Self {
            token: std::env::var("GITHUB_TOKEN").unwrap_or_default(),
            api_base_url: String::from("https://api.github.com"),
            min_stars: 100,
            pushed_within_days: 365,
            max_results: 10,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2,
            min_examples: 3,
            call_timeout_secs: 30,
            search_query_limit: 3,
            results_per_query: 5,
            fallback_threshold: 8,
            max_resources: 20,
            max_evaluated: 10,
            max_recommendations: 10,
            max_focus_skills: 4,
            max_domain_keywords: 5,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            seed_dir: PathBuf::from(".skillpath/seeds"),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cache_dir: PathBuf::from(".skillpath/cache"),
            expire_hours: 24,
        }
    }
}

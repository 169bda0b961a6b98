use crate::config::{Config, LLMProvider};
use crate::pipeline::ResearchRequest;
use crate::skills::SkillObservation;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

/// 默认配置文件名，位于当前工作目录
pub const DEFAULT_CONFIG_FILE: &str = "skillpath.toml";

/// SkillPath - 为技能差距自动调研学习资料与参考代码，并给出优先级排序的学习建议
#[derive(Parser, Debug)]
#[command(name = "skillpath")]
#[command(
    about = "Researches learning resources and reference repositories for a skill gap, scores them and produces a short prioritized learning plan."
)]
#[command(version)]
pub struct Args {
    /// 需要弥补的技能差距，例如 "async programming"
    pub skill_gap: String,

    /// 编程语言
    #[arg(short, long)]
    pub language: Option<String>,

    /// 用户ID，用于加载此前保存的种子状态
    #[arg(short, long)]
    pub user_id: Option<String>,

    /// 用户背景描述
    #[arg(long)]
    pub context: Option<String>,

    /// 目标岗位
    #[arg(long)]
    pub role: Option<String>,

    /// 目标行业
    #[arg(long)]
    pub industry: Option<String>,

    /// 领域关键词，可重复
    #[arg(short, long = "keyword")]
    pub keywords: Vec<String>,

    /// 学习目标，可重复
    #[arg(long = "objective")]
    pub objectives: Vec<String>,

    /// 额外的搜索查询，可重复
    #[arg(short, long = "query")]
    pub queries: Vec<String>,

    /// 技能自评观测文件（JSON数组）
    #[arg(short, long)]
    pub skills: Option<PathBuf>,

    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 报告输出路径，默认打印到标准输出
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 是否启用详细日志
    #[arg(short, long)]
    pub verbose: bool,

    /// LLM Provider (openai, anthropic, deepseek, ollama)
    #[arg(long)]
    pub llm_provider: Option<String>,

    /// LLM API基地址
    #[arg(long)]
    pub llm_api_base_url: Option<String>,

    /// LLM API KEY
    #[arg(long)]
    pub llm_api_key: Option<String>,

    /// 结构化生成使用的模型
    #[arg(long)]
    pub model: Option<String>,

    /// 最大tokens数
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// 温度参数
    #[arg(long)]
    pub temperature: Option<f64>,

    /// 网页搜索 API KEY
    #[arg(long)]
    pub search_api_key: Option<String>,

    /// GitHub 访问令牌
    #[arg(long)]
    pub github_token: Option<String>,

    /// 示例搜索的迭代上限
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// 单次外部调用超时（秒）
    #[arg(long)]
    pub timeout: Option<u64>,

    /// 启用网页搜索结果缓存
    #[arg(long, conflicts_with = "no_cache")]
    pub cache: bool,

    /// 禁用网页搜索结果缓存
    #[arg(long)]
    pub no_cache: bool,
}

impl Args {
    /// 构造调研请求
    pub fn research_request(&self) -> Result<ResearchRequest> {
        let skills = match &self.skills {
            Some(path) => load_skills(path)?,
            None => Vec::new(),
        };

        Ok(ResearchRequest {
            user_id: self.user_id.clone(),
            skill_gap: self.skill_gap.clone(),
            language: self.language.clone(),
            user_context: self.context.clone().unwrap_or_default(),
            target_role: self.role.clone(),
            target_industry: self.industry.clone(),
            domain_keywords: self.keywords.clone(),
            learning_objectives: self.objectives.clone(),
            queries: self.queries.clone(),
            skills,
        })
    }

    /// 将CLI参数转换为配置
    pub fn into_config(self) -> Result<Config> {
        let mut config = if let Some(config_path) = &self.config {
            // 显式指定的配置文件必须可读
            Config::from_file(config_path)?
        } else {
            let default_config_path = std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(DEFAULT_CONFIG_FILE);

            if default_config_path.exists() {
                Config::from_file(&default_config_path)?
            } else {
                Config::default()
            }
        };

        // 覆盖LLM配置
        if let Some(provider_str) = self.llm_provider {
            match provider_str.parse::<LLMProvider>() {
                Ok(provider) => config.llm.provider = provider,
                Err(_) => eprintln!(
                    "⚠️ 警告: 未知的provider: {}，使用 {}",
                    provider_str, config.llm.provider
                ),
            }
        }
        if let Some(llm_api_base_url) = self.llm_api_base_url {
            config.llm.api_base_url = llm_api_base_url;
        }
        if let Some(llm_api_key) = self.llm_api_key {
            config.llm.api_key = llm_api_key;
        }
        if let Some(model) = self.model {
            config.llm.model = model;
        }
        if let Some(max_tokens) = self.max_tokens {
            config.llm.max_tokens = max_tokens;
        }
        if let Some(temperature) = self.temperature {
            config.llm.temperature = temperature;
        }

        // 外部搜索
        if let Some(search_api_key) = self.search_api_key {
            config.search.api_key = search_api_key;
        }
        if let Some(github_token) = self.github_token {
            config.code_host.token = github_token;
        }

        // 流水线参数
        if let Some(max_iterations) = self.max_iterations {
            config.pipeline.max_iterations = max_iterations;
        }
        if let Some(timeout) = self.timeout {
            config.pipeline.call_timeout_secs = timeout;
        }

        // 缓存配置
        if self.cache {
            config.cache.enabled = true;
        }
        if self.no_cache {
            config.cache.enabled = false;
        }

        if self.output.is_some() {
            config.output_path = self.output;
        }
        config.verbose = config.verbose || self.verbose;

        Ok(config)
    }
}

/// 读取技能观测文件
pub fn load_skills(path: &Path) -> Result<Vec<SkillObservation>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read skills file: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse skills file: {:?}", path))
}

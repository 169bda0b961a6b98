//! 结构化输出的解析与校验

use regex::Regex;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use std::sync::LazyLock;

use crate::error::{PipelineError, PipelineResult};

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").expect("fence pattern is valid")
});

/// 反序列化之后的业务约束校验
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// 去掉包裹JSON的Markdown代码块，同时容忍前后的说明文字
pub fn strip_code_fences(text: &str) -> &str {
    let body = match FENCED_BLOCK.captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => text,
    };

    match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => body.trim(),
    }
}

/// 解析并校验结构化输出，任何失败都归为 `SchemaValidation`
pub fn parse_structured<T>(schema: &str, text: &str) -> PipelineResult<T>
where
    T: DeserializeOwned + Validate,
{
    let json = strip_code_fences(text);
    let value: T = serde_json::from_str(json).map_err(|e| PipelineError::schema(schema, e))?;
    value
        .validate()
        .map_err(|message| PipelineError::schema(schema, message))?;
    Ok(value)
}

/// 生成附在指令末尾的输出结构说明
pub fn schema_instruction<T: JsonSchema>() -> String {
    let schema = schemars::schema_for!(T);
    let rendered = serde_json::to_string_pretty(&schema).unwrap_or_default();
    format!(
        "Respond with a single JSON object only, no commentary. It must conform to this JSON schema:\n{}",
        rendered
    )
}

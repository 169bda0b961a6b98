//! 种子状态存储
//!
//! 只负责按用户读取此前保存的上下文快照；写回由外层应用负责。

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::RwLock;

use crate::error::{PipelineError, PipelineResult};

#[async_trait]
pub trait SeedStore: Send + Sync {
    /// 读取用户的种子文档；不存在时返回 `SeedNotFound`
    async fn lookup(&self, user_id: &str) -> PipelineResult<Value>;
}

/// 每个用户一个JSON文件的目录存储
pub struct FileSeedStore {
    seed_dir: PathBuf,
}

impl FileSeedStore {
    pub fn new(seed_dir: impl Into<PathBuf>) -> Self {
        Self {
            seed_dir: seed_dir.into(),
        }
    }

    /// 用户ID中的路径分隔符等字符替换为下划线，避免越出存储目录
    pub fn seed_path(&self, user_id: &str) -> PathBuf {
        let file_stem: String = user_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '@' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.seed_dir.join(format!("{}.json", file_stem))
    }
}

#[async_trait]
impl SeedStore for FileSeedStore {
    async fn lookup(&self, user_id: &str) -> PipelineResult<Value> {
        let path = self.seed_path(user_id);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PipelineError::SeedNotFound {
                    user_id: user_id.to_string(),
                });
            }
            Err(e) => return Err(PipelineError::Storage(e.to_string())),
        };

        serde_json::from_str(&content)
            .map_err(|e| PipelineError::Storage(format!("{}: {}", path.display(), e)))
    }
}

/// 进程内存储，供嵌入方直接注入快照
#[derive(Default)]
pub struct MemorySeedStore {
    seeds: RwLock<HashMap<String, Value>>,
}

impl MemorySeedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, user_id: impl Into<String>, seed: Value) {
        self.seeds.write().await.insert(user_id.into(), seed);
    }
}

#[async_trait]
impl SeedStore for MemorySeedStore {
    async fn lookup(&self, user_id: &str) -> PipelineResult<Value> {
        self.seeds
            .read()
            .await
            .get(user_id)
            .cloned()
            .ok_or_else(|| PipelineError::SeedNotFound {
                user_id: user_id.to_string(),
            })
    }
}

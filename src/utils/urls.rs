use std::collections::HashSet;

use crate::pipeline::types::Resource;

/// 规范化URL，作为去重键
///
/// 忽略大小写、查询串、片段以及末尾的斜杠。
pub fn canonicalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let end = trimmed.find(['?', '#']).unwrap_or(trimmed.len());
    trimmed[..end].trim_end_matches('/').to_lowercase()
}

/// 按规范化URL去重，先出现者保留，顺序不变
pub fn dedupe_resources<I>(resources: I) -> Vec<Resource>
where
    I: IntoIterator<Item = Resource>,
{
    let mut seen = HashSet::new();
    resources
        .into_iter()
        .filter(|resource| {
            let key = canonicalize_url(&resource.url);
            !key.is_empty() && seen.insert(key)
        })
        .collect()
}

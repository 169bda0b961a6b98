use std::collections::HashSet;

/// 折叠空白，作为查询的展示形式
pub fn normalize_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 有序、大小写不敏感去重的查询集合
#[derive(Debug, Default, Clone)]
pub struct QuerySet {
    seen: HashSet<String>,
    queries: Vec<String>,
}

impl QuerySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入一条查询，空白查询与重复查询会被忽略
    pub fn push(&mut self, query: impl AsRef<str>) -> bool {
        let normalized = normalize_query(query.as_ref());
        if normalized.is_empty() {
            return false;
        }
        if self.seen.insert(normalized.to_lowercase()) {
            self.queries.push(normalized);
            true
        } else {
            false
        }
    }

    pub fn extend<I, S>(&mut self, queries: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for query in queries {
            self.push(query);
        }
    }

    pub fn contains(&self, query: impl AsRef<str>) -> bool {
        self.seen
            .contains(&normalize_query(query.as_ref()).to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.queries
    }
}

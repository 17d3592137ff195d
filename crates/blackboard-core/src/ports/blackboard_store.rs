//! BlackboardStore port - 共有タスクボードの永続化
//!
//! store は「テーブル + 等値フィルタ」だけの小さな CRUD 契約を満たせば良い。
//! 呼び出しをまたぐトランザクションは仮定しません（各呼び出しが行単位で atomic）。
//!
//! # 実装
//! - **InMemoryStore**: テスト・ローカル開発用
//! - **PostgrestStore**: Supabase (PostgREST) over HTTP

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// Tables the blackboard uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Projects,
    Tasks,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::Projects => "projects",
            Table::Tasks => "blackboard_state",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Conjunction of `column == value` conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters(Vec<(String, Value)>);

impl Filters {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.0.push((column.to_string(), value.into()));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(c, v)| (c.as_str(), v))
    }

    /// Does `row` satisfy every condition?
    pub fn matches(&self, row: &Value) -> bool {
        self.0.iter().all(|(column, expected)| row.get(column) == Some(expected))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Network failure, timeout, or the store is down.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("unexpected store response: {0}")]
    Malformed(String),
}

/// BlackboardStore は行の insert / select / update を提供
///
/// # 設計原則
/// - `update` は更新後の行を返す。filter に現在の status を含めれば
///   「まだ pending なら processing にする」という compare-and-set になる
/// - select の返却順は未規定（FIFO を仮定しない）
#[async_trait]
pub trait BlackboardStore: Send + Sync {
    /// Insert `record` and return the stored row (with its assigned id).
    async fn insert(&self, table: Table, record: Value) -> Result<Value, StoreError>;

    /// Snapshot of every row matching `filters`.
    async fn select(&self, table: Table, filters: &Filters) -> Result<Vec<Value>, StoreError>;

    /// Merge `patch` into every row matching `filters`; returns the updated rows.
    async fn update(
        &self,
        table: Table,
        filters: &Filters,
        patch: Value,
    ) -> Result<Vec<Value>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filters_match_all_conditions() {
        let row = json!({"id": "1", "status": "pending", "current_stage": "research_needed"});

        let hit = Filters::new().eq("status", "pending").eq("current_stage", "research_needed");
        let miss = Filters::new().eq("status", "pending").eq("id", "2");

        assert!(hit.matches(&row));
        assert!(!miss.matches(&row));
        assert!(Filters::new().matches(&row));
    }

    #[test]
    fn missing_column_never_matches() {
        let row = json!({"id": "1"});
        assert!(!Filters::new().eq("status", "pending").matches(&row));
    }
}

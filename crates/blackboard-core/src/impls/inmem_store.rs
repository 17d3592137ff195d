//! InMemoryStore - 開発・テスト用の blackboard store
//!
//! PostgREST と同じ契約（行の insert / 等値フィルタ select / update）を
//! プロセス内の HashMap で満たします。

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::ports::{
    BlackboardStore, Clock, Filters, IdGenerator, StoreError, SystemClock, Table, UlidGenerator,
};

/// In-memory store state.
#[derive(Default)]
struct InMemoryState {
    /// Rows per table, in insertion order.
    tables: HashMap<Table, Vec<Map<String, Value>>>,
}

/// InMemoryStore は 1 プロセス内で完結する store
///
/// # 実装詳細
/// - Mutex 1 本で全テーブルを保護（各呼び出しが行単位で atomic になる）
/// - ロックを保持したまま await しない
pub struct InMemoryStore {
    state: Arc<Mutex<InMemoryState>>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    pub fn with_clock<C: Clock + Clone + 'static>(clock: C) -> Self {
        Self {
            state: Arc::new(Mutex::new(InMemoryState::default())),
            clock: Arc::new(clock.clone()),
            ids: Arc::new(UlidGenerator::new(clock)),
        }
    }

    /// Number of rows in `table` (for tests and status output).
    pub async fn len(&self, table: Table) -> usize {
        let state = self.state.lock().await;
        state.tables.get(&table).map_or(0, Vec::len)
    }

    fn timestamp(&self) -> Value {
        Value::String(self.clock.now().to_rfc3339())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn into_object(value: Value, what: &str) -> Result<Map<String, Value>, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Rejected {
            status: 400,
            body: format!("{what} must be a JSON object, got {other}"),
        }),
    }
}

#[async_trait]
impl BlackboardStore for InMemoryStore {
    async fn insert(&self, table: Table, record: Value) -> Result<Value, StoreError> {
        let mut row = into_object(record, "record")?;
        row.entry("id")
            .or_insert_with(|| Value::String(self.ids.generate()));
        let now = self.timestamp();
        row.insert("created_at".to_string(), now.clone());
        row.insert("updated_at".to_string(), now);

        let mut state = self.state.lock().await;
        state.tables.entry(table).or_default().push(row.clone());
        Ok(Value::Object(row))
    }

    async fn select(&self, table: Table, filters: &Filters) -> Result<Vec<Value>, StoreError> {
        let state = self.state.lock().await;
        let rows = state
            .tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .map(|row| Value::Object(row.clone()))
                    .filter(|row| filters.matches(row))
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }

    async fn update(
        &self,
        table: Table,
        filters: &Filters,
        patch: Value,
    ) -> Result<Vec<Value>, StoreError> {
        let patch = into_object(patch, "patch")?;
        let now = self.timestamp();

        let mut state = self.state.lock().await;
        let Some(rows) = state.tables.get_mut(&table) else {
            return Ok(Vec::new());
        };

        let mut updated = Vec::new();
        for row in rows.iter_mut() {
            // filter 判定と書き込みが同じロック内なので compare-and-set が成立する
            if !filters.matches(&Value::Object(row.clone())) {
                continue;
            }
            for (key, value) in &patch {
                row.insert(key.clone(), value.clone());
            }
            row.insert("updated_at".to_string(), now.clone());
            updated.push(Value::Object(row.clone()));
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[tokio::test]
    async fn insert_assigns_id_and_timestamps() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let store = InMemoryStore::with_clock(FixedClock::new(at));

        let row = store
            .insert(Table::Projects, json!({"name": "Research: x", "client_name": "Ana"}))
            .await
            .unwrap();

        assert!(row["id"].as_str().is_some_and(|id| !id.is_empty()));
        assert_eq!(row["created_at"], json!(at.to_rfc3339()));
        assert_eq!(store.len(Table::Projects).await, 1);
        assert_eq!(store.len(Table::Tasks).await, 0);
    }

    #[tokio::test]
    async fn select_filters_rows() {
        let store = InMemoryStore::new();
        store.insert(Table::Tasks, json!({"status": "pending"})).await.unwrap();
        store.insert(Table::Tasks, json!({"status": "completed"})).await.unwrap();

        let pending = store
            .select(Table::Tasks, &Filters::new().eq("status", "pending"))
            .await
            .unwrap();
        let all = store.select(Table::Tasks, &Filters::new()).await.unwrap();

        assert_eq!(pending.len(), 1);
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn update_is_conditional_on_filters() {
        let store = InMemoryStore::new();
        let row = store.insert(Table::Tasks, json!({"status": "pending"})).await.unwrap();
        let id = row["id"].clone();
        let claim = Filters::new().eq("id", id).eq("status", "pending");

        let first = store
            .update(Table::Tasks, &claim, json!({"status": "processing"}))
            .await
            .unwrap();
        let second = store
            .update(Table::Tasks, &claim, json!({"status": "processing"}))
            .await
            .unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(first[0]["status"], "processing");
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn update_keeps_unpatched_columns() {
        let store = InMemoryStore::new();
        let row = store
            .insert(Table::Tasks, json!({"status": "pending", "agent_assigned": "marcus"}))
            .await
            .unwrap();

        let updated = store
            .update(
                Table::Tasks,
                &Filters::new().eq("id", row["id"].clone()),
                json!({"status": "error"}),
            )
            .await
            .unwrap();

        assert_eq!(updated[0]["agent_assigned"], "marcus");
    }

    #[tokio::test]
    async fn rejects_non_object_records() {
        let store = InMemoryStore::new();
        let err = store.insert(Table::Tasks, json!([1, 2])).await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected { status: 400, .. }));
    }
}

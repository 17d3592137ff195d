//! PostgrestStore - Supabase の REST API (PostgREST) を使う store
//!
//! - insert: `POST /rest/v1/<table>`
//! - select: `GET /rest/v1/<table>?col=eq.value`
//! - update: `PATCH /rest/v1/<table>?col=eq.value`
//!
//! insert / update は `Prefer: return=representation` で対象行を返させます。
//! update の返却行数で compare-and-set の成否を判定できます。

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::ports::{BlackboardStore, Filters, StoreError, Table};

pub struct PostgrestStore {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl PostgrestStore {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Unavailable(format!("http client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn endpoint(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.base_url, table.name())
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

/// `col=eq.value` 形式のクエリパラメータに変換
fn filter_params(filters: &Filters) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|(column, value)| {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (column.to_string(), format!("eq.{rendered}"))
        })
        .collect()
}

async fn rows_from(response: Response) -> Result<Vec<Value>, StoreError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

    if !status.is_success() {
        return Err(StoreError::Rejected {
            status: status.as_u16(),
            body,
        });
    }
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    match serde_json::from_str::<Value>(&body) {
        Ok(Value::Array(rows)) => Ok(rows),
        Ok(other) => Err(StoreError::Malformed(format!("expected an array of rows, got {other}"))),
        Err(e) => Err(StoreError::Malformed(format!(
            "{e} - body: {}",
            body.chars().take(200).collect::<String>()
        ))),
    }
}

fn send_error(e: reqwest::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

#[async_trait]
impl BlackboardStore for PostgrestStore {
    async fn insert(&self, table: Table, record: Value) -> Result<Value, StoreError> {
        debug!(%table, "postgrest insert");
        let response = self
            .authorized(self.http.post(self.endpoint(table)))
            .header("Prefer", "return=representation")
            .json(&record)
            .send()
            .await
            .map_err(send_error)?;

        rows_from(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Malformed("insert returned no row".to_string()))
    }

    async fn select(&self, table: Table, filters: &Filters) -> Result<Vec<Value>, StoreError> {
        debug!(%table, ?filters, "postgrest select");
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(filter_params(filters));

        let response = self
            .authorized(self.http.get(self.endpoint(table)))
            .query(&params)
            .send()
            .await
            .map_err(send_error)?;

        rows_from(response).await
    }

    async fn update(
        &self,
        table: Table,
        filters: &Filters,
        patch: Value,
    ) -> Result<Vec<Value>, StoreError> {
        // PostgREST は filter 無しの PATCH を全行更新として扱う
        if filters.is_empty() {
            return Err(StoreError::Rejected {
                status: 400,
                body: "refusing to update without filters".to_string(),
            });
        }
        debug!(%table, ?filters, "postgrest update");

        let response = self
            .authorized(self.http.patch(self.endpoint(table)))
            .header("Prefer", "return=representation")
            .query(&filter_params(filters))
            .json(&patch)
            .send()
            .await
            .map_err(send_error)?;

        rows_from(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_equality_filters() {
        let filters = Filters::new()
            .eq("id", json!(17))
            .eq("status", "pending")
            .eq("flag", json!(true));

        assert_eq!(
            filter_params(&filters),
            vec![
                ("id".to_string(), "eq.17".to_string()),
                ("status".to_string(), "eq.pending".to_string()),
                ("flag".to_string(), "eq.true".to_string()),
            ]
        );
    }

    #[test]
    fn endpoint_uses_table_name() {
        let store =
            PostgrestStore::new("https://db.example.co/", "key", Duration::from_secs(5)).unwrap();
        assert_eq!(
            store.endpoint(Table::Tasks),
            "https://db.example.co/rest/v1/blackboard_state"
        );
    }

    #[tokio::test]
    async fn unfiltered_update_is_refused() {
        let store =
            PostgrestStore::new("http://127.0.0.1:9", "key", Duration::from_secs(1)).unwrap();
        let err = store
            .update(Table::Tasks, &Filters::new(), json!({"status": "error"}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected { status: 400, .. }));
    }
}

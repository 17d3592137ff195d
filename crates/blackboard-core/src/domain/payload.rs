//! Payload - エージェント間で共有する free-form なメモリ
//!
//! 各エージェントは必要なキーを読み、新しいキーを書き足します。
//! 既存キーの削除は行いません（後続 stage が前段の結果をすべて読めるように）。

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Key holding the research topic given by the requester.
pub const OBJECTIVE_KEY: &str = "objective";

/// Key holding opaque routing data of the originating chat.
pub const REPLY_CONTEXT_KEY: &str = "reply_context";

/// Key holding the researcher's report.
pub const REPORT_KEY: &str = "report";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Initial payload written by the router.
    pub fn for_objective(objective: &str, reply_context: Value) -> Self {
        let mut map = Map::new();
        map.insert(OBJECTIVE_KEY.to_string(), Value::String(objective.to_string()));
        map.insert(REPLY_CONTEXT_KEY.to_string(), reply_context);
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// 空文字列は「未設定」と同じ扱い
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn objective(&self) -> Option<&str> {
        self.get_str(OBJECTIVE_KEY)
    }

    /// Returns a copy with `key` set to `value`; all other keys are kept.
    ///
    /// 同じキーへの再書き込みは上書きになるので、同じ stage を再実行しても
    /// payload が膨らむことはありません。
    pub fn with_entry(&self, key: &str, value: Value) -> Self {
        let mut merged = self.0.clone();
        merged.insert(key.to_string(), value);
        Self(merged)
    }

    /// Does this payload carry every key of `earlier`?
    pub fn contains_keys_of(&self, earlier: &Payload) -> bool {
        earlier.0.keys().all(|k| self.0.contains_key(k))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// `memory_payload` が null や非オブジェクトの行でもデコード自体は通す。
/// 中身の検証（objective の有無など）は executor の責務。
pub(crate) fn lenient<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Payload, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Object(map)) => Payload(map),
        _ => Payload::new(),
    })
}

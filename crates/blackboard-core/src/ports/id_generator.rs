//! IdGenerator port - 行 ID の採番
//!
//! 本番の store は自前で ID を採番するので、これは InMemoryStore 用です。
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース

use crate::ports::Clock;
use std::time::SystemTime;
use ulid::Ulid;

/// IdGenerator は store 行の主キーを生成
///
/// # ULID の特性
/// - 時刻でソート可能
/// - 分散環境で生成可能（調整不要）
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// UlidGenerator は Clock の時刻をタイムスタンプ部に使う
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate(&self) -> String {
        let at: SystemTime = self.clock.now().into();
        Ulid::from_datetime(at).to_string()
    }
}

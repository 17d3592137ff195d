//! Observability - ログ初期化と状態集計

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::domain::TaskStatus;

/// Target for conditions that need an operator (tasks stuck in `processing`).
pub const CRITICAL_TARGET: &str = "blackboard::critical";

const DEFAULT_FILTER: &str = "blackboard_core=info,blackboard=info";

/// Install the global tracing subscriber. `RUST_LOG` overrides the default filter.
///
/// 2 回目以降の呼び出しは何もしない（テストから複数回呼ばれても良いように）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub error: usize,
}

impl StatusCounts {
    pub fn tally(statuses: impl IntoIterator<Item = TaskStatus>) -> Self {
        let mut counts = Self::default();
        for status in statuses {
            match status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::Processing => counts.processing += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Error => counts.error += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.pending + self.processing + self.completed + self.error
    }
}

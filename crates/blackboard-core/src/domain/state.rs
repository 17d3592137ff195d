//! State - blackboard 上のタスクの状態
//!
//! タスクは 2 つの軸で状態を持ちます。
//! - **Stage**: パイプライン上の位置（前進のみ、後退しない）
//! - **TaskStatus**: stage 内でのライフサイクル
//!
//! # 状態遷移（TaskStatus）
//! - pending -> processing（claim）
//! - processing -> completed（生成成功、stage も前進）
//! - processing -> error（生成失敗・入力不正、stage はそのまま）
//!
//! completed / error は終端で、そこから他の状態へは戻りません。

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage of a task.
///
/// 宣言順がそのままパイプライン順になるので、`Ord` で前後を比較できます。
/// 新しい stage は末尾に追加し、直前の stage の `next()` を更新してください。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Waiting for the researcher.
    ResearchNeeded,

    /// Research report written; ready for a strategist.
    StrategyReady,
}

impl Stage {
    /// The stage a task moves to when work on this stage completes.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::ResearchNeeded => Some(Stage::StrategyReady),
            Stage::StrategyReady => None,
        }
    }

    /// 前進のみ許可（同じ stage への書き込みは no-op として許可）
    pub fn can_advance_to(self, next: Stage) -> bool {
        next >= self
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::ResearchNeeded => "research_needed",
            Stage::StrategyReady => "strategy_ready",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a task within its current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Eligible for a claim.
    Pending,

    /// Claimed by an executor; work in flight.
    Processing,

    /// Stage work finished successfully.
    Completed,

    /// Stage work failed; needs manual reprocessing.
    Error,
}

impl TaskStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error)
    }

    /// Is this task eligible for a claim?
    pub fn is_claimable(self) -> bool {
        matches!(self, TaskStatus::Pending)
    }

    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Processing)
                | (TaskStatus::Processing, TaskStatus::Completed)
                | (TaskStatus::Processing, TaskStatus::Error)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! TaskExecutor - claim → work → 終端状態
//!
//! # フロー
//! 1. claim: pending -> processing（compare-and-set、負けたら何もしない）
//! 2. StageHandler が payload から prompt を組み立てる（組めなければ error）
//! 3. Generator 実行（timeout 付き）
//! 4. 成功: 結果を payload にマージし completed + 次の stage を 1 回で書く
//!    失敗: error だけを書く（stage は据え置き、手動で再処理できる）
//!
//! `process` はエラーを返しません。失敗はすべて行の状態とログに変換されます。
//! 終端状態の書き込み自体が失敗した場合だけは行が processing のまま残るので、
//! critical として記録します。

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::board::{Blackboard, StoreWriteError};
use crate::domain::{Payload, Stage, Task};
use crate::observability::CRITICAL_TARGET;
use crate::ports::{Generator, generate_within};

/// StageHandler は 1 つの stage の「仕事の中身」を定義
///
/// executor 側は claim / 状態書き込みだけを担当し、
/// 何を生成してどのキーに書くかはここで決めます。
pub trait StageHandler: Send + Sync {
    /// The stage this handler consumes.
    fn stage(&self) -> Stage;

    /// Partition tag of the agent doing the work.
    fn agent(&self) -> &str;

    /// Model profile passed to the generator.
    fn model(&self) -> &str;

    /// Payload key the generated text is written to.
    fn result_key(&self) -> &str;

    /// Build the prompt; `None` means the payload is missing required input.
    fn prompt(&self, payload: &Payload) -> Option<String>;
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("stage {0} is the last pipeline stage; nothing to advance to")]
    FinalStage(Stage),
}

/// What happened to one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Result written, stage advanced.
    Completed,
    /// Generation failed; row marked `error`.
    Failed,
    /// Payload lacked required input; row marked `error` without generating.
    Malformed,
    /// Another executor claimed the row first.
    AlreadyClaimed,
    /// The claim write failed; row left `pending` for the next cycle.
    ClaimFailed,
    /// The row belongs to a different stage than this executor handles.
    WrongStage,
    /// The row changed under us before the terminal write landed.
    Superseded,
    /// Terminal write failed; row left `processing`.
    Stuck,
}

pub struct TaskExecutor {
    board: Blackboard,
    generator: Arc<dyn Generator>,
    handler: Arc<dyn StageHandler>,
    next_stage: Stage,
    timeout: Duration,
}

impl TaskExecutor {
    pub fn new(
        board: Blackboard,
        generator: Arc<dyn Generator>,
        handler: Arc<dyn StageHandler>,
        timeout: Duration,
    ) -> Result<Self, ExecutorError> {
        let stage = handler.stage();
        let next_stage = stage.next().ok_or(ExecutorError::FinalStage(stage))?;
        Ok(Self {
            board,
            generator,
            handler,
            next_stage,
            timeout,
        })
    }

    pub async fn process(&self, task: Task) -> ProcessOutcome {
        if task.stage != self.handler.stage() {
            warn!(task_id = %task.id, stage = %task.stage, "task is not at this executor's stage");
            return ProcessOutcome::WrongStage;
        }

        // 1. claim
        let task = match self.board.claim(&task).await {
            Ok(Some(claimed)) => claimed,
            Ok(None) => {
                info!(task_id = %task.id, "task already claimed elsewhere; skipping");
                return ProcessOutcome::AlreadyClaimed;
            }
            Err(e) => {
                error!(task_id = %task.id, error = %e, "claim failed; task stays pending");
                return ProcessOutcome::ClaimFailed;
            }
        };
        info!(task_id = %task.id, agent = self.handler.agent(), "processing task");

        // 2. input
        let Some(prompt) = self.handler.prompt(&task.payload) else {
            warn!(task_id = %task.id, "payload is missing its objective; marking error");
            return self.mark_error(&task, ProcessOutcome::Malformed).await;
        };

        // 3. work
        let generated = generate_within(
            self.generator.as_ref(),
            self.handler.model(),
            &prompt,
            self.timeout,
        )
        .await;

        // 4. terminal write
        match generated {
            Ok(text) => {
                let merged = task
                    .payload
                    .with_entry(self.handler.result_key(), Value::String(text));
                match self.board.complete(&task, self.next_stage, &merged).await {
                    Ok(_) => {
                        info!(task_id = %task.id, stage = %self.next_stage, "task completed");
                        ProcessOutcome::Completed
                    }
                    Err(e) => self.terminal_write_failed(&task, e, "result lost"),
                }
            }
            Err(e) => {
                error!(task_id = %task.id, error = %e, "generation failed; marking error");
                self.mark_error(&task, ProcessOutcome::Failed).await
            }
        }
    }

    async fn mark_error(&self, task: &Task, outcome: ProcessOutcome) -> ProcessOutcome {
        match self.board.fail(task).await {
            Ok(_) => outcome,
            Err(e) => self.terminal_write_failed(task, e, "error status not recorded"),
        }
    }

    fn terminal_write_failed(
        &self,
        task: &Task,
        e: StoreWriteError,
        what: &str,
    ) -> ProcessOutcome {
        match e {
            StoreWriteError::NotApplied(_) => {
                warn!(task_id = %task.id, "task left processing before terminal write; {what}");
                ProcessOutcome::Superseded
            }
            other => {
                error!(
                    target: CRITICAL_TARGET,
                    severity = "critical",
                    task_id = %task.id,
                    error = %other,
                    "terminal write failed; task stuck in processing, {what}"
                );
                ProcessOutcome::Stuck
            }
        }
    }
}

//! Blackboard - store port の上に載る型付きアダプタ
//!
//! 行（JSON）と Task / Project の変換、状態遷移の検証、
//! compare-and-set による claim をここに集約します。
//! Router / Scanner / Executor は BlackboardStore を直接触りません。

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::warn;

use crate::domain::{
    NewProject, NewTask, Payload, Project, Stage, Task, TaskId, TaskStatus, columns,
};
use crate::observability::StatusCounts;
use crate::ports::{BlackboardStore, Filters, StoreError, Table};

/// StoreWriteError は状態を書き込む操作のエラー
#[derive(Debug, thiserror::Error)]
pub enum StoreWriteError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("illegal transition for task {task_id}: {from} -> {to}")]
    IllegalTransition {
        task_id: TaskId,
        from: String,
        to: String,
    },

    /// The row was no longer in the expected status when the write landed.
    #[error("task {0} changed concurrently; update not applied")]
    NotApplied(TaskId),
}

#[derive(Clone)]
pub struct Blackboard {
    store: Arc<dyn BlackboardStore>,
}

fn decode<T: DeserializeOwned>(table: Table, row: Value) -> Result<T, StoreError> {
    serde_json::from_value(row).map_err(|e| StoreError::Malformed(format!("{table} row: {e}")))
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Malformed(e.to_string()))
}

fn by_id(id: &TaskId) -> Filters {
    Filters::new().eq(columns::ID, id.as_str())
}

fn check_status(task: &Task, to: TaskStatus) -> Result<(), StoreWriteError> {
    if task.status.can_transition_to(to) {
        Ok(())
    } else {
        Err(StoreWriteError::IllegalTransition {
            task_id: task.id.clone(),
            from: task.status.to_string(),
            to: to.to_string(),
        })
    }
}

impl Blackboard {
    pub fn new(store: Arc<dyn BlackboardStore>) -> Self {
        Self { store }
    }

    pub async fn create_project(&self, project: &NewProject) -> Result<Project, StoreError> {
        let row = self.store.insert(Table::Projects, encode(project)?).await?;
        decode(Table::Projects, row)
    }

    pub async fn create_task(&self, task: &NewTask) -> Result<Task, StoreError> {
        let row = self.store.insert(Table::Tasks, encode(task)?).await?;
        decode(Table::Tasks, row)
    }

    pub async fn get_task(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        let rows = self.store.select(Table::Tasks, &by_id(id)).await?;
        rows.into_iter()
            .next()
            .map(|row| decode(Table::Tasks, row))
            .transpose()
    }

    /// Tasks matching `filters`. Rows that do not decode are logged and skipped.
    pub async fn select_tasks(&self, filters: &Filters) -> Result<Vec<Task>, StoreError> {
        let rows = self.store.select(Table::Tasks, filters).await?;
        let mut tasks = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.get(columns::ID).cloned().unwrap_or(Value::Null);
            match decode::<Task>(Table::Tasks, row) {
                Ok(task) => tasks.push(task),
                Err(e) => warn!(row_id = %id, error = %e, "skipping undecodable task row"),
            }
        }
        Ok(tasks)
    }

    /// pending -> processing の compare-and-set。
    ///
    /// 行がまだ pending の場合だけ書き込みが反映され、更新後の Task を返す。
    /// 既に他の executor が claim していたら `None`。
    pub async fn claim(&self, task: &Task) -> Result<Option<Task>, StoreWriteError> {
        if !task.status.is_claimable() {
            return Err(StoreWriteError::IllegalTransition {
                task_id: task.id.clone(),
                from: task.status.to_string(),
                to: TaskStatus::Processing.to_string(),
            });
        }
        let filters = by_id(&task.id).eq(columns::STATUS, TaskStatus::Pending.as_str());
        let patch = json!({ columns::STATUS: TaskStatus::Processing });

        let rows = self.store.update(Table::Tasks, &filters, patch).await?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(decode(Table::Tasks, row)?)),
            None => Ok(None),
        }
    }

    /// processing -> completed、stage 前進と payload 書き込みを 1 回の update で行う
    pub async fn complete(
        &self,
        task: &Task,
        next_stage: Stage,
        payload: &Payload,
    ) -> Result<Task, StoreWriteError> {
        check_status(task, TaskStatus::Completed)?;
        if !task.stage.can_advance_to(next_stage) {
            return Err(StoreWriteError::IllegalTransition {
                task_id: task.id.clone(),
                from: task.stage.to_string(),
                to: next_stage.to_string(),
            });
        }
        let patch = json!({
            columns::STATUS: TaskStatus::Completed,
            columns::STAGE: next_stage,
            columns::PAYLOAD: payload,
        });
        self.finish(task, patch).await
    }

    /// processing -> error（stage と payload は変更しない）
    pub async fn fail(&self, task: &Task) -> Result<Task, StoreWriteError> {
        check_status(task, TaskStatus::Error)?;
        self.finish(task, json!({ columns::STATUS: TaskStatus::Error }))
            .await
    }

    async fn finish(&self, task: &Task, patch: Value) -> Result<Task, StoreWriteError> {
        // processing のままの行にだけ終端状態を書く（終端からの逆戻りを防ぐ）
        let filters = by_id(&task.id).eq(columns::STATUS, TaskStatus::Processing.as_str());
        let rows = self.store.update(Table::Tasks, &filters, patch).await?;
        match rows.into_iter().next() {
            Some(row) => Ok(decode(Table::Tasks, row)?),
            None => Err(StoreWriteError::NotApplied(task.id.clone())),
        }
    }

    /// Status counts over every task of `agent` (all agents when `None`).
    pub async fn counts_by_status(&self, agent: Option<&str>) -> Result<StatusCounts, StoreError> {
        let filters = match agent {
            Some(agent) => Filters::new().eq(columns::AGENT, agent),
            None => Filters::new(),
        };
        let tasks = self.select_tasks(&filters).await?;
        Ok(StatusCounts::tally(tasks.iter().map(|t| t.status)))
    }
}

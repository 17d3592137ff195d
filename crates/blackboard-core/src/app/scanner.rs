//! TaskScanner - 対象タスクのスナップショットを取得

use tracing::debug;

use super::board::Blackboard;
use crate::domain::{Stage, Task, TaskStatus, columns};
use crate::ports::{Filters, StoreError};

#[derive(Debug, thiserror::Error)]
#[error("scan of {filter} failed: {source}")]
pub struct ScanError {
    pub filter: ScanFilter,
    #[source]
    pub source: StoreError,
}

/// Which rows a polling loop works on.
///
/// stage / status / agent をすべて明示するので、同じループの形を
/// 別の stage や別のエージェントにも使い回せます。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFilter {
    pub stage: Stage,
    pub status: TaskStatus,
    pub agent: Option<String>,
}

impl ScanFilter {
    /// Pending work for `agent` at `stage`.
    pub fn pending(stage: Stage, agent: impl Into<String>) -> Self {
        Self {
            stage,
            status: TaskStatus::Pending,
            agent: Some(agent.into()),
        }
    }

    fn to_filters(&self) -> Filters {
        let filters = Filters::new()
            .eq(columns::STAGE, self.stage.as_str())
            .eq(columns::STATUS, self.status.as_str());
        match &self.agent {
            Some(agent) => filters.eq(columns::AGENT, agent.as_str()),
            None => filters,
        }
    }
}

impl std::fmt::Display for ScanFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stage={} status={}", self.stage, self.status)?;
        if let Some(agent) = &self.agent {
            write!(f, " agent={agent}")?;
        }
        Ok(())
    }
}

pub struct TaskScanner {
    board: Blackboard,
}

impl TaskScanner {
    pub fn new(board: Blackboard) -> Self {
        Self { board }
    }

    /// Snapshot of rows matching `filter` at call time; empty when nothing matches.
    pub async fn scan(&self, filter: &ScanFilter) -> Result<Vec<Task>, ScanError> {
        let tasks = self
            .board
            .select_tasks(&filter.to_filters())
            .await
            .map_err(|source| ScanError {
                filter: filter.clone(),
                source,
            })?;
        debug!(%filter, found = tasks.len(), "scan finished");
        Ok(tasks)
    }
}

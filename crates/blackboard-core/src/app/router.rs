//! TaskRouter - 受け付けた依頼を blackboard に書き込む
//!
//! # フロー
//! 1. topic を検証（空なら何も書かない）
//! 2. Project 行を作成
//! 3. Project を参照する Task 行を pending / research_needed で作成
//!
//! 2 と 3 は別々の store 呼び出しなので、3 が失敗すると Project だけが残る。
//! ロールバックはせず、`SubmissionError::OrphanedProject` として区別して返す。

use serde_json::Value;
use tracing::{error, info};

use super::board::Blackboard;
use crate::domain::{NewProject, NewTask, Payload, ProjectId, Stage, TaskId};
use crate::ports::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("topic must not be empty")]
    EmptyTopic,

    #[error("failed to create project: {0}")]
    ProjectCreation(#[source] StoreError),

    /// The project row exists but its task row could not be written.
    #[error("project {project_id} was created but its task was not: {source}")]
    OrphanedProject {
        project_id: ProjectId,
        #[source]
        source: StoreError,
    },
}

pub struct TaskRouter {
    board: Blackboard,
    agent: String,
}

impl TaskRouter {
    /// `agent` is the partition tag written to `agent_assigned`.
    pub fn new(board: Blackboard, agent: impl Into<String>) -> Self {
        Self {
            board,
            agent: agent.into(),
        }
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// Create a project and its first task for `topic`.
    ///
    /// `reply_context` is stored verbatim in the payload for whoever delivers
    /// the result later.
    pub async fn submit(
        &self,
        requester_name: &str,
        topic: &str,
        reply_context: Value,
    ) -> Result<TaskId, SubmissionError> {
        // 空判定だけ trim する。書き込む値は受け取ったまま
        if topic.trim().is_empty() {
            return Err(SubmissionError::EmptyTopic);
        }

        let project = self
            .board
            .create_project(&NewProject::research(topic, requester_name))
            .await
            .map_err(|e| {
                error!(error = %e, "failed to create project");
                SubmissionError::ProjectCreation(e)
            })?;

        let new_task = NewTask::pending(
            project.id.clone(),
            Stage::ResearchNeeded,
            &self.agent,
            Payload::for_objective(topic, reply_context),
        );
        let task = match self.board.create_task(&new_task).await {
            Ok(task) => task,
            Err(e) => {
                error!(
                    project_id = %project.id,
                    error = %e,
                    "project created but task write failed; project is orphaned"
                );
                return Err(SubmissionError::OrphanedProject {
                    project_id: project.id,
                    source: e,
                });
            }
        };

        info!(task_id = %task.id, project_id = %project.id, agent = %self.agent, topic, "task submitted");
        Ok(task.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskStatus;
    use crate::impls::InMemoryStore;
    use crate::ports::{BlackboardStore, Filters, Table};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    /// 指定テーブルへの insert だけ失敗させる
    struct FailingInserts {
        inner: InMemoryStore,
        table: Table,
    }

    #[async_trait]
    impl BlackboardStore for FailingInserts {
        async fn insert(&self, table: Table, record: Value) -> Result<Value, StoreError> {
            if table == self.table {
                return Err(StoreError::Unavailable("connection reset".to_string()));
            }
            self.inner.insert(table, record).await
        }

        async fn select(&self, table: Table, filters: &Filters) -> Result<Vec<Value>, StoreError> {
            self.inner.select(table, filters).await
        }

        async fn update(
            &self,
            table: Table,
            filters: &Filters,
            patch: Value,
        ) -> Result<Vec<Value>, StoreError> {
            self.inner.update(table, filters, patch).await
        }
    }

    #[tokio::test]
    async fn submit_writes_pending_research_task() {
        let store = Arc::new(InMemoryStore::new());
        let board = Blackboard::new(store.clone());
        let router = TaskRouter::new(board.clone(), "marcus");

        let id = router
            .submit("Ana", "market entry Peru", json!({"chat_id": 7}))
            .await
            .unwrap();

        let task = board.get_task(&id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.stage, Stage::ResearchNeeded);
        assert_eq!(task.agent, "marcus");
        assert_eq!(task.payload.objective(), Some("market entry Peru"));
        assert_eq!(task.payload.get("reply_context"), Some(&json!({"chat_id": 7})));

        let projects = store.select(Table::Projects, &Filters::new()).await.unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0]["id"], json!(task.project_id.as_str()));
        assert_eq!(projects[0]["client_name"], "Ana");
    }

    #[tokio::test]
    async fn padded_topic_is_stored_verbatim() {
        let store = Arc::new(InMemoryStore::new());
        let board = Blackboard::new(store.clone());
        let router = TaskRouter::new(board.clone(), "marcus");

        let id = router
            .submit("Ana", " market entry Peru ", json!(null))
            .await
            .unwrap();

        let task = board.get_task(&id).await.unwrap().unwrap();
        assert_eq!(
            task.payload.get("objective"),
            Some(&json!(" market entry Peru "))
        );
        let projects = store.select(Table::Projects, &Filters::new()).await.unwrap();
        assert_eq!(projects[0]["name"], "Research:  market entry Peru ");
    }

    #[tokio::test]
    async fn empty_topic_writes_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let router = TaskRouter::new(Blackboard::new(store.clone()), "marcus");

        let err = router.submit("Ana", "  ", json!(null)).await.unwrap_err();

        assert!(matches!(err, SubmissionError::EmptyTopic));
        assert_eq!(store.len(Table::Projects).await, 0);
        assert_eq!(store.len(Table::Tasks).await, 0);
    }

    #[tokio::test]
    async fn task_failure_reports_orphaned_project() {
        let store = Arc::new(FailingInserts {
            inner: InMemoryStore::new(),
            table: Table::Tasks,
        });
        let router = TaskRouter::new(Blackboard::new(store.clone()), "marcus");

        let err = router.submit("Ana", "topic", json!(null)).await.unwrap_err();

        let SubmissionError::OrphanedProject { project_id, .. } = err else {
            panic!("expected OrphanedProject, got {err:?}");
        };
        let projects = store.inner.select(Table::Projects, &Filters::new()).await.unwrap();
        assert_eq!(projects[0]["id"], json!(project_id.as_str()));
    }

    #[tokio::test]
    async fn project_failure_is_distinct() {
        let store = Arc::new(FailingInserts {
            inner: InMemoryStore::new(),
            table: Table::Projects,
        });
        let router = TaskRouter::new(Blackboard::new(store.clone()), "marcus");

        let err = router.submit("Ana", "topic", json!(null)).await.unwrap_err();

        assert!(matches!(err, SubmissionError::ProjectCreation(_)));
        assert_eq!(store.inner.len(Table::Tasks).await, 0);
    }
}

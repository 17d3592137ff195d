//! Task / Project rows.
//!
//! フィールド名は store のカラム名に合わせて serde で rename しています。
//! 行に余分なカラム（updated_at など）があっても無視されます。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ProjectId, TaskId};
use super::payload::{self, Payload};
use super::state::{Stage, TaskStatus};

/// Column names of the `blackboard_state` table.
pub mod columns {
    pub const ID: &str = "id";
    pub const PROJECT_ID: &str = "project_id";
    pub const STAGE: &str = "current_stage";
    pub const STATUS: &str = "status";
    pub const AGENT: &str = "agent_assigned";
    pub const PAYLOAD: &str = "memory_payload";
}

/// One unit of work on the blackboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub project_id: ProjectId,

    #[serde(rename = "current_stage")]
    pub stage: Stage,

    pub status: TaskStatus,

    /// Work-queue partition key (e.g. "marcus"); not a lock.
    #[serde(rename = "agent_assigned")]
    pub agent: String,

    #[serde(rename = "memory_payload", deserialize_with = "payload::lenient", default)]
    pub payload: Payload,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Insert form of a task (id and timestamps come from the store).
#[derive(Debug, Clone, Serialize)]
pub struct NewTask {
    pub project_id: ProjectId,

    #[serde(rename = "current_stage")]
    pub stage: Stage,

    pub status: TaskStatus,

    #[serde(rename = "agent_assigned")]
    pub agent: String,

    #[serde(rename = "memory_payload")]
    pub payload: Payload,
}

impl NewTask {
    /// A task entering the pipeline at `stage`, waiting for `agent`.
    pub fn pending(project_id: ProjectId, stage: Stage, agent: &str, payload: Payload) -> Self {
        Self {
            project_id,
            stage,
            status: TaskStatus::Pending,
            agent: agent.to_string(),
            payload,
        }
    }
}

/// Owner of one or more tasks (1:1 at creation today).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,

    /// Display name.
    pub name: String,

    /// Name of the requester who asked for the work.
    pub client_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewProject {
    pub name: String,
    pub client_name: String,
}

impl NewProject {
    pub fn research(topic: &str, requester_name: &str) -> Self {
        Self {
            name: format!("Research: {topic}"),
            client_name: requester_name.to_string(),
        }
    }
}

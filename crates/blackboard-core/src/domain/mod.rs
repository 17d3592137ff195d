//! Domain model (IDs, stages/statuses, payload, rows).

pub mod ids;
pub mod payload;
pub mod state;
pub mod task;

pub use ids::{ProjectId, TaskId};
pub use payload::{OBJECTIVE_KEY, Payload, REPLY_CONTEXT_KEY, REPORT_KEY};
pub use state::{Stage, TaskStatus};
pub use task::{NewProject, NewTask, Project, Task, columns};

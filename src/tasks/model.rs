//! Task data model — tasks, statuses, the operation catalog, and event types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a task. Ordered by progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, waiting for a worker.
    Pending,
    /// Claimed by a worker.
    InProgress,
    /// Result reported.
    Completed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// A unit of work: one expression to be evaluated by a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    /// Opaque to the registry; workers parse it.
    pub expression: String,
    pub status: TaskStatus,
    /// Only meaningful once `status` is `Completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<f64>,
    /// Set when the task is first claimed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
}

impl Task {
    /// A fresh pending task.
    pub fn new(id: u64, expression: impl Into<String>) -> Self {
        Self {
            id,
            expression: expression.into(),
            status: TaskStatus::Pending,
            result: None,
            start_time: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }
}

/// An arithmetic operator with its simulated execution cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub operator: String,
    /// Seconds.
    pub duration: u32,
}

/// Supported operators, in catalog order.
pub const OPERATIONS: [(&str, u32); 4] = [("+", 2), ("-", 2), ("*", 4), ("/", 4)];

/// The operation catalog as owned values.
pub fn operation_catalog() -> Vec<Operation> {
    OPERATIONS
        .iter()
        .map(|(operator, duration)| Operation {
            operator: (*operator).to_string(),
            duration: *duration,
        })
        .collect()
}

/// Body of `POST /addTask`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub expression: String,
}

/// Response of `POST /addTask`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTaskResponse {
    pub id: u64,
}

/// Task counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
}

/// Registry events pushed to WebSocket subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// Snapshot of pending tasks, sent on connect and after lag.
    PendingSync { tasks: Vec<Task> },
    TaskCreated { task: Task },
    TaskClaimed { task: Task },
    TaskReported { task: Task },
}

//! Task registry — in-memory task store with first-come-first-served claiming.
//!
//! All state sits behind one mutex: the id-keyed task map, the ordered set of
//! pending ids and the id counter. Ids are handed out in ascending order, so
//! the smallest pending id is always the oldest pending task.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use super::model::{Operation, Task, TaskCounts, TaskEvent, TaskStatus, operation_catalog};
use crate::error::TaskError;

/// Default broadcast channel capacity.
const DEFAULT_EVENT_CAPACITY: usize = 256;

struct RegistryState {
    tasks: HashMap<u64, Task>,
    pending: BTreeSet<u64>,
    next_id: u64,
}

impl RegistryState {
    fn new() -> Self {
        Self {
            tasks: HashMap::new(),
            pending: BTreeSet::new(),
            next_id: 1,
        }
    }
}

/// Shared task registry with event fan-out to WebSocket clients.
pub struct TaskRegistry {
    state: Mutex<RegistryState>,
    operations: Vec<Operation>,
    tx: broadcast::Sender<TaskEvent>,
}

impl TaskRegistry {
    /// Create an empty registry.
    pub fn new() -> Arc<Self> {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create an empty registry with a custom event buffer size.
    pub fn with_event_capacity(capacity: usize) -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Arc::new(Self {
            state: Mutex::new(RegistryState::new()),
            operations: operation_catalog(),
            tx,
        })
    }

    /// Subscribe to registry events.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.tx.subscribe()
    }

    /// Register a new pending task and return its id.
    pub async fn create(&self, expression: impl Into<String>) -> u64 {
        let mut state = self.state.lock().await;
        let id = state.next_id;
        state.next_id += 1;
        let task = Task::new(id, expression);
        state.tasks.insert(id, task.clone());
        state.pending.insert(id);

        info!(task_id = id, expression = %task.expression, "Task created");

        // Sent under the lock so events follow mutation order.
        let _ = self.tx.send(TaskEvent::TaskCreated { task });
        id
    }

    /// Snapshot of the task with this id.
    pub async fn get_status(&self, id: u64) -> Result<Task, TaskError> {
        let state = self.state.lock().await;
        state
            .tasks
            .get(&id)
            .cloned()
            .ok_or(TaskError::NotFound { id })
    }

    /// Hand the oldest pending task to the caller, marking it in progress.
    ///
    /// Returns `None` when nothing is pending. Selection and mutation share
    /// one critical section, so a task is never handed out twice.
    pub async fn claim_next(&self) -> Option<Task> {
        let mut state = self.state.lock().await;
        let RegistryState { tasks, pending, .. } = &mut *state;
        let claimed = loop {
            let id = pending.pop_first()?;
            // The pending index may hold an id whose record was overwritten
            // to another status.
            let Some(task) = tasks.get_mut(&id) else {
                continue;
            };
            if !task.is_pending() {
                continue;
            }
            task.status = TaskStatus::InProgress;
            task.start_time.get_or_insert_with(Utc::now);
            break task.clone();
        };

        info!(task_id = claimed.id, "Task claimed");

        let _ = self.tx.send(TaskEvent::TaskClaimed {
            task: claimed.clone(),
        });
        Some(claimed)
    }

    /// Replace the stored record carrying the same id.
    ///
    /// Unknown ids are ignored. No transition checks are made; use
    /// [`TaskRegistry::complete`] for the checked path.
    pub async fn report_result(&self, task: Task) {
        let mut state = self.state.lock().await;
        let RegistryState { tasks, pending, .. } = &mut *state;

        let Some(stored) = tasks.get_mut(&task.id) else {
            debug!(task_id = task.id, "Report for unknown task ignored");
            return;
        };
        *stored = task.clone();
        if task.is_pending() {
            pending.insert(task.id);
        } else {
            pending.remove(&task.id);
        }

        info!(task_id = task.id, status = %task.status, "Task result reported");
        let _ = self.tx.send(TaskEvent::TaskReported { task });
    }

    /// Record a result for an in-progress task and mark it completed.
    pub async fn complete(&self, id: u64, result: f64) -> Result<Task, TaskError> {
        if !result.is_finite() {
            return Err(TaskError::MalformedInput(format!(
                "result for task {id} is not a finite number"
            )));
        }

        let mut state = self.state.lock().await;
        let task = state.tasks.get_mut(&id).ok_or(TaskError::NotFound { id })?;
        if task.status != TaskStatus::InProgress {
            warn!(task_id = id, status = %task.status, "Cannot complete task that is not in progress");
            return Err(TaskError::InvalidTransition {
                id,
                from: task.status,
                to: TaskStatus::Completed,
            });
        }
        task.status = TaskStatus::Completed;
        task.result = Some(result);
        let completed = task.clone();

        info!(task_id = id, result, "Task completed");

        let _ = self.tx.send(TaskEvent::TaskReported {
            task: completed.clone(),
        });
        Ok(completed)
    }

    /// The static operator catalog.
    pub fn list_operations(&self) -> &[Operation] {
        &self.operations
    }

    /// All pending tasks in creation order.
    pub async fn pending_tasks(&self) -> Vec<Task> {
        let state = self.state.lock().await;
        state
            .pending
            .iter()
            .filter_map(|id| state.tasks.get(id))
            .filter(|t| t.is_pending())
            .cloned()
            .collect()
    }

    /// Number of tasks in each status.
    pub async fn counts(&self) -> TaskCounts {
        let state = self.state.lock().await;
        state
            .tasks
            .values()
            .fold(TaskCounts::default(), |mut counts, task| {
                match task.status {
                    TaskStatus::Pending => counts.pending += 1,
                    TaskStatus::InProgress => counts.in_progress += 1,
                    TaskStatus::Completed => counts.completed += 1,
                }
                counts
            })
    }

    /// Total number of tasks ever created.
    pub async fn len(&self) -> usize {
        self.state.lock().await.tasks.len()
    }

    /// Whether no task has been created yet.
    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.tasks.is_empty()
    }
}

//! In-memory task tracking for asynchronous capability invocations.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::debug;

use vista_types::{Capability, CapabilityError, CapabilityResponse, Task, TaskStatus};

/// Tracks asynchronous tasks by id.
///
/// State machine: pending → running → {succeeded | failed}. Terminal states
/// are absorbing; updates against a terminal task are ignored. Retention is
/// bounded: once `max_retained` is exceeded the oldest terminal tasks are
/// evicted, and non-terminal tasks are never evicted.
pub struct TaskTracker {
    tasks: RwLock<HashMap<String, Task>>,
    max_retained: usize,
}

impl TaskTracker {
    pub fn new(max_retained: usize) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            max_retained: max_retained.max(1),
        }
    }

    /// Register a new pending task and return it.
    pub async fn create(&self, capability: Capability) -> Task {
        let task = Task::new(capability);
        let mut tasks = self.tasks.write().await;
        tasks.insert(task.id.clone(), task.clone());
        if tasks.len() > self.max_retained {
            Self::evict_oldest_terminal(&mut tasks);
        }
        task
    }

    /// Transition a task to running. Ignored for terminal tasks.
    pub async fn mark_running(&self, id: &str) {
        let mut tasks = self.tasks.write().await;
        if let Some(task) = tasks.get_mut(id)
            && !task.status.is_terminal()
        {
            task.status = TaskStatus::Running;
            task.updated_at = chrono::Utc::now();
        }
    }

    /// Record the outcome of a task. The terminal status follows the
    /// response: a response with `error` set marks the task failed.
    pub async fn complete(&self, id: &str, response: CapabilityResponse) {
        let mut tasks = self.tasks.write().await;
        let Some(task) = tasks.get_mut(id) else {
            debug!(task_id = id, "completion for unknown task dropped");
            return;
        };
        if task.status.is_terminal() {
            debug!(task_id = id, "completion for terminal task ignored");
            return;
        }
        task.status = if response.is_success() {
            TaskStatus::Succeeded
        } else {
            TaskStatus::Failed
        };
        task.result = Some(response);
        task.updated_at = chrono::Utc::now();
    }

    /// Non-blocking status read.
    pub async fn get(&self, id: &str) -> Result<Task, CapabilityError> {
        self.tasks
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| CapabilityError::TaskNotFound(id.to_string()))
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }

    fn evict_oldest_terminal(tasks: &mut HashMap<String, Task>) {
        let oldest = tasks
            .values()
            .filter(|t| t.status.is_terminal())
            .min_by_key(|t| t.updated_at)
            .map(|t| t.id.clone());
        if let Some(id) = oldest {
            tasks.remove(&id);
            debug!(task_id = %id, "evicted terminal task past retention cap");
        }
    }
}

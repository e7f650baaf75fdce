//! Background task runner for request-spawned work
//!
//! Handlers submit work here instead of spawning detached tasks, so every
//! piece of on-demand work has an id and a queryable state.

use crate::error::AppResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{RwLock, Semaphore};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Queued,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub id: u64,
    pub name: String,
    pub state: TaskState,
    /// Summary on success, error text on failure
    pub message: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Configuration for the task runner
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Tasks allowed to run at the same time
    pub concurrency: usize,
    /// Finished records kept for lookups
    pub history_limit: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            history_limit: 500,
        }
    }
}

#[derive(Clone)]
pub struct TaskRunner {
    tasks: Arc<RwLock<HashMap<u64, TaskRecord>>>,
    next_id: Arc<AtomicU64>,
    permits: Arc<Semaphore>,
    config: RuntimeConfig,
}

impl Default for TaskRunner {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl TaskRunner {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            permits: Arc::new(Semaphore::new(config.concurrency.max(1))),
            config,
        }
    }

    /// Queue `work` and return its task id. The future's `Ok` value becomes the
    /// task message.
    pub async fn submit<F>(&self, name: &str, work: F) -> u64
    where
        F: Future<Output = AppResult<String>> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut tasks = self.tasks.write().await;
            tasks.insert(
                id,
                TaskRecord {
                    id,
                    name: name.to_string(),
                    state: TaskState::Queued,
                    message: None,
                    submitted_at: Utc::now(),
                    finished_at: None,
                },
            );
        }
        info!(task_id = id, task = %name, "TaskRunner: queued task {}", name);

        let runner = self.clone();
        let name = name.to_string();
        tokio::spawn(async move {
            let _permit = match runner.permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    runner
                        .finish(id, TaskState::Failed, Some(e.to_string()))
                        .await;
                    return;
                }
            };
            runner.set_state(id, TaskState::Running).await;

            match tokio::spawn(work).await {
                Ok(Ok(message)) => {
                    info!(task_id = id, task = %name, "TaskRunner: task {} succeeded", name);
                    runner.finish(id, TaskState::Succeeded, Some(message)).await;
                }
                Ok(Err(e)) => {
                    error!(task_id = id, task = %name, error = %e, "TaskRunner: task {} failed", name);
                    runner.finish(id, TaskState::Failed, Some(e.to_string())).await;
                }
                Err(e) => {
                    error!(task_id = id, task = %name, error = %e, "TaskRunner: task {} aborted", name);
                    runner
                        .finish(id, TaskState::Failed, Some("task aborted".to_string()))
                        .await;
                }
            }
        });

        id
    }

    pub async fn get(&self, id: u64) -> Option<TaskRecord> {
        self.tasks.read().await.get(&id).cloned()
    }

    async fn set_state(&self, id: u64, state: TaskState) {
        if let Some(record) = self.tasks.write().await.get_mut(&id) {
            record.state = state;
        }
    }

    async fn finish(&self, id: u64, state: TaskState, message: Option<String>) {
        let mut tasks = self.tasks.write().await;
        if let Some(record) = tasks.get_mut(&id) {
            record.state = state;
            record.message = message;
            record.finished_at = Some(Utc::now());
        }

        // Drop the oldest finished records past the history limit
        let finished = tasks.values().filter(|t| t.finished_at.is_some()).count();
        if finished > self.config.history_limit {
            let mut ids: Vec<u64> = tasks
                .values()
                .filter(|t| t.finished_at.is_some())
                .map(|t| t.id)
                .collect();
            ids.sort_unstable();
            for old in ids.into_iter().take(finished - self.config.history_limit) {
                tasks.remove(&old);
            }
        }
    }
}

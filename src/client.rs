//! Client-side data cache.
//!
//! Single in-memory source of truth for the task list, kept consistent
//! with the server through explicit fetch. Toggle and delete are
//! optimistic: snapshot, apply locally, issue the request, roll back on
//! failure, resync once settled. Create and update wait for the server's
//! canonical row before touching the list.

use std::sync::Mutex;

use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{ApiResponse, NewTask, Priority, Task};

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a failure envelope.
    #[error("server responded {status}: {message}")]
    Api { status: u16, message: String },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// Sparse update as sent over the wire. Absent fields stay untouched on
/// the server; `Some(None)` serializes as an explicit null and clears.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Option<Uuid>>,
}

/// The seam between the cache and the server.
#[allow(async_fn_in_trait)]
pub trait TodoTransport {
    async fn fetch_tasks(&self) -> Result<Vec<Task>, ClientError>;
    async fn create_task(&self, new: &NewTask) -> Result<Task, ClientError>;
    async fn update_task(&self, id: Uuid, update: &TaskUpdate) -> Result<Task, ClientError>;
    async fn delete_task(&self, id: Uuid) -> Result<(), ClientError>;
}

// ── HTTP transport ─────────────────────────────────────────────

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpTransport { client: reqwest::Client::new(), base_url: base_url.into() }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status().as_u16();
    let envelope: ApiResponse<T> = response.json().await?;
    match envelope {
        ApiResponse { success: true, data: Some(data), .. } => Ok(data),
        ApiResponse { error, .. } => Err(ClientError::Api {
            status,
            message: error.unwrap_or_else(|| "request failed".to_string()),
        }),
    }
}

async fn decode_ack(response: reqwest::Response) -> Result<(), ClientError> {
    let status = response.status().as_u16();
    let envelope: ApiResponse<()> = response.json().await?;
    if envelope.success {
        return Ok(());
    }
    Err(ClientError::Api {
        status,
        message: envelope.error.unwrap_or_else(|| "request failed".to_string()),
    })
}

impl TodoTransport for HttpTransport {
    async fn fetch_tasks(&self) -> Result<Vec<Task>, ClientError> {
        let response = self.client.get(self.url("/api/todos")).send().await?;
        decode(response).await
    }

    async fn create_task(&self, new: &NewTask) -> Result<Task, ClientError> {
        let response = self.client.post(self.url("/api/todos")).json(new).send().await?;
        decode(response).await
    }

    async fn update_task(&self, id: Uuid, update: &TaskUpdate) -> Result<Task, ClientError> {
        let response = self
            .client
            .put(self.url(&format!("/api/todos/{id}")))
            .json(update)
            .send()
            .await?;
        decode(response).await
    }

    async fn delete_task(&self, id: Uuid) -> Result<(), ClientError> {
        let response = self.client.delete(self.url(&format!("/api/todos/{id}"))).send().await?;
        decode_ack(response).await
    }
}

// ── Notices ────────────────────────────────────────────────────

/// User-visible outcome of a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Failure(String),
}

pub trait NoticeSink {
    fn push(&self, notice: Notice);
}

/// Default sink: notices go to the log.
pub struct LogNotices;

impl NoticeSink for LogNotices {
    fn push(&self, notice: Notice) {
        match notice {
            Notice::Success(msg) => tracing::info!("{msg}"),
            Notice::Failure(msg) => tracing::warn!("{msg}"),
        }
    }
}

// ── Local stats (computed from the cached list, not fetched) ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub high_priority: usize,
    pub overdue: usize,
    /// Percent of tasks completed, rounded; 0 for an empty list.
    pub completion_rate: u32,
}

// ── The cache ──────────────────────────────────────────────────

struct CacheState {
    tasks: Vec<Task>,
    /// Bumped on every mutation. A refetch only commits if the
    /// generation it started under is still current, so a stale read
    /// can never clobber an optimistic write.
    generation: u64,
}

pub struct TaskCache<T, N> {
    transport: T,
    notices: N,
    state: Mutex<CacheState>,
}

impl<T: TodoTransport, N: NoticeSink> TaskCache<T, N> {
    pub fn new(transport: T, notices: N) -> Self {
        TaskCache {
            transport,
            notices,
            state: Mutex::new(CacheState { tasks: Vec::new(), generation: 0 }),
        }
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.state.lock().unwrap().tasks.clone()
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock().unwrap();
        let today = Utc::now().date_naive();

        let total = state.tasks.len();
        let completed = state.tasks.iter().filter(|t| t.completed).count();
        let high_priority =
            state.tasks.iter().filter(|t| t.priority == Priority::High).count();
        let overdue = state
            .tasks
            .iter()
            .filter(|t| !t.completed && t.due_date.is_some_and(|d| d < today))
            .count();
        let completion_rate = if total > 0 {
            (completed as f64 / total as f64 * 100.0).round() as u32
        } else {
            0
        };

        CacheStats {
            total,
            completed,
            pending: total - completed,
            high_priority,
            overdue,
            completion_rate,
        }
    }

    /// Fetch the list from the server. The result is dropped if a
    /// mutation landed while the fetch was in flight; the mutation's own
    /// resync supersedes it.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        let started_under = self.state.lock().unwrap().generation;
        let fetched = self.transport.fetch_tasks().await?;

        let mut state = self.state.lock().unwrap();
        if state.generation == started_under {
            state.tasks = fetched;
        }
        Ok(())
    }

    /// Not optimistic: the caller (an edit form) waits for the canonical
    /// row, which is prepended to the list.
    pub async fn create(&self, new: &NewTask) -> Result<Task, ClientError> {
        match self.transport.create_task(new).await {
            Ok(task) => {
                let mut state = self.state.lock().unwrap();
                state.generation += 1;
                state.tasks.insert(0, task.clone());
                drop(state);
                self.notices.push(Notice::Success("Todo created".to_string()));
                Ok(task)
            }
            Err(err) => {
                self.notices.push(Notice::Failure("Failed to create todo".to_string()));
                Err(err)
            }
        }
    }

    /// Not optimistic: the canonical returned row replaces the cached one.
    pub async fn update(&self, id: Uuid, update: &TaskUpdate) -> Result<Task, ClientError> {
        match self.transport.update_task(id, update).await {
            Ok(task) => {
                let mut state = self.state.lock().unwrap();
                state.generation += 1;
                if let Some(slot) = state.tasks.iter_mut().find(|t| t.id == id) {
                    *slot = task.clone();
                }
                drop(state);
                self.notices.push(Notice::Success("Todo updated".to_string()));
                Ok(task)
            }
            Err(err) => {
                self.notices.push(Notice::Failure("Failed to update todo".to_string()));
                Err(err)
            }
        }
    }

    /// Optimistic completion toggle.
    pub async fn set_completed(&self, id: Uuid, completed: bool) -> Result<(), ClientError> {
        let snapshot = self.apply_optimistic(|tasks| {
            if let Some(task) = tasks.iter_mut().find(|t| t.id == id) {
                task.completed = completed;
            }
        });

        let update = TaskUpdate { completed: Some(completed), ..TaskUpdate::default() };
        let result = self.transport.update_task(id, &update).await.map(|_| ());
        let success = if completed { "Todo completed" } else { "Todo reopened" };
        self.settle(snapshot, result, success, "Failed to update todo status").await
    }

    /// Optimistic delete.
    pub async fn delete(&self, id: Uuid) -> Result<(), ClientError> {
        let snapshot = self.apply_optimistic(|tasks| {
            tasks.retain(|t| t.id != id);
        });

        let result = self.transport.delete_task(id).await;
        self.settle(snapshot, result, "Todo deleted", "Failed to delete todo").await
    }

    /// Capture prior state, bump the generation (suspending any in-flight
    /// refetch), and apply the tentative change.
    fn apply_optimistic(&self, mutate: impl FnOnce(&mut Vec<Task>)) -> Vec<Task> {
        let mut state = self.state.lock().unwrap();
        state.generation += 1;
        let snapshot = state.tasks.clone();
        mutate(&mut state.tasks);
        snapshot
    }

    /// On failure restore the snapshot and surface a notice; on any
    /// outcome trigger a resync so divergence heals within a round trip.
    async fn settle(
        &self,
        snapshot: Vec<Task>,
        result: Result<(), ClientError>,
        success: &str,
        failure: &str,
    ) -> Result<(), ClientError> {
        match &result {
            Ok(()) => self.notices.push(Notice::Success(success.to_string())),
            Err(_) => {
                let mut state = self.state.lock().unwrap();
                state.generation += 1;
                state.tasks = snapshot;
                drop(state);
                self.notices.push(Notice::Failure(failure.to_string()));
            }
        }

        // The resync's own failure is not surfaced; the next explicit
        // fetch will retry.
        let _ = self.refresh().await;
        result
    }
}

// ── Tests ──────────────────────────────────────────────────────

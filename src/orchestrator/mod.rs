mod error;
mod events;

use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{Config, DEFAULT_PROVIDER_TIMEOUT};
use crate::model::{CompletionState, GroupType, Progress, Task, TaskId};
use crate::provider::{self, ProviderError, TaskProvider};
pub use error::{parse_group, OrchestratorError};
pub use events::{CompletionEvent, EventKind, Observer, ObserverRegistry};

/// Serialization points for the read-modify-write sequences, one per group.
#[derive(Default)]
struct GroupLocks {
    daily: Mutex<()>,
    weekly: Mutex<()>,
    monthly: Mutex<()>,
}

impl GroupLocks {
    fn get(&self, group: GroupType) -> &Mutex<()> {
        match group {
            GroupType::Daily => &self.daily,
            GroupType::Weekly => &self.weekly,
            GroupType::Monthly => &self.monthly,
        }
    }
}

/// Merges static definitions with persisted completion state, toggles tasks
/// and tells observers about completions.
///
/// Toggles on the same group are serialized, toggles on different groups run
/// in parallel. Loads never wait for a toggle.
pub struct TaskOrchestrator {
    provider: RwLock<Arc<dyn TaskProvider>>,
    locks: GroupLocks,
    observers: ObserverRegistry,
    timeout: Duration,
}

impl TaskOrchestrator {
    pub fn new(provider: Arc<dyn TaskProvider>) -> Self {
        Self {
            provider: RwLock::new(provider),
            locks: GroupLocks::default(),
            observers: ObserverRegistry::new(),
            timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    /// Bounds every provider call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolves the provider named by the configuration once.
    pub async fn from_config(config: &Config) -> Result<Self, OrchestratorError> {
        let provider = provider::connect(&config.provider)
            .await
            .map_err(|source| OrchestratorError::Connect {
                provider: config.provider.name(),
                source,
            })?;
        Ok(Self::new(provider).with_timeout(config.provider_timeout()))
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.read().name()
    }

    fn provider(&self) -> Arc<dyn TaskProvider> {
        self.provider.read().clone()
    }

    /// Points subsequent calls at another backend and returns the previous
    /// one. Nothing is migrated; calls already running keep their provider.
    pub fn swap_provider(&self, provider: Arc<dyn TaskProvider>) -> Arc<dyn TaskProvider> {
        let previous = std::mem::replace(&mut *self.provider.write(), provider);
        info!(
            from = previous.name(),
            to = self.provider_name(),
            "task provider swapped"
        );
        previous
    }

    pub fn register_task_completed_observer<F>(&self, observer: F)
    where
        F: Fn(&CompletionEvent) + Send + Sync + 'static,
    {
        self.observers.register(EventKind::TaskCompleted, observer);
    }

    pub fn register_all_tasks_completed_observer<F>(&self, observer: F)
    where
        F: Fn(&CompletionEvent) + Send + Sync + 'static,
    {
        self.observers.register(EventKind::AllTasksCompleted, observer);
    }

    /// Runs one provider call under the timeout.
    ///
    /// A timed-out save is reported as unavailable but may still commit
    /// afterwards: blocking file writes and started transactions are not
    /// cancelled by dropping the future.
    async fn call<T, F>(
        &self,
        provider: &dyn TaskProvider,
        operation: &'static str,
        group: GroupType,
        fut: F,
    ) -> Result<T, OrchestratorError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        let res = match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res,
            Err(_) => Err(ProviderError::Timeout(self.timeout)),
        };
        res.map_err(|source| {
            error!(
                provider = provider.name(),
                group = group.as_str(),
                operation,
                reason = %source,
                "provider call failed"
            );
            OrchestratorError::ProviderUnavailable {
                provider: provider.name(),
                operation,
                group,
                source,
            }
        })
    }

    async fn merged(
        &self,
        provider: &dyn TaskProvider,
        group: GroupType,
    ) -> Result<Vec<Task>, OrchestratorError> {
        let definitions = self
            .call(provider, "load tasks", group, provider.load_tasks(group))
            .await?;
        let state = self
            .call(
                provider,
                "load completion state",
                group,
                provider.load_completion_state(group),
            )
            .await?;
        Ok(state.merge(definitions))
    }

    /// The merged view of a group ordered by task id.
    #[instrument(skip(self))]
    pub async fn load_tasks(&self, group: GroupType) -> Result<Vec<Task>, OrchestratorError> {
        let provider = self.provider();
        let tasks = self.merged(provider.as_ref(), group).await?;
        debug!(provider = provider.name(), count = tasks.len(), "tasks loaded");
        Ok(tasks)
    }

    /// Completion flag of every defined task, after the merge.
    pub async fn load_completion_state(
        &self,
        group: GroupType,
    ) -> Result<CompletionState, OrchestratorError> {
        let tasks = self.load_tasks(group).await?;
        Ok(CompletionState::from_tasks(&tasks))
    }

    pub async fn progress(&self, group: GroupType) -> Result<Progress, OrchestratorError> {
        let tasks = self.load_tasks(group).await?;
        Ok(Progress::of(&tasks))
    }

    /// Persists a full view: definitions first, then the completion flags
    /// carried by the tasks. Does not raise completion events.
    #[instrument(skip(self, tasks), fields(count = tasks.len()))]
    pub async fn save_tasks(&self, group: GroupType, tasks: &[Task]) -> Result<(), OrchestratorError> {
        let _guard = self.locks.get(group).lock().await;
        let provider = self.provider();
        self.call(
            provider.as_ref(),
            "save tasks",
            group,
            provider.save_tasks(group, tasks),
        )
        .await?;
        let state = CompletionState::from_tasks(tasks);
        self.call(
            provider.as_ref(),
            "save completion state",
            group,
            provider.save_completion_state(group, &state),
        )
        .await?;
        info!(provider = provider.name(), "tasks saved");
        Ok(())
    }

    /// Flips one task and persists the new completion map.
    ///
    /// Observers run after the state is persisted and before this returns.
    /// Only a transition to completed notifies; the all-tasks event follows
    /// when that transition completed the last open task of the group.
    #[instrument(skip(self))]
    pub async fn toggle_task(
        &self,
        group: GroupType,
        task_id: TaskId,
    ) -> Result<Vec<Task>, OrchestratorError> {
        let (tasks, completed) = {
            let _guard = self.locks.get(group).lock().await;
            let provider = self.provider();
            let mut tasks = self.merged(provider.as_ref(), group).await?;

            let task = match tasks.iter_mut().find(|t| t.id == task_id) {
                Some(task) => task,
                None => {
                    warn!(task_id, "toggle of unknown task");
                    return Err(OrchestratorError::TaskNotFound { group, task_id });
                }
            };
            task.completed = !task.completed;
            let completed = task.completed;

            if provider.requires_definition_writes() {
                self.call(
                    provider.as_ref(),
                    "save tasks",
                    group,
                    provider.save_tasks(group, &tasks),
                )
                .await?;
            }
            let state = CompletionState::from_tasks(&tasks);
            self.call(
                provider.as_ref(),
                "save completion state",
                group,
                provider.save_completion_state(group, &state),
            )
            .await?;
            info!(provider = provider.name(), task_id, completed, "task toggled");
            (tasks, completed)
        };

        if completed {
            let event = CompletionEvent { group, task_id };
            self.observers.notify(EventKind::TaskCompleted, &event);
            if Progress::of(&tasks).is_complete() {
                info!("all tasks completed");
                self.observers.notify(EventKind::AllTasksCompleted, &event);
            }
        }
        Ok(tasks)
    }
}

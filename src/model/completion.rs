use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::task::{Task, TaskId};

/// Persisted completion flags of one group, keyed by task id.
///
/// Ids without an entry are not completed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletionState(BTreeMap<TaskId, bool>);

impl CompletionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: TaskId) -> Option<bool> {
        self.0.get(&id).copied()
    }

    pub fn set(&mut self, id: TaskId, completed: bool) {
        self.0.insert(id, completed);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaskId, bool)> + '_ {
        self.0.iter().map(|(id, completed)| (*id, *completed))
    }

    pub fn ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.0.keys().copied()
    }

    /// Snapshot of the `completed` flag of every task in a view.
    pub fn from_tasks(tasks: &[Task]) -> Self {
        tasks.iter().map(|t| (t.id, t.completed)).collect()
    }

    /// Applies the state to definitions: a persisted entry always wins over
    /// the definition's own flag.
    pub fn merge(&self, definitions: Vec<Task>) -> Vec<Task> {
        definitions
            .into_iter()
            .map(|task| {
                let completed = self.get(task.id).unwrap_or(task.completed);
                task.with_completed(completed)
            })
            .collect()
    }
}

impl FromIterator<(TaskId, bool)> for CompletionState {
    fn from_iter<I: IntoIterator<Item = (TaskId, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn of(tasks: &[Task]) -> Self {
        Self {
            completed: tasks.iter().filter(|t| t.completed).count(),
            total: tasks.len(),
        }
    }

    /// An empty group is never complete.
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }
}

use parking_lot::RwLock;
use std::sync::Arc;

use crate::model::{GroupType, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    TaskCompleted,
    AllTasksCompleted,
}

/// Raised by the toggle that completed `task_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionEvent {
    pub group: GroupType,
    pub task_id: TaskId,
}

pub type Observer = Arc<dyn Fn(&CompletionEvent) + Send + Sync>;

/// Observers per event kind, invoked synchronously in registration order.
#[derive(Default)]
pub struct ObserverRegistry {
    task_completed: RwLock<Vec<Observer>>,
    all_tasks_completed: RwLock<Vec<Observer>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, kind: EventKind) -> &RwLock<Vec<Observer>> {
        match kind {
            EventKind::TaskCompleted => &self.task_completed,
            EventKind::AllTasksCompleted => &self.all_tasks_completed,
        }
    }

    pub fn register<F>(&self, kind: EventKind, observer: F)
    where
        F: Fn(&CompletionEvent) + Send + Sync + 'static,
    {
        self.slot(kind).write().push(Arc::new(observer));
    }

    pub fn len(&self, kind: EventKind) -> usize {
        self.slot(kind).read().len()
    }

    /// Returns the number of observers invoked.
    pub fn notify(&self, kind: EventKind, event: &CompletionEvent) -> usize {
        // snapshot, so an observer may register further observers
        let observers = self.slot(kind).read().clone();
        for observer in observers.iter() {
            observer(event);
        }
        observers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_delivery_order_and_isolation() {
        let registry = ObserverRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for n in 1..=3 {
            let seen = seen.clone();
            registry.register(EventKind::TaskCompleted, move |event| {
                seen.lock().push((n, event.task_id));
            });
        }

        let event = CompletionEvent {
            group: GroupType::Daily,
            task_id: 9,
        };
        assert_eq!(registry.notify(EventKind::TaskCompleted, &event), 3);
        assert_eq!(registry.notify(EventKind::AllTasksCompleted, &event), 0);

        assert_eq!(*seen.lock(), vec![(1, 9), (2, 9), (3, 9)]);
        assert_eq!(registry.len(EventKind::TaskCompleted), 3);
        assert_eq!(registry.len(EventKind::AllTasksCompleted), 0);
    }

    #[test]
    fn test_observer_may_register_during_delivery() {
        let registry = Arc::new(ObserverRegistry::new());
        let inner = registry.clone();
        registry.register(EventKind::AllTasksCompleted, move |_| {
            inner.register(EventKind::AllTasksCompleted, |_| {});
        });

        let event = CompletionEvent {
            group: GroupType::Weekly,
            task_id: 1,
        };
        assert_eq!(registry.notify(EventKind::AllTasksCompleted, &event), 1);
        assert_eq!(registry.len(EventKind::AllTasksCompleted), 2);
    }
}

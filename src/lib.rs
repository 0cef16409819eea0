//! Daily, weekly and monthly checklists backed by interchangeable storage.
//!
//! [`TaskOrchestrator`] merges static task definitions with the persisted
//! completion state of a [`TaskProvider`], toggles tasks and notifies
//! observers when tasks and whole groups get completed.

pub mod config;
pub mod log;
pub mod model;
pub mod orchestrator;
pub mod provider;

pub use model::{CompletionState, GroupType, Progress, Task, TaskDetails, TaskId};
pub use orchestrator::{CompletionEvent, OrchestratorError, TaskOrchestrator};
pub use provider::{LocalTaskProvider, ProviderError, RelationalTaskProvider, TaskProvider};

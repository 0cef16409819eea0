pub mod completion;
pub mod error;
pub mod task;

pub use completion::{CompletionState, Progress};
pub use error::ModelError;
pub use task::{ordered_definitions, parse_task_id, GroupType, Priority, Task, TaskDetails, TaskId};

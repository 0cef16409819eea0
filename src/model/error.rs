use thiserror::Error;

use super::GroupType;

// Task model errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid group type '{0}', expected one of daily, weekly, monthly")]
    InvalidGroupType(String),
    #[error("invalid priority '{0}', expected one of high, medium, low")]
    InvalidPriority(String),
    #[error("task id must be a positive integer, got {0}")]
    InvalidTaskId(i64),
    #[error("task {0} has an empty title")]
    EmptyTitle(u32),
    #[error("{group} task {id} is missing the '{field}' field")]
    MissingField {
        group: GroupType,
        id: u32,
        field: &'static str,
    },
    #[error("task {id} is defined as {found} but listed under {expected}")]
    GroupMismatch {
        expected: GroupType,
        found: GroupType,
        id: u32,
    },
    #[error("duplicate {group} task id {id}")]
    DuplicateTaskId { group: GroupType, id: u32 },
}

use thiserror::Error;

use crate::model::{GroupType, ModelError, TaskId};
use crate::provider::ProviderError;

// Orchestrator errors surfaced to the presentation layer
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("{provider} provider unavailable, unable to {operation} for {group} tasks: {source}")]
    ProviderUnavailable {
        provider: &'static str,
        operation: &'static str,
        group: GroupType,
        #[source]
        source: ProviderError,
    },
    #[error("unable to connect {provider} provider: {source}")]
    Connect {
        provider: &'static str,
        #[source]
        source: ProviderError,
    },
    #[error("task {task_id} not found in {group} tasks")]
    TaskNotFound { group: GroupType, task_id: TaskId },
    #[error("invalid group type '{0}', expected one of daily, weekly, monthly")]
    InvalidGroupType(String),
}

impl OrchestratorError {
    /// Whether the caller can fix the request and try again.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            OrchestratorError::TaskNotFound { .. } | OrchestratorError::InvalidGroupType(_)
        )
    }
}

/// Parses a group name coming from outside, before any provider is involved.
pub fn parse_group(name: &str) -> Result<GroupType, OrchestratorError> {
    name.parse().map_err(|err| match err {
        ModelError::InvalidGroupType(name) => OrchestratorError::InvalidGroupType(name),
        other => OrchestratorError::InvalidGroupType(other.to_string()),
    })
}

use std::time::Duration;
use thiserror::*;

use crate::model::ModelError;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("database migration {0} failed: {1}")]
    Migration(&'static str, sqlx::Error),

    #[error("malformed completion data: {0}")]
    Format(#[from] serde_json::Error),

    #[error("invalid task catalog: {0}")]
    Catalog(String),

    #[error("invalid stored task: {0}")]
    Definition(#[from] ModelError),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),
}

mod catalog;
mod error;
mod local;
mod relational;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::config::ProviderConfig;
use crate::model::{CompletionState, GroupType, Task};
pub use catalog::{Catalog, CATALOG_VERSION};
pub use error::ProviderError;
pub use local::{storage_key, CompletionStore, LocalTaskProvider};
pub use relational::{RelationalTaskProvider, DEFAULT_USER_ID};

/// Storage backend contract: task definitions and completion state, both
/// partitioned by group type.
#[async_trait]
pub trait TaskProvider: Send + Sync + 'static {
    /// Short backend label used in logs and errors.
    fn name(&self) -> &'static str;

    /// All definitions of the group ordered by ascending id.
    async fn load_tasks(&self, group: GroupType) -> Result<Vec<Task>, ProviderError>;

    async fn save_tasks(&self, group: GroupType, tasks: &[Task]) -> Result<(), ProviderError>;

    /// The persisted map; empty when nothing was ever recorded.
    async fn load_completion_state(&self, group: GroupType)
        -> Result<CompletionState, ProviderError>;

    /// Replaces the whole persisted map of the group in one step.
    async fn save_completion_state(
        &self,
        group: GroupType,
        state: &CompletionState,
    ) -> Result<(), ProviderError>;

    /// Whether a toggle has to write definitions back next to the completion
    /// state.
    fn requires_definition_writes(&self) -> bool {
        false
    }
}

/// Builds the backend selected by configuration.
pub async fn connect(config: &ProviderConfig) -> Result<Arc<dyn TaskProvider>, ProviderError> {
    let provider: Arc<dyn TaskProvider> = match config {
        ProviderConfig::Local {
            catalog,
            completion_dir,
            in_memory,
        } => {
            let catalog = match catalog {
                Some(path) => Catalog::from_file(path)?,
                None => Catalog::builtin()?,
            };
            let store = if *in_memory {
                CompletionStore::memory()
            } else {
                CompletionStore::directory(
                    completion_dir
                        .clone()
                        .unwrap_or_else(crate::config::default_data_dir),
                )
            };
            Arc::new(LocalTaskProvider::new(catalog, store))
        }
        ProviderConfig::Relational {
            url,
            user_id,
            max_connections,
            seed,
        } => {
            let provider = RelationalTaskProvider::connect(url, user_id, *max_connections).await?;
            if *seed {
                provider.seed_if_empty(&Catalog::builtin()?).await?;
            }
            Arc::new(provider)
        }
    };
    info!(provider = provider.name(), "task provider selected");
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_local_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProviderConfig::Local {
            catalog: None,
            completion_dir: Some(dir.path().to_owned()),
            in_memory: false,
        };

        let provider = connect(&config).await.unwrap();

        assert_eq!(provider.name(), "local");
        assert_eq!(provider.load_tasks(GroupType::Daily).await.unwrap().len(), 6);
        assert_eq!(ProviderConfig::default().name(), "local");
    }

    #[tokio::test]
    async fn test_connect_relational_seeds_catalog() {
        let config = ProviderConfig::Relational {
            url: "sqlite::memory:".into(),
            user_id: DEFAULT_USER_ID.into(),
            max_connections: 4,
            seed: true,
        };

        let provider = connect(&config).await.unwrap();

        assert_eq!(provider.name(), "relational");
        assert_eq!(provider.load_tasks(GroupType::Monthly).await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_connect_reports_missing_catalog() {
        let config = ProviderConfig::Local {
            catalog: Some("/nonexistent/catalog.yaml".into()),
            completion_dir: None,
            in_memory: true,
        };

        let res = connect(&config).await;

        assert!(matches!(res, Err(ProviderError::Io(_))));
    }
}

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::catalog::Catalog;
use super::error::ProviderError;
use super::TaskProvider;
use crate::model::{CompletionState, GroupType, Task};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Storage key of a group's completion map, also used as its file stem.
pub fn storage_key(group: GroupType) -> String {
    format!("tasks_{}_completion", group)
}

/// Where the local provider keeps completion state.
pub enum CompletionStore {
    Memory(Mutex<HashMap<GroupType, CompletionState>>),
    /// One JSON file per group inside the directory.
    Directory(PathBuf),
}

impl CompletionStore {
    pub fn memory() -> Self {
        CompletionStore::Memory(Mutex::new(HashMap::new()))
    }

    pub fn directory<P: Into<PathBuf>>(dir: P) -> Self {
        CompletionStore::Directory(dir.into())
    }

    async fn load(&self, group: GroupType) -> Result<CompletionState, ProviderError> {
        match self {
            CompletionStore::Memory(states) => {
                Ok(states.lock().get(&group).cloned().unwrap_or_default())
            }
            CompletionStore::Directory(dir) => {
                let path = state_path(dir, group);
                match tokio::fs::read_to_string(&path).await {
                    Ok(contents) => Ok(serde_json::from_str(&contents)?),
                    Err(err) if err.kind() == ErrorKind::NotFound => Ok(CompletionState::new()),
                    Err(err) => Err(err.into()),
                }
            }
        }
    }

    async fn save(&self, group: GroupType, state: &CompletionState) -> Result<(), ProviderError> {
        match self {
            CompletionStore::Memory(states) => {
                states.lock().insert(group, state.clone());
                Ok(())
            }
            CompletionStore::Directory(dir) => {
                let contents = serde_json::to_vec(state)?;
                let dir = dir.clone();
                // a dropped caller does not stop the blocking write, so the
                // temp file is handled entirely inside it
                tokio::task::spawn_blocking(move || replace_state_file(&dir, group, &contents))
                    .await
                    .map_err(|err| std::io::Error::new(ErrorKind::Other, err))??;
                Ok(())
            }
        }
    }
}

/// Writes a temp file next to the state file and renames it over it, so
/// readers only ever see the old or the new map. The temp file is removed on
/// failure.
fn replace_state_file(dir: &Path, group: GroupType, contents: &[u8]) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let tmp = dir.join(format!(
        "{}.json.{}.{}.tmp",
        storage_key(group),
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    let res = std::fs::write(&tmp, contents).and_then(|_| std::fs::rename(&tmp, state_path(dir, group)));
    if res.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    res
}

fn state_path(dir: &Path, group: GroupType) -> PathBuf {
    dir.join(format!("{}.json", storage_key(group)))
}

/// Static catalog definitions with locally persisted completion state.
pub struct LocalTaskProvider {
    catalog: Catalog,
    store: CompletionStore,
}

impl LocalTaskProvider {
    pub fn new(catalog: Catalog, store: CompletionStore) -> Self {
        Self { catalog, store }
    }

    /// Built-in catalog, completion kept in memory.
    pub fn in_memory() -> Result<Self, ProviderError> {
        Ok(Self::new(Catalog::builtin()?, CompletionStore::memory()))
    }
}

#[async_trait]
impl TaskProvider for LocalTaskProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn load_tasks(&self, group: GroupType) -> Result<Vec<Task>, ProviderError> {
        Ok(self.catalog.tasks(group).to_vec())
    }

    /// The catalog is read-only; definition writes are accepted and dropped.
    async fn save_tasks(&self, group: GroupType, _tasks: &[Task]) -> Result<(), ProviderError> {
        debug!(group = group.as_str(), "ignoring definition write to static catalog");
        Ok(())
    }

    async fn load_completion_state(
        &self,
        group: GroupType,
    ) -> Result<CompletionState, ProviderError> {
        self.store.load(group).await
    }

    async fn save_completion_state(
        &self,
        group: GroupType,
        state: &CompletionState,
    ) -> Result<(), ProviderError> {
        self.store.save(group, state).await
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use super::catalog::Catalog;
use super::error::ProviderError;
use super::TaskProvider;
use crate::model::{
    ordered_definitions, parse_task_id, CompletionState, GroupType, Task, TaskDetails,
};

pub const DEFAULT_USER_ID: &str = "default_user";

const MIGRATIONS: &[(&str, &str)] = &[("001_init", include_str!("../../migrations/001_init.sql"))];

const UPSERT_TASK: &str = "INSERT INTO tasks (group_type, task_id, title, category, description, priority)
     VALUES (?, ?, ?, ?, ?, ?)
     ON CONFLICT (group_type, task_id) DO UPDATE SET
         title = excluded.title,
         category = excluded.category,
         description = excluded.description,
         priority = excluded.priority";

// completed_at survives re-saving an already completed entry
const UPSERT_COMPLETION: &str = "INSERT INTO task_completions
         (user_id, group_type, task_id, completed, completed_at, updated_at)
     VALUES (?, ?, ?, ?, ?, ?)
     ON CONFLICT (user_id, group_type, task_id) DO UPDATE SET
         completed = excluded.completed,
         completed_at = CASE
             WHEN NOT excluded.completed THEN NULL
             WHEN task_completions.completed THEN task_completions.completed_at
             ELSE excluded.completed_at
         END,
         updated_at = excluded.updated_at";

type TaskRow = (i64, String, Option<String>, Option<String>, Option<String>);

/// Definitions and completion state kept in SQL tables.
///
/// Completion rows are scoped by a user identifier so several installations
/// can share one database.
#[derive(Clone)]
pub struct RelationalTaskProvider {
    pool: SqlitePool,
    user_id: String,
}

impl RelationalTaskProvider {
    /// Opens the pool and applies pending migrations.
    pub async fn connect(
        url: &str,
        user_id: impl Into<String>,
        max_connections: u32,
    ) -> Result<Self, ProviderError> {
        let opts = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        // every connection to an in-memory database sees its own database
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let pool_opts = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };
        let pool = pool_opts.connect_with(opts).await?;

        let provider = Self {
            pool,
            user_id: user_id.into(),
        };
        provider.run_migrations().await?;
        info!(url, user_id = provider.user_id.as_str(), "relational provider ready");
        Ok(provider)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    async fn run_migrations(&self) -> Result<(), ProviderError> {
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS _migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .execute(&self.pool)
        .await?;

        for (name, sql) in MIGRATIONS {
            let applied: Option<(String,)> =
                sqlx::query_as("SELECT name FROM _migrations WHERE name = ?")
                    .bind(*name)
                    .fetch_optional(&self.pool)
                    .await?;
            if applied.is_some() {
                continue;
            }

            let mut tx = self.pool.begin().await?;
            sqlx::raw_sql(*sql)
                .execute(&mut *tx)
                .await
                .map_err(|err| ProviderError::Migration(*name, err))?;
            sqlx::query("INSERT INTO _migrations (name) VALUES (?)")
                .bind(*name)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            info!(migration = *name, "applied migration");
        }
        Ok(())
    }

    /// Writes the catalog definitions of every group that has no definition
    /// rows yet. Returns the number of groups seeded.
    pub async fn seed_if_empty(&self, catalog: &Catalog) -> Result<usize, ProviderError> {
        let mut seeded = 0;
        for group in GroupType::ALL.iter() {
            let (count,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM tasks WHERE group_type = ?")
                    .bind(group.as_str())
                    .fetch_one(&self.pool)
                    .await?;
            if count > 0 {
                continue;
            }
            self.save_tasks(*group, catalog.tasks(*group)).await?;
            info!(group = group.as_str(), "seeded task definitions");
            seeded += 1;
        }
        Ok(seeded)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl TaskProvider for RelationalTaskProvider {
    fn name(&self) -> &'static str {
        "relational"
    }

    async fn load_tasks(&self, group: GroupType) -> Result<Vec<Task>, ProviderError> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            "SELECT task_id, title, category, description, priority
             FROM tasks
             WHERE group_type = ?
             ORDER BY task_id",
        )
        .bind(group.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, title, category, description, priority)| -> Result<Task, ProviderError> {
                let id = parse_task_id(id)?;
                let details = TaskDetails::from_columns(
                    group,
                    id,
                    category,
                    description,
                    priority.as_deref(),
                )?;
                Ok(Task::new(id, title, details)?)
            })
            .collect()
    }

    async fn save_tasks(&self, group: GroupType, tasks: &[Task]) -> Result<(), ProviderError> {
        let tasks = ordered_definitions(group, tasks.to_vec())?;
        let mut tx = self.pool.begin().await?;
        for task in tasks.iter() {
            sqlx::query(UPSERT_TASK)
                .bind(group.as_str())
                .bind(i64::from(task.id))
                .bind(&task.title)
                .bind(task.details.category())
                .bind(task.details.description())
                .bind(task.details.priority().map(|p| p.as_str()))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        debug!(group = group.as_str(), count = tasks.len(), "saved task definitions");
        Ok(())
    }

    async fn load_completion_state(
        &self,
        group: GroupType,
    ) -> Result<CompletionState, ProviderError> {
        let rows: Vec<(i64, bool)> = sqlx::query_as(
            "SELECT task_id, completed
             FROM task_completions
             WHERE user_id = ? AND group_type = ?",
        )
        .bind(&self.user_id)
        .bind(group.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, completed)| -> Result<(u32, bool), ProviderError> {
                Ok((parse_task_id(id)?, completed))
            })
            .collect()
    }

    async fn save_completion_state(
        &self,
        group: GroupType,
        state: &CompletionState,
    ) -> Result<(), ProviderError> {
        let now: DateTime<Utc> = Utc::now();
        let mut tx = self.pool.begin().await?;

        let mut delete: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM task_completions WHERE user_id = ");
        delete.push_bind(&self.user_id);
        delete.push(" AND group_type = ");
        delete.push_bind(group.as_str());
        if !state.is_empty() {
            delete.push(" AND task_id NOT IN (");
            let mut ids = delete.separated(", ");
            for id in state.ids() {
                ids.push_bind(i64::from(id));
            }
            ids.push_unseparated(")");
        }
        delete.build().execute(&mut *tx).await?;

        for (id, completed) in state.iter() {
            sqlx::query(UPSERT_COMPLETION)
                .bind(&self.user_id)
                .bind(group.as_str())
                .bind(i64::from(id))
                .bind(completed)
                .bind(if completed { Some(now) } else { None })
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(group = group.as_str(), entries = state.len(), "saved completion state");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_provider() -> RelationalTaskProvider {
        let provider = RelationalTaskProvider::connect("sqlite::memory:", DEFAULT_USER_ID, 4)
            .await
            .unwrap();
        provider
            .seed_if_empty(&Catalog::builtin().unwrap())
            .await
            .unwrap();
        provider
    }

    async fn completion_rows(provider: &RelationalTaskProvider, group: GroupType) -> i64 {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM task_completions WHERE user_id = ? AND group_type = ?",
        )
        .bind(provider.user_id())
        .bind(group.as_str())
        .fetch_one(provider.pool())
        .await
        .unwrap();
        count
    }

    async fn completed_at(
        provider: &RelationalTaskProvider,
        group: GroupType,
        id: u32,
    ) -> Option<DateTime<Utc>> {
        let (at,): (Option<DateTime<Utc>>,) = sqlx::query_as(
            "SELECT completed_at FROM task_completions
             WHERE user_id = ? AND group_type = ? AND task_id = ?",
        )
        .bind(provider.user_id())
        .bind(group.as_str())
        .bind(i64::from(id))
        .fetch_one(provider.pool())
        .await
        .unwrap();
        at
    }

    #[tokio::test]
    async fn test_seeded_definitions_match_catalog() {
        // GIVEN
        let provider = memory_provider().await;
        let catalog = Catalog::builtin().unwrap();

        // THEN
        for group in GroupType::ALL.iter() {
            let tasks = provider.load_tasks(*group).await.unwrap();
            assert_eq!(tasks, catalog.tasks(*group).to_vec());
        }

        // seeding twice is a no-op
        assert_eq!(provider.seed_if_empty(&catalog).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_migrations_are_tracked() {
        let provider = memory_provider().await;
        provider.run_migrations().await.unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM _migrations")
            .fetch_one(provider.pool())
            .await
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn test_completion_round_trip() {
        // GIVEN
        let provider = memory_provider().await;
        assert!(provider
            .load_completion_state(GroupType::Weekly)
            .await
            .unwrap()
            .is_empty());

        // WHEN
        let state: CompletionState = vec![(1, true), (2, false), (5, true)].into_iter().collect();
        provider
            .save_completion_state(GroupType::Weekly, &state)
            .await
            .unwrap();

        // THEN
        assert_eq!(
            provider.load_completion_state(GroupType::Weekly).await.unwrap(),
            state
        );

        // WHEN a smaller map replaces it
        let smaller: CompletionState = vec![(2, true)].into_iter().collect();
        provider
            .save_completion_state(GroupType::Weekly, &smaller)
            .await
            .unwrap();

        // THEN stale rows are gone
        assert_eq!(
            provider.load_completion_state(GroupType::Weekly).await.unwrap(),
            smaller
        );

        // WHEN emptied
        provider
            .save_completion_state(GroupType::Weekly, &CompletionState::new())
            .await
            .unwrap();
        assert_eq!(completion_rows(&provider, GroupType::Weekly).await, 0);
    }

    #[tokio::test]
    async fn test_upsert_keeps_one_row_per_task() {
        // GIVEN
        let provider = memory_provider().await;
        let done: CompletionState = vec![(1, true)].into_iter().collect();
        let undone: CompletionState = vec![(1, false)].into_iter().collect();

        // WHEN
        provider
            .save_completion_state(GroupType::Daily, &done)
            .await
            .unwrap();
        let first_completion = completed_at(&provider, GroupType::Daily, 1).await;
        provider
            .save_completion_state(GroupType::Daily, &done)
            .await
            .unwrap();

        // THEN
        assert_eq!(completion_rows(&provider, GroupType::Daily).await, 1);
        assert!(first_completion.is_some());
        assert_eq!(
            completed_at(&provider, GroupType::Daily, 1).await,
            first_completion,
            "re-saving a completed entry keeps its completion time"
        );

        // WHEN
        provider
            .save_completion_state(GroupType::Daily, &undone)
            .await
            .unwrap();

        // THEN
        assert_eq!(completion_rows(&provider, GroupType::Daily).await, 1);
        assert_eq!(completed_at(&provider, GroupType::Daily, 1).await, None);
    }

    #[tokio::test]
    async fn test_completion_is_scoped_by_user() {
        // GIVEN two users sharing one database
        let alice = memory_provider().await;
        let bob = RelationalTaskProvider {
            pool: alice.pool().clone(),
            user_id: "bob".into(),
        };

        // WHEN
        let state: CompletionState = vec![(3, true)].into_iter().collect();
        alice
            .save_completion_state(GroupType::Monthly, &state)
            .await
            .unwrap();
        bob.save_completion_state(GroupType::Monthly, &CompletionState::new())
            .await
            .unwrap();

        // THEN
        assert_eq!(
            alice.load_completion_state(GroupType::Monthly).await.unwrap(),
            state
        );
        assert!(bob
            .load_completion_state(GroupType::Monthly)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_save_tasks_upserts_definitions() {
        // GIVEN
        let provider = memory_provider().await;
        let mut tasks = provider.load_tasks(GroupType::Daily).await.unwrap();
        tasks[0].title = "Evening walk".into();

        // WHEN
        provider.save_tasks(GroupType::Daily, &tasks).await.unwrap();

        // THEN
        let reloaded = provider.load_tasks(GroupType::Daily).await.unwrap();
        assert_eq!(reloaded.len(), tasks.len());
        assert_eq!(reloaded[0].title, "Evening walk");

        // definitions of another group are rejected before touching the table
        let res = provider.save_tasks(GroupType::Weekly, &tasks).await;
        assert!(matches!(res, Err(ProviderError::Definition(_))));
    }

    #[tokio::test]
    async fn test_closed_pool_is_reported() {
        let provider = memory_provider().await;
        provider.close().await;

        let res = provider.load_tasks(GroupType::Daily).await;
        assert!(matches!(res, Err(ProviderError::Database(_))));
    }
}

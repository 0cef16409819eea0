use serde::Deserialize;
use std::path::Path;

use super::error::ProviderError;
use crate::model::{ordered_definitions, parse_task_id, GroupType, Task, TaskDetails};

/// Catalog format version understood by this build.
pub const CATALOG_VERSION: u32 = 1;

const BUILTIN_CATALOG: &str = include_str!("../../catalog/default.yaml");

#[derive(Deserialize)]
struct CatalogFile {
    version: u32,
    #[serde(default)]
    daily: Vec<CatalogEntry>,
    #[serde(default)]
    weekly: Vec<CatalogEntry>,
    #[serde(default)]
    monthly: Vec<CatalogEntry>,
}

#[derive(Deserialize)]
struct CatalogEntry {
    id: i64,
    title: String,
    #[serde(default)]
    completed: bool,
    category: Option<String>,
    description: Option<String>,
    priority: Option<String>,
}

impl CatalogEntry {
    fn into_task(self, group: GroupType) -> Result<Task, ProviderError> {
        let id = parse_task_id(self.id)?;
        let details = TaskDetails::from_columns(
            group,
            id,
            self.category,
            self.description,
            self.priority.as_deref(),
        )?;
        Ok(Task::new(id, self.title, details)?.with_completed(self.completed))
    }
}

/// Static task definitions for every group, ordered by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    daily: Vec<Task>,
    weekly: Vec<Task>,
    monthly: Vec<Task>,
}

impl Catalog {
    /// The catalog shipped with the application.
    pub fn builtin() -> Result<Self, ProviderError> {
        Self::from_str(BUILTIN_CATALOG)
    }

    pub fn from_str(s: &str) -> Result<Self, ProviderError> {
        let file: CatalogFile =
            serde_yaml::from_str(s).map_err(|err| ProviderError::Catalog(err.to_string()))?;
        if file.version != CATALOG_VERSION {
            return Err(ProviderError::Catalog(format!(
                "unsupported catalog version {}, expected {}",
                file.version, CATALOG_VERSION
            )));
        }

        let convert = |group: GroupType, entries: Vec<CatalogEntry>| {
            entries
                .into_iter()
                .map(|entry| entry.into_task(group))
                .collect::<Result<Vec<Task>, ProviderError>>()
        };
        Self::from_tasks(
            convert(GroupType::Daily, file.daily)?
                .into_iter()
                .chain(convert(GroupType::Weekly, file.weekly)?)
                .chain(convert(GroupType::Monthly, file.monthly)?)
                .collect(),
        )
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ProviderError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_str(&contents)
    }

    /// Partitions tasks by their group and orders each partition.
    pub fn from_tasks(tasks: Vec<Task>) -> Result<Self, ProviderError> {
        let mut daily = Vec::new();
        let mut weekly = Vec::new();
        let mut monthly = Vec::new();
        for task in tasks {
            match task.group_type() {
                GroupType::Daily => daily.push(task),
                GroupType::Weekly => weekly.push(task),
                GroupType::Monthly => monthly.push(task),
            }
        }
        Ok(Self {
            daily: ordered_definitions(GroupType::Daily, daily)?,
            weekly: ordered_definitions(GroupType::Weekly, weekly)?,
            monthly: ordered_definitions(GroupType::Monthly, monthly)?,
        })
    }

    pub fn tasks(&self, group: GroupType) -> &[Task] {
        match group {
            GroupType::Daily => &self.daily,
            GroupType::Weekly => &self.weekly,
            GroupType::Monthly => &self.monthly,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;

    #[test]
    fn test_builtin_catalog() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(catalog.tasks(GroupType::Daily).len(), 6);
        assert_eq!(catalog.tasks(GroupType::Weekly).len(), 8);
        assert_eq!(catalog.tasks(GroupType::Monthly).len(), 8);

        for group in GroupType::ALL.iter() {
            let tasks = catalog.tasks(*group);
            assert!(tasks.windows(2).all(|w| w[0].id < w[1].id));
            assert!(tasks.iter().all(|t| !t.completed && t.group_type() == *group));
        }

        let first_monthly = &catalog.tasks(GroupType::Monthly)[0];
        assert_eq!(first_monthly.details.priority(), Some(Priority::High));
        assert_eq!(first_monthly.details.category(), Some("career"));
    }

    #[test]
    fn test_catalog_orders_and_defaults() {
        let catalog = Catalog::from_str(
            r#"
        version: 1
        daily:
            - id: 3
              title: third
            - id: 1
              title: first
              completed: true
        monthly:
            - id: 1
              title: only
        "#,
        )
        .unwrap();

        let daily = catalog.tasks(GroupType::Daily);
        assert_eq!(daily.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 3]);
        assert!(daily[0].completed);
        assert!(catalog.tasks(GroupType::Weekly).is_empty());
        assert_eq!(
            catalog.tasks(GroupType::Monthly)[0].details.priority(),
            Some(Priority::Medium)
        );
    }

    #[test]
    fn test_catalog_rejects_bad_input() {
        let wrong_version = Catalog::from_str("version: 2\n");
        assert!(matches!(wrong_version, Err(ProviderError::Catalog(_))));

        let duplicate = Catalog::from_str(
            "version: 1\ndaily:\n  - id: 1\n    title: a\n  - id: 1\n    title: b\n",
        );
        assert!(matches!(duplicate, Err(ProviderError::Definition(_))));

        let no_category = Catalog::from_str("version: 1\nweekly:\n  - id: 1\n    title: a\n");
        assert!(matches!(no_category, Err(ProviderError::Definition(_))));

        let zero_id = Catalog::from_str("version: 1\ndaily:\n  - id: 0\n    title: a\n");
        assert!(matches!(zero_id, Err(ProviderError::Definition(_))));
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::ModelError;

pub type TaskId = u32;

/// Partition of the checklist. Selects both the task shape and the storage
/// namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupType {
    Daily,
    Weekly,
    Monthly,
}

impl GroupType {
    pub const ALL: [GroupType; 3] = [GroupType::Daily, GroupType::Weekly, GroupType::Monthly];

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupType::Daily => "daily",
            GroupType::Weekly => "weekly",
            GroupType::Monthly => "monthly",
        }
    }
}

impl fmt::Display for GroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(GroupType::Daily),
            "weekly" => Ok(GroupType::Weekly),
            "monthly" => Ok(GroupType::Monthly),
            other => Err(ModelError::InvalidGroupType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl FromStr for Priority {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(ModelError::InvalidPriority(other.to_string())),
        }
    }
}

/// Group specific part of a task, tagged by the group it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "group_type", rename_all = "lowercase")]
pub enum TaskDetails {
    Daily,
    Weekly {
        category: String,
    },
    Monthly {
        description: String,
        category: String,
        priority: Priority,
    },
}

impl TaskDetails {
    pub fn group_type(&self) -> GroupType {
        match self {
            TaskDetails::Daily => GroupType::Daily,
            TaskDetails::Weekly { .. } => GroupType::Weekly,
            TaskDetails::Monthly { .. } => GroupType::Monthly,
        }
    }

    /// Builds the details for `group` out of nullable storage columns.
    ///
    /// Weekly tasks need a category. Monthly tasks fall back to empty text and
    /// medium priority for absent columns.
    pub fn from_columns(
        group: GroupType,
        id: TaskId,
        category: Option<String>,
        description: Option<String>,
        priority: Option<&str>,
    ) -> Result<Self, ModelError> {
        match group {
            GroupType::Daily => Ok(TaskDetails::Daily),
            GroupType::Weekly => {
                let category = category.ok_or(ModelError::MissingField {
                    group,
                    id,
                    field: "category",
                })?;
                Ok(TaskDetails::Weekly { category })
            }
            GroupType::Monthly => {
                let priority = match priority {
                    Some(p) => p.parse()?,
                    None => Priority::default(),
                };
                Ok(TaskDetails::Monthly {
                    description: description.unwrap_or_default(),
                    category: category.unwrap_or_default(),
                    priority,
                })
            }
        }
    }

    pub fn category(&self) -> Option<&str> {
        match self {
            TaskDetails::Daily => None,
            TaskDetails::Weekly { category } | TaskDetails::Monthly { category, .. } => {
                Some(category)
            }
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            TaskDetails::Monthly { description, .. } => Some(description),
            _ => None,
        }
    }

    pub fn priority(&self) -> Option<Priority> {
        match self {
            TaskDetails::Monthly { priority, .. } => Some(*priority),
            _ => None,
        }
    }
}

/// A checklist item. `completed` is only meaningful after the definition has
/// been merged with the persisted completion state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub completed: bool,
    #[serde(flatten)]
    pub details: TaskDetails,
}

impl Task {
    pub fn new(id: TaskId, title: String, details: TaskDetails) -> Result<Task, ModelError> {
        if id == 0 {
            return Err(ModelError::InvalidTaskId(0));
        }
        if title.trim().is_empty() {
            return Err(ModelError::EmptyTitle(id));
        }
        Ok(Self {
            id,
            title,
            completed: false,
            details,
        })
    }

    pub fn group_type(&self) -> GroupType {
        self.details.group_type()
    }

    pub fn with_completed(mut self, completed: bool) -> Task {
        self.completed = completed;
        self
    }
}

/// Converts a stored or user supplied id, rejecting zero and out of range
/// values.
pub fn parse_task_id(raw: i64) -> Result<TaskId, ModelError> {
    TaskId::try_from(raw)
        .ok()
        .filter(|id| *id > 0)
        .ok_or(ModelError::InvalidTaskId(raw))
}

/// Orders definitions by id and rejects duplicates or tasks of another group.
pub fn ordered_definitions(group: GroupType, mut tasks: Vec<Task>) -> Result<Vec<Task>, ModelError> {
    if let Some(task) = tasks.iter().find(|t| t.group_type() != group) {
        return Err(ModelError::GroupMismatch {
            expected: group,
            found: task.group_type(),
            id: task.id,
        });
    }
    tasks.sort_by_key(|t| t.id);
    if let Some(pair) = tasks.windows(2).find(|pair| pair[0].id == pair[1].id) {
        return Err(ModelError::DuplicateTaskId {
            group,
            id: pair[0].id,
        });
    }
    Ok(tasks)
}

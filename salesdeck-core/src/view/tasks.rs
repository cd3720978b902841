use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{compare_present_first, compare_text, day_of, RecordFilter, Searchable, SortKey};
use crate::models::{Priority, Task, TaskStatus};

impl Searchable for Task {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.title.as_str()];
        if let Some(description) = &self.description {
            fields.push(description);
        }
        fields
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskFilter {
    #[default]
    All,
    /// Due on the current calendar day.
    Today,
    /// Due on an earlier calendar day and not completed.
    Overdue,
    Status(TaskStatus),
    Priority(Priority),
}

impl TaskFilter {
    pub const ALL: [TaskFilter; 9] = [
        Self::All,
        Self::Today,
        Self::Overdue,
        Self::Status(TaskStatus::Completed),
        Self::Status(TaskStatus::Pending),
        Self::Status(TaskStatus::InProgress),
        Self::Priority(Priority::High),
        Self::Priority(Priority::Medium),
        Self::Priority(Priority::Low),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Today => "today",
            Self::Overdue => "overdue",
            Self::Status(status) => status.as_str(),
            Self::Priority(priority) => priority.as_str(),
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == s)
    }
}

/// Calendar-day comparison helpers shared with the task statistics.
pub(crate) fn is_due_today(task: &Task, now: DateTime<Utc>) -> bool {
    task.due_date
        .map(|due| day_of(due) == day_of(now))
        .unwrap_or(false)
}

pub(crate) fn is_overdue(task: &Task, now: DateTime<Utc>) -> bool {
    !task.is_completed()
        && task
            .due_date
            .map(|due| day_of(due) < day_of(now))
            .unwrap_or(false)
}

impl RecordFilter<Task> for TaskFilter {
    fn matches(&self, task: &Task, now: DateTime<Utc>) -> bool {
        match self {
            Self::All => true,
            Self::Today => is_due_today(task, now),
            Self::Overdue => is_overdue(task, now),
            Self::Status(status) => task.status == *status,
            Self::Priority(priority) => task.priority == *priority,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskSort {
    /// Earliest due first, undated last.
    #[default]
    DueDate,
    /// High before medium before low.
    Priority,
    Status,
    Title,
}

impl TaskSort {
    pub const ALL: [TaskSort; 4] = [Self::DueDate, Self::Priority, Self::Status, Self::Title];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DueDate => "dueDate",
            Self::Priority => "priority",
            Self::Status => "status",
            Self::Title => "title",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl SortKey<Task> for TaskSort {
    fn compare(&self, a: &Task, b: &Task) -> Ordering {
        match self {
            Self::DueDate => compare_present_first(a.due_date, b.due_date, |a, b| a.cmp(&b)),
            Self::Priority => b.priority.rank().cmp(&a.priority.rank()),
            Self::Status => a.status.as_str().cmp(b.status.as_str()),
            Self::Title => compare_text(&a.title, &b.title),
        }
    }
}

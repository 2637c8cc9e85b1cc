//! Task domain model and priority-driven defaults.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::validate::not_blank;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "TODO",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Done => "DONE",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TODO" => Ok(TaskStatus::Todo),
            "IN_PROGRESS" => Ok(TaskStatus::InProgress),
            "DONE" => Ok(TaskStatus::Done),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
        }
    }

    /// How far in the future a task of this priority is due when the
    /// caller does not pick a date.
    pub fn default_due_offset(&self) -> Duration {
        match self {
            Priority::Low => Duration::days(14),
            Priority::Medium => Duration::days(7),
            Priority::High => Duration::days(3),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(Priority::Low),
            "MEDIUM" => Ok(Priority::Medium),
            "HIGH" => Ok(Priority::High),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub due_date: DateTime<Utc>,
    pub project_id: Option<Uuid>,
    pub assigned_to_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// True when the task is due in the next 24 hours.
    pub fn is_due_soon(&self, now: DateTime<Utc>) -> bool {
        self.due_date > now && self.due_date - now <= Duration::hours(24)
    }
}

/// Caller-supplied task attributes; missing fields are filled by
/// [`CreateTask::resolve`].
#[derive(Debug, Clone, Serialize, Deserialize, Default, Validate)]
pub struct CreateTask {
    #[validate(custom(function = "not_blank", message = "Title is required"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub due_date: Option<DateTime<Utc>>,
    pub project_id: Option<Uuid>,
    pub assigned_to_id: Option<Uuid>,
}

/// A fully-specified task ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub due_date: DateTime<Utc>,
    pub project_id: Option<Uuid>,
    pub assigned_to_id: Option<Uuid>,
}

impl CreateTask {
    pub fn resolve(self, now: DateTime<Utc>) -> NewTask {
        let priority = self.priority.unwrap_or_default();
        NewTask {
            title: self.title,
            description: self.description,
            status: self.status.unwrap_or_default(),
            priority,
            due_date: self
                .due_date
                .unwrap_or_else(|| now + priority.default_due_offset()),
            project_id: self.project_id,
            assigned_to_id: self.assigned_to_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Validate)]
pub struct UpdateTask {
    #[validate(custom(function = "not_blank", message = "Title is required"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub due_date: Option<DateTime<Utc>>,
    /// `Some(Some(id))` = set, `Some(None)` = clear, `None` = no change.
    #[serde(default, deserialize_with = "present")]
    pub project_id: Option<Option<Uuid>>,
    /// `Some(Some(id))` = set, `Some(None)` = clear, `None` = no change.
    #[serde(default, deserialize_with = "present")]
    pub assigned_to_id: Option<Option<Uuid>>,
}

impl UpdateTask {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.project_id.is_none()
            && self.assigned_to_id.is_none()
    }
}

/// Distinguishes an explicit `null` (clear) from an absent field.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_due_offsets() {
        assert_eq!(Priority::Low.default_due_offset(), Duration::days(14));
        assert_eq!(Priority::Medium.default_due_offset(), Duration::days(7));
        assert_eq!(Priority::High.default_due_offset(), Duration::days(3));
    }

    #[test]
    fn resolve_fills_defaults() {
        let now = Utc::now();
        let task = CreateTask {
            title: "Write report".into(),
            ..Default::default()
        }
        .resolve(now);

        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.due_date, now + Duration::days(7));
    }

    #[test]
    fn resolve_keeps_explicit_due_date() {
        let now = Utc::now();
        let due = now + Duration::days(30);
        let task = CreateTask {
            title: "Audit".into(),
            priority: Some(Priority::High),
            due_date: Some(due),
            ..Default::default()
        }
        .resolve(now);

        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.due_date, due);
    }

    #[test]
    fn due_soon_window() {
        let now = Utc::now();
        let mut task = Task {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            title: "t".into(),
            description: String::new(),
            status: TaskStatus::Todo,
            priority: Priority::High,
            due_date: now + Duration::hours(3),
            project_id: None,
            assigned_to_id: None,
            created_at: now,
            updated_at: now,
        };
        assert!(task.is_due_soon(now));

        task.due_date = now + Duration::hours(48);
        assert!(!task.is_due_soon(now));

        task.due_date = now - Duration::hours(1);
        assert!(!task.is_due_soon(now));
    }

    #[test]
    fn update_null_clears_and_absent_keeps() {
        let clear: UpdateTask = serde_json::from_str(r#"{"assigned_to_id": null}"#).unwrap();
        assert_eq!(clear.assigned_to_id, Some(None));
        assert_eq!(clear.project_id, None);
        assert!(!clear.is_empty());

        let keep: UpdateTask = serde_json::from_str("{}").unwrap();
        assert!(keep.is_empty());
    }
}

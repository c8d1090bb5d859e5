use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::project::Project;
use super::user::User;
use super::{nullable, require_text, string_enum};
use crate::ValidationError;
use crate::ids::{ProjectId, TaskId, UserId};

/// Progress state of a task.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Not started.
    #[default]
    #[serde(rename = "pending")]
    Pending,
    /// Being worked on.
    #[serde(rename = "in-progress")]
    InProgress,
    /// Finished.
    #[serde(rename = "done")]
    Done,
}

string_enum!(TaskStatus, "status", {
    Pending => "pending",
    InProgress => "in-progress",
    Done => "done",
});

/// Relative importance of a task.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    /// Can wait.
    Low,
    /// Normal.
    #[default]
    Medium,
    /// Urgent.
    High,
}

string_enum!(TaskPriority, "priority", {
    Low => "low",
    Medium => "medium",
    High => "high",
});

/// A unit of work, optionally inside a project and assigned to a user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique ID.
    pub id: TaskId,
    /// Short title.
    pub title: String,
    /// Longer description.
    #[serde(default)]
    pub description: Option<String>,
    /// Priority.
    pub priority: TaskPriority,
    /// Progress state.
    pub status: TaskStatus,
    /// Owning project.
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    /// Assignee.
    #[serde(default)]
    pub assigned_to: Option<UserId>,
    /// Due date.
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// A task joined with its project and assignee.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskDetail {
    /// Task fields, flattened.
    #[serde(flatten)]
    pub task: Task,
    /// Owning project, if any.
    pub project: Option<Project>,
    /// Assigned user, if any.
    pub assignee: Option<User>,
}

/// Create-task input.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    /// Short title.
    pub title: String,
    /// Longer description.
    #[serde(default)]
    pub description: Option<String>,
    /// Defaults to medium.
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    /// Defaults to pending.
    #[serde(default)]
    pub status: Option<TaskStatus>,
    /// Owning project.
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    /// Assignee.
    #[serde(default)]
    pub assigned_to: Option<UserId>,
    /// Due date.
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

impl NewTask {
    /// Check required fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text(&self.title, "title")
    }
}

/// Partial task update.
///
/// Optional columns accept `null` to clear them.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    /// New title.
    #[serde(default)]
    pub title: Option<String>,
    /// New description.
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub description: Option<Option<String>>,
    /// New priority.
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    /// New status.
    #[serde(default)]
    pub status: Option<TaskStatus>,
    /// Move to another project or detach.
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub project_id: Option<Option<ProjectId>>,
    /// Reassign or unassign.
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub assigned_to: Option<Option<UserId>>,
    /// New due date.
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub due_date: Option<Option<NaiveDate>>,
}

impl TaskPatch {
    /// A patch that only changes the status.
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

impl Task {
    /// Apply a patch in place.
    pub fn apply(&mut self, patch: &TaskPatch) -> Result<(), ValidationError> {
        if let Some(title) = &patch.title {
            require_text(title, "title")?;
            self.title.clone_from(title);
        }
        if let Some(description) = &patch.description {
            self.description.clone_from(description);
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(project) = &patch.project_id {
            self.project_id.clone_from(project);
        }
        if let Some(assignee) = &patch.assigned_to {
            self.assigned_to.clone_from(assignee);
        }
        if let Some(due) = patch.due_date {
            self.due_date = due;
        }
        Ok(())
    }
}

/// Query filter for task listings. All set fields must match.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFilter {
    /// Only tasks in this project.
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    /// Only tasks in this state.
    #[serde(default)]
    pub status: Option<TaskStatus>,
    /// Only tasks assigned to this user.
    #[serde(default)]
    pub assigned_to: Option<UserId>,
}

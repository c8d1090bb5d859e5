use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::task::Task;
use super::{nullable, require_text, string_enum};
use crate::ValidationError;
use crate::ids::{ProjectId, UserId};

/// Lifecycle status of a project.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    /// Work in progress.
    #[default]
    Active,
    /// Finished.
    Completed,
    /// Hidden from day-to-day views.
    Archived,
}

string_enum!(ProjectStatus, "status", {
    Active => "active",
    Completed => "completed",
    Archived => "archived",
});

/// A project grouping related tasks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Unique ID.
    pub id: ProjectId,
    /// Project name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Lifecycle status.
    pub status: ProjectStatus,
    /// Planned start date.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Planned end date.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// Owning user, cleared when that user is deleted.
    #[serde(default)]
    pub owner_id: Option<UserId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// A project together with all of its tasks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectWithTasks {
    /// The project itself, flattened into the same JSON object.
    #[serde(flatten)]
    pub project: Project,
    /// Tasks belonging to the project.
    pub tasks: Vec<Task>,
}

/// Create-project input.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    /// Project name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Initial status, defaults to active.
    #[serde(default)]
    pub status: Option<ProjectStatus>,
    /// Planned start date.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Planned end date.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// Owning user.
    #[serde(default)]
    pub owner_id: Option<UserId>,
}

impl NewProject {
    /// Check required fields and the date range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text(&self.name, "name")?;
        check_range(self.start_date, self.end_date)
    }
}

/// Partial project update.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPatch {
    /// New name.
    #[serde(default)]
    pub name: Option<String>,
    /// New description, or `null` to clear.
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub description: Option<Option<String>>,
    /// New status.
    #[serde(default)]
    pub status: Option<ProjectStatus>,
    /// New start date, or `null` to clear.
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub start_date: Option<Option<NaiveDate>>,
    /// New end date, or `null` to clear.
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub end_date: Option<Option<NaiveDate>>,
    /// New owner, or `null` to clear.
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub owner_id: Option<Option<UserId>>,
}

impl Project {
    /// Apply a patch in place and validate the result.
    pub fn apply(&mut self, patch: &ProjectPatch) -> Result<(), ValidationError> {
        if let Some(name) = &patch.name {
            require_text(name, "name")?;
            self.name.clone_from(name);
        }
        if let Some(description) = &patch.description {
            self.description.clone_from(description);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(start) = patch.start_date {
            self.start_date = start;
        }
        if let Some(end) = patch.end_date {
            self.end_date = end;
        }
        if let Some(owner) = &patch.owner_id {
            self.owner_id.clone_from(owner);
        }
        check_range(self.start_date, self.end_date)
    }
}

fn check_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<(), ValidationError> {
    match (start, end) {
        (Some(s), Some(e)) if e < s => Err(ValidationError::new(
            "endDate must not be before startDate",
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Project {
        let now = Utc::now();
        Project {
            id: ProjectId::from_raw("prj_1"),
            name: "Website Redesign".into(),
            description: Some("Refresh".into()),
            status: ProjectStatus::Active,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 31),
            owner_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn status_wire_names() {
        for status in ProjectStatus::ALL {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, status.as_str());
        }
    }

    #[test]
    fn dates_serialize_as_calendar_days() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["startDate"], "2024-01-01");
        assert_eq!(json["endDate"], "2024-03-31");
    }

    #[test]
    fn new_project_rejects_inverted_range() {
        let input: NewProject = serde_json::from_value(serde_json::json!({
            "name": "P", "startDate": "2024-05-01", "endDate": "2024-04-01"
        }))
        .unwrap();
        assert!(input.validate().is_err());
    }

    #[test]
    fn apply_patch_clears_and_sets() {
        let mut project = sample();
        let patch: ProjectPatch = serde_json::from_value(serde_json::json!({
            "description": null,
            "status": "archived"
        }))
        .unwrap();
        project.apply(&patch).unwrap();
        assert!(project.description.is_none());
        assert_eq!(project.status, ProjectStatus::Archived);
        assert_eq!(project.name, "Website Redesign");
    }

    #[test]
    fn apply_patch_rejects_blank_name() {
        let mut project = sample();
        let patch = ProjectPatch {
            name: Some("  ".into()),
            ..ProjectPatch::default()
        };
        assert!(project.apply(&patch).is_err());
    }

    #[test]
    fn with_tasks_flattens_project_fields() {
        let wrapped = ProjectWithTasks {
            project: sample(),
            tasks: Vec::new(),
        };
        let json = serde_json::to_value(&wrapped).unwrap();
        assert_eq!(json["name"], "Website Redesign");
        assert!(json["tasks"].as_array().unwrap().is_empty());
    }
}

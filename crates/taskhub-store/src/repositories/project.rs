//! Project repository: CRUD for the `projects` table.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use taskhub_core::ids::ProjectId;
use taskhub_core::models::{NewProject, Project, ProjectPatch, ProjectWithTasks};
use tracing::instrument;

use super::task::TaskRepo;
use crate::errors::{Result, StoreError};
use crate::row_helpers::{opt_id, parse_column};

const COLUMNS: &str =
    "id, name, description, status, start_date, end_date, owner_id, created_at, updated_at";

const UNKNOWN_OWNER: &str = "ownerId does not reference an existing user";

/// Project repository. Stateless; every method takes `&Connection`.
pub struct ProjectRepo;

impl ProjectRepo {
    /// Create a project.
    #[instrument(skip_all, fields(name = %input.name))]
    pub fn insert(conn: &Connection, input: &NewProject) -> Result<Project> {
        input.validate()?;
        let now = Utc::now();
        let project = Project {
            id: ProjectId::new(),
            name: input.name.trim().to_string(),
            description: input.description.clone(),
            status: input.status.unwrap_or_default(),
            start_date: input.start_date,
            end_date: input.end_date,
            owner_id: input.owner_id.clone(),
            created_at: now,
            updated_at: now,
        };
        Self::write(conn, &project, true)?;
        Ok(project)
    }

    /// Fetch a project by ID.
    pub fn get(conn: &Connection, id: &ProjectId) -> Result<Option<Project>> {
        let row = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM projects WHERE id = ?1"),
                params![id.as_str()],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Fetch a project together with its tasks.
    pub fn get_with_tasks(conn: &Connection, id: &ProjectId) -> Result<Option<ProjectWithTasks>> {
        let Some(project) = Self::get(conn, id)? else {
            return Ok(None);
        };
        let tasks = TaskRepo::list_for_project(conn, &project.id)?;
        Ok(Some(ProjectWithTasks { project, tasks }))
    }

    /// All projects ordered by creation time.
    pub fn list(conn: &Connection) -> Result<Vec<Project>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM projects ORDER BY created_at, id"
        ))?;
        let rows = stmt
            .query_map([], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// All projects, each with its tasks.
    pub fn list_with_tasks(conn: &Connection) -> Result<Vec<ProjectWithTasks>> {
        Self::list(conn)?
            .into_iter()
            .map(|project| {
                let tasks = TaskRepo::list_for_project(conn, &project.id)?;
                Ok(ProjectWithTasks { project, tasks })
            })
            .collect()
    }

    /// Apply a partial update. Returns `None` if the project does not exist.
    #[instrument(skip_all, fields(project_id = %id))]
    pub fn update(conn: &Connection, id: &ProjectId, patch: &ProjectPatch) -> Result<Option<Project>> {
        let tx = conn.unchecked_transaction()?;
        let Some(mut project) = Self::get(&tx, id)? else {
            return Ok(None);
        };
        project.apply(patch)?;
        project.updated_at = Utc::now();
        Self::write(&tx, &project, false)?;
        tx.commit()?;
        Ok(Some(project))
    }

    /// Delete a project. Its tasks are kept with `projectId` cleared.
    pub fn delete(conn: &Connection, id: &ProjectId) -> Result<bool> {
        let changed = conn.execute("DELETE FROM projects WHERE id = ?1", params![id.as_str()])?;
        Ok(changed > 0)
    }

    /// Number of projects.
    pub fn count(conn: &Connection) -> Result<u64> {
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM projects", [], |row| row.get(0))?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    fn write(conn: &Connection, p: &Project, insert: bool) -> Result<()> {
        let sql = if insert {
            "INSERT INTO projects (name, description, status, start_date, end_date, owner_id,
                                   created_at, updated_at, id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        } else {
            "UPDATE projects
             SET name = ?1, description = ?2, status = ?3, start_date = ?4, end_date = ?5,
                 owner_id = ?6, created_at = ?7, updated_at = ?8
             WHERE id = ?9"
        };
        let _ = conn
            .execute(
                sql,
                params![
                    p.name,
                    p.description,
                    p.status.as_str(),
                    p.start_date,
                    p.end_date,
                    p.owner_id.as_ref().map(|o| o.as_str()),
                    p.created_at,
                    p.updated_at,
                    p.id.as_str(),
                ],
            )
            .map_err(|e| StoreError::from_write(e, "project already exists", UNKNOWN_OWNER))?;
        Ok(())
    }

    pub(crate) fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
        Ok(Project {
            id: ProjectId::from_raw(row.get::<_, String>(0)?),
            name: row.get(1)?,
            description: row.get(2)?,
            status: parse_column(row, 3)?,
            start_date: row.get(4)?,
            end_date: row.get(5)?,
            owner_id: opt_id(row, 6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;
    use crate::repositories::UserRepo;
    use assert_matches::assert_matches;
    use chrono::NaiveDate;
    use taskhub_core::ids::UserId;
    use taskhub_core::models::{NewTask, NewUser, ProjectStatus};

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        let _ = run_migrations(&conn).unwrap();
        conn
    }

    fn new_project(name: &str) -> NewProject {
        NewProject {
            name: name.into(),
            description: None,
            status: None,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 15),
            end_date: None,
            owner_id: None,
        }
    }

    #[test]
    fn insert_defaults_to_active() {
        let conn = setup();
        let project = ProjectRepo::insert(&conn, &new_project("Alpha")).unwrap();
        assert_eq!(project.status, ProjectStatus::Active);
        let fetched = ProjectRepo::get(&conn, &project.id).unwrap().unwrap();
        assert_eq!(fetched.start_date, NaiveDate::from_ymd_opt(2024, 1, 15));
    }

    #[test]
    fn unknown_owner_is_invalid_reference() {
        let conn = setup();
        let mut input = new_project("Orphan");
        input.owner_id = Some(UserId::from_raw("usr_missing"));
        let err = ProjectRepo::insert(&conn, &input).unwrap_err();
        assert_matches!(err, StoreError::InvalidReference(_));
    }

    #[test]
    fn deleting_owner_clears_reference() {
        let conn = setup();
        let owner = UserRepo::insert(
            &conn,
            &NewUser {
                email: "o@example.com".into(),
                password: "pw".into(),
                name: "Owner".into(),
                role: None,
                avatar: None,
            },
            "h",
        )
        .unwrap();
        let mut input = new_project("Owned");
        input.owner_id = Some(owner.id.clone());
        let project = ProjectRepo::insert(&conn, &input).unwrap();

        assert!(UserRepo::delete(&conn, &owner.id).unwrap());
        let fetched = ProjectRepo::get(&conn, &project.id).unwrap().unwrap();
        assert!(fetched.owner_id.is_none());
    }

    #[test]
    fn with_tasks_lists_children() {
        let conn = setup();
        let project = ProjectRepo::insert(&conn, &new_project("Parent")).unwrap();
        let _ = ProjectRepo::insert(&conn, &new_project("Empty")).unwrap();
        for title in ["one", "two"] {
            let _ = TaskRepo::insert(
                &conn,
                &NewTask {
                    title: title.into(),
                    description: None,
                    priority: None,
                    status: None,
                    project_id: Some(project.id.clone()),
                    assigned_to: None,
                    due_date: None,
                },
            )
            .unwrap();
        }

        let with = ProjectRepo::get_with_tasks(&conn, &project.id).unwrap().unwrap();
        assert_eq!(with.tasks.len(), 2);

        let all = ProjectRepo::list_with_tasks(&conn).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all.iter().map(|p| p.tasks.len()).sum::<usize>(), 2);
    }

    #[test]
    fn update_and_delete() {
        let conn = setup();
        let project = ProjectRepo::insert(&conn, &new_project("Before")).unwrap();
        let patch = ProjectPatch {
            name: Some("After".into()),
            status: Some(ProjectStatus::Completed),
            ..ProjectPatch::default()
        };
        let updated = ProjectRepo::update(&conn, &project.id, &patch).unwrap().unwrap();
        assert_eq!(updated.name, "After");

        assert!(ProjectRepo::delete(&conn, &project.id).unwrap());
        assert!(ProjectRepo::get(&conn, &project.id).unwrap().is_none());
        assert!(
            ProjectRepo::update(&conn, &project.id, &patch)
                .unwrap()
                .is_none()
        );
    }
}

//! Task repository: CRUD for the `tasks` table plus relation lookups.

use std::collections::HashMap;

use chrono::Utc;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use taskhub_core::ids::{ProjectId, TaskId, UserId};
use taskhub_core::models::{NewTask, Project, Task, TaskDetail, TaskFilter, TaskPatch, User};
use tracing::instrument;

use super::{ProjectRepo, UserRepo};
use crate::errors::{Result, StoreError};
use crate::row_helpers::{opt_id, parse_column};

const COLUMNS: &str = "id, title, description, priority, status, project_id, assigned_to, \
                       due_date, created_at, updated_at";

const UNKNOWN_REFERENCE: &str = "projectId or assignedTo does not reference an existing record";

/// Task repository. Stateless; every method takes `&Connection`.
pub struct TaskRepo;

impl TaskRepo {
    /// Create a task.
    #[instrument(skip_all, fields(title = %input.title))]
    pub fn insert(conn: &Connection, input: &NewTask) -> Result<Task> {
        input.validate()?;
        let now = Utc::now();
        let task = Task {
            id: TaskId::new(),
            title: input.title.trim().to_string(),
            description: input.description.clone(),
            priority: input.priority.unwrap_or_default(),
            status: input.status.unwrap_or_default(),
            project_id: input.project_id.clone(),
            assigned_to: input.assigned_to.clone(),
            due_date: input.due_date,
            created_at: now,
            updated_at: now,
        };
        Self::write(conn, &task, true)?;
        Ok(task)
    }

    /// Fetch a task by ID.
    pub fn get(conn: &Connection, id: &TaskId) -> Result<Option<Task>> {
        let row = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM tasks WHERE id = ?1"),
                params![id.as_str()],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Fetch a task with its project and assignee.
    pub fn get_detail(conn: &Connection, id: &TaskId) -> Result<Option<TaskDetail>> {
        let Some(task) = Self::get(conn, id)? else {
            return Ok(None);
        };
        let mut relations = Relations::default();
        Ok(Some(relations.attach(conn, task)?))
    }

    /// Tasks matching every set field of `filter`, oldest first.
    pub fn list(conn: &Connection, filter: &TaskFilter) -> Result<Vec<Task>> {
        let mut clauses = Vec::new();
        let mut args: Vec<SqlValue> = Vec::new();
        if let Some(project) = &filter.project_id {
            args.push(SqlValue::Text(project.as_str().to_string()));
            clauses.push(format!("project_id = ?{}", args.len()));
        }
        if let Some(status) = filter.status {
            args.push(SqlValue::Text(status.as_str().to_string()));
            clauses.push(format!("status = ?{}", args.len()));
        }
        if let Some(assignee) = &filter.assigned_to {
            args.push(SqlValue::Text(assignee.as_str().to_string()));
            clauses.push(format!("assigned_to = ?{}", args.len()));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM tasks {where_clause} ORDER BY created_at, id"
        ))?;
        let rows = stmt
            .query_map(params_from_iter(args), Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Like [`TaskRepo::list`], with project and assignee attached.
    pub fn list_details(conn: &Connection, filter: &TaskFilter) -> Result<Vec<TaskDetail>> {
        let mut relations = Relations::default();
        Self::list(conn, filter)?
            .into_iter()
            .map(|task| relations.attach(conn, task))
            .collect()
    }

    /// Tasks belonging to one project.
    pub fn list_for_project(conn: &Connection, project_id: &ProjectId) -> Result<Vec<Task>> {
        Self::list(
            conn,
            &TaskFilter {
                project_id: Some(project_id.clone()),
                ..TaskFilter::default()
            },
        )
    }

    /// Apply a partial update. Returns `None` if the task does not exist.
    #[instrument(skip_all, fields(task_id = %id))]
    pub fn update(conn: &Connection, id: &TaskId, patch: &TaskPatch) -> Result<Option<Task>> {
        let tx = conn.unchecked_transaction()?;
        let Some(mut task) = Self::get(&tx, id)? else {
            return Ok(None);
        };
        task.apply(patch)?;
        task.updated_at = Utc::now();
        Self::write(&tx, &task, false)?;
        tx.commit()?;
        Ok(Some(task))
    }

    /// Delete a task.
    pub fn delete(conn: &Connection, id: &TaskId) -> Result<bool> {
        let changed = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id.as_str()])?;
        Ok(changed > 0)
    }

    /// Number of tasks.
    pub fn count(conn: &Connection) -> Result<u64> {
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    fn write(conn: &Connection, t: &Task, insert: bool) -> Result<()> {
        let sql = if insert {
            "INSERT INTO tasks (title, description, priority, status, project_id, assigned_to,
                                due_date, created_at, updated_at, id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        } else {
            "UPDATE tasks
             SET title = ?1, description = ?2, priority = ?3, status = ?4, project_id = ?5,
                 assigned_to = ?6, due_date = ?7, created_at = ?8, updated_at = ?9
             WHERE id = ?10"
        };
        let _ = conn
            .execute(
                sql,
                params![
                    t.title,
                    t.description,
                    t.priority.as_str(),
                    t.status.as_str(),
                    t.project_id.as_ref().map(ProjectId::as_str),
                    t.assigned_to.as_ref().map(UserId::as_str),
                    t.due_date,
                    t.created_at,
                    t.updated_at,
                    t.id.as_str(),
                ],
            )
            .map_err(|e| StoreError::from_write(e, "task already exists", UNKNOWN_REFERENCE))?;
        Ok(())
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
        Ok(Task {
            id: TaskId::from_raw(row.get::<_, String>(0)?),
            title: row.get(1)?,
            description: row.get(2)?,
            priority: parse_column(row, 3)?,
            status: parse_column(row, 4)?,
            project_id: opt_id(row, 5)?,
            assigned_to: opt_id(row, 6)?,
            due_date: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

/// Per-call cache so a listing fetches each project and user once.
#[derive(Default)]
struct Relations {
    projects: HashMap<ProjectId, Option<Project>>,
    users: HashMap<UserId, Option<User>>,
}

impl Relations {
    fn attach(&mut self, conn: &Connection, task: Task) -> Result<TaskDetail> {
        let project = match &task.project_id {
            Some(id) => self.project(conn, id)?,
            None => None,
        };
        let assignee = match &task.assigned_to {
            Some(id) => self.user(conn, id)?,
            None => None,
        };
        Ok(TaskDetail {
            task,
            project,
            assignee,
        })
    }

    fn project(&mut self, conn: &Connection, id: &ProjectId) -> Result<Option<Project>> {
        if let Some(cached) = self.projects.get(id) {
            return Ok(cached.clone());
        }
        let found = ProjectRepo::get(conn, id)?;
        let _ = self.projects.insert(id.clone(), found.clone());
        Ok(found)
    }

    fn user(&mut self, conn: &Connection, id: &UserId) -> Result<Option<User>> {
        if let Some(cached) = self.users.get(id) {
            return Ok(cached.clone());
        }
        let found = UserRepo::get(conn, id)?;
        let _ = self.users.insert(id.clone(), found.clone());
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;
    use assert_matches::assert_matches;
    use chrono::NaiveDate;
    use taskhub_core::models::{NewProject, NewUser, TaskPriority, TaskStatus};

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        let _ = run_migrations(&conn).unwrap();
        conn
    }

    fn new_task(title: &str) -> NewTask {
        NewTask {
            title: title.into(),
            description: None,
            priority: None,
            status: None,
            project_id: None,
            assigned_to: None,
            due_date: None,
        }
    }

    fn seed_project(conn: &Connection) -> Project {
        ProjectRepo::insert(
            conn,
            &NewProject {
                name: "P".into(),
                description: None,
                status: None,
                start_date: None,
                end_date: None,
                owner_id: None,
            },
        )
        .unwrap()
    }

    fn seed_user(conn: &Connection) -> User {
        UserRepo::insert(
            conn,
            &NewUser {
                email: "assignee@example.com".into(),
                password: "pw".into(),
                name: "Assignee".into(),
                role: None,
                avatar: None,
            },
            "h",
        )
        .unwrap()
    }

    #[test]
    fn insert_applies_defaults() {
        let conn = setup();
        let task = TaskRepo::insert(&conn, &new_task("Write docs")).unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, TaskPriority::Medium);
        let fetched = TaskRepo::get(&conn, &task.id).unwrap().unwrap();
        assert_eq!(fetched.title, "Write docs");
    }

    #[test]
    fn in_progress_round_trips_through_sql() {
        let conn = setup();
        let mut input = new_task("Busy");
        input.status = Some(TaskStatus::InProgress);
        input.due_date = NaiveDate::from_ymd_opt(2024, 6, 30);
        let task = TaskRepo::insert(&conn, &input).unwrap();
        let fetched = TaskRepo::get(&conn, &task.id).unwrap().unwrap();
        assert_eq!(fetched.status, TaskStatus::InProgress);
        assert_eq!(fetched.due_date, NaiveDate::from_ymd_opt(2024, 6, 30));
    }

    #[test]
    fn unknown_project_is_invalid_reference() {
        let conn = setup();
        let mut input = new_task("Lost");
        input.project_id = Some(ProjectId::from_raw("prj_missing"));
        assert_matches!(
            TaskRepo::insert(&conn, &input),
            Err(StoreError::InvalidReference(_))
        );
    }

    #[test]
    fn filter_by_project_status_and_assignee() {
        let conn = setup();
        let project = seed_project(&conn);
        let user = seed_user(&conn);

        let mut a = new_task("a");
        a.project_id = Some(project.id.clone());
        a.status = Some(TaskStatus::Done);
        let mut b = new_task("b");
        b.project_id = Some(project.id.clone());
        b.assigned_to = Some(user.id.clone());
        let c = new_task("c");
        for input in [&a, &b, &c] {
            let _ = TaskRepo::insert(&conn, input).unwrap();
        }

        let by_project = TaskRepo::list_for_project(&conn, &project.id).unwrap();
        assert_eq!(by_project.len(), 2);

        let done = TaskRepo::list(
            &conn,
            &TaskFilter {
                status: Some(TaskStatus::Done),
                ..TaskFilter::default()
            },
        )
        .unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].title, "a");

        let mine = TaskRepo::list(
            &conn,
            &TaskFilter {
                project_id: Some(project.id.clone()),
                assigned_to: Some(user.id.clone()),
                ..TaskFilter::default()
            },
        )
        .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].title, "b");

        assert_eq!(TaskRepo::list(&conn, &TaskFilter::default()).unwrap().len(), 3);
    }

    #[test]
    fn detail_includes_relations() {
        let conn = setup();
        let project = seed_project(&conn);
        let user = seed_user(&conn);
        let mut input = new_task("related");
        input.project_id = Some(project.id.clone());
        input.assigned_to = Some(user.id.clone());
        let task = TaskRepo::insert(&conn, &input).unwrap();

        let detail = TaskRepo::get_detail(&conn, &task.id).unwrap().unwrap();
        assert_eq!(detail.project.unwrap().id, project.id);
        assert_eq!(detail.assignee.unwrap().id, user.id);

        let details = TaskRepo::list_details(&conn, &TaskFilter::default()).unwrap();
        assert_eq!(details.len(), 1);
    }

    #[test]
    fn deleting_project_and_user_clears_task_refs() {
        let conn = setup();
        let project = seed_project(&conn);
        let user = seed_user(&conn);
        let mut input = new_task("survivor");
        input.project_id = Some(project.id.clone());
        input.assigned_to = Some(user.id.clone());
        let task = TaskRepo::insert(&conn, &input).unwrap();

        assert!(ProjectRepo::delete(&conn, &project.id).unwrap());
        assert!(UserRepo::delete(&conn, &user.id).unwrap());

        let fetched = TaskRepo::get(&conn, &task.id).unwrap().unwrap();
        assert!(fetched.project_id.is_none());
        assert!(fetched.assigned_to.is_none());
    }

    #[test]
    fn update_status_and_delete() {
        let conn = setup();
        let task = TaskRepo::insert(&conn, &new_task("flip")).unwrap();
        let updated = TaskRepo::update(&conn, &task.id, &TaskPatch::status(TaskStatus::Done))
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, TaskStatus::Done);
        assert!(updated.updated_at >= task.updated_at);

        assert!(TaskRepo::delete(&conn, &task.id).unwrap());
        assert!(TaskRepo::get(&conn, &task.id).unwrap().is_none());
        assert!(
            TaskRepo::update(&conn, &task.id, &TaskPatch::default())
                .unwrap()
                .is_none()
        );
        assert_eq!(TaskRepo::count(&conn).unwrap(), 0);
    }

    #[test]
    fn blank_title_patch_rejected() {
        let conn = setup();
        let task = TaskRepo::insert(&conn, &new_task("keep")).unwrap();
        let patch = TaskPatch {
            title: Some(String::new()),
            ..TaskPatch::default()
        };
        assert_matches!(
            TaskRepo::update(&conn, &task.id, &patch),
            Err(StoreError::Validation(_))
        );
        assert_eq!(TaskRepo::get(&conn, &task.id).unwrap().unwrap().title, "keep");
    }
}

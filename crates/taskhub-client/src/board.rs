//! Local task view kept current from `task_update` events.

use std::collections::HashMap;

use serde_json::Value;
use taskhub_core::events::EntityChange;
use taskhub_core::ids::{ProjectId, TaskId};
use taskhub_core::models::{Task, TaskStatus};
use taskhub_core::MutationEvent;
use tracing::debug;

/// In-memory task collection.
#[derive(Debug, Default, Clone)]
pub struct TaskBoard {
    tasks: HashMap<TaskId, Task>,
}

impl TaskBoard {
    /// Empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the board contents, e.g. after an initial REST fetch.
    pub fn replace_all(&mut self, tasks: impl IntoIterator<Item = Task>) {
        self.tasks = tasks.into_iter().map(|t| (t.id.clone(), t)).collect();
    }

    /// Apply an event. Returns `true` if the board changed.
    ///
    /// Snapshots upsert, tombstones remove, and partial payloads carrying an
    /// `id` are merged over the known task. Other kinds are ignored.
    pub fn apply(&mut self, event: &MutationEvent) -> bool {
        let MutationEvent::TaskUpdate(change) = event else {
            return false;
        };
        match change {
            EntityChange::Snapshot(task) => {
                let _ = self.tasks.insert(task.id.clone(), task.clone());
                true
            }
            EntityChange::Deleted(tombstone) => self
                .tasks
                .remove(&TaskId::from_raw(tombstone.id.as_str()))
                .is_some(),
            EntityChange::Other(partial) => self.merge(partial),
        }
    }

    fn merge(&mut self, partial: &Value) -> bool {
        let Some(id) = partial.get("id").and_then(Value::as_str) else {
            return false;
        };
        let Some(existing) = self.tasks.get(&TaskId::from_raw(id)) else {
            debug!(task_id = id, "partial update for unknown task");
            return false;
        };
        let (Ok(Value::Object(mut merged)), Value::Object(fields)) =
            (serde_json::to_value(existing), partial)
        else {
            return false;
        };
        for (key, value) in fields {
            let _ = merged.insert(key.clone(), value.clone());
        }
        match serde_json::from_value::<Task>(Value::Object(merged)) {
            Ok(task) if task.id.as_str() == id => {
                let _ = self.tasks.insert(task.id.clone(), task);
                true
            }
            Ok(_) => false,
            Err(e) => {
                debug!(task_id = id, error = %e, "partial update does not fit task shape");
                false
            }
        }
    }

    /// Look up a task.
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the board is empty.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks in a project, oldest first.
    pub fn by_project(&self, project_id: &ProjectId) -> Vec<&Task> {
        self.sorted(|t| t.project_id.as_ref() == Some(project_id))
    }

    /// Tasks in a status, oldest first.
    pub fn by_status(&self, status: TaskStatus) -> Vec<&Task> {
        self.sorted(|t| t.status == status)
    }

    fn sorted(&self, keep: impl Fn(&Task) -> bool) -> Vec<&Task> {
        let mut out: Vec<&Task> = self.tasks.values().filter(|t| keep(t)).collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use taskhub_core::models::TaskPriority;

    fn task(id: &str, project: Option<&str>, status: TaskStatus) -> Task {
        Task {
            id: TaskId::from_raw(id),
            title: format!("task {id}"),
            description: None,
            priority: TaskPriority::Medium,
            status,
            project_id: project.map(ProjectId::from_raw),
            assigned_to: None,
            due_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn snapshot_then_tombstone() {
        let mut board = TaskBoard::new();
        assert!(board.apply(&MutationEvent::task_saved(task("t1", None, TaskStatus::Pending))));
        assert_eq!(board.len(), 1);
        assert!(board.apply(&MutationEvent::task_deleted("t1")));
        assert!(board.is_empty());
        assert!(!board.apply(&MutationEvent::task_deleted("t1")));
    }

    #[test]
    fn snapshot_replaces_existing() {
        let mut board = TaskBoard::new();
        let _ = board.apply(&MutationEvent::task_saved(task("t1", None, TaskStatus::Pending)));
        let _ = board.apply(&MutationEvent::task_saved(task("t1", None, TaskStatus::Done)));
        assert_eq!(board.len(), 1);
        assert_eq!(board.get(&TaskId::from_raw("t1")).unwrap().status, TaskStatus::Done);
    }

    #[test]
    fn partial_payload_merges_fields() {
        let mut board = TaskBoard::new();
        board.replace_all([task("t1", Some("p1"), TaskStatus::Pending)]);
        let partial = MutationEvent::TaskUpdate(EntityChange::Other(json!({
            "id": "t1",
            "status": "in-progress",
        })));
        assert!(board.apply(&partial));
        let t = board.get(&TaskId::from_raw("t1")).unwrap();
        assert_eq!(t.status, TaskStatus::InProgress);
        assert_eq!(t.title, "task t1");
    }

    #[test]
    fn partial_for_unknown_or_invalid_is_ignored() {
        let mut board = TaskBoard::new();
        board.replace_all([task("t1", None, TaskStatus::Pending)]);
        let unknown = MutationEvent::TaskUpdate(EntityChange::Other(json!({"id": "zz"})));
        let invalid = MutationEvent::TaskUpdate(EntityChange::Other(json!({"id": "t1", "status": "bogus"})));
        assert!(!board.apply(&unknown));
        assert!(!board.apply(&invalid));
        assert_eq!(board.get(&TaskId::from_raw("t1")).unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn queries_filter() {
        let mut board = TaskBoard::new();
        board.replace_all([
            task("a", Some("p1"), TaskStatus::Done),
            task("b", Some("p2"), TaskStatus::Done),
            task("c", Some("p1"), TaskStatus::Pending),
        ]);
        assert_eq!(board.by_project(&ProjectId::from_raw("p1")).len(), 2);
        assert_eq!(board.by_status(TaskStatus::Done).len(), 2);
        assert_eq!(board.by_status(TaskStatus::InProgress).len(), 0);
    }

    #[test]
    fn other_kinds_ignored() {
        let mut board = TaskBoard::new();
        assert!(!board.apply(&MutationEvent::project_deleted("p1")));
    }
}

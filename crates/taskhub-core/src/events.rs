//! Real-time channel payloads.
//!
//! Every frame on the channel is an [`Envelope`]: `{ "kind": ..., "data": ... }`.
//! The envelope itself is schema-free so unknown kinds pass through untouched.
//! [`MutationEvent`] is the typed view over the envelope for the kinds this
//! system produces and consumes, with [`MutationEvent::Unknown`] as the
//! fallback that keeps the raw JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{Project, Task};

/// Kind emitted after every task create, update, or delete.
pub const TASK_UPDATE: &str = "task_update";
/// Kind emitted after every project create, update, or delete.
pub const PROJECT_UPDATE: &str = "project_update";
/// Free-form user-facing notification.
pub const NOTIFICATION: &str = "notification";
/// First frame a server sends on a new connection.
pub const CONNECTION_ESTABLISHED: &str = "connection_established";
/// Client-originated notice asking the server to relay a task change.
pub const UPDATE_TASK_NOTICE: &str = "update_task";

/// Wire frame: a kind tag plus an arbitrary JSON payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event kind, e.g. `task_update`.
    pub kind: String,
    /// Payload. Missing `data` decodes as `null`.
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Build an envelope.
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Serialize to a text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Deletion marker: `{ "id": ..., "deleted": true }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TombstoneWire", into = "TombstoneWire")]
pub struct Tombstone {
    /// ID of the removed entity.
    pub id: String,
}

impl Tombstone {
    /// Tombstone for the given ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Serialize, Deserialize)]
struct TombstoneWire {
    id: String,
    deleted: bool,
}

impl TryFrom<TombstoneWire> for Tombstone {
    type Error = &'static str;

    fn try_from(wire: TombstoneWire) -> Result<Self, Self::Error> {
        if wire.deleted {
            Ok(Self { id: wire.id })
        } else {
            Err("tombstone requires deleted: true")
        }
    }
}

impl From<Tombstone> for TombstoneWire {
    fn from(t: Tombstone) -> Self {
        Self {
            id: t.id,
            deleted: true,
        }
    }
}

/// Payload of an entity-change kind: a full snapshot or a tombstone.
///
/// Payloads that are neither (for example a relayed partial object from a
/// client notice) are kept as [`EntityChange::Other`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityChange<T> {
    /// The entity was removed.
    Deleted(Tombstone),
    /// Full post-write state.
    Snapshot(T),
    /// Some other JSON shape.
    Other(Value),
}

impl<T> EntityChange<T> {
    /// ID of the affected entity when the payload carries one.
    pub fn id(&self) -> Option<&str>
    where
        T: HasId,
    {
        match self {
            Self::Deleted(t) => Some(&t.id),
            Self::Snapshot(v) => Some(v.entity_id()),
            Self::Other(v) => v.get("id").and_then(Value::as_str),
        }
    }
}

/// Entities that expose a string ID.
pub trait HasId {
    /// The entity's ID.
    fn entity_id(&self) -> &str;
}

impl HasId for Task {
    fn entity_id(&self) -> &str {
        self.id.as_str()
    }
}

impl HasId for Project {
    fn entity_id(&self) -> &str {
        self.id.as_str()
    }
}

/// Typed `notification` payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Optional headline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Body text.
    pub message: String,
}

/// A mutation event, typed by kind.
#[derive(Clone, Debug, PartialEq)]
pub enum MutationEvent {
    /// `task_update`
    TaskUpdate(EntityChange<Task>),
    /// `project_update`
    ProjectUpdate(EntityChange<Project>),
    /// `notification`
    Notification(Notification),
    /// Any other kind, or a known kind whose payload did not decode.
    Unknown {
        /// Original kind.
        kind: String,
        /// Raw payload.
        data: Value,
    },
}

impl MutationEvent {
    /// Snapshot of a created or updated task.
    pub fn task_saved(task: Task) -> Self {
        Self::TaskUpdate(EntityChange::Snapshot(task))
    }

    /// Tombstone for a deleted task.
    pub fn task_deleted(id: impl Into<String>) -> Self {
        Self::TaskUpdate(EntityChange::Deleted(Tombstone::new(id)))
    }

    /// Snapshot of a created or updated project.
    pub fn project_saved(project: Project) -> Self {
        Self::ProjectUpdate(EntityChange::Snapshot(project))
    }

    /// Tombstone for a deleted project.
    pub fn project_deleted(id: impl Into<String>) -> Self {
        Self::ProjectUpdate(EntityChange::Deleted(Tombstone::new(id)))
    }

    /// Wire kind of this event.
    pub fn kind(&self) -> &str {
        match self {
            Self::TaskUpdate(_) => TASK_UPDATE,
            Self::ProjectUpdate(_) => PROJECT_UPDATE,
            Self::Notification(_) => NOTIFICATION,
            Self::Unknown { kind, .. } => kind,
        }
    }

    /// Encode into a wire envelope.
    pub fn to_envelope(&self) -> Result<Envelope, serde_json::Error> {
        let data = match self {
            Self::TaskUpdate(change) => serde_json::to_value(change)?,
            Self::ProjectUpdate(change) => serde_json::to_value(change)?,
            Self::Notification(n) => serde_json::to_value(n)?,
            Self::Unknown { data, .. } => data.clone(),
        };
        Ok(Envelope::new(self.kind(), data))
    }

    /// Decode an envelope.
    ///
    /// Never fails: a known kind whose payload does not match the expected
    /// shape becomes [`MutationEvent::Unknown`] with the kind preserved.
    pub fn from_envelope(envelope: Envelope) -> Self {
        let Envelope { kind, data } = envelope;
        let typed = match kind.as_str() {
            TASK_UPDATE => serde_json::from_value(data.clone()).ok().map(Self::TaskUpdate),
            PROJECT_UPDATE => serde_json::from_value(data.clone())
                .ok()
                .map(Self::ProjectUpdate),
            NOTIFICATION => serde_json::from_value(data.clone())
                .ok()
                .map(Self::Notification),
            _ => None,
        };
        typed.unwrap_or(Self::Unknown { kind, data })
    }
}

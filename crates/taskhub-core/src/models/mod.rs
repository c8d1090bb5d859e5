//! Persistent entities and their create/patch inputs.
//!
//! All types serialize with camelCase field names. Patch types distinguish an
//! absent field (leave unchanged) from an explicit `null` (clear the value)
//! for optional columns.

/// Generates `as_str`, `Display` and `FromStr` for a closed string enum.
macro_rules! string_enum {
    ($name:ident, $field:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Wire representation.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::errors::ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(crate::errors::ParseEnumError {
                        field: $field,
                        value: other.to_owned(),
                    }),
                }
            }
        }
    };
}

pub(crate) use string_enum;

mod project;
mod task;
mod user;

pub use project::{NewProject, Project, ProjectPatch, ProjectStatus, ProjectWithTasks};
pub use task::{NewTask, Task, TaskDetail, TaskFilter, TaskPatch, TaskPriority, TaskStatus};
pub use user::{NewUser, User, UserPatch, UserRole};

/// Deserializer for `Option<Option<T>>` patch fields.
///
/// A missing key leaves the field at its `#[serde(default)]` of `None`; a
/// present key (including `null`) yields `Some(..)`.
pub(crate) mod nullable {
    use serde::{Deserialize, Deserializer};

    pub(crate) fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

/// Trim a required text field and reject it when empty.
pub(crate) fn require_text(value: &str, field: &str) -> Result<(), crate::ValidationError> {
    if value.trim().is_empty() {
        return Err(crate::ValidationError::new(format!("{field} is required")));
    }
    Ok(())
}

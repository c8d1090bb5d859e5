//! User repository: CRUD for the `users` table.
//!
//! Password hashes are stored here but never leave the crate inside a
//! [`User`]; login goes through [`UserRepo::get_credentials`].

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use taskhub_core::ids::UserId;
use taskhub_core::models::{NewUser, User, UserPatch};
use tracing::instrument;

use crate::errors::{Result, StoreError};
use crate::row_helpers::parse_column;

const DUPLICATE_EMAIL: &str = "User already exists";

const COLUMNS: &str =
    "id, email, name, role, avatar, is_active, created_at, updated_at, password_hash";

/// A user together with their stored password hash.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    /// The account.
    pub user: User,
    /// Argon2 PHC string.
    pub password_hash: String,
}

/// User repository. Stateless; every method takes `&Connection`.
pub struct UserRepo;

impl UserRepo {
    /// Create an account. Fails with [`StoreError::Conflict`] on a duplicate email.
    #[instrument(skip_all, fields(email = %input.email))]
    pub fn insert(conn: &Connection, input: &NewUser, password_hash: &str) -> Result<User> {
        input.validate()?;
        let now = Utc::now();
        let user = User {
            id: UserId::new(),
            email: input.email.trim().to_string(),
            name: input.name.trim().to_string(),
            role: input.role.unwrap_or_default(),
            avatar: input.avatar.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let _ = conn
            .execute(
                "INSERT INTO users (id, email, password_hash, name, role, avatar, is_active,
                                    created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    user.id.as_str(),
                    user.email,
                    password_hash,
                    user.name,
                    user.role.as_str(),
                    user.avatar,
                    user.is_active,
                    user.created_at,
                    user.updated_at,
                ],
            )
            .map_err(|e| StoreError::from_write(e, DUPLICATE_EMAIL, "invalid user reference"))?;
        Ok(user)
    }

    /// Fetch a user by ID.
    pub fn get(conn: &Connection, id: &UserId) -> Result<Option<User>> {
        let row = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM users WHERE id = ?1"),
                params![id.as_str()],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Fetch a user and password hash by email (case-insensitive).
    pub fn get_credentials(conn: &Connection, email: &str) -> Result<Option<UserCredentials>> {
        let row = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM users WHERE email = ?1"),
                params![email.trim()],
                |row| {
                    Ok(UserCredentials {
                        user: Self::map_row(row)?,
                        password_hash: row.get(8)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// All users ordered by creation time.
    pub fn list(conn: &Connection) -> Result<Vec<User>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM users ORDER BY created_at, id"
        ))?;
        let rows = stmt
            .query_map([], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Apply a partial update. `new_password_hash` replaces the stored hash
    /// when set. Returns `None` if the user does not exist.
    #[instrument(skip_all, fields(user_id = %id))]
    pub fn update(
        conn: &Connection,
        id: &UserId,
        patch: &UserPatch,
        new_password_hash: Option<&str>,
    ) -> Result<Option<User>> {
        patch.validate()?;
        let tx = conn.unchecked_transaction()?;
        let Some(mut user) = Self::get(&tx, id)? else {
            return Ok(None);
        };
        user.apply(patch);
        user.email = user.email.trim().to_string();
        user.updated_at = Utc::now();

        let _ = tx
            .execute(
                "UPDATE users
                 SET email = ?1, name = ?2, role = ?3, avatar = ?4, is_active = ?5,
                     updated_at = ?6, password_hash = COALESCE(?7, password_hash)
                 WHERE id = ?8",
                params![
                    user.email,
                    user.name,
                    user.role.as_str(),
                    user.avatar,
                    user.is_active,
                    user.updated_at,
                    new_password_hash,
                    id.as_str(),
                ],
            )
            .map_err(|e| StoreError::from_write(e, DUPLICATE_EMAIL, "invalid user reference"))?;
        tx.commit()?;
        Ok(Some(user))
    }

    /// Delete a user. Their projects and tasks lose the reference.
    pub fn delete(conn: &Connection, id: &UserId) -> Result<bool> {
        let changed = conn.execute("DELETE FROM users WHERE id = ?1", params![id.as_str()])?;
        Ok(changed > 0)
    }

    /// Number of users.
    pub fn count(conn: &Connection) -> Result<u64> {
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            id: UserId::from_raw(row.get::<_, String>(0)?),
            email: row.get(1)?,
            name: row.get(2)?,
            role: parse_column(row, 3)?,
            avatar: row.get(4)?,
            is_active: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

use std::collections::HashSet;

use rusqlite::{OptionalExtension, params};
use tokio_rusqlite::{Connection, Result};
use tracing::info;

use crate::auth::roles::{Role, parse_role_list};
use crate::database::unix_now;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    /// Comma-joined authority string, already normalised by the caller.
    pub roles: String,
}

/// A stored user record.  `password_hash` never leaves the process — this
/// type deliberately does not implement `Serialize`.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    /// Parsed once here, at load time; nothing downstream re-splits text.
    pub roles: HashSet<Role>,
    pub created_at: i64,
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        roles: parse_role_list(&row.get::<_, String>(4)?),
        created_at: row.get(5)?,
    })
}

const USER_COLUMNS: &str = "id, username, email, password_hash, roles, created_at";

/// Register a new user.  Uniqueness of username and email is enforced by
/// the schema; callers should pre-check to give a friendlier error.
pub async fn create_user(conn: &Connection, new_user: NewUser) -> Result<i64> {
    let created_at = unix_now();

    conn.call(move |conn: &mut rusqlite::Connection| {
        conn.execute(
            "INSERT INTO users (username, email, password_hash, roles, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                new_user.username,
                new_user.email,
                new_user.password_hash,
                new_user.roles,
                created_at,
            ],
        )?;
        info!("New user registered: {}", new_user.username);

        Ok(conn.last_insert_rowid())
    })
    .await
}

/// Check if username exists
pub async fn username_exists(conn: &Connection, username: String) -> Result<bool> {
    conn.call(move |conn: &mut rusqlite::Connection| {
        let mut stmt = conn.prepare("SELECT COUNT(*) FROM users WHERE username = ?1")?;
        let count: i64 = stmt.query_row(params![username], |row: &rusqlite::Row| row.get(0))?;
        Ok(count > 0)
    })
    .await
}

/// Check if email exists
pub async fn email_exists(conn: &Connection, email: String) -> Result<bool> {
    conn.call(move |conn: &mut rusqlite::Connection| {
        let mut stmt = conn.prepare("SELECT COUNT(*) FROM users WHERE email = ?1")?;
        let count: i64 = stmt.query_row(params![email], |row: &rusqlite::Row| row.get(0))?;
        Ok(count > 0)
    })
    .await
}

/// Get user by email — the token subject lookup used on every
/// authenticated request.
pub async fn get_user_by_email(conn: &Connection, email: String) -> Result<Option<User>> {
    conn.call(move |conn: &mut rusqlite::Connection| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users WHERE email = ?1",
            USER_COLUMNS
        ))?;

        let user = stmt.query_row(params![email], row_to_user).optional()?;
        Ok(user)
    })
    .await
}

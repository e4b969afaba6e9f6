use tokio_rusqlite::{Connection, Result};
use tracing::info;

/// Current schema version.  Bump this whenever the schema changes and add a
/// corresponding migration arm in `run_migrations`.
const SCHEMA_VERSION: u32 = 1;

/// Initialize the database schema and run any pending migrations.
pub async fn create_tables(conn: &Connection) -> Result<()> {
    create_schema(conn).await?;
    run_migrations(conn).await?;
    Ok(())
}

/// Create all tables for a brand-new database (version 1 schema).
async fn create_schema(conn: &Connection) -> Result<()> {
    conn.call(|conn: &mut rusqlite::Connection| {
        // Users table — roles is the comma-joined authority string
        // ("ROLE_ADMIN,ROLE_USER"); parsed into a set when rows are loaded.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                username      TEXT    NOT NULL UNIQUE,
                email         TEXT    NOT NULL UNIQUE,
                password_hash TEXT    NOT NULL,
                roles         TEXT    NOT NULL DEFAULT '',
                created_at    INTEGER NOT NULL
            )",
            [],
        )?;

        // Posts — exactly one author; mutation is gated on that author.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS posts (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                title      TEXT    NOT NULL,
                content    TEXT    NOT NULL,
                author_id  INTEGER NOT NULL REFERENCES users(id),
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS comments (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id    INTEGER NOT NULL REFERENCES posts(id),
                content    TEXT    NOT NULL,
                author_id  INTEGER NOT NULL REFERENCES users(id),
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id)",
            [],
        )?;

        Ok(())
    })
    .await
}

/// Apply migrations for databases created by older binaries.
async fn run_migrations(conn: &Connection) -> Result<()> {
    let version = current_version(conn).await?;

    if version < SCHEMA_VERSION {
        info!(
            "Migrating database schema from version {} to {}",
            version, SCHEMA_VERSION
        );
        // No migration arms yet — version 1 is the first schema.
    }

    set_version(conn, SCHEMA_VERSION).await?;
    Ok(())
}

async fn current_version(conn: &Connection) -> Result<u32> {
    conn.call(|conn: &mut rusqlite::Connection| {
        let version: u32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
        Ok(version)
    })
    .await
}

async fn set_version(conn: &Connection, version: u32) -> Result<()> {
    conn.call(move |conn: &mut rusqlite::Connection| {
        conn.pragma_update(None, "user_version", version)?;
        Ok(())
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schema_creation_is_idempotent() {
        let conn = Connection::open_in_memory().await.unwrap();
        create_tables(&conn).await.unwrap();
        create_tables(&conn).await.unwrap();
    }

    #[tokio::test]
    async fn version_is_stamped() {
        let conn = Connection::open_in_memory().await.unwrap();
        create_tables(&conn).await.unwrap();
        assert_eq!(current_version(&conn).await.unwrap(), SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn schema_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blog.db");

        let conn = Connection::open(&path).await.unwrap();
        create_tables(&conn).await.unwrap();
        drop(conn);

        let reopened = Connection::open(&path).await.unwrap();
        assert_eq!(current_version(&reopened).await.unwrap(), SCHEMA_VERSION);
        // Tables are already there, so setup must be a no-op.
        create_tables(&reopened).await.unwrap();
    }
}

use rusqlite::{OptionalExtension, params};
use serde::Serialize;
use tokio_rusqlite::{Connection, Result};
use tracing::info;

use crate::database::{Mutation, unix_now};

/// Title/content pair — the caller-editable fields of a post.
#[derive(Debug, Clone)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
}

/// A post as served to clients: the author foreign key is resolved to a
/// username, which is also what the ownership gate compares against.
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author: String,
    pub created_at: i64,
    pub updated_at: i64,
}

const POST_SELECT: &str = "SELECT p.id, p.title, p.content, u.username, p.created_at, p.updated_at
     FROM posts p JOIN users u ON u.id = p.author_id";

fn row_to_post(row: &rusqlite::Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        author: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn fetch_post(conn: &rusqlite::Connection, id: i64) -> rusqlite::Result<Option<Post>> {
    let mut stmt = conn.prepare(&format!("{} WHERE p.id = ?1", POST_SELECT))?;
    stmt.query_row(params![id], row_to_post).optional()
}

/// Create a post owned by `username`.  Returns `None` when the username
/// resolves to no stored user.
pub async fn create_post(
    conn: &Connection,
    draft: PostDraft,
    username: String,
) -> Result<Option<Post>> {
    let now = unix_now();

    conn.call(move |conn: &mut rusqlite::Connection| {
        let tx = conn.transaction()?;

        let author_id: Option<i64> = tx
            .query_row(
                "SELECT id FROM users WHERE username = ?1",
                params![username],
                |r| r.get(0),
            )
            .optional()?;

        let Some(author_id) = author_id else {
            return Ok(None);
        };

        tx.execute(
            "INSERT INTO posts (title, content, author_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![draft.title, draft.content, author_id, now, now],
        )?;
        let post_id = tx.last_insert_rowid();

        let post = tx.query_row(
            &format!("{} WHERE p.id = ?1", POST_SELECT),
            params![post_id],
            row_to_post,
        )?;

        tx.commit()?;
        info!("Post {} created by {}", post_id, post.author);

        Ok(Some(post))
    })
    .await
}

/// All posts, newest first.
pub async fn list_posts(conn: &Connection) -> Result<Vec<Post>> {
    conn.call(|conn: &mut rusqlite::Connection| {
        let mut stmt = conn.prepare(&format!("{} ORDER BY p.created_at DESC, p.id DESC", POST_SELECT))?;
        let posts = stmt
            .query_map([], row_to_post)?
            .collect::<rusqlite::Result<Vec<Post>>>()?;
        Ok(posts)
    })
    .await
}

pub async fn get_post(conn: &Connection, id: i64) -> Result<Option<Post>> {
    conn.call(move |conn: &mut rusqlite::Connection| Ok(fetch_post(conn, id)?))
        .await
}

/// Update a post's title and content, bumping `updated_at`.
///
/// Ownership is re-verified here, at call time, inside the same transaction
/// as the write — a stale check from an earlier request can never authorise
/// this mutation.
pub async fn update_post(
    conn: &Connection,
    id: i64,
    draft: PostDraft,
    username: String,
) -> Result<Mutation<Post>> {
    let updated_at = unix_now();

    conn.call(move |conn: &mut rusqlite::Connection| {
        let tx = conn.transaction()?;

        let author: Option<String> = tx
            .query_row(
                "SELECT u.username FROM posts p JOIN users u ON u.id = p.author_id
                 WHERE p.id = ?1",
                params![id],
                |r| r.get(0),
            )
            .optional()?;

        let Some(author) = author else {
            return Ok(Mutation::NotFound);
        };
        if author != username {
            return Ok(Mutation::NotOwner);
        }

        tx.execute(
            "UPDATE posts SET title = ?1, content = ?2, updated_at = ?3 WHERE id = ?4",
            params![draft.title, draft.content, updated_at, id],
        )?;

        let post = tx.query_row(
            &format!("{} WHERE p.id = ?1", POST_SELECT),
            params![id],
            row_to_post,
        )?;

        tx.commit()?;
        info!("Post {} updated by {}", id, username);

        Ok(Mutation::Applied(post))
    })
    .await
}

/// Delete a post and its comments.  Same call-time ownership rule as
/// [`update_post`].
pub async fn delete_post(conn: &Connection, id: i64, username: String) -> Result<Mutation<()>> {
    conn.call(move |conn: &mut rusqlite::Connection| {
        let tx = conn.transaction()?;

        let author: Option<String> = tx
            .query_row(
                "SELECT u.username FROM posts p JOIN users u ON u.id = p.author_id
                 WHERE p.id = ?1",
                params![id],
                |r| r.get(0),
            )
            .optional()?;

        let Some(author) = author else {
            return Ok(Mutation::NotFound);
        };
        if author != username {
            return Ok(Mutation::NotOwner);
        }

        // Comments belong to the post; remove them in the same transaction.
        tx.execute("DELETE FROM comments WHERE post_id = ?1", params![id])?;
        tx.execute("DELETE FROM posts WHERE id = ?1", params![id])?;

        tx.commit()?;
        info!("Post {} deleted by {}", id, username);

        Ok(Mutation::Applied(()))
    })
    .await
}

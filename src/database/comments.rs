use rusqlite::{OptionalExtension, params};
use serde::Serialize;
use tokio_rusqlite::{Connection, Result};
use tracing::info;

use crate::database::{Mutation, unix_now};

/// A comment as served to clients, author resolved to a username.
#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub content: String,
    pub author: String,
    pub created_at: i64,
}

/// Outcome of comment creation — the two referenced rows can each be
/// missing independently.
#[derive(Debug)]
pub enum CommentCreate {
    Created(Comment),
    PostMissing,
    AuthorMissing,
}

const COMMENT_SELECT: &str = "SELECT c.id, c.post_id, c.content, u.username, c.created_at
     FROM comments c JOIN users u ON u.id = c.author_id";

fn row_to_comment(row: &rusqlite::Row) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        content: row.get(2)?,
        author: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Create a comment on `post_id` authored by `username`.
pub async fn create_comment(
    conn: &Connection,
    post_id: i64,
    content: String,
    username: String,
) -> Result<CommentCreate> {
    let now = unix_now();

    conn.call(move |conn: &mut rusqlite::Connection| {
        let tx = conn.transaction()?;

        let post_exists: Option<i64> = tx
            .query_row("SELECT id FROM posts WHERE id = ?1", params![post_id], |r| {
                r.get(0)
            })
            .optional()?;
        if post_exists.is_none() {
            return Ok(CommentCreate::PostMissing);
        }

        let author_id: Option<i64> = tx
            .query_row(
                "SELECT id FROM users WHERE username = ?1",
                params![username],
                |r| r.get(0),
            )
            .optional()?;
        let Some(author_id) = author_id else {
            return Ok(CommentCreate::AuthorMissing);
        };

        tx.execute(
            "INSERT INTO comments (post_id, content, author_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![post_id, content, author_id, now],
        )?;
        let comment_id = tx.last_insert_rowid();

        let comment = tx.query_row(
            &format!("{} WHERE c.id = ?1", COMMENT_SELECT),
            params![comment_id],
            row_to_comment,
        )?;

        tx.commit()?;
        info!("Comment {} created on post {} by {}", comment_id, post_id, comment.author);

        Ok(CommentCreate::Created(comment))
    })
    .await
}

/// All comments on a post, oldest first.
pub async fn comments_for_post(conn: &Connection, post_id: i64) -> Result<Vec<Comment>> {
    conn.call(move |conn: &mut rusqlite::Connection| {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE c.post_id = ?1 ORDER BY c.created_at ASC, c.id ASC",
            COMMENT_SELECT
        ))?;
        let comments = stmt
            .query_map(params![post_id], row_to_comment)?
            .collect::<rusqlite::Result<Vec<Comment>>>()?;
        Ok(comments)
    })
    .await
}

pub async fn get_comment(conn: &Connection, id: i64) -> Result<Option<Comment>> {
    conn.call(move |conn: &mut rusqlite::Connection| {
        let mut stmt = conn.prepare(&format!("{} WHERE c.id = ?1", COMMENT_SELECT))?;
        let comment = stmt.query_row(params![id], row_to_comment).optional()?;
        Ok(comment)
    })
    .await
}

/// Replace a comment's content.  Ownership is re-verified at call time in
/// the same transaction as the write.
pub async fn update_comment(
    conn: &Connection,
    id: i64,
    content: String,
    username: String,
) -> Result<Mutation<Comment>> {
    conn.call(move |conn: &mut rusqlite::Connection| {
        let tx = conn.transaction()?;

        let author: Option<String> = tx
            .query_row(
                "SELECT u.username FROM comments c JOIN users u ON u.id = c.author_id
                 WHERE c.id = ?1",
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
            "UPDATE comments SET content = ?1 WHERE id = ?2",
            params![content, id],
        )?;

        let comment = tx.query_row(
            &format!("{} WHERE c.id = ?1", COMMENT_SELECT),
            params![id],
            row_to_comment,
        )?;

        tx.commit()?;
        info!("Comment {} updated by {}", id, username);

        Ok(Mutation::Applied(comment))
    })
    .await
}

/// Delete a comment.  Same call-time ownership rule as [`update_comment`].
pub async fn delete_comment(conn: &Connection, id: i64, username: String) -> Result<Mutation<()>> {
    conn.call(move |conn: &mut rusqlite::Connection| {
        let tx = conn.transaction()?;

        let author: Option<String> = tx
            .query_row(
                "SELECT u.username FROM comments c JOIN users u ON u.id = c.author_id
                 WHERE c.id = ?1",
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

        tx.execute("DELETE FROM comments WHERE id = ?1", params![id])?;

        tx.commit()?;
        info!("Comment {} deleted by {}", id, username);

        Ok(Mutation::Applied(()))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create::create_tables;
    use crate::database::posts::{PostDraft, create_post};
    use crate::database::users::{NewUser, create_user};

    async fn test_db_with_post() -> (Connection, i64) {
        let conn = Connection::open_in_memory().await.unwrap();
        create_tables(&conn).await.unwrap();
        for name in ["alice", "bob"] {
            create_user(
                &conn,
                NewUser {
                    username: name.to_string(),
                    email: format!("{}@example.com", name),
                    password_hash: "$argon2id$fake".to_string(),
                    roles: "ROLE_USER".to_string(),
                },
            )
            .await
            .unwrap();
        }
        let post = create_post(
            &conn,
            PostDraft {
                title: "Hello".to_string(),
                content: "Body".to_string(),
            },
            "alice".to_string(),
        )
        .await
        .unwrap()
        .unwrap();
        (conn, post.id)
    }

    #[tokio::test]
    async fn create_and_list() {
        let (conn, post_id) = test_db_with_post().await;

        let outcome = create_comment(&conn, post_id, "Nice post".to_string(), "bob".to_string())
            .await
            .unwrap();
        assert!(matches!(outcome, CommentCreate::Created(_)));

        let comments = comments_for_post(&conn, post_id).await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].author, "bob");
        assert_eq!(comments[0].content, "Nice post");
    }

    #[tokio::test]
    async fn comment_on_missing_post() {
        let (conn, _) = test_db_with_post().await;
        let outcome = create_comment(&conn, 999, "hi".to_string(), "bob".to_string())
            .await
            .unwrap();
        assert!(matches!(outcome, CommentCreate::PostMissing));
    }

    #[tokio::test]
    async fn comment_by_unknown_author() {
        let (conn, post_id) = test_db_with_post().await;
        let outcome = create_comment(&conn, post_id, "hi".to_string(), "ghost".to_string())
            .await
            .unwrap();
        assert!(matches!(outcome, CommentCreate::AuthorMissing));
    }

    #[tokio::test]
    async fn non_author_update_is_rejected_and_content_survives() {
        let (conn, post_id) = test_db_with_post().await;
        let CommentCreate::Created(comment) =
            create_comment(&conn, post_id, "Original".to_string(), "bob".to_string())
                .await
                .unwrap()
        else {
            panic!("comment should be created");
        };

        let outcome = update_comment(&conn, comment.id, "Defaced".to_string(), "alice".to_string())
            .await
            .unwrap();
        assert!(matches!(outcome, Mutation::NotOwner));

        let unchanged = get_comment(&conn, comment.id).await.unwrap().unwrap();
        assert_eq!(unchanged.content, "Original");
    }

    #[tokio::test]
    async fn author_update_applies() {
        let (conn, post_id) = test_db_with_post().await;
        let CommentCreate::Created(comment) =
            create_comment(&conn, post_id, "Original".to_string(), "bob".to_string())
                .await
                .unwrap()
        else {
            panic!("comment should be created");
        };

        let outcome = update_comment(&conn, comment.id, "Edited".to_string(), "bob".to_string())
            .await
            .unwrap();
        match outcome {
            Mutation::Applied(updated) => assert_eq!(updated.content, "Edited"),
            other => panic!("expected Applied, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn only_the_author_can_delete() {
        let (conn, post_id) = test_db_with_post().await;
        let CommentCreate::Created(comment) =
            create_comment(&conn, post_id, "Mine".to_string(), "bob".to_string())
                .await
                .unwrap()
        else {
            panic!("comment should be created");
        };

        let denied = delete_comment(&conn, comment.id, "alice".to_string())
            .await
            .unwrap();
        assert!(matches!(denied, Mutation::NotOwner));

        let allowed = delete_comment(&conn, comment.id, "bob".to_string())
            .await
            .unwrap();
        assert!(matches!(allowed, Mutation::Applied(())));
        assert!(get_comment(&conn, comment.id).await.unwrap().is_none());
    }
}

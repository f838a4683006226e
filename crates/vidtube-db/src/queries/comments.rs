use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

use vidtube_types::models::{Comment, CommentWithOwner};

use crate::Database;
use crate::models::{OWNER_COLUMNS, read_comment, read_owner};

const COMMENT_COLUMNS: &str = "c.id, c.content, c.video_id, c.owner_id, c.created_at, c.updated_at";

impl Database {
    pub fn insert_comment(
        &self,
        id: &str,
        video_id: &str,
        owner_id: &str,
        content: &str,
    ) -> Result<Comment> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (id, video_id, owner_id, content) VALUES (?1, ?2, ?3, ?4)",
                (id, video_id, owner_id, content),
            )?;
            query_comment(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("Comment {} vanished after insert", id))
        })
    }

    pub fn get_comment(&self, id: &str) -> Result<Option<Comment>> {
        self.with_conn(|conn| query_comment(conn, id))
    }

    /// Comments on a video, newest first, with the total count for paging.
    pub fn list_comments(
        &self,
        video_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<(Vec<CommentWithOwner>, u64)> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM comments WHERE video_id = ?1",
                [video_id],
                |r| r.get(0),
            )?;

            let sql = format!(
                "SELECT {}, {}, (SELECT COUNT(*) FROM likes l WHERE l.comment_id = c.id)
                 FROM comments c
                 JOIN users u ON u.id = c.owner_id
                 WHERE c.video_id = ?1
                 ORDER BY c.created_at DESC, c.rowid DESC
                 LIMIT ?2 OFFSET ?3",
                COMMENT_COLUMNS, OWNER_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![video_id, limit, offset], |row| {
                    Ok(CommentWithOwner {
                        comment: read_comment(row, 0)?,
                        owner_details: read_owner(row, 6)?,
                        likes_count: row.get(10)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((rows, total as u64))
        })
    }

    pub fn update_comment(&self, id: &str, content: &str) -> Result<Option<Comment>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE comments
                 SET content = ?2, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                (id, content),
            )?;
            query_comment(conn, id)
        })
    }

    /// Deletes a comment and, by cascade, its likes.
    pub fn delete_comment(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM comments WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }
}

fn query_comment(conn: &Connection, id: &str) -> Result<Option<Comment>> {
    let sql = format!("SELECT {} FROM comments c WHERE c.id = ?1", COMMENT_COLUMNS);
    let comment = conn.query_row(&sql, [id], |row| read_comment(row, 0)).optional()?;
    Ok(comment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures;

    #[test]
    fn comments_are_paged_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let owner = fixtures::user(&db, "owner");
        let video = fixtures::video(&db, &owner, "clip");

        for i in 0..3 {
            let id = uuid::Uuid::new_v4().to_string();
            db.insert_comment(&id, &video, &owner, &format!("comment {}", i)).unwrap();
        }

        let (rows, total) = db.list_comments(&video, 0, 2).unwrap();
        assert_eq!(total, 3);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].comment.content, "comment 2");
        assert_eq!(rows[0].owner_details.username, "owner");
        assert_eq!(rows[0].likes_count, 0);
    }

    #[test]
    fn edit_and_delete_comment() {
        let db = Database::open_in_memory().unwrap();
        let owner = fixtures::user(&db, "owner");
        let video = fixtures::video(&db, &owner, "clip");
        let id = uuid::Uuid::new_v4().to_string();
        db.insert_comment(&id, &video, &owner, "first").unwrap();

        let edited = db.update_comment(&id, "edited").unwrap().unwrap();
        assert_eq!(edited.content, "edited");

        assert!(db.delete_comment(&id).unwrap());
        assert!(db.get_comment(&id).unwrap().is_none());
    }
}

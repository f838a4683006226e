use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

use vidtube_types::models::{CommunityPost, CommunityPostWithStats};

use crate::Database;
use crate::models::{OWNER_COLUMNS, read_owner, read_post};

const POST_COLUMNS: &str = "p.id, p.owner_id, p.content, p.images, p.created_at, p.updated_at";

impl Database {
    pub fn insert_post(
        &self,
        id: &str,
        owner_id: &str,
        content: &str,
        images: &[String],
    ) -> Result<CommunityPost> {
        let images = serde_json::to_string(images)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO community_posts (id, owner_id, content, images) VALUES (?1, ?2, ?3, ?4)",
                (id, owner_id, content, &images),
            )?;
            query_post(conn, id)?.ok_or_else(|| anyhow::anyhow!("Post {} vanished after insert", id))
        })
    }

    pub fn get_post(&self, id: &str) -> Result<Option<CommunityPost>> {
        self.with_conn(|conn| query_post(conn, id))
    }

    /// A user's posts, newest first, with owner and like count.
    pub fn list_user_posts(&self, owner_id: &str) -> Result<Vec<CommunityPostWithStats>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {}, {}, (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id)
                 FROM community_posts p
                 JOIN users u ON u.id = p.owner_id
                 WHERE p.owner_id = ?1
                 ORDER BY p.created_at DESC, p.rowid DESC",
                POST_COLUMNS, OWNER_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([owner_id], |row| {
                    Ok(CommunityPostWithStats {
                        post: read_post(row, 0)?,
                        owner_details: read_owner(row, 6)?,
                        likes_count: row.get(10)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_post(&self, id: &str, content: &str) -> Result<Option<CommunityPost>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE community_posts
                 SET content = ?2, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                (id, content),
            )?;
            query_post(conn, id)
        })
    }

    /// Deletes a post and, by cascade, its likes.
    pub fn delete_post(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM community_posts WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }
}

fn query_post(conn: &Connection, id: &str) -> Result<Option<CommunityPost>> {
    let sql = format!("SELECT {} FROM community_posts p WHERE p.id = ?1", POST_COLUMNS);
    let post = conn.query_row(&sql, [id], |row| read_post(row, 0)).optional()?;
    Ok(post)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LikeTarget;
    use crate::queries::fixtures;

    #[test]
    fn posts_round_trip_images_and_likes() {
        let db = Database::open_in_memory().unwrap();
        let owner = fixtures::user(&db, "owner");
        let id = uuid::Uuid::new_v4().to_string();
        let images = vec!["http://media/1.png".to_string(), "http://media/2.png".to_string()];

        let post = db.insert_post(&id, &owner, "hello", &images).unwrap();
        assert_eq!(post.images, images);

        let like_id = uuid::Uuid::new_v4().to_string();
        db.toggle_like(&like_id, LikeTarget::Post(&id), &owner).unwrap();

        let listed = db.list_user_posts(&owner).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].likes_count, 1);
        assert_eq!(listed[0].owner_details.username, "owner");

        let updated = db.update_post(&id, "edited").unwrap().unwrap();
        assert_eq!(updated.content, "edited");

        assert!(db.delete_post(&id).unwrap());
        assert_eq!(db.count_likes(LikeTarget::Post(&id)).unwrap(), 0);
    }
}

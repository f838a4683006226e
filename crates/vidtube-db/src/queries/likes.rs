use anyhow::Result;
use rusqlite::OptionalExtension;

use vidtube_types::models::VideoWithOwner;

use crate::Database;
use crate::models::{OWNER_COLUMNS, VIDEO_COLUMNS, read_video_with_owner};

/// The polymorphic target of a like.
#[derive(Debug, Clone, Copy)]
pub enum LikeTarget<'a> {
    Video(&'a str),
    Comment(&'a str),
    Post(&'a str),
}

impl<'a> LikeTarget<'a> {
    fn column(&self) -> &'static str {
        match self {
            Self::Video(_) => "video_id",
            Self::Comment(_) => "comment_id",
            Self::Post(_) => "post_id",
        }
    }

    fn id(&self) -> &'a str {
        match *self {
            Self::Video(id) | Self::Comment(id) | Self::Post(id) => id,
        }
    }
}

impl Database {
    /// Toggle a like: removes it if present, inserts it if not.
    /// Returns `true` when the like now exists.
    pub fn toggle_like(&self, like_id: &str, target: LikeTarget<'_>, user_id: &str) -> Result<bool> {
        let column = target.column();
        self.with_tx(|tx| {
            let existing: Option<String> = tx
                .query_row(
                    &format!("SELECT id FROM likes WHERE {} = ?1 AND liked_by = ?2", column),
                    (target.id(), user_id),
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(existing_id) = existing {
                tx.execute("DELETE FROM likes WHERE id = ?1", [&existing_id])?;
                Ok(false)
            } else {
                tx.execute(
                    &format!("INSERT INTO likes (id, {}, liked_by) VALUES (?1, ?2, ?3)", column),
                    (like_id, target.id(), user_id),
                )?;
                Ok(true)
            }
        })
    }

    #[cfg(test)]
    pub(crate) fn count_likes(&self, target: LikeTarget<'_>) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                &format!("SELECT COUNT(*) FROM likes WHERE {} = ?1", target.column()),
                [target.id()],
                |r| r.get(0),
            )?;
            Ok(count)
        })
    }

    /// Published videos a user liked, most recent like first. The user's own
    /// unpublished videos are included.
    pub fn list_liked_videos(&self, user_id: &str) -> Result<Vec<VideoWithOwner>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {}, {}
                 FROM likes l
                 JOIN videos v ON v.id = l.video_id
                 JOIN users u ON u.id = v.owner_id
                 WHERE l.liked_by = ?1 AND (v.is_published = 1 OR v.owner_id = ?1)
                 ORDER BY l.created_at DESC, l.rowid DESC",
                VIDEO_COLUMNS, OWNER_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], read_video_with_owner)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures;

    fn new_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    #[test]
    fn toggling_twice_removes_the_like() {
        let db = Database::open_in_memory().unwrap();
        let owner = fixtures::user(&db, "owner");
        let fan = fixtures::user(&db, "fan");
        let video = fixtures::video(&db, &owner, "clip");

        assert!(db.toggle_like(&new_id(), LikeTarget::Video(&video), &fan).unwrap());
        assert_eq!(db.count_likes(LikeTarget::Video(&video)).unwrap(), 1);
        assert_eq!(db.list_liked_videos(&fan).unwrap().len(), 1);

        assert!(!db.toggle_like(&new_id(), LikeTarget::Video(&video), &fan).unwrap());
        assert_eq!(db.count_likes(LikeTarget::Video(&video)).unwrap(), 0);
        assert!(db.list_liked_videos(&fan).unwrap().is_empty());
    }

    #[test]
    fn comment_likes_vanish_with_the_comment() {
        let db = Database::open_in_memory().unwrap();
        let owner = fixtures::user(&db, "owner");
        let video = fixtures::video(&db, &owner, "clip");
        let comment = new_id();
        db.insert_comment(&comment, &video, &owner, "nice").unwrap();

        db.toggle_like(&new_id(), LikeTarget::Comment(&comment), &owner).unwrap();
        assert_eq!(db.count_likes(LikeTarget::Comment(&comment)).unwrap(), 1);

        db.delete_video(&video).unwrap();
        assert_eq!(db.count_likes(LikeTarget::Comment(&comment)).unwrap(), 0);
    }
}

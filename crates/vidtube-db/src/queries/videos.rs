use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

use vidtube_types::models::{Video, VideoDetails, VideoWithOwner};

use crate::Database;
use crate::models::{
    NewVideo, OWNER_COLUMNS, VIDEO_COLUMN_COUNT, VIDEO_COLUMNS, read_owner, read_video,
    read_video_with_owner,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VideoSort {
    #[default]
    CreatedAt,
    Views,
    Duration,
    Title,
}

impl VideoSort {
    /// Maps the public `sortBy` names; unknown names yield `None`.
    pub fn from_param(param: &str) -> Option<Self> {
        match param {
            "createdAt" => Some(Self::CreatedAt),
            "views" => Some(Self::Views),
            "duration" => Some(Self::Duration),
            "title" => Some(Self::Title),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "v.created_at",
            Self::Views => "v.views",
            Self::Duration => "v.duration",
            Self::Title => "v.title",
        }
    }
}

/// Filter for the public video listing.
#[derive(Debug, Clone, Default)]
pub struct VideoFilter {
    pub search: Option<String>,
    pub owner_id: Option<String>,
    pub sort: VideoSort,
    pub descending: bool,
    pub offset: u32,
    pub limit: u32,
}

impl Database {
    pub fn insert_video(&self, video: &NewVideo<'_>) -> Result<Video> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO videos (id, owner_id, video_file, thumbnail, title, description, duration)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    video.id,
                    video.owner_id,
                    video.video_file,
                    video.thumbnail,
                    video.title,
                    video.description,
                    video.duration,
                ],
            )?;
            query_video(conn, video.id)?
                .ok_or_else(|| anyhow::anyhow!("Video {} vanished after insert", video.id))
        })
    }

    pub fn get_video(&self, id: &str) -> Result<Option<Video>> {
        self.with_conn(|conn| query_video(conn, id))
    }

    /// Video joined with its owner, like count and whether `viewer_id` liked it.
    pub fn get_video_details(&self, id: &str, viewer_id: &str) -> Result<Option<VideoDetails>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {}, {},
                    (SELECT COUNT(*) FROM likes l WHERE l.video_id = v.id),
                    EXISTS (SELECT 1 FROM likes l WHERE l.video_id = v.id AND l.liked_by = ?2)
                 FROM videos v
                 JOIN users u ON u.id = v.owner_id
                 WHERE v.id = ?1",
                VIDEO_COLUMNS, OWNER_COLUMNS
            );
            let details = conn
                .query_row(&sql, (id, viewer_id), |row| {
                    let at = VIDEO_COLUMN_COUNT + crate::models::OWNER_COLUMN_COUNT;
                    Ok(VideoDetails {
                        video: read_video(row, 0)?,
                        owner_details: read_owner(row, VIDEO_COLUMN_COUNT)?,
                        likes_count: row.get(at)?,
                        is_liked: row.get(at + 1)?,
                    })
                })
                .optional()?;
            Ok(details)
        })
    }

    /// Published videos matching `filter`, plus the total match count.
    pub fn list_published_videos(&self, filter: &VideoFilter) -> Result<(Vec<VideoWithOwner>, u64)> {
        let pattern = filter
            .search
            .as_deref()
            .map(|s| format!("%{}%", escape_like(s)));

        self.with_conn(|conn| {
            let where_clause = "WHERE v.is_published = 1
                   AND (?1 IS NULL OR v.title LIKE ?1 ESCAPE '\\' OR v.description LIKE ?1 ESCAPE '\\')
                   AND (?2 IS NULL OR v.owner_id = ?2)";

            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM videos v {}", where_clause),
                (pattern.as_deref(), filter.owner_id.as_deref()),
                |r| r.get(0),
            )?;

            let direction = if filter.descending { "DESC" } else { "ASC" };
            let sql = format!(
                "SELECT {}, {}
                 FROM videos v
                 JOIN users u ON u.id = v.owner_id
                 {}
                 ORDER BY {} {}, v.rowid {}
                 LIMIT ?3 OFFSET ?4",
                VIDEO_COLUMNS,
                OWNER_COLUMNS,
                where_clause,
                filter.sort.column(),
                direction,
                direction
            );
            let mut stmt = conn.prepare(&sql)?;
            let docs = stmt
                .query_map(
                    rusqlite::params![
                        pattern.as_deref(),
                        filter.owner_id.as_deref(),
                        filter.limit,
                        filter.offset
                    ],
                    read_video_with_owner,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((docs, total as u64))
        })
    }

    /// Every video of a channel, unpublished included, newest first.
    pub fn list_channel_videos(&self, owner_id: &str) -> Result<Vec<Video>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM videos v WHERE v.owner_id = ?1 ORDER BY v.created_at DESC, v.rowid DESC",
                VIDEO_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([owner_id], |row| read_video(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Counts a view and moves the video to the front of the viewer's history.
    pub fn record_view(&self, video_id: &str, viewer_id: &str) -> Result<()> {
        self.with_tx(|tx| {
            tx.execute("UPDATE videos SET views = views + 1 WHERE id = ?1", [video_id])?;
            tx.execute(
                "DELETE FROM watch_history WHERE user_id = ?1 AND video_id = ?2",
                (viewer_id, video_id),
            )?;
            tx.execute(
                "INSERT INTO watch_history (user_id, video_id) VALUES (?1, ?2)",
                (viewer_id, video_id),
            )?;
            Ok(())
        })
    }

    pub fn update_video(
        &self,
        id: &str,
        title: &str,
        description: &str,
        thumbnail: &str,
    ) -> Result<Option<Video>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE videos
                 SET title = ?2, description = ?3, thumbnail = ?4,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                (id, title, description, thumbnail),
            )?;
            query_video(conn, id)
        })
    }

    /// Flips the publish flag, returning the new value.
    pub fn toggle_publish(&self, id: &str) -> Result<Option<bool>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE videos
                 SET is_published = NOT is_published,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                [id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            let published: bool =
                conn.query_row("SELECT is_published FROM videos WHERE id = ?1", [id], |r| r.get(0))?;
            Ok(Some(published))
        })
    }

    /// Deletes a video; comments, likes, playlist entries and history
    /// entries go with it through foreign-key cascades.
    pub fn delete_video(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM videos WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }

    /// Watch history aggregation: most recently watched first, each video
    /// joined with its owner.
    pub fn get_watch_history(&self, user_id: &str) -> Result<Vec<VideoWithOwner>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {}, {}
                 FROM watch_history h
                 JOIN videos v ON v.id = h.video_id
                 JOIN users u ON u.id = v.owner_id
                 WHERE h.user_id = ?1 AND (v.is_published = 1 OR v.owner_id = ?1)
                 ORDER BY h.rowid DESC",
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

fn query_video(conn: &Connection, id: &str) -> Result<Option<Video>> {
    let sql = format!("SELECT {} FROM videos v WHERE v.id = ?1", VIDEO_COLUMNS);
    let video = conn.query_row(&sql, [id], |row| read_video(row, 0)).optional()?;
    Ok(video)
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures;

    #[test]
    fn listing_filters_searches_and_pages() {
        let db = Database::open_in_memory().unwrap();
        let alice = fixtures::user(&db, "alice");
        let bob = fixtures::user(&db, "bob");
        fixtures::video(&db, &alice, "Rust ownership");
        fixtures::video(&db, &alice, "Cooking pasta");
        let hidden = fixtures::video(&db, &bob, "Rust lifetimes");
        db.toggle_publish(&hidden).unwrap();

        let (docs, total) = db
            .list_published_videos(&VideoFilter {
                limit: 10,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(docs.len(), 2);

        let (docs, total) = db
            .list_published_videos(&VideoFilter {
                search: Some("rust".into()),
                limit: 10,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(docs[0].video.title, "Rust ownership");
        assert_eq!(docs[0].owner_details.username, "alice");

        let (docs, total) = db
            .list_published_videos(&VideoFilter {
                owner_id: Some(alice.clone()),
                sort: VideoSort::Title,
                limit: 1,
                offset: 1,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].video.title, "Rust ownership");
    }

    #[test]
    fn like_wildcards_are_literal() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn views_and_history_are_recorded() {
        let db = Database::open_in_memory().unwrap();
        let owner = fixtures::user(&db, "owner");
        let viewer = fixtures::user(&db, "viewer");
        let first = fixtures::video(&db, &owner, "first");
        let second = fixtures::video(&db, &owner, "second");

        db.record_view(&first, &viewer).unwrap();
        db.record_view(&second, &viewer).unwrap();
        db.record_view(&first, &viewer).unwrap();

        let history = db.get_watch_history(&viewer).unwrap();
        let titles: Vec<_> = history.iter().map(|v| v.video.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second"]);
        assert_eq!(history[0].video.views, 2);
        assert_eq!(history[0].owner_details.username, "owner");
    }

    #[test]
    fn unpublished_videos_leave_other_viewers_history() {
        let db = Database::open_in_memory().unwrap();
        let owner = fixtures::user(&db, "owner");
        let viewer = fixtures::user(&db, "viewer");
        let id = fixtures::video(&db, &owner, "draft");

        db.record_view(&id, &viewer).unwrap();
        db.record_view(&id, &owner).unwrap();
        db.toggle_publish(&id).unwrap();

        assert!(db.get_watch_history(&viewer).unwrap().is_empty());
        assert_eq!(db.get_watch_history(&owner).unwrap().len(), 1);

        db.toggle_publish(&id).unwrap();
        assert_eq!(db.get_watch_history(&viewer).unwrap().len(), 1);
    }

    #[test]
    fn toggle_and_delete() {
        let db = Database::open_in_memory().unwrap();
        let owner = fixtures::user(&db, "owner");
        let id = fixtures::video(&db, &owner, "clip");

        assert_eq!(db.toggle_publish(&id).unwrap(), Some(false));
        assert_eq!(db.toggle_publish(&id).unwrap(), Some(true));
        assert_eq!(db.toggle_publish("missing").unwrap(), None);

        db.record_view(&id, &owner).unwrap();
        assert!(db.delete_video(&id).unwrap());
        assert!(db.get_video(&id).unwrap().is_none());
        assert!(db.get_watch_history(&owner).unwrap().is_empty());
        assert!(!db.delete_video(&id).unwrap());
    }
}

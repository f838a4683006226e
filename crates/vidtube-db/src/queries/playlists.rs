use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

use vidtube_types::models::{Playlist, VideoWithOwner};

use crate::Database;
use crate::models::{OWNER_COLUMNS, VIDEO_COLUMNS, read_playlist, read_video_with_owner};

const PLAYLIST_COLUMNS: &str = "p.id, p.name, p.description, p.owner_id,
    (SELECT COUNT(*) FROM playlist_videos pv WHERE pv.playlist_id = p.id),
    p.created_at, p.updated_at";

impl Database {
    pub fn create_playlist(
        &self,
        id: &str,
        owner_id: &str,
        name: &str,
        description: &str,
    ) -> Result<Playlist> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO playlists (id, owner_id, name, description) VALUES (?1, ?2, ?3, ?4)",
                (id, owner_id, name, description),
            )?;
            query_playlist(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("Playlist {} vanished after insert", id))
        })
    }

    pub fn get_playlist(&self, id: &str) -> Result<Option<Playlist>> {
        self.with_conn(|conn| query_playlist(conn, id))
    }

    pub fn list_user_playlists(&self, owner_id: &str) -> Result<Vec<Playlist>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM playlists p WHERE p.owner_id = ?1 ORDER BY p.created_at DESC, p.rowid DESC",
                PLAYLIST_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([owner_id], |row| read_playlist(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Videos in insertion order. Unpublished videos only show up for their owner.
    pub fn list_playlist_videos(&self, playlist_id: &str, viewer_id: &str) -> Result<Vec<VideoWithOwner>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {}, {}
                 FROM playlist_videos pv
                 JOIN videos v ON v.id = pv.video_id
                 JOIN users u ON u.id = v.owner_id
                 WHERE pv.playlist_id = ?1 AND (v.is_published = 1 OR v.owner_id = ?2)
                 ORDER BY pv.rowid ASC",
                VIDEO_COLUMNS, OWNER_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map((playlist_id, viewer_id), read_video_with_owner)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_playlist(&self, id: &str, name: &str, description: &str) -> Result<Option<Playlist>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE playlists
                 SET name = ?2, description = ?3, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                (id, name, description),
            )?;
            query_playlist(conn, id)
        })
    }

    pub fn delete_playlist(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM playlists WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }

    /// Idempotent: adding a video already in the playlist is a no-op.
    pub fn add_video_to_playlist(&self, playlist_id: &str, video_id: &str) -> Result<Option<Playlist>> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO playlist_videos (playlist_id, video_id) VALUES (?1, ?2)",
                (playlist_id, video_id),
            )?;
            touch_playlist(conn, playlist_id)?;
            query_playlist(conn, playlist_id)
        })
    }

    pub fn remove_video_from_playlist(
        &self,
        playlist_id: &str,
        video_id: &str,
    ) -> Result<Option<Playlist>> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM playlist_videos WHERE playlist_id = ?1 AND video_id = ?2",
                (playlist_id, video_id),
            )?;
            touch_playlist(conn, playlist_id)?;
            query_playlist(conn, playlist_id)
        })
    }
}

fn touch_playlist(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(
        "UPDATE playlists SET updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?1",
        [id],
    )?;
    Ok(())
}

fn query_playlist(conn: &Connection, id: &str) -> Result<Option<Playlist>> {
    let sql = format!("SELECT {} FROM playlists p WHERE p.id = ?1", PLAYLIST_COLUMNS);
    let playlist = conn.query_row(&sql, [id], |row| read_playlist(row, 0)).optional()?;
    Ok(playlist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures;

    #[test]
    fn playlist_keeps_insertion_order_and_dedupes() {
        let db = Database::open_in_memory().unwrap();
        let owner = fixtures::user(&db, "owner");
        let first = fixtures::video(&db, &owner, "first");
        let second = fixtures::video(&db, &owner, "second");
        let id = uuid::Uuid::new_v4().to_string();
        db.create_playlist(&id, &owner, "mix", "").unwrap();

        db.add_video_to_playlist(&id, &second).unwrap();
        db.add_video_to_playlist(&id, &first).unwrap();
        let playlist = db.add_video_to_playlist(&id, &second).unwrap().unwrap();
        assert_eq!(playlist.total_videos, 2);

        let videos = db.list_playlist_videos(&id, &owner).unwrap();
        let titles: Vec<_> = videos.iter().map(|v| v.video.title.as_str()).collect();
        assert_eq!(titles, vec!["second", "first"]);

        let playlist = db.remove_video_from_playlist(&id, &second).unwrap().unwrap();
        assert_eq!(playlist.total_videos, 1);
    }

    #[test]
    fn unpublished_videos_hidden_from_other_viewers() {
        let db = Database::open_in_memory().unwrap();
        let owner = fixtures::user(&db, "owner");
        let guest = fixtures::user(&db, "guest");
        let video = fixtures::video(&db, &owner, "draft");
        db.toggle_publish(&video).unwrap();

        let id = uuid::Uuid::new_v4().to_string();
        db.create_playlist(&id, &owner, "drafts", "wip").unwrap();
        db.add_video_to_playlist(&id, &video).unwrap();

        assert_eq!(db.list_playlist_videos(&id, &owner).unwrap().len(), 1);
        assert!(db.list_playlist_videos(&id, &guest).unwrap().is_empty());
        assert_eq!(db.list_user_playlists(&owner).unwrap().len(), 1);

        assert!(db.delete_playlist(&id).unwrap());
        assert!(db.get_playlist(&id).unwrap().is_none());
    }
}

use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                username        TEXT NOT NULL UNIQUE,
                email           TEXT NOT NULL UNIQUE,
                fullname        TEXT NOT NULL,
                password        TEXT NOT NULL,
                avatar          TEXT NOT NULL,
                cover_image     TEXT NOT NULL DEFAULT '',
                refresh_token   TEXT,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_users_fullname ON users(fullname);

            CREATE TABLE videos (
                id              TEXT PRIMARY KEY,
                video_file      TEXT NOT NULL,
                thumbnail       TEXT NOT NULL,
                owner_id        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title           TEXT NOT NULL,
                description     TEXT NOT NULL,
                duration        REAL NOT NULL DEFAULT 0,
                views           INTEGER NOT NULL DEFAULT 0,
                is_published    INTEGER NOT NULL DEFAULT 1,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_videos_owner ON videos(owner_id, created_at);
            CREATE INDEX idx_videos_title ON videos(title);

            -- rowid order is watch order; re-watching deletes and re-inserts
            CREATE TABLE watch_history (
                user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                video_id        TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
                watched_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                PRIMARY KEY (user_id, video_id)
            );

            CREATE TABLE comments (
                id              TEXT PRIMARY KEY,
                content         TEXT NOT NULL,
                video_id        TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
                owner_id        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_comments_video ON comments(video_id, created_at);

            CREATE TABLE community_posts (
                id              TEXT PRIMARY KEY,
                owner_id        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                content         TEXT NOT NULL,
                images          TEXT NOT NULL DEFAULT '[]',
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_posts_owner ON community_posts(owner_id, created_at);

            CREATE TABLE likes (
                id              TEXT PRIMARY KEY,
                video_id        TEXT REFERENCES videos(id) ON DELETE CASCADE,
                comment_id      TEXT REFERENCES comments(id) ON DELETE CASCADE,
                post_id         TEXT REFERENCES community_posts(id) ON DELETE CASCADE,
                liked_by        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                CHECK ((video_id IS NOT NULL) + (comment_id IS NOT NULL) + (post_id IS NOT NULL) = 1)
            );

            CREATE UNIQUE INDEX idx_likes_video ON likes(video_id, liked_by) WHERE video_id IS NOT NULL;
            CREATE UNIQUE INDEX idx_likes_comment ON likes(comment_id, liked_by) WHERE comment_id IS NOT NULL;
            CREATE UNIQUE INDEX idx_likes_post ON likes(post_id, liked_by) WHERE post_id IS NOT NULL;

            CREATE TABLE playlists (
                id              TEXT PRIMARY KEY,
                name            TEXT NOT NULL,
                description     TEXT NOT NULL DEFAULT '',
                owner_id        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_playlists_owner ON playlists(owner_id);

            CREATE TABLE playlist_videos (
                playlist_id     TEXT NOT NULL REFERENCES playlists(id) ON DELETE CASCADE,
                video_id        TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
                added_at        TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                PRIMARY KEY (playlist_id, video_id)
            );

            CREATE TABLE subscriptions (
                id              TEXT PRIMARY KEY,
                subscriber_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                channel_id      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                UNIQUE (subscriber_id, channel_id),
                CHECK (subscriber_id != channel_id)
            );

            CREATE INDEX idx_subscriptions_channel ON subscriptions(channel_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }
}

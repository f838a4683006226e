//! Database row types and column readers.
//!
//! `UserRow` stays distinct from the API `User` because it carries the
//! password hash and the stored refresh token. Everything else is read
//! straight into the shared API models through the helpers below.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use uuid::Uuid;

use vidtube_types::models::{
    Comment, CommunityPost, OwnerSummary, Playlist, User, Video, VideoWithOwner,
};

/// Column list matching [`read_video`], for tables aliased as `v`.
pub const VIDEO_COLUMNS: &str = "v.id, v.video_file, v.thumbnail, v.owner_id, v.title, \
     v.description, v.duration, v.views, v.is_published, v.created_at, v.updated_at";
pub const VIDEO_COLUMN_COUNT: usize = 11;

/// Column list matching [`read_owner`], for tables aliased as `u`.
pub const OWNER_COLUMNS: &str = "u.id, u.username, u.fullname, u.avatar";
pub const OWNER_COLUMN_COUNT: usize = 4;

pub const USER_COLUMNS: &str = "id, username, email, fullname, password, avatar, cover_image, \
     refresh_token, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub password: String,
    pub avatar: String,
    pub cover_image: String,
    pub refresh_token: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl UserRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            fullname: row.get(3)?,
            password: row.get(4)?,
            avatar: row.get(5)?,
            cover_image: row.get(6)?,
            refresh_token: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    /// Public view of the row, without credentials.
    pub fn to_user(&self) -> anyhow::Result<User> {
        Ok(User {
            id: self.id.parse()?,
            username: self.username.clone(),
            email: self.email.clone(),
            fullname: self.fullname.clone(),
            avatar: self.avatar.clone(),
            cover_image: self.cover_image.clone(),
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

pub struct NewUser<'a> {
    pub id: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub fullname: &'a str,
    pub password_hash: &'a str,
    pub avatar: &'a str,
    pub cover_image: &'a str,
}

pub struct NewVideo<'a> {
    pub id: &'a str,
    pub owner_id: &'a str,
    pub video_file: &'a str,
    pub thumbnail: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub duration: f64,
}

/// Parses timestamps written by SQLite. New rows use RFC 3339 with
/// milliseconds; plain `datetime('now')` output is accepted as naive UTC.
pub fn parse_timestamp(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| anyhow::anyhow!("Corrupt timestamp '{}': {}", raw, e))
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub(crate) fn get_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

pub(crate) fn get_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw)
        .map_err(|e| conversion_error(idx, std::io::Error::other(e.to_string())))
}

pub(crate) fn read_video(row: &Row<'_>, at: usize) -> rusqlite::Result<Video> {
    Ok(Video {
        id: get_uuid(row, at)?,
        video_file: row.get(at + 1)?,
        thumbnail: row.get(at + 2)?,
        owner: get_uuid(row, at + 3)?,
        title: row.get(at + 4)?,
        description: row.get(at + 5)?,
        duration: row.get(at + 6)?,
        views: row.get(at + 7)?,
        is_published: row.get(at + 8)?,
        created_at: get_timestamp(row, at + 9)?,
        updated_at: get_timestamp(row, at + 10)?,
    })
}

pub(crate) fn read_owner(row: &Row<'_>, at: usize) -> rusqlite::Result<OwnerSummary> {
    Ok(OwnerSummary {
        id: get_uuid(row, at)?,
        username: row.get(at + 1)?,
        fullname: row.get(at + 2)?,
        avatar: row.get(at + 3)?,
    })
}

/// Reads `VIDEO_COLUMNS, OWNER_COLUMNS` starting at column 0.
pub(crate) fn read_video_with_owner(row: &Row<'_>) -> rusqlite::Result<VideoWithOwner> {
    Ok(VideoWithOwner {
        video: read_video(row, 0)?,
        owner_details: read_owner(row, VIDEO_COLUMN_COUNT)?,
    })
}

pub(crate) fn read_comment(row: &Row<'_>, at: usize) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: get_uuid(row, at)?,
        content: row.get(at + 1)?,
        video: get_uuid(row, at + 2)?,
        owner: get_uuid(row, at + 3)?,
        created_at: get_timestamp(row, at + 4)?,
        updated_at: get_timestamp(row, at + 5)?,
    })
}

pub(crate) fn read_playlist(row: &Row<'_>, at: usize) -> rusqlite::Result<Playlist> {
    Ok(Playlist {
        id: get_uuid(row, at)?,
        name: row.get(at + 1)?,
        description: row.get(at + 2)?,
        owner: get_uuid(row, at + 3)?,
        total_videos: row.get(at + 4)?,
        created_at: get_timestamp(row, at + 5)?,
        updated_at: get_timestamp(row, at + 6)?,
    })
}

pub(crate) fn read_post(row: &Row<'_>, at: usize) -> rusqlite::Result<CommunityPost> {
    let images: String = row.get(at + 3)?;
    Ok(CommunityPost {
        id: get_uuid(row, at)?,
        owner: get_uuid(row, at + 1)?,
        content: row.get(at + 2)?,
        images: serde_json::from_str(&images).map_err(|e| conversion_error(at + 3, e))?,
        created_at: get_timestamp(row, at + 4)?,
        updated_at: get_timestamp(row, at + 5)?,
    })
}

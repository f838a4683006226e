use anyhow::Result;
use rusqlite::OptionalExtension;

use vidtube_types::models::{ChannelProfile, ChannelStats, SubscriptionEntry};

use crate::Database;
use crate::models::{OWNER_COLUMNS, get_timestamp, get_uuid, read_owner};

impl Database {
    /// Toggle a subscription edge. Returns `true` when now subscribed.
    pub fn toggle_subscription(&self, id: &str, subscriber_id: &str, channel_id: &str) -> Result<bool> {
        self.with_tx(|tx| {
            let removed = tx.execute(
                "DELETE FROM subscriptions WHERE subscriber_id = ?1 AND channel_id = ?2",
                (subscriber_id, channel_id),
            )?;
            if removed > 0 {
                return Ok(false);
            }
            tx.execute(
                "INSERT INTO subscriptions (id, subscriber_id, channel_id) VALUES (?1, ?2, ?3)",
                (id, subscriber_id, channel_id),
            )?;
            Ok(true)
        })
    }

    /// Users subscribed to `channel_id`, newest first.
    pub fn list_subscribers(&self, channel_id: &str) -> Result<Vec<SubscriptionEntry>> {
        self.list_subscription_edges("s.subscriber_id", "s.channel_id", channel_id)
    }

    /// Channels `subscriber_id` is subscribed to, newest first.
    pub fn list_subscribed_channels(&self, subscriber_id: &str) -> Result<Vec<SubscriptionEntry>> {
        self.list_subscription_edges("s.channel_id", "s.subscriber_id", subscriber_id)
    }

    fn list_subscription_edges(
        &self,
        join_column: &str,
        filter_column: &str,
        id: &str,
    ) -> Result<Vec<SubscriptionEntry>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {}, s.created_at
                 FROM subscriptions s
                 JOIN users u ON u.id = {}
                 WHERE {} = ?1
                 ORDER BY s.created_at DESC, s.rowid DESC",
                OWNER_COLUMNS, join_column, filter_column
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([id], |row| {
                    Ok(SubscriptionEntry {
                        user: read_owner(row, 0)?,
                        subscribed_at: get_timestamp(row, 4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Channel profile aggregation: the user behind `username` joined with
    /// subscriber counts and whether `viewer_id` subscribes to them.
    pub fn get_channel_profile(&self, username: &str, viewer_id: &str) -> Result<Option<ChannelProfile>> {
        self.with_conn(|conn| {
            let profile = conn
                .query_row(
                    "SELECT u.id, u.fullname, u.username, u.email, u.avatar, u.cover_image,
                        (SELECT COUNT(*) FROM subscriptions s WHERE s.channel_id = u.id),
                        (SELECT COUNT(*) FROM subscriptions s WHERE s.subscriber_id = u.id),
                        EXISTS (SELECT 1 FROM subscriptions s
                                WHERE s.channel_id = u.id AND s.subscriber_id = ?2)
                     FROM users u
                     WHERE u.username = ?1",
                    (username, viewer_id),
                    |row| {
                        Ok(ChannelProfile {
                            id: get_uuid(row, 0)?,
                            fullname: row.get(1)?,
                            username: row.get(2)?,
                            email: row.get(3)?,
                            avatar: row.get(4)?,
                            cover_image: row.get(5)?,
                            subscribers_count: row.get(6)?,
                            channels_subscribed_to_count: row.get(7)?,
                            is_subscribed: row.get(8)?,
                        })
                    },
                )
                .optional()?;
            Ok(profile)
        })
    }

    /// Totals for a creator's dashboard.
    pub fn get_channel_stats(&self, owner_id: &str) -> Result<ChannelStats> {
        self.with_conn(|conn| {
            let stats = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM videos WHERE owner_id = ?1),
                    (SELECT COALESCE(SUM(views), 0) FROM videos WHERE owner_id = ?1),
                    (SELECT COUNT(*) FROM subscriptions WHERE channel_id = ?1),
                    (SELECT COUNT(*) FROM likes l JOIN videos v ON v.id = l.video_id
                     WHERE v.owner_id = ?1)",
                [owner_id],
                |row| {
                    Ok(ChannelStats {
                        total_videos: row.get(0)?,
                        total_views: row.get(1)?,
                        total_subscribers: row.get(2)?,
                        total_likes: row.get(3)?,
                    })
                },
            )?;
            Ok(stats)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LikeTarget;
    use crate::queries::fixtures;

    fn new_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    #[test]
    fn profile_counts_follow_subscriptions() {
        let db = Database::open_in_memory().unwrap();
        let creator = fixtures::user(&db, "creator");
        let fan = fixtures::user(&db, "fan");
        let other = fixtures::user(&db, "other");

        assert!(db.toggle_subscription(&new_id(), &fan, &creator).unwrap());
        assert!(db.toggle_subscription(&new_id(), &other, &creator).unwrap());
        assert!(db.toggle_subscription(&new_id(), &creator, &fan).unwrap());

        let profile = db.get_channel_profile("creator", &fan).unwrap().unwrap();
        assert_eq!(profile.subscribers_count, 2);
        assert_eq!(profile.channels_subscribed_to_count, 1);
        assert!(profile.is_subscribed);

        let seen_by_self = db.get_channel_profile("creator", &creator).unwrap().unwrap();
        assert!(!seen_by_self.is_subscribed);

        assert!(!db.toggle_subscription(&new_id(), &fan, &creator).unwrap());
        let profile = db.get_channel_profile("creator", &fan).unwrap().unwrap();
        assert_eq!(profile.subscribers_count, 1);
        assert!(!profile.is_subscribed);

        assert!(db.get_channel_profile("nobody", &fan).unwrap().is_none());
    }

    #[test]
    fn subscription_lists_point_both_ways() {
        let db = Database::open_in_memory().unwrap();
        let creator = fixtures::user(&db, "creator");
        let fan = fixtures::user(&db, "fan");
        db.toggle_subscription(&new_id(), &fan, &creator).unwrap();

        let subscribers = db.list_subscribers(&creator).unwrap();
        assert_eq!(subscribers.len(), 1);
        assert_eq!(subscribers[0].user.username, "fan");

        let channels = db.list_subscribed_channels(&fan).unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].user.username, "creator");
    }

    #[test]
    fn self_subscription_violates_constraint() {
        let db = Database::open_in_memory().unwrap();
        let me = fixtures::user(&db, "me");
        assert!(db.toggle_subscription(&new_id(), &me, &me).is_err());
    }

    #[test]
    fn stats_aggregate_views_likes_and_subscribers() {
        let db = Database::open_in_memory().unwrap();
        let creator = fixtures::user(&db, "creator");
        let fan = fixtures::user(&db, "fan");
        let video = fixtures::video(&db, &creator, "clip");
        db.record_view(&video, &fan).unwrap();
        db.record_view(&video, &fan).unwrap();
        db.toggle_like(&new_id(), LikeTarget::Video(&video), &fan).unwrap();
        db.toggle_subscription(&new_id(), &fan, &creator).unwrap();

        let stats = db.get_channel_stats(&creator).unwrap();
        assert_eq!(stats.total_videos, 1);
        assert_eq!(stats.total_views, 2);
        assert_eq!(stats.total_likes, 1);
        assert_eq!(stats.total_subscribers, 1);
    }
}

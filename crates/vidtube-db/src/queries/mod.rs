pub mod channels;
pub mod comments;
pub mod likes;
pub mod playlists;
pub mod posts;
pub mod users;
pub mod videos;

#[cfg(test)]
pub(crate) mod fixtures {
    use uuid::Uuid;

    use crate::Database;
    use crate::models::{NewUser, NewVideo};

    pub fn user(db: &Database, username: &str) -> String {
        let id = Uuid::new_v4().to_string();
        let email = format!("{}@example.com", username);
        db.create_user(&NewUser {
            id: &id,
            username,
            email: &email,
            fullname: username,
            password_hash: "hash",
            avatar: "http://media/avatar.png",
            cover_image: "",
        })
        .unwrap();
        id
    }

    pub fn video(db: &Database, owner_id: &str, title: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.insert_video(&NewVideo {
            id: &id,
            owner_id,
            video_file: "http://media/video.mp4",
            thumbnail: "http://media/thumb.png",
            title,
            description: "a video",
            duration: 12.5,
        })
        .unwrap();
        id
    }
}

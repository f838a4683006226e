use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

use crate::Database;
use crate::models::{NewUser, USER_COLUMNS, UserRow};

impl Database {
    pub fn create_user(&self, user: &NewUser<'_>) -> Result<UserRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, fullname, password, avatar, cover_image)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                (
                    user.id,
                    user.username,
                    user.email,
                    user.fullname,
                    user.password_hash,
                    user.avatar,
                    user.cover_image,
                ),
            )?;
            query_user(conn, "id", user.id)?
                .ok_or_else(|| anyhow::anyhow!("User {} vanished after insert", user.id))
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    /// Login lookup: either identifier may be given.
    pub fn find_user_by_login(
        &self,
        email: Option<&str>,
        username: Option<&str>,
    ) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM users WHERE username = ?1 OR email = ?2 LIMIT 1",
                USER_COLUMNS
            );
            let row = conn
                .query_row(&sql, (username, email), UserRow::from_row)
                .optional()?;
            Ok(row)
        })
    }

    /// Stores (or clears, with `None`) the refresh token for a user.
    pub fn set_refresh_token(&self, id: &str, token: Option<&str>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET refresh_token = ?2 WHERE id = ?1",
                (id, token),
            )?;
            Ok(())
        })
    }

    pub fn update_password(&self, id: &str, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users
                 SET password = ?2, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                (id, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn update_account(&self, id: &str, fullname: &str, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users
                 SET fullname = ?2, email = ?3, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                (id, fullname, email),
            )?;
            query_user(conn, "id", id)
        })
    }

    pub fn update_avatar(&self, id: &str, url: &str) -> Result<Option<UserRow>> {
        self.update_image_column(id, "avatar", url)
    }

    pub fn update_cover_image(&self, id: &str, url: &str) -> Result<Option<UserRow>> {
        self.update_image_column(id, "cover_image", url)
    }

    fn update_image_column(&self, id: &str, column: &str, url: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "UPDATE users
                 SET {} = ?2, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                column
            );
            conn.execute(&sql, (id, url))?;
            query_user(conn, "id", id)
        })
    }
}

/// `column` is always one of the fixed lookup keys above, never user input.
fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column);
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([value], UserRow::from_row).optional()?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures;

    #[test]
    fn create_and_lookup_user() {
        let db = Database::open_in_memory().unwrap();
        let id = fixtures::user(&db, "alice");

        let by_name = db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(by_name.id, id);
        assert_eq!(by_name.cover_image, "");
        assert!(by_name.refresh_token.is_none());

        let by_email = db.get_user_by_email("alice@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, id);

        let by_login = db.find_user_by_login(None, Some("alice")).unwrap().unwrap();
        assert_eq!(by_login.id, id);
        let by_login = db
            .find_user_by_login(Some("alice@example.com"), None)
            .unwrap()
            .unwrap();
        assert_eq!(by_login.id, id);
        assert!(db.find_user_by_login(None, None).unwrap().is_none());
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        fixtures::user(&db, "bob");
        let id = uuid::Uuid::new_v4().to_string();
        let err = db.create_user(&NewUser {
            id: &id,
            username: "bob",
            email: "other@example.com",
            fullname: "Bob",
            password_hash: "hash",
            avatar: "a",
            cover_image: "",
        });
        assert!(crate::is_unique_violation(&err.unwrap_err()));
    }

    #[test]
    fn taking_another_users_email_is_a_unique_violation() {
        let db = Database::open_in_memory().unwrap();
        fixtures::user(&db, "dave");
        let erin = fixtures::user(&db, "erin");

        let err = db.update_account(&erin, "Erin", "dave@example.com").unwrap_err();
        assert!(crate::is_unique_violation(&err));

        assert!(!crate::is_unique_violation(&anyhow::anyhow!("lock poisoned")));
    }

    #[test]
    fn refresh_token_can_be_set_and_cleared() {
        let db = Database::open_in_memory().unwrap();
        let id = fixtures::user(&db, "carol");

        db.set_refresh_token(&id, Some("tok")).unwrap();
        let row = db.get_user_by_id(&id).unwrap().unwrap();
        assert_eq!(row.refresh_token.as_deref(), Some("tok"));

        db.set_refresh_token(&id, None).unwrap();
        let row = db.get_user_by_id(&id).unwrap().unwrap();
        assert!(row.refresh_token.is_none());
    }

    #[test]
    fn profile_updates_return_fresh_row() {
        let db = Database::open_in_memory().unwrap();
        let id = fixtures::user(&db, "dave");

        let row = db.update_account(&id, "Dave D", "dave@new.io").unwrap().unwrap();
        assert_eq!(row.fullname, "Dave D");
        assert_eq!(row.email, "dave@new.io");

        let row = db.update_cover_image(&id, "http://media/cover.png").unwrap().unwrap();
        assert_eq!(row.cover_image, "http://media/cover.png");
        assert!(row.to_user().is_ok());
    }
}

use anyhow::Result;
use serde::Deserialize;

use crate::db::Database;
use crate::model::{User, UserSummary};

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterUser {
    pub user_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// A user row including its credential columns. Never serialized.
#[derive(Debug, Clone)]
pub struct StoredUser {
    pub user: User,
    pub password_hash: Option<String>,
    pub legacy_password: Option<String>,
}

pub struct Accounts<'a> {
    db: &'a Database,
}

impl<'a> Accounts<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<StoredUser>> {
        let query = r#"
            SELECT id, username, email, created_at, password_hash, legacy_password
            FROM users WHERE email = ?
        "#;

        let mut rows = self.db.connection().query(query, libsql::params![email]).await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(StoredUser {
                user: Self::row_to_user(&row)?,
                password_hash: row.get(4)?,
                legacy_password: row.get(5)?,
            }))
        } else {
            Ok(None)
        }
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        let mut rows = self
            .db
            .connection()
            .query("SELECT 1 FROM users WHERE email = ?", libsql::params![email])
            .await?;
        Ok(rows.next().await?.is_some())
    }

    pub async fn create_user(&self, username: &str, email: &str, password_hash: &str) -> Result<User> {
        let query = r#"
            INSERT INTO users (username, email, password_hash)
            VALUES (?, ?, ?)
            RETURNING id, username, email, created_at
        "#;

        let mut rows = self
            .db
            .connection()
            .query(query, libsql::params![username, email, password_hash])
            .await?;

        if let Some(row) = rows.next().await? {
            Self::row_to_user(&row)
        } else {
            anyhow::bail!("Failed to create user")
        }
    }

    /// Creates the admin account unless a user with `email` already exists.
    /// Returns true when an account was created.
    pub async fn ensure_admin(&self, email: &str, password_hash: &str) -> Result<bool> {
        if self.email_exists(email).await? {
            return Ok(false);
        }
        self.create_user("admin", email, password_hash).await?;
        Ok(true)
    }

    /// Lists every account except `admin_email`, with how many shelves each owns.
    pub async fn list_users(&self, admin_email: &str) -> Result<Vec<UserSummary>> {
        let query = r#"
            SELECT u.id, u.username, u.email, COUNT(s.id) AS shelf_count
            FROM users u
            LEFT JOIN custom_shelves s ON s.user_id = u.id
            WHERE u.email != ? COLLATE NOCASE
            GROUP BY u.id, u.username, u.email
            ORDER BY u.id
        "#;

        let mut rows = self
            .db
            .connection()
            .query(query, libsql::params![admin_email])
            .await?;
        let mut users = Vec::new();

        while let Some(row) = rows.next().await? {
            users.push(UserSummary {
                user_id: row.get(0)?,
                user_name: row.get(1)?,
                email: row.get(2)?,
                shelf_count: row.get(3)?,
            });
        }

        Ok(users)
    }

    /// Deletes a user together with their shelves and shelf items.
    pub async fn delete_user(&self, user_id: i64) -> Result<bool> {
        self.db
            .in_transaction(|conn| async move {
                conn.execute(
                    r#"
                    DELETE FROM shelf_items
                    WHERE shelf_id IN (SELECT id FROM custom_shelves WHERE user_id = ?)
                    "#,
                    libsql::params![user_id],
                )
                .await?;
                conn.execute("DELETE FROM custom_shelves WHERE user_id = ?", libsql::params![user_id])
                    .await?;
                let deleted = conn
                    .execute("DELETE FROM users WHERE id = ?", libsql::params![user_id])
                    .await?;
                Ok::<bool, anyhow::Error>(deleted > 0)
            })
            .await
    }

    fn row_to_user(row: &libsql::Row) -> Result<User> {
        Ok(User {
            user_id: row.get(0)?,
            user_name: row.get(1)?,
            email: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_find_by_email() {
        let db = Database::in_memory().await.unwrap();
        let accounts = Accounts::new(&db);

        let user = accounts.create_user("ada", "ada@example.com", "$argon2id$stub").await.unwrap();
        assert_eq!(user.user_name, "ada");

        let stored = accounts.find_by_email("ada@example.com").await.unwrap().unwrap();
        assert_eq!(stored.user.user_id, user.user_id);
        assert_eq!(stored.password_hash.as_deref(), Some("$argon2id$stub"));
        assert!(stored.legacy_password.is_none());
        assert!(accounts.email_exists("ada@example.com").await.unwrap());
        assert!(!accounts.email_exists("bob@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_ensure_admin_creates_once() {
        let db = Database::in_memory().await.unwrap();
        let accounts = Accounts::new(&db);

        assert!(accounts.ensure_admin("admin@gmail.com", "h1").await.unwrap());
        assert!(!accounts.ensure_admin("admin@gmail.com", "h2").await.unwrap());

        let stored = accounts.find_by_email("admin@gmail.com").await.unwrap().unwrap();
        assert_eq!(stored.password_hash.as_deref(), Some("h1"));
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected_by_schema() {
        let db = Database::in_memory().await.unwrap();
        let accounts = Accounts::new(&db);
        accounts.create_user("ada", "ada@example.com", "h").await.unwrap();
        assert!(accounts.create_user("ada2", "ada@example.com", "h").await.is_err());
    }

    #[tokio::test]
    async fn test_list_users_hides_admin_and_counts_shelves() {
        let db = Database::in_memory().await.unwrap();
        let accounts = Accounts::new(&db);
        accounts.create_user("admin", "admin@gmail.com", "h").await.unwrap();
        let ada = accounts.create_user("ada", "ada@example.com", "h").await.unwrap();
        db.connection()
            .execute(
                "INSERT INTO custom_shelves (user_id, name) VALUES (?, 'a'), (?, 'b')",
                libsql::params![ada.user_id, ada.user_id],
            )
            .await
            .unwrap();

        let users = accounts.list_users("admin@gmail.com").await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "ada@example.com");
        assert_eq!(users[0].shelf_count, 2);
    }
}

use anyhow::Result;
use libsql::Value;
use serde::Deserialize;

use crate::api::{nullable, present, truthy};
use crate::catalog::{authors_for, unique_ids};
use crate::db::Database;
use crate::model::{
    DEFAULT_OWNERSHIP_STATUS, ReadingStatus, Shelf, ShelfItem, ShelfItemWithBook,
};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateShelf {
    pub shelf_name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateShelfItem {
    pub book_id: Option<i64>,
    pub reading_status: Option<String>,
    pub ownership_status: Option<String>,
    pub current_page: Option<i64>,
}

/// A validated shelf item insert.
#[derive(Debug, Clone)]
pub struct NewShelfItem {
    pub book_id: i64,
    pub reading_status: ReadingStatus,
    pub ownership_status: String,
    pub current_page: Option<i64>,
}

impl CreateShelfItem {
    pub fn validate(self) -> Result<NewShelfItem, String> {
        let book_id = self.book_id.ok_or_else(|| "Book ID is required".to_string())?;

        let reading_status = match self.reading_status.as_deref().filter(|s| !s.is_empty()) {
            Some(s) => parse_reading_status(s)?,
            None => ReadingStatus::default(),
        };

        if let Some(page) = self.current_page {
            check_page(page)?;
        }

        Ok(NewShelfItem {
            book_id,
            reading_status,
            ownership_status: self
                .ownership_status
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_OWNERSHIP_STATUS.to_string()),
            current_page: self.current_page.filter(|p| *p != 0),
        })
    }
}

/// A sparse update to a shelf item.
///
/// Absent keys are left alone. For the nullable columns an explicit `null`
/// clears the value, and so does an empty date string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShelfItemPatch {
    pub reading_status: Option<String>,
    pub ownership_status: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub current_page: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub user_rating: Option<Option<i64>>,
    #[serde(default, deserialize_with = "present")]
    pub is_favorite: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "nullable")]
    pub start_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub finish_date: Option<Option<String>>,
}

fn parse_reading_status(s: &str) -> Result<ReadingStatus, String> {
    s.parse()
}

fn check_page(page: i64) -> Result<(), String> {
    if page < 0 {
        return Err("current_page must not be negative".to_string());
    }
    Ok(())
}

fn check_rating(rating: i64) -> Result<(), String> {
    if !(1..=5).contains(&rating) {
        return Err("user_rating must be between 1 and 5".to_string());
    }
    Ok(())
}

fn date_value(date: Option<String>) -> Value {
    match date {
        Some(d) if !d.is_empty() => Value::Text(d),
        _ => Value::Null,
    }
}

fn int_value(v: Option<i64>) -> Value {
    v.map_or(Value::Null, Value::Integer)
}

impl ShelfItemPatch {
    /// Column assignments in a fixed order, one per field present in the patch.
    ///
    /// Fails on a value the column cannot hold. An empty list means the patch
    /// names no known field.
    pub fn assignments(self) -> Result<Vec<(&'static str, Value)>, String> {
        let mut updates: Vec<(&'static str, Value)> = Vec::new();

        if let Some(status) = self.reading_status {
            let status = parse_reading_status(&status)?;
            updates.push(("reading_status", Value::Text(status.as_str().to_string())));
        }
        if let Some(ownership) = self.ownership_status {
            updates.push(("ownership_status", Value::Text(ownership)));
        }
        if let Some(page) = self.current_page {
            if let Some(p) = page {
                check_page(p)?;
            }
            updates.push(("current_page", int_value(page)));
        }
        if let Some(rating) = self.user_rating {
            if let Some(r) = rating {
                check_rating(r)?;
            }
            updates.push(("user_rating", int_value(rating)));
        }
        if let Some(favorite) = self.is_favorite {
            updates.push(("is_favorite", Value::Integer(truthy(&favorite) as i64)));
        }
        if let Some(start) = self.start_date {
            updates.push(("start_date", date_value(start)));
        }
        if let Some(finish) = self.finish_date {
            updates.push(("finish_date", date_value(finish)));
        }

        Ok(updates)
    }
}

/// Renders `UPDATE shelf_items SET a = ?, b = ? WHERE id = ?` and its parameters.
pub fn render_item_update(item_id: i64, assignments: Vec<(&'static str, Value)>) -> (String, Vec<Value>) {
    let columns: Vec<String> = assignments.iter().map(|(col, _)| format!("{col} = ?")).collect();
    let mut params: Vec<Value> = assignments.into_iter().map(|(_, v)| v).collect();
    params.push(Value::Integer(item_id));

    (
        format!("UPDATE shelf_items SET {} WHERE id = ?", columns.join(", ")),
        params,
    )
}

const ITEM_FIELDS: [&str; 11] = [
    "id",
    "shelf_id",
    "book_id",
    "added_date",
    "reading_status",
    "ownership_status",
    "current_page",
    "start_date",
    "finish_date",
    "user_rating",
    "is_favorite",
];

/// Shelf item columns in `row_to_item` order, optionally qualified by a table alias.
fn item_columns(alias: Option<&str>) -> String {
    ITEM_FIELDS
        .iter()
        .map(|f| match alias {
            Some(a) => format!("{a}.{f}"),
            None => f.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub struct Shelves<'a> {
    db: &'a Database,
}

impl<'a> Shelves<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub async fn list_shelves(&self, user_id: i64) -> Result<Vec<Shelf>> {
        let query = r#"
            SELECT id, user_id, name, description, created_at
            FROM custom_shelves
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
        "#;

        let mut rows = self.db.connection().query(query, libsql::params![user_id]).await?;
        let mut shelves = Vec::new();

        while let Some(row) = rows.next().await? {
            shelves.push(Self::row_to_shelf(&row)?);
        }

        Ok(shelves)
    }

    pub async fn create_shelf(&self, user_id: i64, name: &str, description: &str) -> Result<Shelf> {
        let query = r#"
            INSERT INTO custom_shelves (user_id, name, description)
            VALUES (?, ?, ?)
            RETURNING id, user_id, name, description, created_at
        "#;

        let mut rows = self
            .db
            .connection()
            .query(query, libsql::params![user_id, name, description])
            .await?;

        if let Some(row) = rows.next().await? {
            Self::row_to_shelf(&row)
        } else {
            anyhow::bail!("Failed to create shelf")
        }
    }

    /// The shelf, if it exists and belongs to `user_id`.
    pub async fn get_owned_shelf(&self, shelf_id: i64, user_id: i64) -> Result<Option<Shelf>> {
        let query = r#"
            SELECT id, user_id, name, description, created_at
            FROM custom_shelves
            WHERE id = ? AND user_id = ?
        "#;

        let mut rows = self
            .db
            .connection()
            .query(query, libsql::params![shelf_id, user_id])
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_shelf(&row)?))
        } else {
            Ok(None)
        }
    }

    /// Deletes an owned shelf and its items. Returns false when nothing matched.
    pub async fn delete_shelf(&self, shelf_id: i64, user_id: i64) -> Result<bool> {
        self.db
            .in_transaction(|conn| async move {
                conn.execute(
                    r#"
                    DELETE FROM shelf_items
                    WHERE shelf_id IN (SELECT id FROM custom_shelves WHERE id = ? AND user_id = ?)
                    "#,
                    libsql::params![shelf_id, user_id],
                )
                .await?;
                let deleted = conn
                    .execute(
                        "DELETE FROM custom_shelves WHERE id = ? AND user_id = ?",
                        libsql::params![shelf_id, user_id],
                    )
                    .await?;
                Ok::<bool, anyhow::Error>(deleted > 0)
            })
            .await
    }

    /// Items on a shelf, newest first, each with its book's title, cover and authors.
    pub async fn list_items(&self, shelf_id: i64) -> Result<Vec<ShelfItemWithBook>> {
        let query = format!(
            r#"
            SELECT {}, b.title, b.isbn, b.cover_url
            FROM shelf_items si
            JOIN books b ON si.book_id = b.id
            WHERE si.shelf_id = ?
            ORDER BY si.added_date DESC, si.id DESC
            "#,
            item_columns(Some("si"))
        );

        let conn = self.db.connection();
        let mut rows = conn.query(&query, libsql::params![shelf_id]).await?;
        let mut items = Vec::new();

        while let Some(row) = rows.next().await? {
            items.push(ShelfItemWithBook {
                item: Self::row_to_item(&row)?,
                title: row.get(11)?,
                isbn: row.get(12)?,
                cover_url: row.get(13)?,
                authors: Vec::new(),
            });
        }

        let ids = unique_ids(items.iter().map(|i| i.item.book_id));
        let by_book = authors_for(conn, &ids).await?;
        for item in items.iter_mut() {
            item.authors = by_book.get(&item.item.book_id).cloned().unwrap_or_default();
        }

        Ok(items)
    }

    pub async fn add_item(&self, shelf_id: i64, input: &NewShelfItem) -> Result<ShelfItem> {
        let query = format!(
            r#"
            INSERT INTO shelf_items
                (shelf_id, book_id, reading_status, ownership_status, current_page, start_date, is_favorite)
            VALUES (?, ?, ?, ?, ?, NULL, 0)
            RETURNING {}
            "#,
            item_columns(None)
        );

        let mut rows = self
            .db
            .connection()
            .query(
                &query,
                libsql::params![
                    shelf_id,
                    input.book_id,
                    input.reading_status.as_str(),
                    input.ownership_status.as_str(),
                    input.current_page
                ],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Self::row_to_item(&row)
        } else {
            anyhow::bail!("Failed to add item to shelf")
        }
    }

    /// The item, if its shelf belongs to `user_id`.
    pub async fn find_owned_item(&self, item_id: i64, user_id: i64) -> Result<Option<ShelfItem>> {
        let query = format!(
            r#"
            SELECT {}
            FROM shelf_items si
            JOIN custom_shelves cs ON si.shelf_id = cs.id
            WHERE si.id = ? AND cs.user_id = ?
            "#,
            item_columns(Some("si"))
        );

        let mut rows = self
            .db
            .connection()
            .query(&query, libsql::params![item_id, user_id])
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_item(&row)?))
        } else {
            Ok(None)
        }
    }

    /// Applies non-empty `assignments` to one item. Ownership is the caller's check.
    pub async fn update_item(&self, item_id: i64, assignments: Vec<(&'static str, Value)>) -> Result<u64> {
        if assignments.is_empty() {
            anyhow::bail!("no fields to update");
        }

        let (query, params) = render_item_update(item_id, assignments);
        Ok(self.db.connection().execute(&query, params).await?)
    }

    pub async fn delete_item(&self, item_id: i64) -> Result<bool> {
        let deleted = self
            .db
            .connection()
            .execute("DELETE FROM shelf_items WHERE id = ?", libsql::params![item_id])
            .await?;
        Ok(deleted > 0)
    }

    fn row_to_shelf(row: &libsql::Row) -> Result<Shelf> {
        Ok(Shelf {
            shelf_id: row.get(0)?,
            user_id: row.get(1)?,
            shelf_name: row.get(2)?,
            description: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn row_to_item(row: &libsql::Row) -> Result<ShelfItem> {
        let status: String = row.get(4)?;
        let reading_status: ReadingStatus = status.parse().map_err(anyhow::Error::msg)?;

        Ok(ShelfItem {
            item_id: row.get(0)?,
            shelf_id: row.get(1)?,
            book_id: row.get(2)?,
            added_date: row.get(3)?,
            reading_status,
            ownership_status: row.get(5)?,
            current_page: row.get(6)?,
            start_date: row.get(7)?,
            finish_date: row.get(8)?,
            user_rating: row.get(9)?,
            is_favorite: row.get(10)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patch(body: serde_json::Value) -> ShelfItemPatch {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_empty_patch_has_no_assignments() {
        assert!(patch(json!({})).assignments().unwrap().is_empty());
        assert!(patch(json!({"title": "ignored", "shelf_id": 3})).assignments().unwrap().is_empty());
    }

    #[test]
    fn test_assignments_follow_field_order() {
        let updates = patch(json!({
            "finish_date": "2024-05-01",
            "is_favorite": true,
            "reading_status": "Read",
            "user_rating": 5,
        }))
        .assignments()
        .unwrap();

        let columns: Vec<&str> = updates.iter().map(|(c, _)| *c).collect();
        assert_eq!(columns, vec!["reading_status", "user_rating", "is_favorite", "finish_date"]);
        assert!(matches!(updates[2].1, Value::Integer(1)));
        assert!(matches!(&updates[3].1, Value::Text(d) if d == "2024-05-01"));
    }

    #[test]
    fn test_favorite_and_dates_are_coerced() {
        let updates = patch(json!({"is_favorite": 0, "start_date": "", "current_page": null}))
            .assignments()
            .unwrap();
        let columns: Vec<&str> = updates.iter().map(|(c, _)| *c).collect();
        assert_eq!(columns, vec!["current_page", "is_favorite", "start_date"]);
        assert!(matches!(updates[0].1, Value::Null));
        assert!(matches!(updates[1].1, Value::Integer(0)));
        assert!(matches!(updates[2].1, Value::Null));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(patch(json!({"reading_status": "Finished"})).assignments().is_err());
        assert!(patch(json!({"user_rating": 6})).assignments().is_err());
        assert!(patch(json!({"user_rating": 0})).assignments().is_err());
        assert!(patch(json!({"current_page": -1})).assignments().is_err());
        assert!(patch(json!({"user_rating": null})).assignments().is_ok());
    }

    #[test]
    fn test_item_columns() {
        assert!(item_columns(None).starts_with("id, shelf_id, book_id"));
        assert!(item_columns(Some("si")).ends_with("si.user_rating, si.is_favorite"));
    }

    #[test]
    fn test_render_item_update() {
        let (sql, params) = render_item_update(
            9,
            vec![("reading_status", Value::Text("Reading".into())), ("current_page", Value::Integer(40))],
        );
        assert_eq!(sql, "UPDATE shelf_items SET reading_status = ?, current_page = ? WHERE id = ?");
        assert_eq!(params.len(), 3);
        assert!(matches!(&params[0], Value::Text(s) if s == "Reading"));
        assert!(matches!(params[1], Value::Integer(40)));
        assert!(matches!(params[2], Value::Integer(9)));
    }

    #[test]
    fn test_create_item_defaults() {
        let item = CreateShelfItem {
            book_id: Some(4),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(item.reading_status, ReadingStatus::ToRead);
        assert_eq!(item.ownership_status, "Owned");
        assert_eq!(item.current_page, None);

        assert!(CreateShelfItem::default().validate().is_err());
    }

    async fn seeded() -> (Database, i64, i64) {
        let db = Database::in_memory().await.unwrap();
        let conn = db.connection();
        conn.execute(
            "INSERT INTO users (username, email, password_hash) VALUES ('ada', 'ada@example.com', 'h')",
            (),
        )
        .await
        .unwrap();
        let user_id = conn.last_insert_rowid();
        conn.execute("INSERT INTO books (title) VALUES ('Emma')", ()).await.unwrap();
        let book_id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO book_authors (book_id, author_name) VALUES (?, 'Jane Austen')",
            libsql::params![book_id],
        )
        .await
        .unwrap();
        (db, user_id, book_id)
    }

    #[tokio::test]
    async fn test_item_lifecycle() {
        let (db, user_id, book_id) = seeded().await;
        let shelves = Shelves::new(&db);

        let shelf = shelves.create_shelf(user_id, "Classics", "").await.unwrap();
        let new_item = CreateShelfItem {
            book_id: Some(book_id),
            current_page: Some(12),
            ..Default::default()
        }
        .validate()
        .unwrap();
        let item = shelves.add_item(shelf.shelf_id, &new_item).await.unwrap();
        assert!(item.added_date.is_some());
        assert_eq!(item.current_page, Some(12));

        let items = shelves.list_items(shelf.shelf_id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Emma");
        assert_eq!(items[0].authors[0].author_name, "Jane Austen");

        let updates = patch(json!({"reading_status": "Reading", "is_favorite": true}))
            .assignments()
            .unwrap();
        assert_eq!(shelves.update_item(item.item_id, updates).await.unwrap(), 1);

        let updated = shelves.find_owned_item(item.item_id, user_id).await.unwrap().unwrap();
        assert_eq!(updated.reading_status, ReadingStatus::Reading);
        assert_eq!(updated.is_favorite, 1);
        assert!(shelves.find_owned_item(item.item_id, user_id + 1).await.unwrap().is_none());

        assert!(shelves.update_item(item.item_id, Vec::new()).await.is_err());

        assert!(shelves.delete_shelf(shelf.shelf_id, user_id).await.unwrap());
        assert!(shelves.find_owned_item(item.item_id, user_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_shelf_of_other_user_is_a_no_op() {
        let (db, user_id, _) = seeded().await;
        let shelves = Shelves::new(&db);
        let shelf = shelves.create_shelf(user_id, "Mine", "").await.unwrap();

        assert!(!shelves.delete_shelf(shelf.shelf_id, user_id + 1).await.unwrap());
        assert!(shelves.get_owned_shelf(shelf.shelf_id, user_id).await.unwrap().is_some());
    }
}

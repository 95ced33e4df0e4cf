use anyhow::Result;
use libsql::Connection;
use serde::Deserialize;
use std::collections::HashMap;

use crate::db::{Database, placeholders};
use crate::model::{Author, Book, TopRatedBook};

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct BookListParams {
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug)]
pub struct BookPage {
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl BookListParams {
    pub fn into_page(self) -> BookPage {
        BookPage {
            search: self.search.filter(|s| !s.is_empty()),
            limit: self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
            offset: self.offset.unwrap_or(0).max(0),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBook {
    pub title: Option<String>,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub publication_date: Option<String>,
    pub cover_url: Option<String>,
    pub publisher: Option<String>,
    pub pages: Option<i64>,
    pub language: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
}

const BOOK_COLUMNS: &str =
    "id, title, isbn, description, publication_date, cover_url, publisher, pages, language";

/// Fetches the authors of every book in `book_ids` with one query.
///
/// Books keep their authors in insertion order. An empty id list issues no
/// query.
pub async fn authors_for(conn: &Connection, book_ids: &[i64]) -> Result<HashMap<i64, Vec<Author>>> {
    let mut by_book: HashMap<i64, Vec<Author>> = HashMap::new();
    if book_ids.is_empty() {
        return Ok(by_book);
    }

    let query = format!(
        "SELECT book_id, author_name FROM book_authors WHERE book_id IN ({}) ORDER BY id",
        placeholders(book_ids.len())
    );
    let params: Vec<libsql::Value> = book_ids.iter().map(|id| (*id).into()).collect();

    let mut rows = conn.query(&query, params).await?;
    while let Some(row) = rows.next().await? {
        let book_id: i64 = row.get(0)?;
        by_book.entry(book_id).or_default().push(Author {
            author_name: row.get(1)?,
        });
    }

    Ok(by_book)
}

/// Distinct ids in first-seen order.
pub fn unique_ids(ids: impl IntoIterator<Item = i64>) -> Vec<i64> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

pub struct Catalog<'a> {
    db: &'a Database,
}

impl<'a> Catalog<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub async fn list_books(&self, page: &BookPage) -> Result<Vec<Book>> {
        let conn = self.db.connection();

        let mut rows = if let Some(search) = &page.search {
            let query = format!(
                r#"
                SELECT {BOOK_COLUMNS} FROM books
                WHERE title LIKE ? OR isbn LIKE ? OR description LIKE ?
                ORDER BY title, id
                LIMIT ? OFFSET ?
                "#
            );
            let term = format!("%{}%", search);
            conn.query(&query, libsql::params![term.clone(), term.clone(), term, page.limit, page.offset])
                .await?
        } else {
            let query = format!("SELECT {BOOK_COLUMNS} FROM books ORDER BY title, id LIMIT ? OFFSET ?");
            conn.query(&query, libsql::params![page.limit, page.offset]).await?
        };

        let mut books = Vec::new();
        while let Some(row) = rows.next().await? {
            books.push(Self::row_to_book(&row)?);
        }

        self.attach_authors(&mut books).await?;
        Ok(books)
    }

    pub async fn get_book(&self, id: i64) -> Result<Option<Book>> {
        let query = format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?");
        let mut rows = self.db.connection().query(&query, libsql::params![id]).await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };

        let mut books = vec![Self::row_to_book(&row)?];
        self.attach_authors(&mut books).await?;
        Ok(books.pop())
    }

    pub async fn book_exists(&self, id: i64) -> Result<bool> {
        let mut rows = self
            .db
            .connection()
            .query("SELECT 1 FROM books WHERE id = ?", libsql::params![id])
            .await?;
        Ok(rows.next().await?.is_some())
    }

    /// Inserts a book and its authors atomically. `input.title` must be set.
    pub async fn create_book(&self, input: CreateBook) -> Result<Book> {
        let Some(title) = input.title.clone() else {
            anyhow::bail!("book title is required")
        };

        let book_id = self
            .db
            .in_transaction(|conn| async move {
                let insert_book = r#"
                    INSERT INTO books (title, isbn, description, publication_date, cover_url, publisher, pages, language)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                    RETURNING id
                "#;

                let mut rows = conn
                    .query(
                        insert_book,
                        libsql::params![
                            title,
                            input.isbn,
                            input.description,
                            input.publication_date,
                            input.cover_url,
                            input.publisher,
                            input.pages,
                            input.language
                        ],
                    )
                    .await?;

                let book_id: i64 = if let Some(row) = rows.next().await? {
                    row.get(0)?
                } else {
                    anyhow::bail!("Failed to create book")
                };

                for author_name in input.authors.iter().map(|a| a.trim()).filter(|a| !a.is_empty()) {
                    conn.execute(
                        "INSERT INTO book_authors (book_id, author_name) VALUES (?, ?)",
                        libsql::params![book_id, author_name],
                    )
                    .await?;
                }

                Ok::<i64, anyhow::Error>(book_id)
            })
            .await?;

        self.get_book(book_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("book {} vanished after insert", book_id))
    }

    pub async fn top_rated(&self) -> Result<Vec<TopRatedBook>> {
        let query = r#"
            SELECT book_id, title, authors, total_ratings, average_rating
            FROM v_top_rated_books
            ORDER BY average_rating DESC, total_ratings DESC
        "#;

        let mut rows = self.db.connection().query(query, ()).await?;
        let mut books = Vec::new();

        while let Some(row) = rows.next().await? {
            books.push(TopRatedBook {
                book_id: row.get(0)?,
                title: row.get(1)?,
                authors: row.get(2)?,
                total_ratings: row.get(3)?,
                average_rating: row.get(4)?,
            });
        }

        Ok(books)
    }

    async fn attach_authors(&self, books: &mut [Book]) -> Result<()> {
        let ids = unique_ids(books.iter().map(|b| b.book_id));
        let mut by_book = authors_for(self.db.connection(), &ids).await?;

        for book in books.iter_mut() {
            book.authors = by_book.remove(&book.book_id).unwrap_or_default();
        }
        Ok(())
    }

    fn row_to_book(row: &libsql::Row) -> Result<Book> {
        Ok(Book {
            book_id: row.get(0)?,
            title: row.get(1)?,
            isbn: row.get(2)?,
            description: row.get(3)?,
            publication_date: row.get(4)?,
            cover_url: row.get(5)?,
            publisher: row.get(6)?,
            pages: row.get(7)?,
            language: row.get(8)?,
            authors: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(title: &str, authors: &[&str]) -> CreateBook {
        CreateBook {
            title: Some(title.to_string()),
            isbn: Some(format!("isbn-{title}")),
            description: None,
            publication_date: None,
            cover_url: None,
            publisher: None,
            pages: Some(300),
            language: Some("en".into()),
            authors: authors.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn test_page_defaults_and_clamps() {
        let page = BookListParams::default().into_page();
        assert_eq!((page.limit, page.offset), (DEFAULT_LIMIT, 0));
        assert!(page.search.is_none());

        let page = BookListParams {
            search: Some(String::new()),
            limit: Some(10_000),
            offset: Some(-5),
        }
        .into_page();
        assert_eq!((page.limit, page.offset), (MAX_LIMIT, 0));
        assert!(page.search.is_none());
    }

    #[test]
    fn test_unique_ids_keeps_first_seen_order() {
        assert_eq!(unique_ids([3, 1, 3, 2, 1]), vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn test_authors_for_empty_ids_is_empty() {
        let db = Database::in_memory().await.unwrap();
        assert!(authors_for(db.connection(), &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_attaches_authors_per_book() {
        let db = Database::in_memory().await.unwrap();
        let catalog = Catalog::new(&db);
        let emma = catalog.create_book(book("Emma", &["Jane Austen"])).await.unwrap();
        let omens = catalog
            .create_book(book("Good Omens", &["Terry Pratchett", "Neil Gaiman"]))
            .await
            .unwrap();
        let anon = catalog.create_book(book("Beowulf", &[])).await.unwrap();

        let books = catalog.list_books(&BookListParams::default().into_page()).await.unwrap();
        let titles: Vec<&str> = books.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["Beowulf", "Emma", "Good Omens"]);

        let by_id: HashMap<i64, &Book> = books.iter().map(|b| (b.book_id, b)).collect();
        assert_eq!(by_id[&emma.book_id].authors, vec![Author { author_name: "Jane Austen".into() }]);
        let names: Vec<&str> = by_id[&omens.book_id]
            .authors
            .iter()
            .map(|a| a.author_name.as_str())
            .collect();
        assert_eq!(names, vec!["Terry Pratchett", "Neil Gaiman"]);
        assert!(by_id[&anon.book_id].authors.is_empty());
    }

    #[tokio::test]
    async fn test_search_matches_title_isbn_and_description() {
        let db = Database::in_memory().await.unwrap();
        let catalog = Catalog::new(&db);
        catalog.create_book(book("Emma", &["Jane Austen"])).await.unwrap();
        catalog.create_book(book("Persuasion", &["Jane Austen"])).await.unwrap();

        let page = BookListParams {
            search: Some("isbn-Pers".into()),
            ..Default::default()
        }
        .into_page();
        let books = catalog.list_books(&page).await.unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].title, "Persuasion");
        assert_eq!(books[0].authors.len(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_book() {
        let db = Database::in_memory().await.unwrap();
        assert!(Catalog::new(&db).get_book(99).await.unwrap().is_none());
    }
}

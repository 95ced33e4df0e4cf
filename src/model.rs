use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Author {
    pub author_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub book_id: i64,
    pub title: String,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub publication_date: Option<String>,
    pub cover_url: Option<String>,
    pub publisher: Option<String>,
    pub pages: Option<i64>,
    pub language: Option<String>,
    pub authors: Vec<Author>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopRatedBook {
    pub book_id: i64,
    pub title: String,
    pub authors: Option<String>,
    pub total_ratings: i64,
    pub average_rating: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub user_name: String,
    pub email: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub user_id: i64,
    pub user_name: String,
    pub email: String,
    pub shelf_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shelf {
    pub shelf_id: i64,
    pub user_id: i64,
    pub shelf_name: String,
    pub description: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadingStatus {
    #[default]
    #[serde(rename = "To-Read")]
    ToRead,
    Reading,
    Read,
}

impl ReadingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingStatus::ToRead => "To-Read",
            ReadingStatus::Reading => "Reading",
            ReadingStatus::Read => "Read",
        }
    }

}

impl FromStr for ReadingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "To-Read" => Ok(ReadingStatus::ToRead),
            "Reading" => Ok(ReadingStatus::Reading),
            "Read" => Ok(ReadingStatus::Read),
            other => Err(format!("reading_status must be one of To-Read, Reading, Read (got {other:?})")),
        }
    }
}

/// Ownership is free text; this is what new items get.
pub const DEFAULT_OWNERSHIP_STATUS: &str = "Owned";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShelfItem {
    pub item_id: i64,
    pub shelf_id: i64,
    pub book_id: i64,
    pub added_date: Option<String>,
    pub reading_status: ReadingStatus,
    pub ownership_status: String,
    pub current_page: Option<i64>,
    pub start_date: Option<String>,
    pub finish_date: Option<String>,
    pub user_rating: Option<i64>,
    pub is_favorite: i64,
}

/// A shelf item joined with the catalog fields the shelf page shows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShelfItemWithBook {
    #[serde(flatten)]
    pub item: ShelfItem,
    pub title: String,
    pub isbn: Option<String>,
    pub cover_url: Option<String>,
    pub authors: Vec<Author>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub trigger_name: String,
    pub event_object_table: String,
    pub sql: Option<String>,
}

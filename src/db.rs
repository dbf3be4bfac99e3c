mod schema;

pub use schema::Database;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID.
    pub id: String,
    /// Username for login.
    pub username: String,
    /// Argon2 password hash.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// User role: "admin" or "user".
    pub role: String,
    /// Account creation timestamp.
    pub created_at: i64,
    /// Last login timestamp.
    pub last_login: Option<i64>,
}

/// Authentication session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session token.
    pub token: String,
    /// User ID.
    pub user_id: String,
    /// Expiration timestamp.
    pub expires_at: i64,
}

/// Catalog entry.
///
/// Books are created through ingestion and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    /// Book ID.
    pub id: String,
    /// Book title.
    pub title: String,
    /// Primary author.
    pub author: String,
    /// Book description.
    pub description: Option<String>,
    /// Genre label.
    pub genre: Option<String>,
    /// Year of publication.
    pub published_year: Option<i64>,
    /// Page count.
    pub page_count: Option<i64>,
    /// Public URL of the cover image.
    pub cover_image_url: Option<String>,
    /// Storage path of the PDF content file.
    pub pdf_file_path: Option<String>,
    /// Creation timestamp.
    pub created_at: i64,
}

/// Reading list membership status.
///
/// The catalog only knows these two shelves; rows carrying any other
/// status value are ignored when lists are assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingStatus {
    /// Book the user plans to read.
    WantToRead,
    /// Book the user is reading now.
    CurrentlyReading,
}

impl ReadingStatus {
    /// Database representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingStatus::WantToRead => "want_to_read",
            ReadingStatus::CurrentlyReading => "currently_reading",
        }
    }

    /// Human-readable shelf name shown in confirmations.
    pub fn label(&self) -> &'static str {
        match self {
            ReadingStatus::WantToRead => "Want to Read",
            ReadingStatus::CurrentlyReading => "Currently Reading",
        }
    }

    /// Parse a stored status value. Unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "want_to_read" => Some(ReadingStatus::WantToRead),
            "currently_reading" => Some(ReadingStatus::CurrentlyReading),
            _ => None,
        }
    }
}

/// Reading list membership row.
///
/// At most one row exists per (user, book) pair; adding the same book
/// again overwrites the status instead of inserting a duplicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingListEntry {
    /// Membership ID.
    pub id: String,
    /// Owning user ID.
    pub user_id: String,
    /// Book ID.
    pub book_id: String,
    /// Raw status value as stored.
    pub status: String,
}

/// Membership joined with its book, as returned to list views.
#[derive(Debug, Clone, Serialize)]
pub struct ReadingListItem {
    /// Membership ID.
    pub id: String,
    /// Raw status value as stored.
    pub status: String,
    /// The referenced book.
    pub book: Book,
}

/// Split memberships into (currently reading, want to read).
///
/// Rows with a status outside the known enumeration land in neither
/// partition.
pub fn partition_by_status(
    items: Vec<ReadingListItem>,
) -> (Vec<ReadingListItem>, Vec<ReadingListItem>) {
    let mut currently_reading = Vec::new();
    let mut want_to_read = Vec::new();

    for item in items {
        match ReadingStatus::parse(&item.status) {
            Some(ReadingStatus::CurrentlyReading) => currently_reading.push(item),
            Some(ReadingStatus::WantToRead) => want_to_read.push(item),
            None => {}
        }
    }

    (currently_reading, want_to_read)
}

/// Timestamp helper.
pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Convert timestamp to DateTime.
pub fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
}

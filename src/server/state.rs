//! Application state shared across handlers.

use crate::auth::AuthService;
use crate::config::Config;
use crate::db::{Book, Database};
use crate::storage::Storage;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Database connection.
    pub db: Database,
    /// Authentication service.
    pub auth: Arc<AuthService>,
    /// Content and cover storage.
    pub storage: Arc<Storage>,
}

impl AppState {
    /// Create new application state.
    pub fn new(config: Config, db: Database, auth: AuthService, storage: Storage) -> Self {
        Self {
            config: Arc::new(config),
            db,
            auth: Arc::new(auth),
            storage: Arc::new(storage),
        }
    }

    /// Derive a signed content URL for a book.
    ///
    /// A book without a content file yields no URL, and no grant is
    /// minted for it. A minting failure degrades to no URL as well,
    /// so the reader view can render its placeholder instead of a
    /// broken viewer.
    pub fn content_url_for(&self, book: &Book) -> Option<String> {
        let path = book.pdf_file_path.as_deref()?;

        match self.storage.create_signed_url(path) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(book = %book.id, error = %e, "Failed to sign content URL");
                None
            }
        }
    }

    /// Get book count.
    pub fn book_count(&self) -> usize {
        self.db.list_books().map(|b| b.len()).unwrap_or(0)
    }
}

//! File storage for book content and cover images.
//!
//! Two separate areas on the local filesystem stand in for object
//! storage buckets: the content area holds PDFs and is only reachable
//! through short-lived signed URLs, the cover area holds images served
//! from stable public URLs. Content uploads may overwrite an existing
//! file with the same stored name; cover uploads never do.

use crate::auth::generate_token;
use crate::db::now_timestamp;
use crate::error::{AppError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A minted access grant for one content file.
#[derive(Debug, Clone)]
struct Grant {
    path: String,
    expires_at: i64,
}

/// Filesystem-backed storage service.
pub struct Storage {
    content_dir: PathBuf,
    covers_dir: PathBuf,
    grant_ttl_seconds: i64,
    grants: Mutex<HashMap<String, Grant>>,
}

impl Storage {
    /// Open storage, creating both areas if needed.
    pub fn open(content_dir: &Path, covers_dir: &Path, grant_ttl_seconds: i64) -> Result<Self> {
        std::fs::create_dir_all(content_dir)?;
        std::fs::create_dir_all(covers_dir)?;

        Ok(Self {
            content_dir: content_dir.to_path_buf(),
            covers_dir: covers_dir.to_path_buf(),
            grant_ttl_seconds,
            grants: Mutex::new(HashMap::new()),
        })
    }

    /// Store a content file and return its storage path.
    ///
    /// The stored name is a generated unique token plus the sanitized
    /// original filename, so two uploads of the same file never race
    /// on a shared name. Overwriting an existing stored name is
    /// allowed.
    pub fn store_content(&self, original_name: &str, data: &[u8]) -> Result<String> {
        let stored_name = format!(
            "{}-{}",
            uuid::Uuid::new_v4(),
            sanitize_file_name(original_name)
        );
        std::fs::write(self.content_dir.join(&stored_name), data)?;
        Ok(stored_name)
    }

    /// Store a cover image and return its storage path.
    ///
    /// Unlike content files, covers are never overwritten.
    pub fn store_cover(&self, original_name: &str, data: &[u8]) -> Result<String> {
        let stored_name = format!(
            "{}-{}",
            uuid::Uuid::new_v4(),
            sanitize_file_name(original_name)
        );
        let target = self.covers_dir.join(&stored_name);

        if target.exists() {
            return Err(AppError::Conflict(format!(
                "Cover already exists: {}",
                stored_name
            )));
        }

        std::fs::write(target, data)?;
        Ok(stored_name)
    }

    /// Public URL for a stored cover.
    pub fn cover_public_url(&self, stored_name: &str) -> String {
        format!("/covers/{}", stored_name)
    }

    /// Absolute path of a stored cover, if it exists.
    pub fn cover_file(&self, stored_name: &str) -> Option<PathBuf> {
        let name = sanitize_file_name(stored_name);
        let path = self.covers_dir.join(name);
        path.is_file().then_some(path)
    }

    /// Mint a time-limited signed URL for a content file.
    ///
    /// Fails when the referenced file is missing, so callers can fall
    /// back to their "content not available" state.
    pub fn create_signed_url(&self, content_path: &str) -> Result<String> {
        let name = sanitize_file_name(content_path);
        if !self.content_dir.join(&name).is_file() {
            return Err(AppError::NotFound(format!(
                "Content file missing: {}",
                content_path
            )));
        }

        let token = generate_token();
        let grant = Grant {
            path: name,
            expires_at: now_timestamp() + self.grant_ttl_seconds,
        };

        let mut grants = self.grants.lock();
        grants.retain(|_, g| g.expires_at >= now_timestamp());
        grants.insert(token.clone(), grant);

        Ok(format!("/content/{}", token))
    }

    /// Resolve a signed-URL token to the content file it grants.
    ///
    /// Expired or unknown tokens resolve to nothing.
    pub fn resolve_grant(&self, token: &str) -> Option<PathBuf> {
        let mut grants = self.grants.lock();
        grants.retain(|_, g| g.expires_at >= now_timestamp());

        let grant = grants.get(token)?;
        let path = self.content_dir.join(&grant.path);
        path.is_file().then_some(path)
    }

    /// Number of live (unexpired) grants.
    pub fn active_grants(&self) -> usize {
        let mut grants = self.grants.lock();
        grants.retain(|_, g| g.expires_at >= now_timestamp());
        grants.len()
    }
}

/// Reduce a client-supplied filename to a safe single path segment.
fn sanitize_file_name(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .trim_start_matches('.');

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_path_components() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("dir\\book.pdf"), "book.pdf");
        assert_eq!(sanitize_file_name("My Book (1).pdf"), "My_Book__1_.pdf");
        assert_eq!(sanitize_file_name(""), "file");
    }
}

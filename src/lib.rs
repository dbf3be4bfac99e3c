//! booknest: a self-hosted digital library server with reading lists.
//!
//! This crate provides a small HTTP server around a book catalog:
//! users browse books, read PDFs through time-limited signed URLs,
//! and keep per-user reading lists ("want to read" / "currently
//! reading"). Admins ingest new books by uploading a PDF and an
//! optional cover image together with the catalog metadata.
//!
//! # Features
//!
//! - User accounts and session-token authentication
//! - Book catalog with newest-first listing
//! - Per-user reading lists with upsert membership semantics
//! - Signed, expiring content URLs for in-browser reading
//! - Public cover image serving
//! - Admin multipart ingestion of PDF + cover + metadata

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Authentication and user management.
pub mod auth;
/// Configuration and CLI.
pub mod config;
/// Database operations.
pub mod db;
/// Error types.
pub mod error;
/// HTTP server.
pub mod server;
/// Content and cover file storage.
pub mod storage;

#[cfg(test)]
mod tests;

pub use config::{Cli, Command, Config};
pub use db::Database;
pub use error::{AppError, Result};
pub use server::AppState;
pub use storage::Storage;

//! HTTP request handlers.

use crate::db::{self, Book, ReadingListEntry, ReadingListItem, ReadingStatus};
use crate::error::{AppError, Result};
use crate::server::AppState;
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, Response},
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

// ============================================================================
// WEB PAGES
// ============================================================================

/// Index page (simple HTML).
pub async fn index(State(state): State<AppState>) -> Html<String> {
    let book_count = state.book_count();
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <style>
        body {{ font-family: system-ui, sans-serif; max-width: 600px; margin: 2rem auto; padding: 0 1rem; }}
        h1 {{ color: #333; }}
        a {{ color: #0066cc; }}
        .stats {{ background: #f5f5f5; padding: 1rem; border-radius: 8px; margin: 1rem 0; }}
        code {{ background: #e8e8e8; padding: 0.2rem 0.4rem; border-radius: 4px; }}
    </style>
</head>
<body>
    <h1>&#128218; {title}</h1>
    <div class="stats">
        <p><strong>{book_count}</strong> books in the catalog</p>
    </div>
    <h2>API</h2>
    <ul>
        <li><code>POST /api/auth/login</code></li>
        <li><code>GET /api/books</code></li>
        <li><code>GET /api/lists</code></li>
    </ul>
</body>
</html>"#,
        title = state.config.server.title,
        book_count = book_count,
    );

    Html(html)
}

// ============================================================================
// AUTH API
// ============================================================================

/// Login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

/// Login response.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    token: String,
    user_id: String,
    username: String,
    role: String,
}

/// Register request.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    username: String,
    password: String,
}

/// Auth login.
pub async fn auth_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let (user, token) = state.auth.login(&req.username, &req.password)?;

    Ok(Json(LoginResponse {
        token,
        user_id: user.id,
        username: user.username,
        role: user.role,
    }))
}

/// Auth register.
pub async fn auth_register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<LoginResponse>> {
    let _user = state.auth.register(&req.username, &req.password)?;
    let (user, token) = state.auth.login(&req.username, &req.password)?;

    Ok(Json(LoginResponse {
        token,
        user_id: user.id,
        username: user.username,
        role: user.role,
    }))
}

/// Auth logout.
pub async fn auth_logout(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode> {
    if let Some(token) = extract_token(&headers) {
        state.auth.logout(&token)?;
    }
    Ok(StatusCode::OK)
}

/// Get current user info.
pub async fn auth_me(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<db::User>> {
    let user = get_authenticated_user(&state, &headers)?;
    Ok(Json(user))
}

// ============================================================================
// CATALOG API
// ============================================================================

/// List all books, newest first.
pub async fn list_books(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Book>>> {
    get_authenticated_user(&state, &headers)?;
    let books = state.db.list_books()?;
    Ok(Json(books))
}

/// Book detail with its derived content URL.
#[derive(Debug, Serialize)]
pub struct BookDetail {
    /// The book record.
    #[serde(flatten)]
    pub book: Book,
    /// Signed content URL, absent when the book has no readable file.
    pub content_url: Option<String>,
}

/// Fetch one book with a signed content URL when available.
pub async fn book_detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<BookDetail>> {
    get_authenticated_user(&state, &headers)?;

    let book = state
        .db
        .get_book(&id)?
        .ok_or_else(|| AppError::NotFound(format!("Book not found: {}", id)))?;

    let content_url = state.content_url_for(&book);

    Ok(Json(BookDetail { book, content_url }))
}

// ============================================================================
// INGESTION API (admin)
// ============================================================================

/// Parsed multipart form for book ingestion.
#[derive(Default)]
struct IngestForm {
    title: Option<String>,
    author: Option<String>,
    description: Option<String>,
    genre: Option<String>,
    published_year: Option<String>,
    page_count: Option<String>,
    pdf: Option<(String, Vec<u8>)>,
    cover: Option<(String, Vec<u8>)>,
}

/// Create a book from an uploaded PDF, optional cover, and metadata.
///
/// The three steps run in order: content upload, cover upload, record
/// insert. A failure aborts the remaining steps; a content file stored
/// before a later failure stays behind without a book record.
pub async fn create_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Book>)> {
    let user = get_authenticated_user(&state, &headers)?;
    if !state.auth.is_admin(&user) {
        return Err(AppError::Forbidden(
            "Only admins can add books".to_string(),
        ));
    }

    let mut form = IngestForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidRequest(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "pdf" => {
                let filename = field.file_name().unwrap_or("book.pdf").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::InvalidRequest(format!("Failed to read PDF: {}", e)))?;
                form.pdf = Some((filename, data.to_vec()));
            }
            "cover" => {
                let filename = field.file_name().unwrap_or("cover").to_string();
                let data = field.bytes().await.map_err(|e| {
                    AppError::InvalidRequest(format!("Failed to read cover: {}", e))
                })?;
                // An empty file input arrives as a zero-length part
                if !data.is_empty() {
                    form.cover = Some((filename, data.to_vec()));
                }
            }
            _ => {
                let value = field.text().await.map_err(|e| {
                    AppError::InvalidRequest(format!("Failed to read field '{}': {}", name, e))
                })?;
                match name.as_str() {
                    "title" => form.title = Some(value),
                    "author" => form.author = Some(value),
                    "description" => form.description = Some(value),
                    "genre" => form.genre = Some(value),
                    "published_year" => form.published_year = Some(value),
                    "page_count" => form.page_count = Some(value),
                    _ => {}
                }
            }
        }
    }

    let title = non_empty(form.title)
        .ok_or_else(|| AppError::InvalidRequest("Title is required".to_string()))?;
    let author = non_empty(form.author)
        .ok_or_else(|| AppError::InvalidRequest("Author is required".to_string()))?;
    let (pdf_name, pdf_data) = form
        .pdf
        .ok_or_else(|| AppError::InvalidRequest("Please select a PDF file".to_string()))?;

    let published_year = parse_optional_int("published_year", form.published_year)?;
    let page_count = parse_optional_int("page_count", form.page_count)?;

    // Step 1: content upload (overwrite allowed)
    let pdf_path = state.storage.store_content(&pdf_name, &pdf_data)?;

    // Step 2: cover upload (no overwrite), resolve public URL
    let cover_image_url = match form.cover {
        Some((cover_name, cover_data)) => {
            let stored = state.storage.store_cover(&cover_name, &cover_data)?;
            Some(state.storage.cover_public_url(&stored))
        }
        None => None,
    };

    // Step 3: catalog record
    let book = Book {
        id: uuid::Uuid::new_v4().to_string(),
        title,
        author,
        description: non_empty(form.description),
        genre: non_empty(form.genre),
        published_year,
        page_count,
        cover_image_url,
        pdf_file_path: Some(pdf_path),
        created_at: db::now_timestamp(),
    };

    state.db.create_book(&book)?;

    tracing::info!(book = %book.id, title = %book.title, "Book ingested");
    Ok((StatusCode::CREATED, Json(book)))
}

/// Treat missing and empty-string form values as absent.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse an optional integer form field; empty string means absent.
fn parse_optional_int(field: &str, value: Option<String>) -> Result<Option<i64>> {
    match non_empty(value) {
        Some(v) => v
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| AppError::InvalidRequest(format!("Invalid number for '{}'", field))),
        None => Ok(None),
    }
}

// ============================================================================
// READING LIST API
// ============================================================================

/// Add-to-list request body.
#[derive(Debug, Deserialize)]
pub struct AddToListRequest {
    status: ReadingStatus,
}

/// Add-to-list confirmation.
#[derive(Debug, Serialize)]
pub struct AddToListResponse {
    /// Membership ID.
    pub id: String,
    /// Stored status.
    pub status: ReadingStatus,
    /// Human-readable confirmation naming the target shelf.
    pub message: String,
}

/// Add a book to the caller's list (upsert on the user/book pair).
pub async fn add_to_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(book_id): Path<String>,
    Json(req): Json<AddToListRequest>,
) -> Result<Json<AddToListResponse>> {
    let user = get_authenticated_user(&state, &headers)?;

    state
        .db
        .get_book(&book_id)?
        .ok_or_else(|| AppError::NotFound(format!("Book not found: {}", book_id)))?;

    let entry = ReadingListEntry {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user.id.clone(),
        book_id: book_id.clone(),
        status: req.status.as_str().to_string(),
    };

    state.db.upsert_reading_list(&entry)?;

    // The upsert may have kept a pre-existing row; report its real ID
    let saved = state
        .db
        .get_reading_list_entry(&user.id, &book_id)?
        .ok_or_else(|| AppError::Internal("Reading list entry vanished".to_string()))?;

    Ok(Json(AddToListResponse {
        id: saved.id,
        status: req.status,
        message: format!("Book added to {}", req.status.label()),
    }))
}

/// Partitioned reading lists response.
#[derive(Debug, Serialize)]
pub struct ReadingListsResponse {
    /// Books the user is reading now.
    pub currently_reading: Vec<ReadingListItem>,
    /// Books the user plans to read.
    pub want_to_read: Vec<ReadingListItem>,
}

/// Fetch the caller's memberships joined with books, partitioned by
/// status.
pub async fn get_reading_lists(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ReadingListsResponse>> {
    let user = get_authenticated_user(&state, &headers)?;

    let items = state.db.get_reading_list(&user.id)?;
    let (currently_reading, want_to_read) = db::partition_by_status(items);

    Ok(Json(ReadingListsResponse {
        currently_reading,
        want_to_read,
    }))
}

/// Remove a membership owned by the caller.
pub async fn remove_from_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let user = get_authenticated_user(&state, &headers)?;

    if !state.db.delete_reading_list_entry(&id, &user.id)? {
        return Err(AppError::NotFound(format!(
            "Reading list entry not found: {}",
            id
        )));
    }

    Ok(StatusCode::OK)
}

// ============================================================================
// FILE SERVING
// ============================================================================

/// Serve a content file through a signed-URL token.
pub async fn serve_content(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response<Body>> {
    let path = state
        .storage
        .resolve_grant(&token)
        .ok_or_else(|| AppError::NotFound("Link expired or unknown".to_string()))?;

    let file = tokio::fs::File::open(&path).await?;
    let size = file.metadata().await?.len();
    let stream = ReaderStream::new(file);

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(header::CONTENT_LENGTH, size)
        .header(header::CONTENT_DISPOSITION, "inline")
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| Response::default()))
}

/// Serve a public cover image.
pub async fn serve_cover(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Response<Body>> {
    let path = state
        .storage
        .cover_file(&file)
        .ok_or_else(|| AppError::NotFound(format!("Cover not found: {}", file)))?;

    let content_type = match path.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    };

    let data = tokio::fs::read(&path).await?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, "public, max-age=86400")
        .body(Body::from(data))
        .unwrap_or_else(|_| Response::default()))
}

// ============================================================================
// HELPERS
// ============================================================================

/// Extract token from Authorization header.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

/// Get authenticated user from token.
fn get_authenticated_user(state: &AppState, headers: &HeaderMap) -> Result<db::User> {
    let token = extract_token(headers)
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

    state
        .auth
        .validate_token(&token)?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_form_values_are_absent() {
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some("".to_string())), None);
        assert_eq!(non_empty(Some("  ".to_string())), None);
        assert_eq!(non_empty(Some("x".to_string())), Some("x".to_string()));
    }

    #[test]
    fn optional_int_parsing() {
        assert_eq!(parse_optional_int("year", None).unwrap(), None);
        assert_eq!(
            parse_optional_int("year", Some("".to_string())).unwrap(),
            None
        );
        assert_eq!(
            parse_optional_int("year", Some("1965".to_string())).unwrap(),
            Some(1965)
        );
        assert!(parse_optional_int("year", Some("abc".to_string())).is_err());
    }
}

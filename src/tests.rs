use crate::auth::AuthService;
use crate::config::Config;
use crate::db::{
    Book, Database, ReadingListEntry, ReadingStatus, Session, User, now_timestamp,
    partition_by_status,
};
use crate::server::AppState;
use crate::storage::Storage;

fn test_db() -> Database {
    Database::open_memory().unwrap()
}

fn create_user(db: &Database, id: &str, username: &str) {
    let user = User {
        id: id.to_string(),
        username: username.to_string(),
        password_hash: "hash".to_string(),
        role: "user".to_string(),
        created_at: now_timestamp(),
        last_login: None,
    };
    db.create_user(&user).unwrap();
}

fn book(id: &str, title: &str, created_at: i64) -> Book {
    Book {
        id: id.to_string(),
        title: title.to_string(),
        author: "Author".to_string(),
        description: None,
        genre: None,
        published_year: None,
        page_count: None,
        cover_image_url: None,
        pdf_file_path: Some(format!("{}.pdf", id)),
        created_at,
    }
}

fn create_book(db: &Database, id: &str, title: &str) {
    db.create_book(&book(id, title, now_timestamp())).unwrap();
}

fn add_entry(db: &Database, user_id: &str, book_id: &str, status: &str) {
    let entry = ReadingListEntry {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        book_id: book_id.to_string(),
        status: status.to_string(),
    };
    db.upsert_reading_list(&entry).unwrap();
}

fn setup_user_and_book(db: &Database) {
    create_user(db, "user-1", "testuser");
    create_book(db, "book-1", "Test Book");
}

#[test]
fn db_create_and_get_user() {
    let db = test_db();
    let user = User {
        id: "user-1".to_string(),
        username: "alice".to_string(),
        password_hash: "hash".to_string(),
        role: "user".to_string(),
        created_at: now_timestamp(),
        last_login: None,
    };

    db.create_user(&user).unwrap();

    let found = db.get_user_by_username("alice").unwrap().unwrap();
    assert_eq!(found.id, "user-1");
    assert_eq!(found.username, "alice");

    let found_by_id = db.get_user_by_id("user-1").unwrap().unwrap();
    assert_eq!(found_by_id.username, "alice");
}

#[test]
fn db_duplicate_username_fails() {
    let db = test_db();
    create_user(&db, "user-1", "alice");

    let dup = User {
        id: "user-2".to_string(),
        username: "alice".to_string(),
        password_hash: "hash2".to_string(),
        role: "user".to_string(),
        created_at: now_timestamp(),
        last_login: None,
    };
    assert!(db.create_user(&dup).is_err());
}

#[test]
fn db_create_and_get_session() {
    let db = test_db();
    create_user(&db, "user-1", "testuser");

    let session = Session {
        token: "token123".to_string(),
        user_id: "user-1".to_string(),
        expires_at: now_timestamp() + 3600,
    };

    db.create_session(&session).unwrap();

    let found = db.get_session("token123").unwrap().unwrap();
    assert_eq!(found.user_id, "user-1");
}

#[test]
fn db_expired_sessions_cleanup() {
    let db = test_db();
    create_user(&db, "user-1", "testuser");

    let expired = Session {
        token: "expired".to_string(),
        user_id: "user-1".to_string(),
        expires_at: now_timestamp() - 3600,
    };
    let valid = Session {
        token: "valid".to_string(),
        user_id: "user-1".to_string(),
        expires_at: now_timestamp() + 3600,
    };

    db.create_session(&expired).unwrap();
    db.create_session(&valid).unwrap();

    db.cleanup_expired_sessions().unwrap();

    assert!(db.get_session("expired").unwrap().is_none());
    assert!(db.get_session("valid").unwrap().is_some());
}

#[test]
fn db_create_and_get_book() {
    let db = test_db();

    let full = Book {
        id: "book-1".to_string(),
        title: "Dune".to_string(),
        author: "Frank Herbert".to_string(),
        description: Some("Desert planet".to_string()),
        genre: Some("Science Fiction".to_string()),
        published_year: Some(1965),
        page_count: Some(412),
        cover_image_url: Some("/covers/dune.jpg".to_string()),
        pdf_file_path: Some("dune.pdf".to_string()),
        created_at: now_timestamp(),
    };
    db.create_book(&full).unwrap();

    let found = db.get_book("book-1").unwrap().unwrap();
    assert_eq!(found.title, "Dune");
    assert_eq!(found.published_year, Some(1965));
}

#[test]
fn db_book_optional_fields_stay_absent() {
    // Ingestion with only title, author, and a PDF leaves every other
    // field null
    let db = test_db();

    let minimal = Book {
        id: "book-min".to_string(),
        title: "Dune".to_string(),
        author: "Frank Herbert".to_string(),
        description: None,
        genre: None,
        published_year: None,
        page_count: None,
        cover_image_url: None,
        pdf_file_path: Some("abc-dune.pdf".to_string()),
        created_at: now_timestamp(),
    };
    db.create_book(&minimal).unwrap();

    let found = db.get_book("book-min").unwrap().unwrap();
    assert_eq!(found.description, None);
    assert_eq!(found.genre, None);
    assert_eq!(found.published_year, None);
    assert_eq!(found.page_count, None);
    assert_eq!(found.cover_image_url, None);
    assert!(found.pdf_file_path.is_some());
}

#[test]
fn db_list_books_newest_first() {
    let db = test_db();

    db.create_book(&book("book-old", "Old", 100)).unwrap();
    db.create_book(&book("book-mid", "Mid", 200)).unwrap();
    db.create_book(&book("book-new", "New", 300)).unwrap();

    let books = db.list_books().unwrap();
    let ids: Vec<&str> = books.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, vec!["book-new", "book-mid", "book-old"]);
}

#[test]
fn db_list_books_same_timestamp_latest_insert_first() {
    let db = test_db();

    db.create_book(&book("book-a", "A", 500)).unwrap();
    db.create_book(&book("book-b", "B", 500)).unwrap();

    let books = db.list_books().unwrap();
    assert_eq!(books[0].id, "book-b");
    assert_eq!(books[1].id, "book-a");
}

#[test]
fn reading_list_repeat_add_is_idempotent() {
    let db = test_db();
    setup_user_and_book(&db);

    add_entry(&db, "user-1", "book-1", "want_to_read");
    add_entry(&db, "user-1", "book-1", "want_to_read");

    let items = db.get_reading_list("user-1").unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].status, "want_to_read");
}

#[test]
fn reading_list_second_add_overwrites_status() {
    let db = test_db();
    setup_user_and_book(&db);

    add_entry(&db, "user-1", "book-1", "want_to_read");
    add_entry(&db, "user-1", "book-1", "currently_reading");

    let items = db.get_reading_list("user-1").unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].status, "currently_reading");
}

#[test]
fn reading_list_upsert_keeps_original_id() {
    let db = test_db();
    setup_user_and_book(&db);

    add_entry(&db, "user-1", "book-1", "want_to_read");
    let first = db
        .get_reading_list_entry("user-1", "book-1")
        .unwrap()
        .unwrap();

    add_entry(&db, "user-1", "book-1", "currently_reading");
    let second = db
        .get_reading_list_entry("user-1", "book-1")
        .unwrap()
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.status, "currently_reading");
}

#[test]
fn reading_list_separate_users_separate_rows() {
    let db = test_db();
    create_user(&db, "user-1", "alice");
    create_user(&db, "user-2", "bob");
    create_book(&db, "book-1", "Shared");

    add_entry(&db, "user-1", "book-1", "want_to_read");
    add_entry(&db, "user-2", "book-1", "currently_reading");

    assert_eq!(db.get_reading_list("user-1").unwrap().len(), 1);
    assert_eq!(db.get_reading_list("user-2").unwrap().len(), 1);
    assert_eq!(
        db.get_reading_list("user-1").unwrap()[0].status,
        "want_to_read"
    );
}

#[test]
fn reading_list_delete_missing_entry_fails() {
    let db = test_db();
    setup_user_and_book(&db);

    add_entry(&db, "user-1", "book-1", "want_to_read");

    assert!(!db.delete_reading_list_entry("no-such-id", "user-1").unwrap());
    // The existing membership is untouched
    assert_eq!(db.get_reading_list("user-1").unwrap().len(), 1);
}

#[test]
fn reading_list_delete_is_owner_scoped() {
    let db = test_db();
    create_user(&db, "user-1", "alice");
    create_user(&db, "user-2", "bob");
    create_book(&db, "book-1", "Test Book");

    add_entry(&db, "user-1", "book-1", "want_to_read");
    let entry = db
        .get_reading_list_entry("user-1", "book-1")
        .unwrap()
        .unwrap();

    assert!(!db.delete_reading_list_entry(&entry.id, "user-2").unwrap());
    assert!(db.delete_reading_list_entry(&entry.id, "user-1").unwrap());
    assert!(db.get_reading_list("user-1").unwrap().is_empty());
}

#[test]
fn reading_list_join_carries_book_fields() {
    let db = test_db();
    create_user(&db, "user-1", "alice");
    db.create_book(&Book {
        id: "book-1".to_string(),
        title: "Dune".to_string(),
        author: "Frank Herbert".to_string(),
        description: Some("Desert planet".to_string()),
        genre: None,
        published_year: None,
        page_count: None,
        cover_image_url: Some("/covers/dune.jpg".to_string()),
        pdf_file_path: None,
        created_at: now_timestamp(),
    })
    .unwrap();

    add_entry(&db, "user-1", "book-1", "currently_reading");

    let items = db.get_reading_list("user-1").unwrap();
    assert_eq!(items[0].book.title, "Dune");
    assert_eq!(items[0].book.author, "Frank Herbert");
    assert_eq!(
        items[0].book.cover_image_url.as_deref(),
        Some("/covers/dune.jpg")
    );
}

#[test]
fn partition_splits_by_status_without_overlap() {
    let db = test_db();
    create_user(&db, "user-1", "alice");
    create_book(&db, "book-1", "First");
    create_book(&db, "book-2", "Second");

    add_entry(&db, "user-1", "book-1", "currently_reading");
    add_entry(&db, "user-1", "book-2", "want_to_read");

    let items = db.get_reading_list("user-1").unwrap();
    let (reading, want) = partition_by_status(items);

    assert_eq!(reading.len(), 1);
    assert_eq!(want.len(), 1);
    assert_eq!(reading[0].book.id, "book-1");
    assert_eq!(want[0].book.id, "book-2");
}

#[test]
fn partition_drops_unknown_statuses() {
    let db = test_db();
    create_user(&db, "user-1", "alice");
    create_book(&db, "book-1", "First");
    create_book(&db, "book-2", "Second");

    add_entry(&db, "user-1", "book-1", "want_to_read");
    add_entry(&db, "user-1", "book-2", "finished");

    let items = db.get_reading_list("user-1").unwrap();
    assert_eq!(items.len(), 2);

    let (reading, want) = partition_by_status(items);
    assert!(reading.is_empty());
    assert_eq!(want.len(), 1);
    assert_eq!(want[0].book.id, "book-1");
}

#[test]
fn reading_status_labels() {
    assert_eq!(ReadingStatus::WantToRead.label(), "Want to Read");
    assert_eq!(ReadingStatus::CurrentlyReading.label(), "Currently Reading");
}

#[test]
fn reading_status_roundtrip_and_unknown() {
    assert_eq!(
        ReadingStatus::parse("want_to_read"),
        Some(ReadingStatus::WantToRead)
    );
    assert_eq!(
        ReadingStatus::parse("currently_reading"),
        Some(ReadingStatus::CurrentlyReading)
    );
    assert_eq!(ReadingStatus::parse("finished"), None);
    assert_eq!(ReadingStatus::parse(""), None);

    assert_eq!(ReadingStatus::WantToRead.as_str(), "want_to_read");
    assert_eq!(ReadingStatus::CurrentlyReading.as_str(), "currently_reading");
}

#[test]
fn reading_status_serde_uses_snake_case() {
    let json = serde_json::to_string(&ReadingStatus::CurrentlyReading).unwrap();
    assert_eq!(json, "\"currently_reading\"");

    let parsed: ReadingStatus = serde_json::from_str("\"want_to_read\"").unwrap();
    assert_eq!(parsed, ReadingStatus::WantToRead);

    assert!(serde_json::from_str::<ReadingStatus>("\"finished\"").is_err());
}

fn test_storage(ttl: i64) -> (tempfile::TempDir, Storage) {
    let dir = tempfile::tempdir().unwrap();
    let storage = Storage::open(&dir.path().join("books"), &dir.path().join("covers"), ttl).unwrap();
    (dir, storage)
}

#[test]
fn storage_content_names_never_collide() {
    let (_dir, storage) = test_storage(3600);

    let a = storage.store_content("dune.pdf", b"first").unwrap();
    let b = storage.store_content("dune.pdf", b"second").unwrap();

    assert_ne!(a, b);
    assert!(a.ends_with("-dune.pdf"));
}

#[test]
fn storage_cover_url_and_serving() {
    let (_dir, storage) = test_storage(3600);

    let stored = storage.store_cover("cover.jpg", b"jpeg-bytes").unwrap();
    let url = storage.cover_public_url(&stored);

    assert_eq!(url, format!("/covers/{}", stored));
    assert!(storage.cover_file(&stored).is_some());
    assert!(storage.cover_file("missing.jpg").is_none());
}

#[test]
fn storage_signed_url_grants_access() {
    let (_dir, storage) = test_storage(3600);

    let path = storage.store_content("dune.pdf", b"pdf-bytes").unwrap();
    let url = storage.create_signed_url(&path).unwrap();

    let token = url.strip_prefix("/content/").unwrap();
    let resolved = storage.resolve_grant(token).unwrap();
    assert_eq!(std::fs::read(resolved).unwrap(), b"pdf-bytes");
}

#[test]
fn storage_signed_url_for_missing_file_fails() {
    let (_dir, storage) = test_storage(3600);
    assert!(storage.create_signed_url("nope.pdf").is_err());
}

#[test]
fn storage_expired_grant_is_rejected() {
    let (_dir, storage) = test_storage(-1);

    let path = storage.store_content("dune.pdf", b"pdf-bytes").unwrap();
    let url = storage.create_signed_url(&path).unwrap();

    let token = url.strip_prefix("/content/").unwrap();
    assert!(storage.resolve_grant(token).is_none());
    assert_eq!(storage.active_grants(), 0);
}

#[test]
fn storage_unknown_token_is_rejected() {
    let (_dir, storage) = test_storage(3600);
    assert!(storage.resolve_grant("not-a-token").is_none());
}

fn test_state(storage: Storage) -> AppState {
    let db = test_db();
    let auth = AuthService::new(db.clone(), 30, true);
    AppState::new(Config::default(), db, auth, storage)
}

#[test]
fn content_url_absent_without_file_reference() {
    let (_dir, storage) = test_storage(3600);
    let state = test_state(storage);

    let mut b = book("book-1", "No File", now_timestamp());
    b.pdf_file_path = None;

    assert!(state.content_url_for(&b).is_none());
    // No grant may be minted for a book without content
    assert_eq!(state.storage.active_grants(), 0);
}

#[test]
fn content_url_minted_for_stored_file() {
    let (_dir, storage) = test_storage(3600);
    let path = storage.store_content("dune.pdf", b"pdf").unwrap();
    let state = test_state(storage);

    let mut b = book("book-1", "Dune", now_timestamp());
    b.pdf_file_path = Some(path);

    let url = state.content_url_for(&b).unwrap();
    assert!(url.starts_with("/content/"));
    assert_eq!(state.storage.active_grants(), 1);
}

#[test]
fn content_url_degrades_when_file_missing() {
    let (_dir, storage) = test_storage(3600);
    let state = test_state(storage);

    let b = book("book-1", "Gone", now_timestamp());
    assert!(b.pdf_file_path.is_some());
    assert!(state.content_url_for(&b).is_none());
    assert_eq!(state.storage.active_grants(), 0);
}

#[test]
fn auth_create_user_and_login() {
    let db = test_db();
    let auth = AuthService::new(db, 30, true);

    let user = auth.create_user("testuser", "password123", "user").unwrap();
    assert_eq!(user.username, "testuser");
    assert_eq!(user.role, "user");

    let (logged_in, token) = auth.login("testuser", "password123").unwrap();
    assert_eq!(logged_in.username, "testuser");
    assert!(!token.is_empty());
}

#[test]
fn auth_validate_token() {
    let db = test_db();
    let auth = AuthService::new(db, 30, true);

    auth.create_user("alice", "pass1234", "admin").unwrap();
    let (_, token) = auth.login("alice", "pass1234").unwrap();

    let user = auth.validate_token(&token).unwrap().unwrap();
    assert_eq!(user.username, "alice");

    assert!(auth.validate_token("invalid_token").unwrap().is_none());
}

#[test]
fn auth_logout() {
    let db = test_db();
    let auth = AuthService::new(db, 30, true);

    auth.create_user("bob", "password", "user").unwrap();
    let (_, token) = auth.login("bob", "password").unwrap();

    auth.logout(&token).unwrap();
    assert!(auth.validate_token(&token).unwrap().is_none());
}

#[test]
fn auth_registration_disabled() {
    let db = test_db();
    let auth = AuthService::new(db, 30, false);

    let result = auth.register("newuser", "password");
    assert!(result.is_err());
}

#[test]
fn auth_invalid_password() {
    let db = test_db();
    let auth = AuthService::new(db, 30, true);

    auth.create_user("user", "correct", "user").unwrap();
    let result = auth.login("user", "wrong");
    assert!(result.is_err());
}

#[test]
fn auth_is_admin() {
    let db = test_db();
    let auth = AuthService::new(db, 30, true);

    let admin = auth.create_user("admin", "password", "admin").unwrap();
    let user = auth.create_user("user", "password", "user").unwrap();

    assert!(auth.is_admin(&admin));
    assert!(!auth.is_admin(&user));
}

#[test]
fn config_parse_toml() {
    let toml = r#"
[server]
bind = "127.0.0.1:9090"
title = "Test Library"

[database]
path = "/tmp/test.db"

[storage]
content_dir = "/tmp/books"
covers_dir = "/tmp/covers"
signed_url_ttl_seconds = 600

[auth]
registration = "disabled"
session_days = 7
"#;
    let config: Config = toml::from_str(toml).unwrap();
    assert_eq!(config.server.bind.port(), 9090);
    assert_eq!(config.server.title, "Test Library");
    assert!(!config.auth.registration_enabled());
    assert_eq!(config.auth.session_days, 7);
    assert_eq!(config.storage.signed_url_ttl_seconds, 600);
}

#[test]
fn config_default_values() {
    let config = Config::default();
    assert_eq!(config.server.bind.port(), 8080);
    assert!(config.auth.registration_enabled());
    // Signed URLs default to a one hour lifetime
    assert_eq!(config.storage.signed_url_ttl_seconds, 3600);
}

//! HTTP server and routes.

mod handlers;
mod state;

pub use state::AppState;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/login", post(handlers::auth_login))
        .route("/register", post(handlers::auth_register))
        .route("/logout", post(handlers::auth_logout))
        .route("/me", get(handlers::auth_me));

    let book_routes = Router::new()
        .route("/", get(handlers::list_books).post(handlers::create_book))
        .route("/{id}", get(handlers::book_detail));

    let list_routes = Router::new()
        .route("/", get(handlers::get_reading_lists))
        .route(
            "/{id}",
            put(handlers::add_to_list).delete(handlers::remove_from_list),
        );

    Router::new()
        .route("/", get(handlers::index))
        .nest("/api/auth", auth_routes)
        .nest("/api/books", book_routes)
        .nest("/api/lists", list_routes)
        .route("/content/{token}", get(handlers::serve_content))
        .route("/covers/{file}", get(handlers::serve_cover))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

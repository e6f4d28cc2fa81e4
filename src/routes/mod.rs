use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::AllowOrigin, cors::CorsLayer, services::ServeDir, trace::TraceLayer};

pub mod auth;
pub mod books;
pub mod genres;
pub mod recommendations;
pub mod reviews;
pub mod shelves;
pub mod tutorials;
pub mod users;

use crate::state::AppState;

/// Multipart uploads top out at one cover plus form fields
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origin_list()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .nest_service("/uploads", ServeDir::new(&state.config.upload_dir))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// API routes under /api
fn api_routes() -> Router<AppState> {
    Router::new()
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        // User administration
        .route("/users", get(users::list_users))
        .route("/users/:id/role", put(users::update_role))
        // Catalog
        .route("/books", get(books::list_books).post(books::create_book))
        .route("/books/recommendations", get(recommendations::recommend))
        .route(
            "/books/:id",
            get(books::get_book)
                .put(books::update_book)
                .delete(books::delete_book),
        )
        .route("/genres", get(genres::list_genres).post(genres::create_genre))
        .route(
            "/genres/:id",
            put(genres::update_genre).delete(genres::delete_genre),
        )
        // Shelves
        .route(
            "/shelves",
            get(shelves::list_shelves).post(shelves::add_to_shelf),
        )
        .route("/shelves/stats", get(shelves::stats))
        .route("/shelves/:id/progress", put(shelves::update_progress))
        .route("/shelves/:id", delete(shelves::remove_from_shelf))
        // Reviews
        .route(
            "/reviews",
            get(reviews::list_reviews).post(reviews::create_review),
        )
        .route("/reviews/pending", get(reviews::pending_reviews))
        .route("/reviews/book/:book_id", get(reviews::reviews_by_book))
        .route("/reviews/:id/approve", put(reviews::approve_review))
        .route("/reviews/:id", delete(reviews::delete_review))
        // Tutorials
        .route(
            "/tutorials",
            get(tutorials::list_tutorials).post(tutorials::create_tutorial),
        )
        .route(
            "/tutorials/:id",
            get(tutorials::get_tutorial)
                .put(tutorials::update_tutorial)
                .delete(tutorials::delete_tutorial),
        )
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

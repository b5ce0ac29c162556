pub mod attachments;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod query;

use std::sync::Arc;

use attachments::AttachmentUrls;
use axum::{
    routing::{get, post},
    Router,
};
use db::DbPool;

/// Shared by every request. Built once in `main` and never mutated.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub attachments: Arc<AttachmentUrls>,
    pub base_path: Arc<String>,
}

pub fn create_app(state: AppState) -> Router {
    let base_path = state.base_path.clone();

    let app_routes = Router::new()
        .route(
            "/todos",
            get(handlers::todos::list_all_todos).post(handlers::todos::create_new_todo),
        )
        .route("/todos/retrieve", post(handlers::todos::retrieve))
        .route(
            "/todos/{todo_id}",
            get(handlers::todos::get_single_todo)
                .patch(handlers::todos::update_existing_todo)
                .delete(handlers::todos::delete_existing_todo),
        )
        .route(
            "/todos/{todo_id}/attachment",
            post(handlers::todos::generate_upload_url),
        )
        .layer(
            tower::ServiceBuilder::new()
                .layer(tower_http::trace::TraceLayer::new_for_http())
                .layer(tower_http::cors::CorsLayer::very_permissive())
                .layer(tower_http::compression::CompressionLayer::new()),
        )
        .with_state(state);

    tracing::info!("base_path: {base_path:?}");

    if base_path.is_empty() {
        app_routes
    } else {
        Router::new().nest(&*base_path, app_routes)
    }
}

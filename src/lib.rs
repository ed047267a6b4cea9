pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod util;

use axum::{Router, response::IntoResponse, routing::get};
use sqlx::SqlitePool;

use routes::{
    admin_routes, auth_routes, blog_comments_routes, blogs_routes, categories_routes,
    comments_routes, tags_routes, users_routes,
};

pub fn app(pool: SqlitePool) -> Router {
    Router::new()
        .nest("/api/auth", auth_routes())
        .nest("/api/users", users_routes())
        .nest("/api/blogs", blogs_routes())
        .nest("/api/blogs", blog_comments_routes())
        .nest("/api/comments", comments_routes())
        .nest("/api/categories", categories_routes())
        .nest("/api/tags", tags_routes())
        .nest("/api/admin", admin_routes())
        .route("/api/health", get(health_check))
        .with_state(pool)
}

async fn health_check() -> impl IntoResponse {
    axum::Json(serde_json::json!({"status": "healthy"}))
}

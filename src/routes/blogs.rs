use axum::{
    Router,
    extract::{Json, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use sqlx::SqlitePool;

use crate::error::ApiError;
use crate::models::{BlogQuery, CreateBlog, RelatedQuery, UpdateBlog};
use crate::routes::auth::{extract_admin_user, extract_current_user};
use crate::services::blogs;

pub fn blogs_routes() -> Router<SqlitePool> {
    Router::new()
        .route("/", get(list_blogs).post(create_blog))
        .route("/search", get(search_blogs))
        .route("/{slug}", get(get_blog).put(update_blog).delete(delete_blog))
        .route("/{slug}/related", get(related_blogs))
        .route("/{slug}/like", post(like_blog).delete(unlike_blog))
}

async fn list_blogs(
    State(pool): State<SqlitePool>,
    Query(query): Query<BlogQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let response = blogs::list_blogs(&pool, &query).await?;
    Ok(Json(response))
}

async fn create_blog(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
    Json(input): Json<CreateBlog>,
) -> Result<impl IntoResponse, ApiError> {
    let admin = extract_admin_user(&pool, &headers).await?;
    let blog = blogs::create_blog(&pool, admin.id, &input).await?;
    tracing::info!("blog '{}' created by {}", blog.slug, admin.username);
    Ok((StatusCode::CREATED, Json(blog)))
}

async fn search_blogs(
    State(pool): State<SqlitePool>,
    Query(query): Query<BlogQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let keyword = query.keyword.unwrap_or_default();
    let results = blogs::search_blogs(&pool, &keyword).await?;
    Ok(Json(results))
}

async fn get_blog(
    State(pool): State<SqlitePool>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let blog = blogs::get_blog_by_slug(&pool, &slug).await?;
    Ok(Json(blog))
}

async fn update_blog(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
    Path(slug): Path<String>,
    Json(input): Json<UpdateBlog>,
) -> Result<impl IntoResponse, ApiError> {
    extract_admin_user(&pool, &headers).await?;
    let blog = blogs::update_blog(&pool, &slug, &input).await?;
    Ok(Json(blog))
}

async fn delete_blog(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let admin = extract_admin_user(&pool, &headers).await?;
    blogs::delete_blog(&pool, &slug).await?;
    tracing::info!("blog '{slug}' deleted by {}", admin.username);
    Ok(Json(json!({"message": "Blog deleted successfully."})))
}

async fn related_blogs(
    State(pool): State<SqlitePool>,
    Path(slug): Path<String>,
    Query(query): Query<RelatedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let related = blogs::related_blogs(&pool, &slug, query.limit).await?;
    Ok(Json(related))
}

async fn like_blog(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = extract_current_user(&pool, &headers).await?;
    let blog = blogs::find_by_slug(&pool, &slug).await?;
    let like_count = blogs::like_blog(&pool, blog.id, user.id).await?;
    Ok(Json(json!({
        "message": "Blog liked successfully.",
        "like_count": like_count
    })))
}

async fn unlike_blog(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = extract_current_user(&pool, &headers).await?;
    let blog = blogs::find_by_slug(&pool, &slug).await?;
    let like_count = blogs::unlike_blog(&pool, blog.id, user.id).await?;
    Ok(Json(json!({
        "message": "Blog like removed.",
        "like_count": like_count
    })))
}

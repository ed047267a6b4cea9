use axum::{
    Router,
    extract::{Json, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
};
use sqlx::SqlitePool;

use crate::error::ApiError;
use crate::models::{CommentListQuery, CreateComment};
use crate::routes::auth::extract_current_user;
use crate::services::{blogs, comments};

/// Blog-scoped comment endpoints, nested under the blogs router.
pub fn blog_comments_routes() -> Router<SqlitePool> {
    Router::new().route(
        "/{slug}/comments",
        get(list_comments).post(create_comment),
    )
}

/// Comment-scoped endpoints: replying and deletion.
pub fn comments_routes() -> Router<SqlitePool> {
    Router::new()
        .route("/{comment_id}/replies", post(add_reply))
        .route("/{comment_id}", delete(delete_comment))
}

async fn create_comment(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
    Path(slug): Path<String>,
    Json(input): Json<CreateComment>,
) -> Result<impl IntoResponse, ApiError> {
    let user = extract_current_user(&pool, &headers).await?;
    let blog = blogs::find_by_slug(&pool, &slug).await?;
    let comment = comments::create_comment(&pool, blog.id, user.id, &input.content).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn list_comments(
    State(pool): State<SqlitePool>,
    Path(slug): Path<String>,
    Query(query): Query<CommentListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let blog = blogs::find_by_slug(&pool, &slug).await?;
    let page = comments::get_comments_for_blog(&pool, blog.id, &query).await?;
    Ok(Json(page))
}

async fn add_reply(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
    Path(comment_id): Path<i64>,
    Json(input): Json<CreateComment>,
) -> Result<impl IntoResponse, ApiError> {
    let user = extract_current_user(&pool, &headers).await?;
    let reply = comments::add_reply(&pool, comment_id, user.id, &input.content).await?;
    Ok((StatusCode::CREATED, Json(reply)))
}

async fn delete_comment(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
    Path(comment_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user = extract_current_user(&pool, &headers).await?;
    let outcome = comments::delete_comment(&pool, comment_id, user.id, user.role).await?;
    tracing::info!(
        "user {} deleted comment {comment_id} ({} rows)",
        user.username,
        outcome.deleted_count
    );
    Ok(Json(outcome))
}

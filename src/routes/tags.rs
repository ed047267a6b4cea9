use axum::{
    Router,
    extract::{Json, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;

use crate::error::ApiError;
use crate::models::{BlogSummary, CreateTag, Tag, UpdateTag};
use crate::routes::auth::extract_admin_user;
use crate::util::slugify;

pub fn tags_routes() -> Router<SqlitePool> {
    Router::new()
        .route("/", get(list_tags).post(create_tag))
        .route("/{slug}", get(get_tag).put(update_tag).delete(delete_tag))
}

async fn list_tags(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, ApiError> {
    let tags = sqlx::query_as::<_, Tag>("SELECT * FROM tags ORDER BY created_at DESC, id DESC")
        .fetch_all(&pool)
        .await?;
    Ok(Json(tags))
}

async fn create_tag(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
    Json(input): Json<CreateTag>,
) -> Result<impl IntoResponse, ApiError> {
    extract_admin_user(&pool, &headers).await?;

    let name = input.name.trim();
    if name.is_empty() {
        return Err(ApiError::Invalid("Name is required."));
    }
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(ApiError::Invalid("Name must contain alphanumeric characters."));
    }

    let existing = sqlx::query_as::<_, (i64,)>(
        "SELECT id FROM tags WHERE name = ? COLLATE NOCASE OR slug = ?",
    )
    .bind(name)
    .bind(&slug)
    .fetch_optional(&pool)
    .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict("Tag already exists."));
    }

    let result = sqlx::query("INSERT INTO tags (name, slug, created_at) VALUES (?, ?, ?)")
        .bind(name)
        .bind(&slug)
        .bind(Utc::now())
        .execute(&pool)
        .await?;

    let tag = sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE id = ?")
        .bind(result.last_insert_rowid())
        .fetch_one(&pool)
        .await?;

    Ok((StatusCode::CREATED, Json(tag)))
}

async fn get_tag(
    State(pool): State<SqlitePool>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tag = find_tag_by_slug(&pool, &slug).await?;

    let blogs = sqlx::query_as::<_, BlogSummary>(
        "SELECT b.id, b.title, b.slug, b.excerpt, b.author_id, b.is_published, \
         b.total_comments, b.like_count, b.created_at, b.updated_at \
         FROM blog_tags bt JOIN blogs b ON b.id = bt.blog_id \
         WHERE bt.tag_id = ? AND b.is_published = TRUE \
         ORDER BY b.created_at DESC, b.id DESC",
    )
    .bind(tag.id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(json!({"tag": tag, "blogs": blogs})))
}

async fn update_tag(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
    Path(slug): Path<String>,
    Json(input): Json<UpdateTag>,
) -> Result<impl IntoResponse, ApiError> {
    extract_admin_user(&pool, &headers).await?;

    let tag = find_tag_by_slug(&pool, &slug).await?;

    let name = input.name.trim();
    if name.is_empty() {
        return Err(ApiError::Invalid("Name is required."));
    }
    let new_slug = slugify(name);
    if new_slug.is_empty() {
        return Err(ApiError::Invalid("Name must contain alphanumeric characters."));
    }

    let conflicting = sqlx::query_as::<_, (i64,)>(
        "SELECT id FROM tags WHERE (name = ? COLLATE NOCASE OR slug = ?) AND id != ?",
    )
    .bind(name)
    .bind(&new_slug)
    .bind(tag.id)
    .fetch_optional(&pool)
    .await?;
    if conflicting.is_some() {
        return Err(ApiError::Conflict("Tag already exists."));
    }

    sqlx::query("UPDATE tags SET name = ?, slug = ?, updated_at = ? WHERE id = ?")
        .bind(name)
        .bind(&new_slug)
        .bind(Utc::now())
        .bind(tag.id)
        .execute(&pool)
        .await?;

    let updated = sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE id = ?")
        .bind(tag.id)
        .fetch_one(&pool)
        .await?;

    Ok(Json(updated))
}

async fn delete_tag(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    extract_admin_user(&pool, &headers).await?;

    let result = sqlx::query("DELETE FROM tags WHERE slug = ?")
        .bind(&slug)
        .execute(&pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Tag not found."));
    }

    Ok(Json(json!({"message": "Tag deleted successfully."})))
}

async fn find_tag_by_slug(pool: &SqlitePool, slug: &str) -> Result<Tag, ApiError> {
    sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE slug = ?")
        .bind(slug)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::NotFound("Tag not found."))
}

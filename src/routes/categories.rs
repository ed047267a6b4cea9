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
use crate::models::{BlogSummary, Category, CreateCategory, UpdateCategory};
use crate::routes::auth::extract_admin_user;
use crate::util::slugify;

pub fn categories_routes() -> Router<SqlitePool> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route(
            "/{slug}",
            get(get_category).put(update_category).delete(delete_category),
        )
}

async fn list_categories(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, ApiError> {
    let categories = sqlx::query_as::<_, Category>(
        "SELECT * FROM categories ORDER BY created_at DESC, id DESC",
    )
    .fetch_all(&pool)
    .await?;
    Ok(Json(categories))
}

async fn create_category(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
    Json(input): Json<CreateCategory>,
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
        "SELECT id FROM categories WHERE name = ? COLLATE NOCASE OR slug = ?",
    )
    .bind(name)
    .bind(&slug)
    .fetch_optional(&pool)
    .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict("Category already exists."));
    }

    let result = sqlx::query("INSERT INTO categories (name, slug, created_at) VALUES (?, ?, ?)")
        .bind(name)
        .bind(&slug)
        .bind(Utc::now())
        .execute(&pool)
        .await?;

    let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?")
        .bind(result.last_insert_rowid())
        .fetch_one(&pool)
        .await?;

    Ok((StatusCode::CREATED, Json(category)))
}

async fn get_category(
    State(pool): State<SqlitePool>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let category = find_category_by_slug(&pool, &slug).await?;

    let blogs = sqlx::query_as::<_, BlogSummary>(
        "SELECT b.id, b.title, b.slug, b.excerpt, b.author_id, b.is_published, \
         b.total_comments, b.like_count, b.created_at, b.updated_at \
         FROM blog_categories bc JOIN blogs b ON b.id = bc.blog_id \
         WHERE bc.category_id = ? AND b.is_published = TRUE \
         ORDER BY b.created_at DESC, b.id DESC",
    )
    .bind(category.id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(json!({"category": category, "blogs": blogs})))
}

async fn update_category(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
    Path(slug): Path<String>,
    Json(input): Json<UpdateCategory>,
) -> Result<impl IntoResponse, ApiError> {
    extract_admin_user(&pool, &headers).await?;

    let category = find_category_by_slug(&pool, &slug).await?;

    let name = input.name.trim();
    if name.is_empty() {
        return Err(ApiError::Invalid("Name is required."));
    }
    let new_slug = slugify(name);
    if new_slug.is_empty() {
        return Err(ApiError::Invalid("Name must contain alphanumeric characters."));
    }

    let conflicting = sqlx::query_as::<_, (i64,)>(
        "SELECT id FROM categories WHERE (name = ? COLLATE NOCASE OR slug = ?) AND id != ?",
    )
    .bind(name)
    .bind(&new_slug)
    .bind(category.id)
    .fetch_optional(&pool)
    .await?;
    if conflicting.is_some() {
        return Err(ApiError::Conflict("Category already exists."));
    }

    sqlx::query("UPDATE categories SET name = ?, slug = ?, updated_at = ? WHERE id = ?")
        .bind(name)
        .bind(&new_slug)
        .bind(Utc::now())
        .bind(category.id)
        .execute(&pool)
        .await?;

    let updated = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?")
        .bind(category.id)
        .fetch_one(&pool)
        .await?;

    Ok(Json(updated))
}

async fn delete_category(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    extract_admin_user(&pool, &headers).await?;

    let result = sqlx::query("DELETE FROM categories WHERE slug = ?")
        .bind(&slug)
        .execute(&pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Category not found."));
    }

    Ok(Json(json!({"message": "Category deleted successfully."})))
}

async fn find_category_by_slug(pool: &SqlitePool, slug: &str) -> Result<Category, ApiError> {
    sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE slug = ?")
        .bind(slug)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::NotFound("Category not found."))
}

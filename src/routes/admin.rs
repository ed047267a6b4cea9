use axum::{
    Router,
    extract::{Json, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, put},
};
use bcrypt::{DEFAULT_COST, hash};
use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::ApiError;
use crate::models::{AdminCreateUser, UpdateUserRole, User, UserResponse, UserRole};
use crate::routes::auth::extract_admin_user;

pub fn admin_routes() -> Router<SqlitePool> {
    Router::new()
        .route("/stats", get(admin_stats))
        .route("/users", get(admin_list_users).post(admin_create_user))
        .route("/users/{user_id}/role", put(admin_update_role))
        .route("/users/{user_id}", delete(admin_delete_user))
}

// ============================
// GET /admin/stats
// ============================
async fn admin_stats(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let _admin = extract_admin_user(&pool, &headers).await?;

    let user_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(&pool)
        .await?;

    let blog_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM blogs")
        .fetch_one(&pool)
        .await?;

    let comment_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM comments")
        .fetch_one(&pool)
        .await?;

    let like_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM blog_likes")
        .fetch_one(&pool)
        .await?;

    Ok(Json(serde_json::json!({
        "total_users": user_count.0,
        "total_blogs": blog_count.0,
        "total_comments": comment_count.0,
        "total_likes": like_count.0,
    })))
}

// ============================
// GET /admin/users
// ============================
async fn admin_list_users(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let _admin = extract_admin_user(&pool, &headers).await?;

    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC, id DESC")
        .fetch_all(&pool)
        .await?;

    // Full user info plus authored-content counts.
    let mut user_list = Vec::new();
    for u in users {
        let blog_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM blogs WHERE author_id = ?")
            .bind(u.id)
            .fetch_one(&pool)
            .await?;

        let comment_count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM comments WHERE author_id = ?")
                .bind(u.id)
                .fetch_one(&pool)
                .await?;

        let resp = UserResponse::from(u);
        user_list.push(serde_json::json!({
            "id": resp.id,
            "username": resp.username,
            "name": resp.name,
            "email": resp.email,
            "role": resp.role,
            "account_status": resp.account_status,
            "is_verified": resp.is_verified,
            "followers_count": resp.followers_count,
            "following_count": resp.following_count,
            "created_at": resp.created_at,
            "blog_count": blog_count.0,
            "comment_count": comment_count.0,
        }));
    }

    Ok(Json(serde_json::json!(user_list)))
}

// ============================
// POST /admin/users
// ============================
async fn admin_create_user(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
    Json(input): Json<AdminCreateUser>,
) -> Result<impl IntoResponse, ApiError> {
    let _admin = extract_admin_user(&pool, &headers).await?;

    let name = input.name.trim();
    if name.is_empty() {
        return Err(ApiError::Invalid("Name is required."));
    }

    let email = input.email.trim().to_lowercase();
    let local_part = match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => local.to_string(),
        _ => return Err(ApiError::Invalid("Must be a valid email address.")),
    };

    let role = match input.role.as_deref() {
        Some(raw) => UserRole::parse(raw).ok_or(ApiError::Invalid("Invalid role."))?,
        None => UserRole::User,
    };

    let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(&pool)
        .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict("Email is already registered."));
    }

    let username = local_part;
    let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE username = ?")
        .bind(&username)
        .fetch_optional(&pool)
        .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict("Username is already taken."));
    }

    let hashed = hash(&input.password, DEFAULT_COST)?;
    let now = Utc::now();

    // Admin-created accounts skip the email verification round-trip.
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, name, email, hashed_password, role,
                           account_status, is_verified, agreed_to_terms, created_at)
        VALUES (?, ?, ?, ?, ?, 'active', TRUE, TRUE, ?)
        "#,
    )
    .bind(&username)
    .bind(name)
    .bind(&email)
    .bind(&hashed)
    .bind(role)
    .bind(now)
    .execute(&pool)
    .await?;

    let created = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(result.last_insert_rowid())
        .fetch_one(&pool)
        .await?;

    tracing::info!("admin created user {}", created.username);
    Ok((StatusCode::CREATED, Json(UserResponse::from(created))))
}

// ============================
// PUT /admin/users/:id/role
// ============================
async fn admin_update_role(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
    Json(input): Json<UpdateUserRole>,
) -> Result<impl IntoResponse, ApiError> {
    let admin = extract_admin_user(&pool, &headers).await?;

    let role = UserRole::parse(&input.role).ok_or(ApiError::Invalid("Invalid role."))?;

    if admin.id == user_id && !role.is_admin() {
        return Err(ApiError::InvalidOperation(
            "You cannot remove your own admin role.",
        ));
    }

    let target: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&pool)
        .await?;
    if target.is_none() {
        return Err(ApiError::NotFound("User not found."));
    }

    sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
        .bind(role)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&pool)
        .await?;

    let updated = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_one(&pool)
        .await?;

    Ok(Json(UserResponse::from(updated)))
}

// ============================
// DELETE /admin/users/:id
// ============================
async fn admin_delete_user(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let admin = extract_admin_user(&pool, &headers).await?;

    if admin.id == user_id {
        return Err(ApiError::InvalidOperation(
            "You cannot delete your own account.",
        ));
    }

    let target: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&pool)
        .await?;
    if target.is_none() {
        return Err(ApiError::NotFound("User not found."));
    }

    // Denormalized counters on surviving rows must be settled before the
    // foreign-key cascades remove the edges they were derived from.
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE blogs SET like_count = like_count - 1
        WHERE id IN (SELECT blog_id FROM blog_likes WHERE user_id = ?)
        "#,
    )
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE blogs
        SET total_comments = total_comments -
            (SELECT COUNT(*) FROM comments WHERE comments.blog_id = blogs.id AND comments.author_id = ?)
        WHERE id IN (SELECT DISTINCT blog_id FROM comments WHERE author_id = ?)
        "#,
    )
    .bind(user_id)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE users SET followers_count = followers_count - 1
        WHERE id IN (SELECT related_user_id FROM relationships
                     WHERE user_id = ? AND kind = 'following')
        "#,
    )
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE users SET following_count = following_count - 1
        WHERE id IN (SELECT user_id FROM relationships
                     WHERE related_user_id = ? AND kind = 'following')
        "#,
    )
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM comments WHERE author_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM blogs WHERE author_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    // Likes, relationships, and remaining join rows cascade off this delete.
    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!("admin {} deleted user {}", admin.id, user_id);
    Ok(Json(serde_json::json!({"message": "User deleted successfully."})))
}

use axum::{
    Router,
    extract::{Json, Path, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post, put},
};
use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::ApiError;
use crate::models::{UpdateProfile, User, UserResponse};
use crate::routes::auth::extract_current_user;
use crate::services::{blogs, relationships};

pub fn users_routes() -> Router<SqlitePool> {
    Router::new()
        .route("/me", put(update_profile))
        .route("/{username}", get(get_user))
        .route("/{username}/blogs", get(get_user_blogs))
        .route("/{username}/follow", post(follow_user).delete(unfollow_user))
        .route("/{username}/follow-back", post(follow_back))
        .route("/{username}/followers", get(get_followers))
        .route("/{username}/following", get(get_following))
}

pub async fn find_user_by_username(pool: &SqlitePool, username: &str) -> Result<User, ApiError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::NotFound("User not found."))
}

async fn get_user(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    extract_current_user(&pool, &headers).await?;
    let user = find_user_by_username(&pool, &username).await?;
    Ok(Json(UserResponse::from(user)))
}

async fn update_profile(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
    Json(input): Json<UpdateProfile>,
) -> Result<impl IntoResponse, ApiError> {
    let current_user = extract_current_user(&pool, &headers).await?;

    let name = match input.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => current_user.name.clone(),
    };
    let about = optional_field(input.about.as_deref(), current_user.about.clone());
    let website = optional_field(input.website.as_deref(), current_user.website.clone());
    let profession = optional_field(input.profession.as_deref(), current_user.profession.clone());
    let company = optional_field(input.company.as_deref(), current_user.company.clone());

    sqlx::query(
        "UPDATE users SET name = ?, about = ?, website = ?, profession = ?, company = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&name)
    .bind(&about)
    .bind(&website)
    .bind(&profession)
    .bind(&company)
    .bind(Utc::now())
    .bind(current_user.id)
    .execute(&pool)
    .await?;

    let updated = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(current_user.id)
        .fetch_one(&pool)
        .await?;

    Ok(Json(UserResponse::from(updated)))
}

// A supplied empty string clears the field; an absent field keeps the
// current value.
fn optional_field(input: Option<&str>, current: Option<String>) -> Option<String> {
    match input {
        Some(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        None => current,
    }
}

async fn get_user_blogs(
    State(pool): State<SqlitePool>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = find_user_by_username(&pool, &username).await?;
    let blogs = blogs::user_blogs(&pool, user.id).await?;
    Ok(Json(blogs))
}

async fn follow_user(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let current_user = extract_current_user(&pool, &headers).await?;
    let target = find_user_by_username(&pool, &username).await?;
    let response = relationships::follow_user(&pool, current_user.id, target.id).await?;
    Ok(Json(response))
}

async fn follow_back(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let current_user = extract_current_user(&pool, &headers).await?;
    let target = find_user_by_username(&pool, &username).await?;
    let response = relationships::follow_back(&pool, current_user.id, target.id).await?;
    Ok(Json(response))
}

async fn unfollow_user(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let current_user = extract_current_user(&pool, &headers).await?;
    let target = find_user_by_username(&pool, &username).await?;
    let response = relationships::unfollow_user(&pool, current_user.id, target.id).await?;
    Ok(Json(response))
}

async fn get_followers(
    State(pool): State<SqlitePool>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = find_user_by_username(&pool, &username).await?;
    let followers = relationships::followers_of(&pool, user.id).await?;
    Ok(Json(followers))
}

async fn get_following(
    State(pool): State<SqlitePool>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = find_user_by_username(&pool, &username).await?;
    let following = relationships::following_of(&pool, user.id).await?;
    Ok(Json(following))
}

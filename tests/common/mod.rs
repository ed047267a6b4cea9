#![allow(dead_code)]

use std::path::PathBuf;

use chrono::Utc;
use sqlx::SqlitePool;

use inkpot::models::User;

/// Password every seeded user gets; hashed at the lowest bcrypt cost to keep
/// the suite fast.
pub const PASSWORD: &str = "sekret1";

pub async fn test_pool() -> SqlitePool {
    inkpot::db::init_db("sqlite::memory:")
        .await
        .expect("in-memory database")
}

/// File-backed database for tests that need several connections at once; the
/// in-memory pool is pinned to a single connection. Callers remove the file
/// when they are done.
pub async fn file_backed_pool(name: &str) -> (SqlitePool, PathBuf) {
    let path = std::env::temp_dir().join(format!("inkpot-test-{name}-{}.db", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let pool = inkpot::db::init_db(&format!("sqlite://{}", path.display()))
        .await
        .expect("file-backed database");
    (pool, path)
}

pub async fn seed_user(pool: &SqlitePool, username: &str) -> i64 {
    seed_user_with_role(pool, username, "user").await
}

pub async fn seed_admin(pool: &SqlitePool, username: &str) -> i64 {
    seed_user_with_role(pool, username, "admin").await
}

pub async fn seed_user_with_role(pool: &SqlitePool, username: &str, role: &str) -> i64 {
    let hashed = bcrypt::hash(PASSWORD, 4).expect("hash password");
    let result = sqlx::query(
        "INSERT INTO users (username, name, email, hashed_password, role, account_status, \
         is_verified, agreed_to_terms, created_at) \
         VALUES (?, ?, ?, ?, ?, 'active', TRUE, TRUE, ?)",
    )
    .bind(username)
    .bind(username)
    .bind(format!("{username}@example.com"))
    .bind(&hashed)
    .bind(role)
    .bind(Utc::now())
    .execute(pool)
    .await
    .expect("seed user");
    result.last_insert_rowid()
}

pub async fn seed_blog(pool: &SqlitePool, author_id: i64, title: &str, slug: &str) -> i64 {
    let result = sqlx::query(
        "INSERT INTO blogs (title, slug, content, author_id, is_published, created_at) \
         VALUES (?, ?, ?, ?, TRUE, ?)",
    )
    .bind(title)
    .bind(slug)
    .bind("Seeded body text, long enough to look like a real article.")
    .bind(author_id)
    .bind(Utc::now())
    .execute(pool)
    .await
    .expect("seed blog");
    result.last_insert_rowid()
}

pub async fn seed_category(pool: &SqlitePool, name: &str, slug: &str) -> i64 {
    let result = sqlx::query("INSERT INTO categories (name, slug, created_at) VALUES (?, ?, ?)")
        .bind(name)
        .bind(slug)
        .bind(Utc::now())
        .execute(pool)
        .await
        .expect("seed category");
    result.last_insert_rowid()
}

pub async fn seed_tag(pool: &SqlitePool, name: &str, slug: &str) -> i64 {
    let result = sqlx::query("INSERT INTO tags (name, slug, created_at) VALUES (?, ?, ?)")
        .bind(name)
        .bind(slug)
        .bind(Utc::now())
        .execute(pool)
        .await
        .expect("seed tag");
    result.last_insert_rowid()
}

pub async fn fetch_user(pool: &SqlitePool, user_id: i64) -> User {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("user row")
}

pub async fn auth_token(pool: &SqlitePool, user_id: i64) -> String {
    let user = fetch_user(pool, user_id).await;
    inkpot::routes::auth::generate_jwt(&user).expect("jwt")
}

pub async fn blog_comment_counter(pool: &SqlitePool, blog_id: i64) -> i64 {
    let (count,): (i64,) = sqlx::query_as("SELECT total_comments FROM blogs WHERE id = ?")
        .bind(blog_id)
        .fetch_one(pool)
        .await
        .expect("blog row");
    count
}

pub async fn comment_row_count(pool: &SqlitePool, blog_id: i64) -> i64 {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM comments WHERE blog_id = ?")
        .bind(blog_id)
        .fetch_one(pool)
        .await
        .expect("count comments");
    count
}

/// (following_count, followers_count) straight off the user row.
pub async fn follow_counters(pool: &SqlitePool, user_id: i64) -> (i64, i64) {
    sqlx::query_as("SELECT following_count, followers_count FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("user counters")
}

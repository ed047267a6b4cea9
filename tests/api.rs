mod common;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use common::*;

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("request");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

fn get_auth(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request")
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn delete_auth(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request")
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let pool = test_pool().await;
    let app = inkpot::app(pool);

    let (status, body) = send(&app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn register_verify_login_flow() {
    let pool = test_pool().await;
    let app = inkpot::app(pool.clone());

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            &json!({
                "name": "Dana",
                "email": "dana@example.com",
                "password": "hunter42",
                "agreed_to_terms": true
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        body["message"],
        "Signup successful. Check your email to verify your account."
    );

    // Login is blocked until the email round-trip completes.
    let credentials = json!({"email": "dana@example.com", "password": "hunter42"});
    let (status, body) = send(&app, json_request("POST", "/api/auth/login", None, &credentials)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Email not verified.");

    let (token,): (String,) = sqlx::query_as("SELECT verify_token FROM users WHERE email = ?")
        .bind("dana@example.com")
        .fetch_one(&pool)
        .await
        .expect("verify token");

    let (status, body) = send(&app, get(&format!("/api/auth/verify-email/{token}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Email verified successfully. You can now log in.");

    let (status, body) = send(&app, json_request("POST", "/api/auth/login", None, &credentials)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["user"]["username"], "dana");
    let access = body["access_token"].as_str().expect("access token").to_string();

    let (status, body) = send(&app, get_auth("/api/auth/me", &access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "dana");
    assert_eq!(body["name"], "Dana");
    assert!(body.get("hashed_password").is_none());
}

#[tokio::test]
async fn register_rejects_bad_input() {
    let pool = test_pool().await;
    seed_user(&pool, "erin").await;
    let app = inkpot::app(pool);

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            &json!({"name": "X", "email": "nodomain", "password": "hunter42", "agreed_to_terms": true}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Must be a valid email address.");

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            &json!({"name": "X", "email": "x@example.com", "password": "letters", "agreed_to_terms": true}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Password must contain a digit.");

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            &json!({"name": "X", "email": "x@example.com", "password": "hunter42"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "You must agree to the terms and conditions.");

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            &json!({"name": "Erin Again", "email": "erin@example.com", "password": "hunter42", "agreed_to_terms": true}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["detail"], "Email is already registered.");
}

#[tokio::test]
async fn protected_routes_require_bearer_token() {
    let pool = test_pool().await;
    let author = seed_user(&pool, "alice").await;
    seed_blog(&pool, author, "Locked", "locked").await;
    let app = inkpot::app(pool);

    let comment = json!({"content": "hi"});

    let (status, body) = send(
        &app,
        json_request("POST", "/api/blogs/locked/comments", None, &comment),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Missing authorization header.");

    let request = Request::builder()
        .method("POST")
        .uri("/api/blogs/locked/comments")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, "Token abc")
        .body(Body::from(comment.to_string()))
        .expect("request");
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid authorization header.");

    let (status, body) = send(
        &app,
        json_request("POST", "/api/blogs/locked/comments", Some("garbage"), &comment),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid token.");
}

#[tokio::test]
async fn blog_creation_is_admin_only() {
    let pool = test_pool().await;
    let user = seed_user(&pool, "alice").await;
    let admin = seed_admin(&pool, "boss").await;
    let category = seed_category(&pool, "Rust", "rust").await;
    let tag = seed_tag(&pool, "Tips", "tips").await;
    let user_token = auth_token(&pool, user).await;
    let admin_token = auth_token(&pool, admin).await;
    let app = inkpot::app(pool);

    let blog = json!({
        "title": "Admin Only",
        "content": "A body comfortably past the minimum length gate.",
        "categories": [category],
        "tags": [tag]
    });

    let (status, body) = send(
        &app,
        json_request("POST", "/api/blogs", Some(&user_token), &blog),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Admin privileges required.");

    let (status, body) = send(
        &app,
        json_request("POST", "/api/blogs", Some(&admin_token), &blog),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["slug"], "admin-only");
    assert_eq!(body["author"]["username"], "boss");
}

#[tokio::test]
async fn comment_thread_flow_over_http() {
    let pool = test_pool().await;
    let alice = seed_user(&pool, "alice").await;
    let bob = seed_user(&pool, "bob").await;
    let mallory = seed_user(&pool, "mallory").await;
    seed_blog(&pool, alice, "Discussion", "discussion").await;
    let alice_token = auth_token(&pool, alice).await;
    let bob_token = auth_token(&pool, bob).await;
    let mallory_token = auth_token(&pool, mallory).await;
    let app = inkpot::app(pool);

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/blogs/discussion/comments",
            Some(&alice_token),
            &json!({"content": "First!"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["content"], "First!");
    assert_eq!(body["author"]["username"], "alice");
    let root_id = body["id"].as_i64().expect("comment id");

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("/api/comments/{root_id}/replies"),
            Some(&bob_token),
            &json!({"content": "Welcome."}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["parent_comment_id"].as_i64(), Some(root_id));

    let (status, body) = send(&app, get("/api/blogs/discussion/comments")).await;
    assert_eq!(status, StatusCode::OK);
    let comments = body["comments"].as_array().expect("comments array");
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0]["id"].as_i64(), Some(root_id));
    assert_eq!(comments[0]["replies"][0]["content"], "Welcome.");
    assert_eq!(body["metadata"]["total_comments"].as_i64(), Some(2));
    assert_eq!(body["metadata"]["total_root_comments"].as_i64(), Some(1));

    let (status, body) = send(
        &app,
        delete_auth(&format!("/api/comments/{root_id}"), &mallory_token),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Unauthorized to delete this comment.");

    let (status, body) = send(
        &app,
        delete_auth(&format!("/api/comments/{root_id}"), &alice_token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted_count"].as_i64(), Some(2));
    assert_eq!(body["message"], "Comment and 1 replies deleted successfully.");
}

#[tokio::test]
async fn follow_flow_over_http() {
    let pool = test_pool().await;
    let alice = seed_user(&pool, "alice").await;
    let bob = seed_user(&pool, "bob").await;
    let alice_token = auth_token(&pool, alice).await;
    let bob_token = auth_token(&pool, bob).await;
    let app = inkpot::app(pool);

    let empty = json!({});
    let (status, body) = send(
        &app,
        json_request("POST", "/api/users/bob/follow", Some(&alice_token), &empty),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "You successfully followed user 'bob'.");

    let (status, body) = send(
        &app,
        json_request("POST", "/api/users/bob/follow", Some(&alice_token), &empty),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["detail"], "Already following this user.");

    let (status, body) = send(&app, get("/api/users/bob/followers")).await;
    assert_eq!(status, StatusCode::OK);
    let followers = body.as_array().expect("followers array");
    assert_eq!(followers.len(), 1);
    assert_eq!(followers[0]["username"], "alice");

    let (status, body) = send(
        &app,
        json_request("POST", "/api/users/alice/follow-back", Some(&bob_token), &empty),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "You successfully followed back user 'alice'.");

    let (status, _body) = send(&app, delete_auth("/api/users/bob/follow", &alice_token)).await;
    assert_eq!(status, StatusCode::OK);

    // Bob still follows Alice; the other direction is gone.
    let (status, body) = send(&app, get_auth("/api/users/alice", &bob_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["followers_count"].as_i64(), Some(1));
    assert_eq!(body["following_count"].as_i64(), Some(0));
}

#[tokio::test]
async fn admin_endpoints_over_http() {
    let pool = test_pool().await;
    let admin = seed_admin(&pool, "boss").await;
    let worker = seed_user(&pool, "worker").await;
    let admin_token = auth_token(&pool, admin).await;
    let worker_token = auth_token(&pool, worker).await;
    let app = inkpot::app(pool);

    let (status, body) = send(&app, get_auth("/api/admin/stats", &worker_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Admin privileges required.");

    let (status, body) = send(&app, get_auth("/api/admin/stats", &admin_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_users"].as_i64(), Some(2));
    assert_eq!(body["total_blogs"].as_i64(), Some(0));

    let (status, body) = send(&app, get_auth("/api/admin/users", &admin_token)).await;
    assert_eq!(status, StatusCode::OK);
    let users = body.as_array().expect("user array");
    assert_eq!(users.len(), 2);
    assert!(users[0]["blog_count"].is_i64());
    assert!(users[0]["comment_count"].is_i64());

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/admin/users",
            Some(&admin_token),
            &json!({"name": "New Editor", "email": "editor@example.com", "password": "abc123", "role": "editor"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["username"], "editor");
    assert_eq!(body["role"], "editor");
    assert_eq!(body["is_verified"], true);

    let (status, body) = send(
        &app,
        json_request(
            "PUT",
            &format!("/api/admin/users/{worker}/role"),
            Some(&admin_token),
            &json!({"role": "superuser"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid role.");

    let (status, body) = send(
        &app,
        json_request(
            "PUT",
            &format!("/api/admin/users/{worker}/role"),
            Some(&admin_token),
            &json!({"role": "author"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "author");

    let (status, body) = send(
        &app,
        delete_auth(&format!("/api/admin/users/{admin}"), &admin_token),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "You cannot delete your own account.");

    let (status, body) = send(
        &app,
        delete_auth(&format!("/api/admin/users/{worker}"), &admin_token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User deleted successfully.");
}

#[tokio::test]
async fn category_crud_over_http() {
    let pool = test_pool().await;
    let admin = seed_admin(&pool, "boss").await;
    let user = seed_user(&pool, "alice").await;
    let admin_token = auth_token(&pool, admin).await;
    let user_token = auth_token(&pool, user).await;
    let app = inkpot::app(pool);

    let (status, _body) = send(
        &app,
        json_request("POST", "/api/categories", Some(&user_token), &json!({"name": "Rust"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        json_request("POST", "/api/categories", Some(&admin_token), &json!({"name": "Rust"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "Rust");
    assert_eq!(body["slug"], "rust");

    // Uniqueness is case-insensitive.
    let (status, body) = send(
        &app,
        json_request("POST", "/api/categories", Some(&admin_token), &json!({"name": "rust"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["detail"], "Category already exists.");

    let (status, body) = send(&app, get("/api/categories/rust")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["category"]["name"], "Rust");
    assert!(body["blogs"].as_array().expect("blogs array").is_empty());

    let (status, body) = send(
        &app,
        json_request(
            "PUT",
            "/api/categories/rust",
            Some(&admin_token),
            &json!({"name": "Rust Lang"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["slug"], "rust-lang");

    let (status, body) = send(&app, delete_auth("/api/categories/rust-lang", &admin_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Category deleted successfully.");

    let (status, _body) = send(&app, get("/api/categories/rust-lang")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn tag_names_are_unique_over_http() {
    let pool = test_pool().await;
    let admin = seed_admin(&pool, "boss").await;
    let admin_token = auth_token(&pool, admin).await;
    let app = inkpot::app(pool);

    let (status, body) = send(
        &app,
        json_request("POST", "/api/tags", Some(&admin_token), &json!({"name": "Async"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["slug"], "async");

    let (status, body) = send(
        &app,
        json_request("POST", "/api/tags", Some(&admin_token), &json!({"name": "ASYNC"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["detail"], "Tag already exists.");
}

use axum::{
    Router,
    extract::{Json, Path, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::IntoResponse,
    routing::{get, post},
};
use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::{Rng, distr::Alphanumeric};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{
    AccountStatus, ForgotPassword, LoginResponse, LoginUser, RegisterUser, ResetPassword, User,
    UserResponse,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

const COMMON_PASSWORDS: [&str; 4] = ["123456", "password", "god", "abcdef"];

pub fn auth_routes() -> Router<SqlitePool> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(get_me))
        .route("/verify-email/{token}", get(verify_email))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

async fn register(
    State(pool): State<SqlitePool>,
    Json(input): Json<RegisterUser>,
) -> Result<impl IntoResponse, ApiError> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(ApiError::Invalid("Name is required."));
    }

    let email = input.email.trim().to_lowercase();
    let local_part = match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => local,
        _ => return Err(ApiError::Invalid("Must be a valid email address.")),
    };

    validate_password(&input.password)?;

    if !input.agreed_to_terms {
        return Err(ApiError::Invalid("You must agree to the terms and conditions."));
    }

    let existing_email = sqlx::query_as::<_, (i64,)>("SELECT id FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(&pool)
        .await?;
    if existing_email.is_some() {
        return Err(ApiError::Conflict("Email is already registered."));
    }

    // Username is the email local part, same as the signup flow has always
    // derived it.
    let username = local_part.to_string();
    let existing_username = sqlx::query_as::<_, (i64,)>("SELECT id FROM users WHERE username = ?")
        .bind(&username)
        .fetch_optional(&pool)
        .await?;
    if existing_username.is_some() {
        return Err(ApiError::Conflict("Username is already taken."));
    }

    let hashed = hash(&input.password, DEFAULT_COST)?;
    let verify_token = Uuid::new_v4().to_string();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO users (username, name, email, hashed_password, agreed_to_terms, verify_token, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&username)
    .bind(name)
    .bind(&email)
    .bind(&hashed)
    .bind(true)
    .bind(&verify_token)
    .bind(now)
    .execute(&pool)
    .await?;

    // Stands in for the verification email.
    tracing::info!("verification link for {email}: /api/auth/verify-email/{verify_token}");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Signup successful. Check your email to verify your account."
        })),
    ))
}

async fn login(
    State(pool): State<SqlitePool>,
    Json(input): Json<LoginUser>,
) -> Result<impl IntoResponse, ApiError> {
    let email = input.email.trim().to_lowercase();
    let mut user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(&pool)
        .await?
        .ok_or(ApiError::Unauthorized("Invalid email or password."))?;

    let valid = verify(&input.password, &user.hashed_password)?;
    if !valid {
        return Err(ApiError::Unauthorized("Invalid email or password."));
    }

    if !user.is_verified {
        return Err(ApiError::Unauthorized("Email not verified."));
    }

    let now = Utc::now();
    sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
        .bind(now)
        .bind(user.id)
        .execute(&pool)
        .await?;
    user.last_login = Some(now);

    let token = generate_jwt(&user)?;
    tracing::info!("user {} logged in", user.username);

    Ok(Json(LoginResponse {
        access_token: token,
        token_type: "bearer".to_string(),
        user: user.into(),
    }))
}

async fn get_me(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let user = extract_current_user(&pool, &headers).await?;
    Ok(Json(UserResponse::from(user)))
}

async fn verify_email(
    State(pool): State<SqlitePool>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE verify_token = ?")
        .bind(&token)
        .fetch_optional(&pool)
        .await?
        .ok_or(ApiError::Invalid("Invalid verification link."))?;

    if user.is_verified {
        return Ok(Json(json!({"message": "Account already verified."})));
    }

    sqlx::query(
        "UPDATE users SET is_verified = TRUE, account_status = ?, verify_token = NULL, updated_at = ? WHERE id = ?",
    )
    .bind(AccountStatus::Active)
    .bind(Utc::now())
    .bind(user.id)
    .execute(&pool)
    .await?;

    tracing::info!("user {} verified their email", user.username);

    Ok(Json(json!({
        "message": "Email verified successfully. You can now log in."
    })))
}

async fn forgot_password(
    State(pool): State<SqlitePool>,
    Json(input): Json<ForgotPassword>,
) -> Result<impl IntoResponse, ApiError> {
    let email = input.email.trim().to_lowercase();
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(&pool)
        .await?
        .ok_or(ApiError::NotFound("User not found."))?;

    let length: usize = std::env::var("RESET_CODE_LENGTH")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(6);
    let minutes: i64 = std::env::var("RESET_CODE_EXPIRY_MINUTES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(30);

    let code: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect();
    let expires_at = Utc::now() + Duration::minutes(minutes);

    sqlx::query("UPDATE users SET reset_code = ?, reset_code_expires_at = ? WHERE id = ?")
        .bind(&code)
        .bind(expires_at)
        .bind(user.id)
        .execute(&pool)
        .await?;

    // Stands in for the reset email.
    tracing::info!("password reset code for {}: {code}", user.email);

    Ok(Json(json!({
        "message": "A reset code has been sent to your email."
    })))
}

async fn reset_password(
    State(pool): State<SqlitePool>,
    Json(input): Json<ResetPassword>,
) -> Result<impl IntoResponse, ApiError> {
    validate_password(&input.new_password)?;

    let email = input.email.trim().to_lowercase();
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ? AND reset_code = ?")
        .bind(&email)
        .bind(input.reset_code.trim())
        .fetch_optional(&pool)
        .await?
        .ok_or(ApiError::NotFound("Invalid or expired reset code."))?;

    match user.reset_code_expires_at {
        Some(expires_at) if expires_at > Utc::now() => {}
        _ => return Err(ApiError::NotFound("Invalid or expired reset code.")),
    }

    let hashed = hash(&input.new_password, DEFAULT_COST)?;
    sqlx::query(
        "UPDATE users SET hashed_password = ?, reset_code = NULL, reset_code_expires_at = NULL, updated_at = ? WHERE id = ?",
    )
    .bind(&hashed)
    .bind(Utc::now())
    .bind(user.id)
    .execute(&pool)
    .await?;

    tracing::info!("user {} reset their password", user.username);

    Ok(Json(json!({
        "message": "Password reset successfully. You can now log in."
    })))
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < 6 {
        return Err(ApiError::Invalid("Password must be at least 6 characters long."));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(ApiError::Invalid("Password must contain a digit."));
    }
    if COMMON_PASSWORDS.contains(&password) {
        return Err(ApiError::Invalid("Do not use a common word as the password."));
    }
    Ok(())
}

fn jwt_secret() -> String {
    std::env::var("SECRET_KEY").unwrap_or_else(|_| "your-secret-key".to_string())
}

pub fn generate_jwt(user: &User) -> Result<String, ApiError> {
    let expiration = (Utc::now() + Duration::hours(24)).timestamp() as usize;
    let claims = Claims {
        sub: user.id.to_string(),
        exp: expiration,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret().as_bytes()),
    )?;
    Ok(token)
}

pub async fn extract_current_user(
    pool: &SqlitePool,
    headers: &HeaderMap,
) -> Result<User, ApiError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized("Missing authorization header."))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthorized("Invalid authorization header."))?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret().as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized("Invalid token."))?;

    let user_id: i64 = token_data
        .claims
        .sub
        .parse()
        .map_err(|_| ApiError::Unauthorized("Invalid token."))?;

    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::Unauthorized("User not found."))
}

pub async fn extract_admin_user(pool: &SqlitePool, headers: &HeaderMap) -> Result<User, ApiError> {
    let user = extract_current_user(pool, headers).await?;
    if !user.role.is_admin() {
        return Err(ApiError::Forbidden("Admin privileges required."));
    }
    Ok(user)
}

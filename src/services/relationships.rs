use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::{ApiError, is_unique_violation};
use crate::models::{FollowResponse, RelationshipKind, UserSummary};

/// Records an actor following a target. The edge row and both denormalized
/// counters move in one transaction; the unique index on the edge backstops
/// concurrent duplicates.
pub async fn follow_user(
    pool: &SqlitePool,
    actor_id: i64,
    target_id: i64,
) -> Result<FollowResponse, ApiError> {
    if actor_id == target_id {
        return Err(ApiError::InvalidOperation("You cannot follow yourself."));
    }

    let (username,) = sqlx::query_as::<_, (String,)>("SELECT username FROM users WHERE id = ?")
        .bind(target_id)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::NotFound("User not found."))?;

    if follows(pool, actor_id, target_id).await? {
        return Err(ApiError::Conflict("Already following this user."));
    }

    insert_follow_edge(pool, actor_id, target_id).await?;

    Ok(FollowResponse {
        message: format!("You successfully followed user '{username}'."),
    })
}

/// Follows a user back. Valid only when the target already follows the
/// actor.
pub async fn follow_back(
    pool: &SqlitePool,
    actor_id: i64,
    target_id: i64,
) -> Result<FollowResponse, ApiError> {
    if actor_id == target_id {
        return Err(ApiError::InvalidOperation("You cannot follow yourself."));
    }

    let (username,) = sqlx::query_as::<_, (String,)>("SELECT username FROM users WHERE id = ?")
        .bind(target_id)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::NotFound("User not found."))?;

    if !follows(pool, target_id, actor_id).await? {
        return Err(ApiError::InvalidOperation("This user is not following you."));
    }

    if follows(pool, actor_id, target_id).await? {
        return Err(ApiError::Conflict("You are already following this user."));
    }

    insert_follow_edge(pool, actor_id, target_id).await?;

    Ok(FollowResponse {
        message: format!("You successfully followed back user '{username}'."),
    })
}

/// Removes a follow edge and walks both counters back, in one transaction.
pub async fn unfollow_user(
    pool: &SqlitePool,
    actor_id: i64,
    target_id: i64,
) -> Result<FollowResponse, ApiError> {
    if actor_id == target_id {
        return Err(ApiError::InvalidOperation("You cannot unfollow yourself."));
    }

    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "DELETE FROM relationships WHERE user_id = ? AND related_user_id = ? AND kind = ?",
    )
    .bind(actor_id)
    .bind(target_id)
    .bind(RelationshipKind::Following)
    .execute(&mut *tx)
    .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("You are not following this user."));
    }

    sqlx::query("UPDATE users SET following_count = following_count - 1 WHERE id = ?")
        .bind(actor_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE users SET followers_count = followers_count - 1 WHERE id = ?")
        .bind(target_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(FollowResponse {
        message: "You successfully unfollowed the user.".to_string(),
    })
}

pub async fn follows(pool: &SqlitePool, actor_id: i64, target_id: i64) -> Result<bool, ApiError> {
    let edge = sqlx::query_as::<_, (i64,)>(
        "SELECT id FROM relationships WHERE user_id = ? AND related_user_id = ? AND kind = ?",
    )
    .bind(actor_id)
    .bind(target_id)
    .bind(RelationshipKind::Following)
    .fetch_optional(pool)
    .await?;
    Ok(edge.is_some())
}

/// Users the given user follows, newest edge first.
pub async fn following_of(pool: &SqlitePool, user_id: i64) -> Result<Vec<UserSummary>, ApiError> {
    let users = sqlx::query_as::<_, UserSummary>(
        "SELECT u.id, u.username, u.name FROM relationships r \
         JOIN users u ON u.id = r.related_user_id \
         WHERE r.user_id = ? AND r.kind = ? \
         ORDER BY r.created_at DESC, r.id DESC",
    )
    .bind(user_id)
    .bind(RelationshipKind::Following)
    .fetch_all(pool)
    .await?;
    Ok(users)
}

/// Users following the given user, newest edge first.
pub async fn followers_of(pool: &SqlitePool, user_id: i64) -> Result<Vec<UserSummary>, ApiError> {
    let users = sqlx::query_as::<_, UserSummary>(
        "SELECT u.id, u.username, u.name FROM relationships r \
         JOIN users u ON u.id = r.user_id \
         WHERE r.related_user_id = ? AND r.kind = ? \
         ORDER BY r.created_at DESC, r.id DESC",
    )
    .bind(user_id)
    .bind(RelationshipKind::Following)
    .fetch_all(pool)
    .await?;
    Ok(users)
}

async fn insert_follow_edge(
    pool: &SqlitePool,
    actor_id: i64,
    target_id: i64,
) -> Result<(), ApiError> {
    let mut tx = pool.begin().await?;

    let insert = sqlx::query(
        "INSERT INTO relationships (user_id, related_user_id, kind, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(actor_id)
    .bind(target_id)
    .bind(RelationshipKind::Following)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await;
    if let Err(err) = insert {
        if is_unique_violation(&err) {
            return Err(ApiError::Conflict("Already following this user."));
        }
        return Err(err.into());
    }

    sqlx::query("UPDATE users SET following_count = following_count + 1 WHERE id = ?")
        .bind(actor_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE users SET followers_count = followers_count + 1 WHERE id = ?")
        .bind(target_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

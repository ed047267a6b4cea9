use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum RelationshipKind {
    Following,
    Follower,
    Friend,
}

/// A directed edge in the social graph. Only `following` edges are written;
/// follower views are the reverse traversal of the same rows.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Relationship {
    pub id: i64,
    pub user_id: i64,
    pub related_user_id: i64,
    pub kind: RelationshipKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct FollowResponse {
    pub message: String,
}

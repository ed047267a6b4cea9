use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::UserSummary;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: i64,
    pub blog_id: i64,
    pub author_id: i64,
    pub parent_comment_id: Option<i64>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Comment row joined with its author columns.
#[derive(Debug, Clone, FromRow)]
pub struct CommentWithAuthor {
    pub id: i64,
    pub blog_id: i64,
    pub author_id: i64,
    pub parent_comment_id: Option<i64>,
    pub content: String,
    pub author_username: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentResponse {
    pub id: i64,
    pub blog_id: i64,
    pub parent_comment_id: Option<i64>,
    pub content: String,
    pub author: UserSummary,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<CommentWithAuthor> for CommentResponse {
    fn from(row: CommentWithAuthor) -> Self {
        Self {
            id: row.id,
            blog_id: row.blog_id,
            parent_comment_id: row.parent_comment_id,
            content: row.content,
            author: UserSummary {
                id: row.author_id,
                username: row.author_username,
                name: row.author_name,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateComment {
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CommentsMetadata {
    pub total_comments: i64,
    pub total_root_comments: i64,
    pub current_page: i64,
    pub limit: i64,
    pub sort_by: String,
    pub sort_order: String,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct CommentDeleteResponse {
    pub message: String,
    pub deleted_count: i64,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::{Category, Tag, UserSummary};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Blog {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub author_id: i64,
    pub is_published: bool,
    pub total_comments: i64,
    pub like_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct BlogResponse {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub author: UserSummary,
    pub categories: Vec<Category>,
    pub tags: Vec<Tag>,
    pub is_published: bool,
    pub total_comments: i64,
    pub like_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Listing/search shape without the content body.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BlogSummary {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub author_id: i64,
    pub is_published: bool,
    pub total_comments: i64,
    pub like_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct BlogListResponse {
    pub count: i64,
    pub page: i64,
    pub pages: i64,
    pub blogs: Vec<BlogResponse>,
    pub categories: Vec<Category>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBlog {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub categories: Vec<i64>,
    #[serde(default)]
    pub tags: Vec<i64>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBlog {
    pub title: Option<String>,
    pub content: Option<String>,
    pub categories: Option<Vec<i64>>,
    pub tags: Option<Vec<i64>>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BlogQuery {
    pub page: Option<i64>,
    pub keyword: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RelatedQuery {
    pub limit: Option<i64>,
}

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::ApiError;
use crate::models::{
    Comment, CommentDeleteResponse, CommentListQuery, CommentResponse, CommentWithAuthor,
    CommentsMetadata, UserRole,
};

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

/// Anything the tree builder can hang off a parent: a bare row, a joined
/// row, or a response shape.
pub trait CommentRecord {
    fn id(&self) -> i64;
    fn parent_id(&self) -> Option<i64>;
}

impl CommentRecord for Comment {
    fn id(&self) -> i64 {
        self.id
    }

    fn parent_id(&self) -> Option<i64> {
        self.parent_comment_id
    }
}

impl CommentRecord for CommentResponse {
    fn id(&self) -> i64 {
        self.id
    }

    fn parent_id(&self) -> Option<i64> {
        self.parent_comment_id
    }
}

#[derive(Debug, Serialize)]
pub struct CommentThread<T> {
    #[serde(flatten)]
    pub comment: T,
    pub replies: Vec<CommentThread<T>>,
}

#[derive(Debug, Serialize)]
pub struct CommentsPage {
    pub comments: Vec<CommentThread<CommentResponse>>,
    pub metadata: CommentsMetadata,
}

/// Assembles a flat comment list into a forest. First pass indexes every id,
/// second pass hangs each item off its parent's reply list. An item whose
/// parent id is not in the set (or points at itself) becomes a root; nothing
/// is ever dropped.
pub fn build_comment_tree<T: CommentRecord>(items: Vec<T>) -> Vec<CommentThread<T>> {
    let ids: HashSet<i64> = items.iter().map(|item| item.id()).collect();
    let mut children: HashMap<i64, Vec<T>> = HashMap::new();
    let mut roots: Vec<T> = Vec::new();

    for item in items {
        match item.parent_id() {
            Some(parent) if parent != item.id() && ids.contains(&parent) => {
                children.entry(parent).or_default().push(item);
            }
            _ => roots.push(item),
        }
    }

    roots
        .into_iter()
        .map(|item| attach_replies(item, &mut children))
        .collect()
}

fn attach_replies<T: CommentRecord>(item: T, children: &mut HashMap<i64, Vec<T>>) -> CommentThread<T> {
    let replies = children
        .remove(&item.id())
        .unwrap_or_default()
        .into_iter()
        .map(|child| attach_replies(child, children))
        .collect();
    CommentThread {
        comment: item,
        replies,
    }
}

fn sort_column(sort_by: Option<&str>) -> &'static str {
    match sort_by {
        Some("updated_at") | Some("updatedAt") => "updated_at",
        _ => "created_at",
    }
}

fn sort_direction(sort_order: Option<&str>) -> &'static str {
    match sort_order {
        Some("asc") | Some("ASC") => "ASC",
        _ => "DESC",
    }
}

/// Creates a root comment on a blog and bumps the blog's comment counter in
/// the same transaction.
pub async fn create_comment(
    pool: &SqlitePool,
    blog_id: i64,
    author_id: i64,
    content: &str,
) -> Result<CommentResponse, ApiError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ApiError::Invalid("Comment content cannot be empty."));
    }

    let mut tx = pool.begin().await?;

    let blog = sqlx::query_as::<_, (i64,)>("SELECT id FROM blogs WHERE id = ?")
        .bind(blog_id)
        .fetch_optional(&mut *tx)
        .await?;
    if blog.is_none() {
        return Err(ApiError::NotFound("Blog not found."));
    }

    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO comments (blog_id, author_id, parent_comment_id, content, created_at) VALUES (?, ?, NULL, ?, ?)",
    )
    .bind(blog_id)
    .bind(author_id)
    .bind(content)
    .bind(now)
    .execute(&mut *tx)
    .await?;
    let comment_id = result.last_insert_rowid();

    sqlx::query("UPDATE blogs SET total_comments = total_comments + 1 WHERE id = ?")
        .bind(blog_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    fetch_comment(pool, comment_id).await
}

/// Creates a reply under an existing comment. The blog id comes from the
/// parent row, not the caller, so a reply always lands on its parent's blog.
pub async fn add_reply(
    pool: &SqlitePool,
    parent_comment_id: i64,
    author_id: i64,
    content: &str,
) -> Result<CommentResponse, ApiError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ApiError::Invalid("Comment content cannot be empty."));
    }

    let mut tx = pool.begin().await?;

    let (parent_id, blog_id) = sqlx::query_as::<_, (i64, i64)>(
        "SELECT id, blog_id FROM comments WHERE id = ?",
    )
    .bind(parent_comment_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(ApiError::NotFound("Comment not found."))?;

    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO comments (blog_id, author_id, parent_comment_id, content, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(blog_id)
    .bind(author_id)
    .bind(parent_id)
    .bind(content)
    .bind(now)
    .execute(&mut *tx)
    .await?;
    let comment_id = result.last_insert_rowid();

    sqlx::query("UPDATE blogs SET total_comments = total_comments + 1 WHERE id = ?")
        .bind(blog_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    fetch_comment(pool, comment_id).await
}

/// Pages through a blog's root comments and returns them as threads with
/// their full reply subtrees attached.
pub async fn get_comments_for_blog(
    pool: &SqlitePool,
    blog_id: i64,
    query: &CommentListQuery,
) -> Result<CommentsPage, ApiError> {
    let (total_comments,) =
        sqlx::query_as::<_, (i64,)>("SELECT total_comments FROM blogs WHERE id = ?")
            .bind(blog_id)
            .fetch_optional(pool)
            .await?
            .ok_or(ApiError::NotFound("Blog not found."))?;

    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = (page - 1).saturating_mul(limit);
    let column = sort_column(query.sort_by.as_deref());
    let direction = sort_direction(query.sort_order.as_deref());

    let (total_roots,) = sqlx::query_as::<_, (i64,)>(
        "SELECT COUNT(*) FROM comments WHERE blog_id = ? AND parent_comment_id IS NULL",
    )
    .bind(blog_id)
    .fetch_one(pool)
    .await?;

    // column and direction come from a fixed whitelist above, never from the
    // raw query string.
    let roots_sql = format!(
        "SELECT c.id, c.blog_id, c.author_id, c.parent_comment_id, c.content, \
         u.username AS author_username, u.name AS author_name, c.created_at, c.updated_at \
         FROM comments c JOIN users u ON u.id = c.author_id \
         WHERE c.blog_id = ? AND c.parent_comment_id IS NULL \
         ORDER BY c.{column} {direction}, c.id {direction} LIMIT ? OFFSET ?"
    );
    let roots = sqlx::query_as::<_, CommentWithAuthor>(&roots_sql)
        .bind(blog_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    let mut flat: Vec<CommentWithAuthor> = roots;
    if !flat.is_empty() {
        let placeholders = vec!["?"; flat.len()].join(", ");
        let replies_sql = format!(
            "WITH RECURSIVE thread AS ( \
                 SELECT id, blog_id, author_id, parent_comment_id, content, created_at, updated_at \
                 FROM comments WHERE parent_comment_id IN ({placeholders}) \
                 UNION ALL \
                 SELECT c.id, c.blog_id, c.author_id, c.parent_comment_id, c.content, c.created_at, c.updated_at \
                 FROM comments c JOIN thread t ON c.parent_comment_id = t.id \
             ) \
             SELECT t.id, t.blog_id, t.author_id, t.parent_comment_id, t.content, \
             u.username AS author_username, u.name AS author_name, t.created_at, t.updated_at \
             FROM thread t JOIN users u ON u.id = t.author_id \
             ORDER BY t.{column} {direction}, t.id {direction}"
        );
        let mut reply_query = sqlx::query_as::<_, CommentWithAuthor>(&replies_sql);
        for root in &flat {
            reply_query = reply_query.bind(root.id);
        }
        let replies = reply_query.fetch_all(pool).await?;
        flat.extend(replies);
    }

    let comments = build_comment_tree(flat.into_iter().map(CommentResponse::from).collect());

    let total_pages = if total_roots == 0 {
        0
    } else {
        (total_roots + limit - 1) / limit
    };

    Ok(CommentsPage {
        comments,
        metadata: CommentsMetadata {
            total_comments,
            total_root_comments: total_roots,
            current_page: page,
            limit,
            sort_by: column.to_string(),
            sort_order: direction.to_lowercase(),
            total_pages,
        },
    })
}

/// Deletes a comment. Root comments (and any comment, for admins) take their
/// whole reply subtree with them; an author removing their own reply removes
/// just that row. The blog counter moves by the number of rows deleted, in
/// the same transaction.
pub async fn delete_comment(
    pool: &SqlitePool,
    comment_id: i64,
    actor_id: i64,
    actor_role: UserRole,
) -> Result<CommentDeleteResponse, ApiError> {
    let (target_id, blog_id, author_id, parent_comment_id) =
        sqlx::query_as::<_, (i64, i64, i64, Option<i64>)>(
            "SELECT id, blog_id, author_id, parent_comment_id FROM comments WHERE id = ?",
        )
        .bind(comment_id)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::NotFound("Comment not found."))?;

    if !actor_role.is_admin() && actor_id != author_id {
        return Err(ApiError::Forbidden("Unauthorized to delete this comment."));
    }

    let mut tx = pool.begin().await?;

    let deleted_count = if parent_comment_id.is_none() || actor_role.is_admin() {
        let result = sqlx::query(
            "DELETE FROM comments WHERE id IN ( \
                 WITH RECURSIVE subtree(id) AS ( \
                     SELECT ? \
                     UNION ALL \
                     SELECT c.id FROM comments c JOIN subtree s ON c.parent_comment_id = s.id \
                 ) \
                 SELECT id FROM subtree)",
        )
        .bind(target_id)
        .execute(&mut *tx)
        .await?;
        result.rows_affected() as i64
    } else {
        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(target_id)
            .execute(&mut *tx)
            .await?;
        result.rows_affected() as i64
    };

    // Zero rows affected means a concurrent delete removed the target after
    // the fetch above.
    if deleted_count == 0 {
        return Err(ApiError::NotFound("Comment not found."));
    }

    sqlx::query("UPDATE blogs SET total_comments = total_comments - ? WHERE id = ?")
        .bind(deleted_count)
        .bind(blog_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    let message = if deleted_count > 1 {
        format!(
            "Comment and {} replies deleted successfully.",
            deleted_count - 1
        )
    } else {
        "Comment deleted successfully.".to_string()
    };

    Ok(CommentDeleteResponse {
        message,
        deleted_count,
    })
}

async fn fetch_comment(pool: &SqlitePool, comment_id: i64) -> Result<CommentResponse, ApiError> {
    let row = sqlx::query_as::<_, CommentWithAuthor>(
        "SELECT c.id, c.blog_id, c.author_id, c.parent_comment_id, c.content, \
         u.username AS author_username, u.name AS author_name, c.created_at, c.updated_at \
         FROM comments c JOIN users u ON u.id = c.author_id \
         WHERE c.id = ?",
    )
    .bind(comment_id)
    .fetch_one(pool)
    .await?;
    Ok(row.into())
}

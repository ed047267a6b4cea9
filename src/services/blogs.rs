use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::{ApiError, is_unique_violation};
use crate::models::{
    Blog, BlogListResponse, BlogQuery, BlogResponse, BlogSummary, Category, CreateBlog, Tag,
    UpdateBlog, UserSummary,
};
use crate::util::{meta_description, slugify, smart_trim};

const PAGE_SIZE: i64 = 10;
const EXCERPT_LENGTH: usize = 120;
const MIN_CONTENT_LENGTH: usize = 30;
const SITE_NAME: &str = "Inkpot";

pub async fn create_blog(
    pool: &SqlitePool,
    author_id: i64,
    input: &CreateBlog,
) -> Result<BlogResponse, ApiError> {
    let title = input.title.trim();
    if title.is_empty() {
        return Err(ApiError::Invalid("Title is required."));
    }
    if input.content.chars().count() < MIN_CONTENT_LENGTH {
        return Err(ApiError::Invalid("Content must be at least 30 characters long."));
    }
    if input.categories.is_empty() {
        return Err(ApiError::Invalid("At least one category is required."));
    }
    if input.tags.is_empty() {
        return Err(ApiError::Invalid("At least one tag is required."));
    }

    let slug = slugify(title);
    if slug.is_empty() {
        return Err(ApiError::Invalid("Title must contain alphanumeric characters."));
    }
    if slug_taken(pool, &slug, None).await? {
        return Err(ApiError::Conflict("Title already present."));
    }

    ensure_categories_exist(pool, &input.categories).await?;
    ensure_tags_exist(pool, &input.tags).await?;

    let excerpt = smart_trim(&input.content, EXCERPT_LENGTH);
    let meta_title = format!("{title} | {SITE_NAME}");
    let meta_desc = meta_description(&input.content);
    let now = Utc::now();

    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "INSERT INTO blogs (title, slug, content, excerpt, meta_title, meta_description, author_id, is_published, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(title)
    .bind(&slug)
    .bind(&input.content)
    .bind(&excerpt)
    .bind(&meta_title)
    .bind(&meta_desc)
    .bind(author_id)
    .bind(input.is_published.unwrap_or(true))
    .bind(now)
    .execute(&mut *tx)
    .await?;
    let blog_id = result.last_insert_rowid();

    for category_id in &input.categories {
        sqlx::query("INSERT OR IGNORE INTO blog_categories (blog_id, category_id) VALUES (?, ?)")
            .bind(blog_id)
            .bind(category_id)
            .execute(&mut *tx)
            .await?;
    }
    for tag_id in &input.tags {
        sqlx::query("INSERT OR IGNORE INTO blog_tags (blog_id, tag_id) VALUES (?, ?)")
            .bind(blog_id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    blog_response_by_id(pool, blog_id).await
}

/// Published blogs, newest first, optionally filtered by a keyword matched
/// against title or content. The response carries the full category and tag
/// catalogs alongside the page.
pub async fn list_blogs(pool: &SqlitePool, query: &BlogQuery) -> Result<BlogListResponse, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1).saturating_mul(PAGE_SIZE);
    let keyword = query
        .keyword
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty());

    let (count, rows) = match keyword {
        Some(keyword) => {
            let pattern = format!("%{keyword}%");
            let (count,) = sqlx::query_as::<_, (i64,)>(
                "SELECT COUNT(*) FROM blogs WHERE is_published = TRUE AND (title LIKE ? OR content LIKE ?)",
            )
            .bind(&pattern)
            .bind(&pattern)
            .fetch_one(pool)
            .await?;
            let rows = sqlx::query_as::<_, Blog>(
                "SELECT * FROM blogs WHERE is_published = TRUE AND (title LIKE ? OR content LIKE ?) \
                 ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            )
            .bind(&pattern)
            .bind(&pattern)
            .bind(PAGE_SIZE)
            .bind(offset)
            .fetch_all(pool)
            .await?;
            (count, rows)
        }
        None => {
            let (count,) =
                sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM blogs WHERE is_published = TRUE")
                    .fetch_one(pool)
                    .await?;
            let rows = sqlx::query_as::<_, Blog>(
                "SELECT * FROM blogs WHERE is_published = TRUE \
                 ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            )
            .bind(PAGE_SIZE)
            .bind(offset)
            .fetch_all(pool)
            .await?;
            (count, rows)
        }
    };

    let mut blogs = Vec::with_capacity(rows.len());
    for blog in rows {
        blogs.push(to_response(pool, blog).await?);
    }

    let categories = sqlx::query_as::<_, Category>(
        "SELECT * FROM categories ORDER BY created_at DESC, id DESC",
    )
    .fetch_all(pool)
    .await?;
    let tags = sqlx::query_as::<_, Tag>("SELECT * FROM tags ORDER BY created_at DESC, id DESC")
        .fetch_all(pool)
        .await?;

    let pages = if count == 0 {
        0
    } else {
        (count + PAGE_SIZE - 1) / PAGE_SIZE
    };

    Ok(BlogListResponse {
        count,
        page,
        pages,
        blogs,
        categories,
        tags,
    })
}

pub async fn find_by_slug(pool: &SqlitePool, slug: &str) -> Result<Blog, ApiError> {
    sqlx::query_as::<_, Blog>("SELECT * FROM blogs WHERE slug = ?")
        .bind(slug)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::NotFound("Blog not found."))
}

pub async fn get_blog_by_slug(pool: &SqlitePool, slug: &str) -> Result<BlogResponse, ApiError> {
    let blog = find_by_slug(pool, slug).await?;
    to_response(pool, blog).await
}

pub async fn update_blog(
    pool: &SqlitePool,
    slug: &str,
    input: &UpdateBlog,
) -> Result<BlogResponse, ApiError> {
    let blog = find_by_slug(pool, slug).await?;

    let mut title = blog.title;
    let mut new_slug = blog.slug;
    let mut content = blog.content;
    let mut excerpt = blog.excerpt;
    let mut meta_title = blog.meta_title;
    let mut meta_desc = blog.meta_description;
    let is_published = input.is_published.unwrap_or(blog.is_published);

    if let Some(new_title) = input.title.as_deref().map(str::trim) {
        if new_title.is_empty() {
            return Err(ApiError::Invalid("Title is required."));
        }
        let candidate = slugify(new_title);
        if candidate.is_empty() {
            return Err(ApiError::Invalid("Title must contain alphanumeric characters."));
        }
        if candidate != new_slug && slug_taken(pool, &candidate, Some(blog.id)).await? {
            return Err(ApiError::Conflict("Title already present."));
        }
        title = new_title.to_string();
        new_slug = candidate;
        meta_title = Some(format!("{title} | {SITE_NAME}"));
    }

    if let Some(new_content) = input.content.as_deref() {
        if new_content.chars().count() < MIN_CONTENT_LENGTH {
            return Err(ApiError::Invalid("Content must be at least 30 characters long."));
        }
        excerpt = Some(smart_trim(new_content, EXCERPT_LENGTH));
        meta_desc = Some(meta_description(new_content));
        content = new_content.to_string();
    }

    if let Some(categories) = &input.categories {
        ensure_categories_exist(pool, categories).await?;
    }
    if let Some(tags) = &input.tags {
        ensure_tags_exist(pool, tags).await?;
    }

    let mut tx = pool.begin().await?;

    sqlx::query(
        "UPDATE blogs SET title = ?, slug = ?, content = ?, excerpt = ?, meta_title = ?, \
         meta_description = ?, is_published = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&title)
    .bind(&new_slug)
    .bind(&content)
    .bind(&excerpt)
    .bind(&meta_title)
    .bind(&meta_desc)
    .bind(is_published)
    .bind(Utc::now())
    .bind(blog.id)
    .execute(&mut *tx)
    .await?;

    // Category and tag lists merge into the existing sets rather than
    // replacing them.
    if let Some(categories) = &input.categories {
        for category_id in categories {
            sqlx::query("INSERT OR IGNORE INTO blog_categories (blog_id, category_id) VALUES (?, ?)")
                .bind(blog.id)
                .bind(category_id)
                .execute(&mut *tx)
                .await?;
        }
    }
    if let Some(tags) = &input.tags {
        for tag_id in tags {
            sqlx::query("INSERT OR IGNORE INTO blog_tags (blog_id, tag_id) VALUES (?, ?)")
                .bind(blog.id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await?;
        }
    }

    tx.commit().await?;

    blog_response_by_id(pool, blog.id).await
}

pub async fn delete_blog(pool: &SqlitePool, slug: &str) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM blogs WHERE slug = ?")
        .bind(slug)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Blog not found."));
    }
    Ok(())
}

/// Published blogs sharing at least one category with the given blog.
pub async fn related_blogs(
    pool: &SqlitePool,
    slug: &str,
    limit: Option<i64>,
) -> Result<Vec<BlogResponse>, ApiError> {
    let blog = find_by_slug(pool, slug).await?;
    let limit = limit.unwrap_or(4).clamp(1, 20);

    let rows = sqlx::query_as::<_, Blog>(
        "SELECT DISTINCT b.* FROM blogs b \
         JOIN blog_categories bc ON bc.blog_id = b.id \
         WHERE bc.category_id IN (SELECT category_id FROM blog_categories WHERE blog_id = ?) \
         AND b.id != ? AND b.is_published = TRUE \
         ORDER BY b.created_at DESC LIMIT ?",
    )
    .bind(blog.id)
    .bind(blog.id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    if rows.is_empty() {
        return Err(ApiError::NotFound("No related blogs found."));
    }

    let mut related = Vec::with_capacity(rows.len());
    for row in rows {
        related.push(to_response(pool, row).await?);
    }
    Ok(related)
}

/// Keyword search over title and content; returns summaries without the
/// body.
pub async fn search_blogs(pool: &SqlitePool, keyword: &str) -> Result<Vec<BlogSummary>, ApiError> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return Err(ApiError::Invalid("Keyword is required."));
    }
    let pattern = format!("%{keyword}%");

    let rows = sqlx::query_as::<_, BlogSummary>(
        "SELECT id, title, slug, excerpt, author_id, is_published, total_comments, like_count, \
         created_at, updated_at \
         FROM blogs WHERE is_published = TRUE AND (title LIKE ? OR content LIKE ?) \
         ORDER BY created_at DESC, id DESC",
    )
    .bind(&pattern)
    .bind(&pattern)
    .fetch_all(pool)
    .await?;

    if rows.is_empty() {
        return Err(ApiError::NotFound("No blogs found."));
    }
    Ok(rows)
}

pub async fn user_blogs(pool: &SqlitePool, author_id: i64) -> Result<Vec<BlogSummary>, ApiError> {
    let rows = sqlx::query_as::<_, BlogSummary>(
        "SELECT id, title, slug, excerpt, author_id, is_published, total_comments, like_count, \
         created_at, updated_at \
         FROM blogs WHERE author_id = ? AND is_published = TRUE \
         ORDER BY created_at DESC, id DESC",
    )
    .bind(author_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Records a like and bumps the blog counter in one transaction. Returns the
/// new like count.
pub async fn like_blog(pool: &SqlitePool, blog_id: i64, user_id: i64) -> Result<i64, ApiError> {
    let mut tx = pool.begin().await?;

    let insert = sqlx::query("INSERT INTO blog_likes (user_id, blog_id, created_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(blog_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await;
    if let Err(err) = insert {
        if is_unique_violation(&err) {
            return Err(ApiError::Conflict("Already liked this blog."));
        }
        return Err(err.into());
    }

    sqlx::query("UPDATE blogs SET like_count = like_count + 1 WHERE id = ?")
        .bind(blog_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    current_like_count(pool, blog_id).await
}

pub async fn unlike_blog(pool: &SqlitePool, blog_id: i64, user_id: i64) -> Result<i64, ApiError> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query("DELETE FROM blog_likes WHERE user_id = ? AND blog_id = ?")
        .bind(user_id)
        .bind(blog_id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("You have not liked this blog."));
    }

    sqlx::query("UPDATE blogs SET like_count = like_count - 1 WHERE id = ?")
        .bind(blog_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    current_like_count(pool, blog_id).await
}

async fn current_like_count(pool: &SqlitePool, blog_id: i64) -> Result<i64, ApiError> {
    let (like_count,) = sqlx::query_as::<_, (i64,)>("SELECT like_count FROM blogs WHERE id = ?")
        .bind(blog_id)
        .fetch_one(pool)
        .await?;
    Ok(like_count)
}

async fn slug_taken(
    pool: &SqlitePool,
    slug: &str,
    exclude_blog: Option<i64>,
) -> Result<bool, ApiError> {
    let existing = match exclude_blog {
        Some(id) => {
            sqlx::query_as::<_, (i64,)>("SELECT id FROM blogs WHERE slug = ? AND id != ?")
                .bind(slug)
                .bind(id)
                .fetch_optional(pool)
                .await?
        }
        None => {
            sqlx::query_as::<_, (i64,)>("SELECT id FROM blogs WHERE slug = ?")
                .bind(slug)
                .fetch_optional(pool)
                .await?
        }
    };
    Ok(existing.is_some())
}

async fn ensure_categories_exist(pool: &SqlitePool, ids: &[i64]) -> Result<(), ApiError> {
    let mut unique = ids.to_vec();
    unique.sort_unstable();
    unique.dedup();
    if unique.is_empty() {
        return Ok(());
    }
    let placeholders = vec!["?"; unique.len()].join(", ");
    let sql = format!("SELECT COUNT(*) FROM categories WHERE id IN ({placeholders})");
    let mut query = sqlx::query_as::<_, (i64,)>(&sql);
    for id in &unique {
        query = query.bind(id);
    }
    let (count,) = query.fetch_one(pool).await?;
    if count as usize != unique.len() {
        return Err(ApiError::NotFound("Category not found."));
    }
    Ok(())
}

async fn ensure_tags_exist(pool: &SqlitePool, ids: &[i64]) -> Result<(), ApiError> {
    let mut unique = ids.to_vec();
    unique.sort_unstable();
    unique.dedup();
    if unique.is_empty() {
        return Ok(());
    }
    let placeholders = vec!["?"; unique.len()].join(", ");
    let sql = format!("SELECT COUNT(*) FROM tags WHERE id IN ({placeholders})");
    let mut query = sqlx::query_as::<_, (i64,)>(&sql);
    for id in &unique {
        query = query.bind(id);
    }
    let (count,) = query.fetch_one(pool).await?;
    if count as usize != unique.len() {
        return Err(ApiError::NotFound("Tag not found."));
    }
    Ok(())
}

async fn blog_response_by_id(pool: &SqlitePool, blog_id: i64) -> Result<BlogResponse, ApiError> {
    let blog = sqlx::query_as::<_, Blog>("SELECT * FROM blogs WHERE id = ?")
        .bind(blog_id)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::NotFound("Blog not found."))?;
    to_response(pool, blog).await
}

async fn to_response(pool: &SqlitePool, blog: Blog) -> Result<BlogResponse, ApiError> {
    let author = sqlx::query_as::<_, UserSummary>("SELECT id, username, name FROM users WHERE id = ?")
        .bind(blog.author_id)
        .fetch_one(pool)
        .await?;

    let categories = sqlx::query_as::<_, Category>(
        "SELECT c.id, c.name, c.slug, c.created_at, c.updated_at \
         FROM blog_categories bc JOIN categories c ON c.id = bc.category_id \
         WHERE bc.blog_id = ? ORDER BY c.name",
    )
    .bind(blog.id)
    .fetch_all(pool)
    .await?;

    let tags = sqlx::query_as::<_, Tag>(
        "SELECT t.id, t.name, t.slug, t.created_at, t.updated_at \
         FROM blog_tags bt JOIN tags t ON t.id = bt.tag_id \
         WHERE bt.blog_id = ? ORDER BY t.name",
    )
    .bind(blog.id)
    .fetch_all(pool)
    .await?;

    Ok(BlogResponse {
        id: blog.id,
        title: blog.title,
        slug: blog.slug,
        content: blog.content,
        excerpt: blog.excerpt,
        meta_title: blog.meta_title,
        meta_description: blog.meta_description,
        author,
        categories,
        tags,
        is_published: blog.is_published,
        total_comments: blog.total_comments,
        like_count: blog.like_count,
        created_at: blog.created_at,
        updated_at: blog.updated_at,
    })
}

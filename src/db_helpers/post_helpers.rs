use sqlx::{Sqlite, SqlitePool};

use crate::data_formats::{Page, PageRequest};
use crate::errors::RequestError;
use crate::models::Post;

use super::now;

const POST_QUERY: &str = r#"
            SELECT posts.id                AS "id",
                   posts.text              AS "text",
                   posts.pub_date          AS "pub_date",
                   posts.image             AS "image",
                   posts.author_id         AS "author_id",
                   users.username          AS "author_username",
                   posts.group_id          AS "group_id",
                   post_groups.slug        AS "group_slug",
                   post_groups.title       AS "group_title",
                   (SELECT Count(*)
                    FROM   comments
                    WHERE  comments.post_id = posts.id) AS "comment_count"
            FROM   posts
                JOIN users
                    ON posts.author_id = users.id
                LEFT JOIN post_groups
                    ON posts.group_id = post_groups.id
     "#;

const FEED_FILTER: &str = r#"
            WHERE  ( posts.author_id = $1
                    OR $1 IS NULL )
                AND ( posts.group_id = $2
                        OR $2 IS NULL )
                AND ( posts.author_id IN (SELECT follows.author_id
                                          FROM   follows
                                          WHERE  follows.user_id = $3)
                        OR $3 IS NULL )
     "#;

/// Which posts a feed shows. All `None` is the global feed.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostFilter {
    pub author_id: Option<i64>,
    pub group_id: Option<i64>,
    /// Only posts by authors this user follows.
    pub followed_by: Option<i64>,
}

impl PostFilter {
    pub fn by_author(author_id: i64) -> Self {
        Self {
            author_id: Some(author_id),
            ..Default::default()
        }
    }

    pub fn by_group(group_id: i64) -> Self {
        Self {
            group_id: Some(group_id),
            ..Default::default()
        }
    }

    pub fn followed_by(user_id: i64) -> Self {
        Self {
            followed_by: Some(user_id),
            ..Default::default()
        }
    }
}

#[derive(Debug)]
pub struct NewPost {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

#[derive(Debug)]
pub enum ImageUpdate {
    Keep,
    Replace(String),
    Clear,
}

#[derive(Debug)]
pub struct PostUpdate {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: ImageUpdate,
}

pub async fn count_posts_in_db(pool: &SqlitePool, filter: PostFilter) -> Result<i64, RequestError> {
    let mut tx = pool.begin().await?;
    let query = format!("SELECT Count(*) FROM posts {}", FEED_FILTER);
    let (count,): (i64,) = sqlx::query_as(&query)
        .bind(filter.author_id)
        .bind(filter.group_id)
        .bind(filter.followed_by)
        .fetch_one(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(count)
}

/// Newest-first page of the posts selected by `filter`.
pub async fn list_posts_in_db(
    pool: &SqlitePool,
    filter: PostFilter,
    page: PageRequest,
) -> Result<Page<Post>, RequestError> {
    let total = count_posts_in_db(pool, filter).await?;
    let paginator = page.resolve(total);

    let mut tx = pool.begin().await?;
    let query = format!(
        "{} {} ORDER BY posts.pub_date DESC, posts.id DESC LIMIT $4 OFFSET $5",
        POST_QUERY, FEED_FILTER
    );
    let posts = sqlx::query_as::<Sqlite, Post>(&query)
        .bind(filter.author_id)
        .bind(filter.group_id)
        .bind(filter.followed_by)
        .bind(paginator.limit())
        .bind(paginator.offset())
        .fetch_all(&mut tx)
        .await?;
    tx.commit().await?;

    Ok(paginator.wrap(posts))
}

/// A post is addressed by its author's username and its id; both must match.
pub async fn get_post_in_db(
    pool: &SqlitePool,
    username: &str,
    post_id: i64,
) -> Result<Option<Post>, RequestError> {
    let mut tx = pool.begin().await?;
    let query = format!(
        "{} WHERE posts.id = $1 AND users.username = $2",
        POST_QUERY
    );
    let post = sqlx::query_as::<Sqlite, Post>(&query)
        .bind(post_id)
        .bind(username)
        .fetch_optional(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(post)
}

pub async fn insert_post_in_db(
    pool: &SqlitePool,
    author_id: i64,
    NewPost {
        text,
        group_id,
        image,
    }: NewPost,
) -> Result<i64, RequestError> {
    let mut tx = pool.begin().await?;
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO posts (text, pub_date, author_id, group_id, image)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(text)
    .bind(now())
    .bind(author_id)
    .bind(group_id)
    .bind(image)
    .fetch_one(&mut tx)
    .await?;
    tx.commit().await?;
    Ok(id)
}

/// Rewrites the editable fields of a post owned by `author_id`. `pub_date` is
/// never touched.
pub async fn update_post_in_db(
    pool: &SqlitePool,
    post_id: i64,
    author_id: i64,
    PostUpdate {
        text,
        group_id,
        image,
    }: PostUpdate,
) -> Result<(), RequestError> {
    let (replace_image, new_image) = match image {
        ImageUpdate::Keep => (false, None),
        ImageUpdate::Replace(name) => (true, Some(name)),
        ImageUpdate::Clear => (true, None),
    };

    let mut tx = pool.begin().await?;
    let result = sqlx::query(
        r#"
        UPDATE posts
        SET    text = $1,
               group_id = $2,
               image = CASE WHEN $3 THEN $4 ELSE image END
        WHERE  id = $5 AND author_id = $6
        "#,
    )
    .bind(text)
    .bind(group_id)
    .bind(replace_image)
    .bind(new_image)
    .bind(post_id)
    .bind(author_id)
    .execute(&mut tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RequestError::Forbidden);
    }

    tx.commit().await?;
    Ok(())
}

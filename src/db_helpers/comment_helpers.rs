use sqlx::{Sqlite, SqlitePool};

use crate::{errors::RequestError, models::Comment};

use super::now;

const COMMENT_QUERY: &str = r#"
        SELECT comments.id        AS "id",
               comments.post_id   AS "post_id",
               comments.author_id AS "author_id",
               users.username     AS "author_username",
               comments.text      AS "text",
               comments.created   AS "created"
        FROM   comments
            JOIN users
                ON comments.author_id = users.id
     "#;

pub async fn add_comment_to_post_in_db(
    pool: &SqlitePool,
    author_id: i64,
    post_id: i64,
    text: &str,
) -> Result<i64, RequestError> {
    let mut tx = pool.begin().await?;
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO comments (post_id, author_id, text, created)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(post_id)
    .bind(author_id)
    .bind(text)
    .bind(now())
    .fetch_one(&mut tx)
    .await?;
    tx.commit().await?;
    Ok(id)
}

/// Comments on a post, oldest first.
pub async fn get_comments_for_post_in_db(
    pool: &SqlitePool,
    post_id: i64,
) -> Result<Vec<Comment>, RequestError> {
    let mut tx = pool.begin().await?;
    let query = format!(
        "{} WHERE comments.post_id = $1 ORDER BY comments.created ASC, comments.id ASC",
        COMMENT_QUERY
    );
    let result = sqlx::query_as::<Sqlite, Comment>(&query)
        .bind(post_id)
        .fetch_all(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(result)
}

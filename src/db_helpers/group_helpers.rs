use sqlx::{Sqlite, SqlitePool};

use crate::{errors::RequestError, models::Group};

const GROUP_COLUMNS: &str = "id, title, slug, description";
pub const MAX_SLUG_LENGTH: usize = 20;
pub const MAX_TITLE_LENGTH: usize = 200;

/// Slugs are short URL path segments made of ASCII letters, digits, `-` and `_`.
pub fn validate_slug(slug: &str) -> Result<(), &'static str> {
    if slug.is_empty() {
        return Err("slug must not be empty");
    }
    if slug.chars().count() > MAX_SLUG_LENGTH {
        return Err("slug must be at most 20 characters");
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err("slug may only contain letters, digits, hyphens and underscores");
    }
    Ok(())
}

pub async fn insert_group(
    pool: &SqlitePool,
    title: &str,
    slug: &str,
    description: &str,
) -> Result<Group, RequestError> {
    validate_slug(slug).map_err(RequestError::BadRequest)?;
    if title.trim().is_empty() || title.chars().count() > MAX_TITLE_LENGTH {
        return Err(RequestError::BadRequest(
            "title must be between 1 and 200 characters",
        ));
    }

    let mut tx = pool.begin().await?;
    let query = format!(
        r#"
        INSERT INTO post_groups (title, slug, description)
        VALUES ($1, $2, $3)
        RETURNING {}
        "#,
        GROUP_COLUMNS
    );
    let group = sqlx::query_as::<Sqlite, Group>(&query)
        .bind(title)
        .bind(slug)
        .bind(description)
        .fetch_one(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(group)
}

pub async fn get_group_by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<Group>, RequestError> {
    let mut tx = pool.begin().await?;
    let query = format!("SELECT {} FROM post_groups WHERE slug = $1", GROUP_COLUMNS);
    let result = sqlx::query_as::<Sqlite, Group>(&query)
        .bind(slug)
        .fetch_optional(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(result)
}

/// All groups, for the group picker on the post form.
pub async fn list_groups_in_db(pool: &SqlitePool) -> Result<Vec<Group>, RequestError> {
    let mut tx = pool.begin().await?;
    let query = format!("SELECT {} FROM post_groups ORDER BY title", GROUP_COLUMNS);
    let result = sqlx::query_as::<Sqlite, Group>(&query)
        .fetch_all(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(result)
}

/// Deletes a group that no post refers to.
pub async fn delete_group_by_slug(pool: &SqlitePool, slug: &str) -> Result<(), RequestError> {
    let mut tx = pool.begin().await?;

    let group = sqlx::query_as::<Sqlite, Group>(&format!(
        "SELECT {} FROM post_groups WHERE slug = $1",
        GROUP_COLUMNS
    ))
    .bind(slug)
    .fetch_optional(&mut tx)
    .await?;
    let group = match group {
        Some(group) => group,
        None => return Err(RequestError::NotFound),
    };

    let (posts,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE group_id = $1")
        .bind(group.id)
        .fetch_one(&mut tx)
        .await?;
    if posts > 0 {
        return Err(RequestError::Protected(
            "group still has posts and cannot be deleted",
        ));
    }

    sqlx::query("DELETE FROM post_groups WHERE id = $1")
        .bind(group.id)
        .execute(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

use sqlx::{Sqlite, SqlitePool};

use crate::{
    errors::RequestError,
    models::{Follow, Profile, User},
};

use super::{now, require_user_by_username};

pub async fn get_follow_in_db(
    pool: &SqlitePool,
    user_id: i64,
    author_id: i64,
) -> Result<Option<Follow>, RequestError> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query_as::<Sqlite, Follow>(
        r#"
        SELECT id, user_id, author_id, pub_date FROM follows WHERE user_id = $1 AND author_id = $2
        "#,
    )
    .bind(user_id)
    .bind(author_id)
    .fetch_optional(&mut tx)
    .await?;
    tx.commit().await?;
    Ok(result)
}

pub async fn get_profile_by_username_in_db(
    pool: &SqlitePool,
    viewer_id: Option<i64>,
    username: &str,
) -> Result<Profile, RequestError> {
    let user = require_user_by_username(pool, username).await?;

    let mut tx = pool.begin().await?;
    let (post_count, follower_count, following_count): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT (SELECT Count(*) FROM posts WHERE author_id = $1),
               (SELECT Count(*) FROM follows WHERE author_id = $1),
               (SELECT Count(*) FROM follows WHERE user_id = $1)
        "#,
    )
    .bind(user.id)
    .fetch_one(&mut tx)
    .await?;
    tx.commit().await?;

    let following = match viewer_id {
        Some(viewer_id) => get_follow_in_db(pool, viewer_id, user.id).await?.is_some(),
        None => false,
    };

    Ok(Profile {
        user,
        post_count,
        follower_count,
        following_count,
        following,
    })
}

/// Makes `follower_id` follow `profile`. Following oneself or following twice
/// changes nothing.
pub async fn follow_user_in_db(
    pool: &SqlitePool,
    follower_id: i64,
    profile: &str,
) -> Result<User, RequestError> {
    let profile_result = require_user_by_username(pool, profile).await?;
    if profile_result.id == follower_id {
        return Ok(profile_result);
    }

    let mut tx = pool.begin().await?;
    sqlx::query(
        r#"
        INSERT INTO follows (user_id, author_id, pub_date)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, author_id) DO NOTHING
        "#,
    )
    .bind(follower_id)
    .bind(profile_result.id)
    .bind(now())
    .execute(&mut tx)
    .await?;
    tx.commit().await?;

    Ok(profile_result)
}

pub async fn unfollow_user_in_db(
    pool: &SqlitePool,
    follower_id: i64,
    profile: &str,
) -> Result<User, RequestError> {
    let profile_result = require_user_by_username(pool, profile).await?;

    let mut tx = pool.begin().await?;
    sqlx::query(
        r#"
        DELETE FROM follows WHERE user_id = $1 AND author_id = $2
        "#,
    )
    .bind(follower_id)
    .bind(profile_result.id)
    .execute(&mut tx)
    .await?;
    tx.commit().await?;

    Ok(profile_result)
}

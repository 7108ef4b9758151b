use chrono::{NaiveDateTime, Utc};
use sqlx::{Sqlite, SqlitePool};

use crate::{errors::RequestError, models::User};

mod comment_helpers;
mod group_helpers;
mod post_helpers;
mod profile_helpers;
mod user_helpers;

pub use comment_helpers::*;
pub use group_helpers::*;
pub use post_helpers::*;
pub use profile_helpers::*;
pub use user_helpers::*;

const USER_COLUMNS: &str = "id, username, password, created_at";

// Sub-second precision keeps same-second rows in creation order.
fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

// ----------------- Helper Functions -----------------

pub async fn get_user_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<User>, RequestError> {
    let mut tx = pool.begin().await?;
    let query = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
    let result = sqlx::query_as::<Sqlite, User>(&query)
        .bind(username)
        .fetch_optional(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(result)
}

pub async fn get_user_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>, RequestError> {
    let mut tx = pool.begin().await?;
    let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
    let result = sqlx::query_as::<Sqlite, User>(&query)
        .bind(id)
        .fetch_optional(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(result)
}

/// Looks up a user by name, turning a miss into `NotFound`.
pub async fn require_user_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<User, RequestError> {
    match get_user_by_username(pool, username).await? {
        Some(user) => Ok(user),
        None => Err(RequestError::NotFound),
    }
}

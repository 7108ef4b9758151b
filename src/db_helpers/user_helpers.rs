use sqlx::{Sqlite, SqlitePool};

use crate::{errors::RequestError, models::User};

use super::{now, USER_COLUMNS};

/// First path segments taken by fixed routes; a profile under one of these
/// names could never be reached.
pub const RESERVED_USERNAMES: [&str; 6] = ["new", "follow", "group", "auth", "media", "check_health"];

pub const INVALID_USERNAME: &str = "Введите правильное имя пользователя.";
pub const RESERVED_USERNAME: &str = "Это имя пользователя зарезервировано.";

/// Usernames are letters, digits and `@.+-_`, and must not shadow a route.
pub fn validate_username(username: &str) -> Result<(), &'static str> {
    if username.is_empty()
        || !username
            .chars()
            .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
    {
        return Err(INVALID_USERNAME);
    }
    if RESERVED_USERNAMES.contains(&username) {
        return Err(RESERVED_USERNAME);
    }
    Ok(())
}

/// Inserts a user whose password has already been hashed.
pub async fn insert_user(
    pool: &SqlitePool,
    username: &str,
    password_hash: &str,
) -> Result<User, RequestError> {
    let mut tx = pool.begin().await?;
    let query = format!(
        r#"
        INSERT INTO users (username, password, created_at)
        VALUES ($1, $2, $3)
        RETURNING {}
        "#,
        USER_COLUMNS
    );
    let user = sqlx::query_as::<Sqlite, User>(&query)
        .bind(username)
        .bind(password_hash)
        .bind(now())
        .fetch_one(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(user)
}

/// Deletes the user; their posts, comments and follows go with them.
pub async fn delete_user_by_username(pool: &SqlitePool, username: &str) -> Result<(), RequestError> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query(
        r#"
        DELETE FROM users WHERE username = $1
        "#,
    )
    .bind(username)
    .execute(&mut tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RequestError::NotFound);
    }

    tx.commit().await?;
    Ok(())
}

pub fn is_unique_violation(error: &RequestError) -> bool {
    if let RequestError::DatabaseError(sqlx::Error::Database(e)) = error {
        return e.message().contains("UNIQUE constraint failed");
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_usernames() {
        assert!(validate_username("leo").is_ok());
        assert!(validate_username("user.name+tag@host-1_x").is_ok());
        assert!(validate_username("Кот").is_ok());
        assert!(validate_username("-").is_ok());
        assert!(validate_username("groups").is_ok());
    }

    #[test]
    fn rejects_route_names_and_odd_characters() {
        for name in RESERVED_USERNAMES {
            assert_eq!(validate_username(name), Err(RESERVED_USERNAME));
        }
        assert_eq!(validate_username(""), Err(INVALID_USERNAME));
        assert_eq!(validate_username("with space"), Err(INVALID_USERNAME));
        assert_eq!(validate_username("a/b"), Err(INVALID_USERNAME));
    }
}

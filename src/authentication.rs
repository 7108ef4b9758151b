use std::sync::Arc;

use crate::db_helpers::get_user_by_id;
use crate::errors::RequestError;
use crate::AppState;
use anyhow::{Context, Result};
use argon2::PasswordVerifier;
use argon2::{password_hash::SaltString, Argon2, PasswordHash};
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

const JWT_EXPIRY_DURATION: time::Duration = time::Duration::days(90);
pub const SESSION_COOKIE: &str = "token";

#[derive(Debug, Serialize, Deserialize)]
struct AuthClaim {
    id: i64,
    exp: i64,
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
}

/// The identity of the caller, `None` for anonymous visitors.
pub struct MaybeUser(pub Option<AuthUser>);

impl MaybeUser {
    pub fn get_id(&self) -> Option<i64> {
        self.0.as_ref().map(|a| a.id)
    }

    pub fn username(&self) -> Option<&str> {
        self.0.as_ref().map(|a| a.username.as_str())
    }

    /// Returns the authenticated user or a login redirect back to `next`.
    pub fn require(self, next: &str) -> Result<AuthUser, RequestError> {
        self.0
            .ok_or_else(|| RequestError::NotAuthorized(next.to_string()))
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync + 'static,
{
    type Rejection = RequestError;
    async fn from_request_parts(
        parts: &mut Parts,
        _: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let state = match parts.extensions.get::<Arc<AppState>>() {
            Some(state) => state.clone(),
            None => {
                tracing::error!("AppState extension missing from request");
                return Err(RequestError::ServerError);
            }
        };

        // A header that is not `Token <jwt>` carries no identity.
        let token = match parts.headers.get(AUTHORIZATION) {
            Some(header) => {
                let token = header
                    .to_str()
                    .ok()
                    .and_then(|header| header.strip_prefix("Token "))
                    .map(|token| token.to_string());
                if token.is_none() {
                    tracing::debug!("Ignoring malformed Authorization header");
                }
                token
            }
            None => session_cookie(parts),
        };

        let token = match token {
            Some(token) => token,
            None => return Ok(MaybeUser(None)),
        };

        // A stale cookie just means the visitor is anonymous again.
        let id = match verify_jwt_token(&state.jwt_secret, &token) {
            Ok(id) => id,
            Err(_) => return Ok(MaybeUser(None)),
        };

        let user = get_user_by_id(&state.pool, id).await?;
        Ok(MaybeUser(user.map(|user| AuthUser {
            id: user.id,
            username: user.username,
        })))
    }
}

fn session_cookie(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

pub fn session_cookie_header(token: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        JWT_EXPIRY_DURATION.whole_seconds()
    )
}

pub fn cleared_session_cookie_header() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

pub fn get_jwt_token(jwt_secret: &str, id: i64) -> Result<String> {
    let expiry_date = OffsetDateTime::now_utc() + JWT_EXPIRY_DURATION;
    let claim = AuthClaim {
        id,
        exp: expiry_date.unix_timestamp(),
    };

    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claim,
        &jsonwebtoken::EncodingKey::from_secret(jwt_secret.as_ref()),
    )
    .context("Failed to generate jwt token")
}

pub fn verify_jwt_token(jwt_secret: &str, token: &str) -> Result<i64, RequestError> {
    let token_data = jsonwebtoken::decode::<AuthClaim>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(jwt_secret.as_ref()),
        &jsonwebtoken::Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!("Error verifying token: {}", e);
        RequestError::NotAuthorized("/".to_string())
    })?;
    let claim = token_data.claims;
    if claim.exp < OffsetDateTime::now_utc().unix_timestamp() {
        return Err(RequestError::NotAuthorized("/".to_string()));
    }
    Ok(claim.id)
}

pub async fn verify_password_argon2(password: String, hash: &str) -> Result<bool> {
    let hash = hash.to_owned();
    tokio::task::spawn_blocking(move || {
        let hash = PasswordHash::new(hash.as_str())
            .map_err(|_| anyhow::anyhow!("Failed to verify password"))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok())
    })
    .await
    .context("Failed to verify password")?
}

pub async fn hash_password_argon2(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(rand::thread_rng());
        let hash = PasswordHash::generate(Argon2::default(), password, salt.as_salt())
            .map_err(|_| anyhow::anyhow!("Failed to hash password"))?;
        Ok(hash.to_string())
    })
    .await
    .context("Failed to hash password")?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies_with_same_secret() {
        let token = get_jwt_token("secret", 42).unwrap();
        assert_eq!(verify_jwt_token("secret", &token).unwrap(), 42);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = get_jwt_token("secret", 42).unwrap();
        assert!(matches!(
            verify_jwt_token("other", &token),
            Err(RequestError::NotAuthorized(_))
        ));
    }

    #[tokio::test]
    async fn password_hash_round_trip() {
        let hash = hash_password_argon2("hunter2".to_string()).await.unwrap();
        assert!(verify_password_argon2("hunter2".to_string(), &hash)
            .await
            .unwrap());
        assert!(!verify_password_argon2("hunter3".to_string(), &hash)
            .await
            .unwrap());
    }

    #[test]
    fn session_cookie_header_carries_token() {
        let header = session_cookie_header("abc");
        assert!(header.starts_with("token=abc;"));
        assert!(cleared_session_cookie_header().contains("Max-Age=0"));
    }
}

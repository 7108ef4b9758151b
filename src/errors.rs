use std::fmt;

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};

use crate::pages;

#[derive(Debug)]
pub enum RequestError {
    NotFound,
    /// Carries the path to come back to after logging in.
    NotAuthorized(String),
    Forbidden,
    BadRequest(&'static str),
    Protected(&'static str),
    ServerError,
    DatabaseError(sqlx::Error),
}

impl From<sqlx::Error> for RequestError {
    fn from(value: sqlx::Error) -> Self {
        Self::DatabaseError(value)
    }
}

impl From<axum::extract::multipart::MultipartError> for RequestError {
    fn from(value: axum::extract::multipart::MultipartError) -> Self {
        tracing::warn!("Malformed multipart body: {}", value);
        Self::BadRequest("Malformed form data")
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::NotFound => write!(f, "not found"),
            RequestError::NotAuthorized(_) => write!(f, "authentication required"),
            RequestError::Forbidden => write!(f, "forbidden"),
            RequestError::BadRequest(message) => write!(f, "bad request: {}", message),
            RequestError::Protected(message) => write!(f, "{}", message),
            RequestError::ServerError => write!(f, "internal server error"),
            RequestError::DatabaseError(e) => write!(f, "database error: {}", e),
        }
    }
}

impl std::error::Error for RequestError {}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let (status_code, title, message) = match self {
            RequestError::NotAuthorized(next) => {
                return Redirect::to(&login_redirect_target(&next)).into_response();
            }
            RequestError::NotFound => (
                StatusCode::NOT_FOUND,
                "Страница не найдена",
                "The page you requested does not exist.",
            ),
            RequestError::Forbidden => (
                StatusCode::FORBIDDEN,
                "Доступ запрещён",
                "You are not allowed to do that.",
            ),
            RequestError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, "Некорректный запрос", message)
            }
            RequestError::Protected(message) => (StatusCode::CONFLICT, "Конфликт", message),
            RequestError::ServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Ошибка сервера",
                "Internal Server Error",
            ),
            RequestError::DatabaseError(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Ошибка сервера",
                    "Internal Server Error",
                )
            }
        };
        (status_code, Html(pages::error_page(title, message))).into_response()
    }
}

pub fn login_redirect_target(next: &str) -> String {
    format!("/auth/login?next={}", pages::encode_query_value(next))
}

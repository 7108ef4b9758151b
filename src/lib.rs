mod authentication;
pub mod cache;
pub mod config;
mod data_formats;
pub mod db_helpers;
mod errors;
mod handlers;
pub mod models;
mod pages;

use anyhow::Context;
pub use anyhow::Result;
pub use authentication::hash_password_argon2;
use axum::{
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::*,
    Extension, Router,
};
use cache::{page_cache_for_ttl, PageCache};
use config::ServeConfig;
pub use errors::RequestError;
use handlers::*;
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};
use std::{
    net::{SocketAddr, TcpListener},
    path::PathBuf,
    sync::Arc,
    time::Instant,
};
use tracing::Instrument;

/// Everything a request handler needs, shared behind an `Arc`.
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt_secret: String,
    pub media_root: PathBuf,
    pub posts_per_page: i64,
    pub page_cache: Box<dyn PageCache>,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: &ServeConfig) -> Self {
        AppState {
            pool,
            jwt_secret: config.jwt_secret.clone(),
            media_root: config.media_root.clone(),
            posts_per_page: config.posts_per_page,
            page_cache: page_cache_for_ttl(config.page_cache_ttl),
        }
    }
}

pub async fn run_app(config: ServeConfig) -> Result<()> {
    let address: SocketAddr = config
        .bind_address
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.bind_address))?;
    let db = init_db(&config.database_url).await?;
    let state = Arc::new(AppState::new(db, &config));
    let app = make_router(state);
    tracing::info!("Server started on {}", address);
    axum::Server::bind(&address)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

pub async fn init_db(db_url: &str) -> Result<SqlitePool> {
    if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
        tracing::info!("Creating database {}", db_url);
        Sqlite::create_database(db_url)
            .await
            .with_context(|| format!("Failed to create database {}", db_url))?;
    } else {
        tracing::debug!("Database already exists");
    }
    let pool = SqlitePool::connect(db_url)
        .await
        .with_context(|| format!("Failed to connect to {}", db_url))?;
    tracing::info!("Running Migrations");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations completed");
    Ok(pool)
}

pub fn get_random_free_port() -> (u16, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Could not bind an ephemeral port");
    match listener.local_addr() {
        Ok(addr) => (addr.port(), addr),
        Err(_) => panic!("Could not get a free port"),
    }
}

async fn log_requests<B>(request: Request<B>, next: Next<B>) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let span = tracing::info_span!("request", method = %method, path = %path);
    let started = Instant::now();
    let response = next.run(request).instrument(span.clone()).await;
    span.in_scope(|| {
        tracing::info!(
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "finished"
        )
    });
    response
}

pub fn make_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/check_health", get(alive))
        .route("/new", get(new_post_form).post(create_post))
        .route("/follow/", get(follow_index))
        .route("/group/:slug/", get(group_posts))
        .route("/media/posts/:name", get(media))
        .route("/auth/login", get(login_form).post(login_user))
        .route("/auth/signup", get(signup_form).post(register_user))
        .route("/auth/logout", get(logout))
        .route("/:username/", get(profile))
        .route("/:username/follow", get(profile_follow))
        .route("/:username/unfollow", get(profile_unfollow))
        .route("/:username/:post_id/", get(post_view))
        .route("/:username/:post_id/edit", get(edit_post_form).post(edit_post))
        .route("/:username/:post_id/comment", post(add_comment))
        .fallback(not_found)
        .layer(middleware::from_fn(log_requests))
        .layer(Extension(state))
}

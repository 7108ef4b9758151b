#![allow(dead_code)]

use std::{path::PathBuf, time::Duration};

use postboard::{
    config::ServeConfig,
    db_helpers::{self, NewPost},
    get_random_free_port, init_db,
    models::{Group, User},
    run_app,
};
use reqwest::{multipart, Client};
use sqlx::SqlitePool;
use tempfile::TempDir;

pub const PASSWORD: &str = "AsefdasDSa32";
pub const INVALID_IMAGE: &str = "Загрузите правильное изображение. Файл, который вы загрузили, поврежден или не является изображением.";
pub const REQUIRED_FIELD: &str = "Обязательное поле.";

pub struct TestApp {
    pub address: String,
    pub pool: SqlitePool,
    pub media_root: PathBuf,
    _dir: TempDir,
}

impl TestApp {
    /// Starts a server with the page cache switched off.
    pub async fn spawn() -> TestApp {
        Self::spawn_with_cache_ttl(0).await
    }

    pub async fn spawn_with_cache_ttl(page_cache_ttl: u64) -> TestApp {
        let dir = tempfile::tempdir().expect("tempdir");
        let database_url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
        let media_root = dir.path().join("media");
        let (_, addr) = get_random_free_port();

        // Migrate up front so the test pool sees the schema immediately.
        let pool = init_db(&database_url).await.expect("init db");

        let config = ServeConfig {
            database_url,
            bind_address: addr.to_string(),
            jwt_secret: "test-secret".to_string(),
            media_root: media_root.clone(),
            page_cache_ttl,
            posts_per_page: 10,
            log_level: "info".to_string(),
            log_json: false,
        };
        tokio::spawn(run_app(config));

        let address = format!("http://{}", addr);
        let probe = Client::new();
        for _ in 0..100 {
            if probe
                .get(format!("{}/check_health", address))
                .send()
                .await
                .is_ok()
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            pool,
            media_root,
            _dir: dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub fn anonymous(&self) -> Client {
        Client::builder()
            .cookie_store(true)
            .build()
            .expect("client")
    }

    /// Signs a new user up through the site and returns a client carrying
    /// their session cookie.
    pub async fn signup(&self, username: &str) -> Client {
        let client = self.anonymous();
        let response = client
            .post(self.url("/auth/signup"))
            .form(&[("username", username), ("password", PASSWORD)])
            .send()
            .await
            .expect("signup request");
        assert_eq!(response.status(), 200);
        client
    }

    /// A user that exists but never logs in.
    pub async fn create_user(&self, username: &str) -> User {
        db_helpers::insert_user(&self.pool, username, "not-a-hash")
            .await
            .expect("insert user")
    }

    pub async fn user(&self, username: &str) -> User {
        db_helpers::get_user_by_username(&self.pool, username)
            .await
            .expect("query user")
            .expect("user exists")
    }

    pub async fn create_group(&self, title: &str, slug: &str) -> Group {
        db_helpers::insert_group(&self.pool, title, slug, "")
            .await
            .expect("insert group")
    }

    pub async fn create_post(&self, author_id: i64, text: &str, group_id: Option<i64>) -> i64 {
        db_helpers::insert_post_in_db(
            &self.pool,
            author_id,
            NewPost {
                text: text.to_string(),
                group_id,
                image: None,
            },
        )
        .await
        .expect("insert post")
    }

    pub async fn count(&self, query: &str) -> i64 {
        let (count,): (i64,) = sqlx::query_as(query)
            .fetch_one(&self.pool)
            .await
            .expect("count query");
        count
    }

    pub async fn get_text(&self, client: &Client, path: &str) -> (u16, String) {
        let response = client.get(self.url(path)).send().await.expect("GET");
        let status = response.status().as_u16();
        (status, response.text().await.expect("body"))
    }
}

pub fn post_form(text: &str, group_id: Option<i64>) -> multipart::Form {
    let form = multipart::Form::new().text("text", text.to_string());
    match group_id {
        Some(id) => form.text("group", id.to_string()),
        None => form,
    }
}

pub fn png_bytes() -> Vec<u8> {
    let image = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        200,
        200,
        image::Rgb([255, 255, 255]),
    ));
    let mut out = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut out, image::ImageOutputFormat::Png)
        .expect("encode png");
    out.into_inner()
}

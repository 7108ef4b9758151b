use std::{path::Path as FsPath, sync::Arc};

use axum::{
    extract::{
        multipart::MultipartRejection, rejection::FormRejection, Multipart, Path, Query,
    },
    http::{header, StatusCode, Uri},
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Form,
};
use image::ImageFormat;
use rand::{distributions::Alphanumeric, Rng};

use crate::{
    authentication::{
        cleared_session_cookie_header, get_jwt_token, hash_password_argon2,
        session_cookie_header, verify_password_argon2, MaybeUser,
    },
    data_formats::{
        safe_next, CommentRequest, FormErrors, LoginRequest, NextQuery, PageQuery, PageRequest,
        PostForm, SignupRequest, ValidImage, REQUIRED_FIELD,
    },
    db_helpers::{
        add_comment_to_post_in_db, follow_user_in_db, get_comments_for_post_in_db,
        get_group_by_slug, get_post_in_db, get_profile_by_username_in_db, get_user_by_username,
        insert_post_in_db, insert_user, is_unique_violation, list_groups_in_db, list_posts_in_db,
        unfollow_user_in_db, update_post_in_db, validate_username, ImageUpdate, NewPost,
        PostFilter, PostUpdate,
    },
    errors::RequestError,
    models::Post,
    pages, AppState,
};

type HtmlResult = Result<Html<String>, RequestError>;

fn post_url(username: &str, post_id: i64) -> String {
    format!("/{}/{}/", pages::encode_query_value(username), post_id)
}

fn profile_url(username: &str) -> String {
    format!("/{}/", pages::encode_query_value(username))
}

// Ids that are not numbers can never name a post.
fn parse_post_id(raw: &str) -> Result<i64, RequestError> {
    raw.parse::<i64>().map_err(|_| RequestError::NotFound)
}

async fn require_post(
    state: &AppState,
    username: &str,
    post_id: &str,
) -> Result<Post, RequestError> {
    let post_id = parse_post_id(post_id)?;
    match get_post_in_db(&state.pool, username, post_id).await? {
        Some(post) => Ok(post),
        None => Err(RequestError::NotFound),
    }
}

// Body rejections are only surfaced once the caller is known to be logged in.
fn form_body<T>(body: Result<T, impl std::fmt::Display>) -> Result<T, RequestError> {
    body.map_err(|e| {
        tracing::warn!("Malformed form body: {}", e);
        RequestError::BadRequest("Malformed form data")
    })
}

async fn save_image(media_root: &FsPath, image: &ValidImage) -> Result<String, RequestError> {
    let stem: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(20)
        .map(char::from)
        .collect();
    let name = format!("posts/{}.{}", stem, image.extension());
    let target = media_root.join(&name);
    if let Some(dir) = target.parent() {
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            tracing::error!("Could not create media directory {}: {}", dir.display(), e);
            RequestError::ServerError
        })?;
    }
    tokio::fs::write(&target, &image.bytes).await.map_err(|e| {
        tracing::error!("Could not write image {}: {}", target.display(), e);
        RequestError::ServerError
    })?;
    tracing::info!("Stored uploaded image {}", name);
    Ok(name)
}

// ----------------- Helper Handlers -----------------
pub async fn alive() -> &'static str {
    "alive"
}

pub async fn not_found(uri: Uri) -> RequestError {
    tracing::debug!("No route for {}", uri);
    RequestError::NotFound
}

pub async fn media(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, RequestError> {
    if name.is_empty()
        || name.starts_with('.')
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
    {
        return Err(RequestError::NotFound);
    }
    let path = state.media_root.join("posts").join(&name);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| RequestError::NotFound)?;
    let content_type = FsPath::new(&name)
        .extension()
        .and_then(ImageFormat::from_extension)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream");
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

// ----------------- Feed Handlers -----------------
pub async fn index(
    Extension(state): Extension<Arc<AppState>>,
    maybe_user: MaybeUser,
    Query(query): Query<PageQuery>,
) -> HtmlResult {
    let viewer = match maybe_user.get_id() {
        Some(id) => format!("u{}", id),
        None => "anon".to_string(),
    };
    let cache_key = format!("index:{}:{}", viewer, query.page.as_deref().unwrap_or("1"));
    if let Some(page) = state.page_cache.get(&cache_key) {
        return Ok(Html(page));
    }

    let page_request = PageRequest::new(query.page.as_deref(), state.posts_per_page);
    let page = list_posts_in_db(&state.pool, PostFilter::default(), page_request).await?;
    let html = pages::index_page(maybe_user.username(), &page);
    state.page_cache.set(&cache_key, html.clone());
    Ok(Html(html))
}

pub async fn group_posts(
    Extension(state): Extension<Arc<AppState>>,
    maybe_user: MaybeUser,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> HtmlResult {
    let group = match get_group_by_slug(&state.pool, &slug).await? {
        Some(group) => group,
        None => return Err(RequestError::NotFound),
    };
    let page_request = PageRequest::new(query.page.as_deref(), state.posts_per_page);
    let page = list_posts_in_db(&state.pool, PostFilter::by_group(group.id), page_request).await?;
    Ok(Html(pages::group_page(maybe_user.username(), &group, &page)))
}

pub async fn profile(
    Extension(state): Extension<Arc<AppState>>,
    maybe_user: MaybeUser,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> HtmlResult {
    let profile =
        get_profile_by_username_in_db(&state.pool, maybe_user.get_id(), &username).await?;
    let page_request = PageRequest::new(query.page.as_deref(), state.posts_per_page);
    let page = list_posts_in_db(
        &state.pool,
        PostFilter::by_author(profile.user.id),
        page_request,
    )
    .await?;
    Ok(Html(pages::profile_page(
        maybe_user.username(),
        &profile,
        &page,
    )))
}

/// Posts by the authors the visitor follows. Anonymous visitors follow nobody.
pub async fn follow_index(
    Extension(state): Extension<Arc<AppState>>,
    maybe_user: MaybeUser,
    Query(query): Query<PageQuery>,
) -> HtmlResult {
    let page_request = PageRequest::new(query.page.as_deref(), state.posts_per_page);
    let page = match maybe_user.get_id() {
        Some(id) => list_posts_in_db(&state.pool, PostFilter::followed_by(id), page_request).await?,
        None => page_request.resolve(0).wrap(Vec::new()),
    };
    Ok(Html(pages::follow_page(maybe_user.username(), &page)))
}

// ----------------- Post Handlers -----------------
pub async fn post_view(
    Extension(state): Extension<Arc<AppState>>,
    maybe_user: MaybeUser,
    Path((username, post_id)): Path<(String, String)>,
) -> HtmlResult {
    let post = require_post(&state, &username, &post_id).await?;
    let comments = get_comments_for_post_in_db(&state.pool, post.id).await?;
    Ok(Html(pages::post_page(
        maybe_user.username(),
        &post,
        &comments,
        None,
    )))
}

pub async fn new_post_form(
    Extension(state): Extension<Arc<AppState>>,
    maybe_user: MaybeUser,
) -> HtmlResult {
    let user = maybe_user.require("/new")?;
    let groups = list_groups_in_db(&state.pool).await?;
    Ok(Html(pages::post_form_page(
        Some(user.username.as_str()),
        &PostForm::default(),
        &FormErrors::default(),
        &groups,
        None,
    )))
}

pub async fn create_post(
    Extension(state): Extension<Arc<AppState>>,
    maybe_user: MaybeUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, RequestError> {
    let user = maybe_user.require("/new")?;
    let form = PostForm::from_multipart(form_body(multipart)?).await?;
    let groups = list_groups_in_db(&state.pool).await?;

    let clean = match form.clean(&groups).await {
        Ok(clean) => clean,
        Err(errors) => {
            tracing::debug!("Rejected new post from {}: {:?}", user.username, errors);
            let html = pages::post_form_page(Some(user.username.as_str()), &form, &errors, &groups, None);
            return Ok(Html(html).into_response());
        }
    };

    let image = match &clean.image {
        Some(image) => Some(save_image(&state.media_root, image).await?),
        None => None,
    };
    let post_id = insert_post_in_db(
        &state.pool,
        user.id,
        NewPost {
            text: clean.text,
            group_id: clean.group_id,
            image,
        },
    )
    .await?;
    state.page_cache.invalidate();
    tracing::info!("{} created post {}", user.username, post_id);

    Ok(Redirect::to("/").into_response())
}

pub async fn edit_post_form(
    Extension(state): Extension<Arc<AppState>>,
    maybe_user: MaybeUser,
    uri: Uri,
    Path((username, post_id)): Path<(String, String)>,
) -> Result<Response, RequestError> {
    let user = maybe_user.require(uri.path())?;
    let post = require_post(&state, &username, &post_id).await?;
    if post.author_id != user.id {
        return Ok(Redirect::to(&post_url(&post.author_username, post.id)).into_response());
    }
    let groups = list_groups_in_db(&state.pool).await?;
    let html = pages::post_form_page(
        Some(user.username.as_str()),
        &PostForm::from_post(&post),
        &FormErrors::default(),
        &groups,
        Some(&post),
    );
    Ok(Html(html).into_response())
}

pub async fn edit_post(
    Extension(state): Extension<Arc<AppState>>,
    maybe_user: MaybeUser,
    uri: Uri,
    Path((username, post_id)): Path<(String, String)>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, RequestError> {
    let user = maybe_user.require(uri.path())?;
    let post = require_post(&state, &username, &post_id).await?;
    if post.author_id != user.id {
        tracing::warn!("{} tried to edit post {} by {}", user.username, post.id, post.author_username);
        return Ok(Redirect::to(&post_url(&post.author_username, post.id)).into_response());
    }

    let form = PostForm::from_multipart(form_body(multipart)?).await?;
    let groups = list_groups_in_db(&state.pool).await?;
    let clean = match form.clean(&groups).await {
        Ok(clean) => clean,
        Err(errors) => {
            let html =
                pages::post_form_page(Some(user.username.as_str()), &form, &errors, &groups, Some(&post));
            return Ok(Html(html).into_response());
        }
    };

    let image = match &clean.image {
        Some(image) => ImageUpdate::Replace(save_image(&state.media_root, image).await?),
        None if clean.clear_image => ImageUpdate::Clear,
        None => ImageUpdate::Keep,
    };
    update_post_in_db(
        &state.pool,
        post.id,
        user.id,
        PostUpdate {
            text: clean.text,
            group_id: clean.group_id,
            image,
        },
    )
    .await?;
    state.page_cache.invalidate();
    tracing::info!("{} edited post {}", user.username, post.id);

    Ok(Redirect::to(&post_url(&post.author_username, post.id)).into_response())
}

// ----------------- Comment Handlers -----------------
pub async fn add_comment(
    Extension(state): Extension<Arc<AppState>>,
    maybe_user: MaybeUser,
    Path((username, post_id)): Path<(String, String)>,
    form: Result<Form<CommentRequest>, FormRejection>,
) -> Result<Response, RequestError> {
    let user = maybe_user.require(&post_url(&username, parse_post_id(&post_id)?))?;
    let post = require_post(&state, &username, &post_id).await?;
    let Form(CommentRequest { text }) = form_body(form)?;

    let text = text.trim();
    if text.is_empty() {
        let comments = get_comments_for_post_in_db(&state.pool, post.id).await?;
        let html = pages::post_page(Some(user.username.as_str()), &post, &comments, Some(REQUIRED_FIELD));
        return Ok(Html(html).into_response());
    }

    add_comment_to_post_in_db(&state.pool, user.id, post.id, text).await?;
    Ok(Redirect::to(&post_url(&post.author_username, post.id)).into_response())
}

// ----------------- Profile Handlers -----------------
pub async fn profile_follow(
    Extension(state): Extension<Arc<AppState>>,
    maybe_user: MaybeUser,
    uri: Uri,
    Path(username): Path<String>,
) -> Result<Redirect, RequestError> {
    let user = maybe_user.require(uri.path())?;
    let profile = follow_user_in_db(&state.pool, user.id, &username).await?;
    tracing::info!("{} follows {}", user.username, profile.username);
    Ok(Redirect::to(&profile_url(&profile.username)))
}

pub async fn profile_unfollow(
    Extension(state): Extension<Arc<AppState>>,
    maybe_user: MaybeUser,
    uri: Uri,
    Path(username): Path<String>,
) -> Result<Redirect, RequestError> {
    let user = maybe_user.require(uri.path())?;
    let profile = unfollow_user_in_db(&state.pool, user.id, &username).await?;
    tracing::info!("{} unfollowed {}", user.username, profile.username);
    Ok(Redirect::to(&profile_url(&profile.username)))
}

// ----------------- Identity Handlers -----------------
fn logged_in_redirect(state: &AppState, user_id: i64, next: &str) -> Result<Response, RequestError> {
    let token = get_jwt_token(&state.jwt_secret, user_id).map_err(|e| {
        tracing::error!("Could not issue session token: {}", e);
        RequestError::ServerError
    })?;
    Ok((
        [(header::SET_COOKIE, session_cookie_header(&token))],
        Redirect::to(next),
    )
        .into_response())
}

pub async fn login_form(Query(NextQuery { next }): Query<NextQuery>) -> Html<String> {
    Html(pages::login_page(safe_next(next.as_deref()), None))
}

pub async fn login_user(
    Extension(state): Extension<Arc<AppState>>,
    Form(request): Form<LoginRequest>,
) -> Result<Response, RequestError> {
    let next = safe_next(request.next.as_deref()).to_string();
    let rejected = || {
        Html(pages::login_page(
            &next,
            Some("Введите правильные имя пользователя и пароль."),
        ))
        .into_response()
    };

    let user = match get_user_by_username(&state.pool, request.username.trim()).await? {
        Some(user) => user,
        None => {
            tracing::warn!("Login attempt for unknown user {}", request.username);
            return Ok(rejected());
        }
    };
    let is_password_correct = verify_password_argon2(request.password, &user.password)
        .await
        .map_err(|e| {
            tracing::error!("Password verification failed: {}", e);
            RequestError::ServerError
        })?;
    if !is_password_correct {
        tracing::warn!("Wrong password for {}", user.username);
        return Ok(rejected());
    }

    tracing::info!("{} logged in", user.username);
    logged_in_redirect(&state, user.id, &next)
}

pub async fn signup_form() -> Html<String> {
    Html(pages::signup_page("", None))
}

pub async fn register_user(
    Extension(state): Extension<Arc<AppState>>,
    Form(SignupRequest { username, password }): Form<SignupRequest>,
) -> Result<Response, RequestError> {
    let username = username.trim().to_string();
    if username.is_empty() || password.is_empty() {
        return Ok(Html(pages::signup_page(&username, Some(REQUIRED_FIELD))).into_response());
    }
    if let Err(message) = validate_username(&username) {
        tracing::debug!("Rejected sign-up for {}: {}", username, message);
        return Ok(Html(pages::signup_page(&username, Some(message))).into_response());
    }

    let password = hash_password_argon2(password).await.map_err(|e| {
        tracing::error!("Could not hash password: {}", e);
        RequestError::ServerError
    })?;
    let user = match insert_user(&state.pool, &username, &password).await {
        Ok(user) => user,
        Err(e) if is_unique_violation(&e) => {
            return Ok(Html(pages::signup_page(
                &username,
                Some("Пользователь с таким именем уже существует."),
            ))
            .into_response());
        }
        Err(e) => return Err(e),
    };

    tracing::info!("Registered user {}", user.username);
    logged_in_redirect(&state, user.id, "/")
}

pub async fn logout() -> Response {
    (
        StatusCode::OK,
        [(header::SET_COOKIE, cleared_session_cookie_header())],
        Html(pages::logged_out_page()),
    )
        .into_response()
}

//! Server-side HTML for every page the site serves.
//!
//! Markup is assembled with `format!`; every value that came from a user goes
//! through [`escape`] first.

use std::fmt::Write;

use crate::data_formats::{FormErrors, Page, PostForm};
use crate::models::{Comment, Group, Post, Profile};

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Percent-encodes everything outside the unreserved set and `/`.
pub fn encode_query_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(byte as char)
            }
            _ => {
                let _ = write!(out, "%{:02X}", byte);
            }
        }
    }
    out
}

fn layout(title: &str, viewer: Option<&str>, body: &str) -> String {
    let nav = match viewer {
        Some(username) => format!(
            r#"<a href="/new">Новая запись</a> <a href="/follow/">Избранные авторы</a> <a href="/{user}/">{user}</a> <a href="/auth/logout">Выйти</a>"#,
            user = escape(username)
        ),
        None => r#"<a href="/auth/login">Войти</a> <a href="/auth/signup">Регистрация</a>"#
            .to_string(),
    };
    format!(
        r#"<!DOCTYPE html>
<html lang="ru">
<head>
<meta charset="utf-8">
<title>{title}</title>
</head>
<body>
<header><a href="/">Postboard</a> <nav>{nav}</nav></header>
<main>
{body}
</main>
</body>
</html>
"#,
        title = escape(title),
        nav = nav,
        body = body
    )
}

fn post_card(post: &Post) -> String {
    let mut card = String::from(r#"<article class="card">"#);
    let _ = write!(
        card,
        r#"<p class="card-meta"><a href="/{author}/">{author}</a> <time>{date}</time></p>"#,
        author = escape(&post.author_username),
        date = post.pub_date.format("%d.%m.%Y %H:%M")
    );
    if let Some(image) = &post.image {
        let _ = write!(
            card,
            r#"<img class="card-img" src="/media/{}" alt="">"#,
            escape(image)
        );
    }
    let _ = write!(card, r#"<p class="card-text">{}</p>"#, escape(&post.text));
    if let (Some(slug), Some(title)) = (&post.group_slug, &post.group_title) {
        let _ = write!(
            card,
            r#"<p class="card-group"><a href="/group/{}/">{}</a></p>"#,
            escape(slug),
            escape(title)
        );
    }
    let _ = write!(
        card,
        r#"<p class="card-links"><a href="/{author}/{id}/">Комментарии: {count}</a></p></article>"#,
        author = escape(&post.author_username),
        id = post.id,
        count = post.comment_count
    );
    card
}

fn pagination(page: &Page<Post>, base_path: &str) -> String {
    let paginator = &page.paginator;
    if paginator.num_pages <= 1 {
        return String::new();
    }
    let mut nav = String::from(r#"<nav class="pagination">"#);
    if page.has_previous() {
        let _ = write!(
            nav,
            r#"<a href="{}?page={}">&laquo;</a> "#,
            base_path,
            paginator.number - 1
        );
    }
    let _ = write!(
        nav,
        "<span>{} / {}</span>",
        paginator.number, paginator.num_pages
    );
    if page.has_next() {
        let _ = write!(
            nav,
            r#" <a href="{}?page={}">&raquo;</a>"#,
            base_path,
            paginator.number + 1
        );
    }
    nav.push_str("</nav>");
    nav
}

fn feed(page: &Page<Post>, base_path: &str, empty_message: &str) -> String {
    if page.items.is_empty() {
        return format!(r#"<p class="empty">{}</p>"#, escape(empty_message));
    }
    let mut html = String::new();
    for post in &page.items {
        html.push_str(&post_card(post));
    }
    html.push_str(&pagination(page, base_path));
    html
}

pub fn index_page(viewer: Option<&str>, page: &Page<Post>) -> String {
    let body = format!(
        "<h1>Последние обновления на сайте</h1>{}",
        feed(page, "/", "Записей пока нет.")
    );
    layout("Последние обновления", viewer, &body)
}

pub fn follow_page(viewer: Option<&str>, page: &Page<Post>) -> String {
    let body = format!(
        "<h1>Записи избранных авторов</h1>{}",
        feed(page, "/follow/", "Вы ещё ни на кого не подписаны.")
    );
    layout("Избранные авторы", viewer, &body)
}

pub fn group_page(viewer: Option<&str>, group: &Group, page: &Page<Post>) -> String {
    let base_path = format!("/group/{}/", encode_query_value(&group.slug));
    let body = format!(
        r#"<h1>{}</h1><p class="group-description">{}</p>{}"#,
        escape(&group.title),
        escape(&group.description),
        feed(page, &base_path, "В этой группе пока нет записей.")
    );
    layout(&group.title, viewer, &body)
}

pub fn profile_page(viewer: Option<&str>, profile: &Profile, page: &Page<Post>) -> String {
    let username = &profile.user.username;
    let mut header = format!(
        r#"<section class="profile"><h1>{user}</h1><p>Записей: {posts}</p><p>Подписчиков: {followers}</p><p>Подписан: {following}</p>"#,
        user = escape(username),
        posts = profile.post_count,
        followers = profile.follower_count,
        following = profile.following_count
    );
    if let Some(viewer) = viewer {
        if viewer != username {
            let (action, label) = if profile.following {
                ("unfollow", "Отписаться")
            } else {
                ("follow", "Подписаться")
            };
            let _ = write!(
                header,
                r#"<a class="follow-button" href="/{}/{}">{}</a>"#,
                escape(username),
                action,
                label
            );
        }
    }
    header.push_str("</section>");

    let base_path = format!("/{}/", encode_query_value(username));
    let body = format!(
        "{}{}",
        header,
        feed(page, &base_path, "У автора пока нет записей.")
    );
    layout(username, viewer, &body)
}

pub fn post_page(
    viewer: Option<&str>,
    post: &Post,
    comments: &[Comment],
    comment_error: Option<&str>,
) -> String {
    let mut body = post_card(post);
    if viewer == Some(post.author_username.as_str()) {
        let _ = write!(
            body,
            r#"<p><a href="/{}/{}/edit">Редактировать</a></p>"#,
            escape(&post.author_username),
            post.id
        );
    }

    body.push_str(r#"<section class="comments">"#);
    for comment in comments {
        let _ = write!(
            body,
            r#"<div class="comment"><p><a href="/{author}/">{author}</a> <time>{date}</time></p><p>{text}</p></div>"#,
            author = escape(&comment.author_username),
            date = comment.created.format("%d.%m.%Y %H:%M"),
            text = escape(&comment.text)
        );
    }
    body.push_str("</section>");

    if viewer.is_some() {
        let _ = write!(
            body,
            r#"<form method="post" action="/{}/{}/comment"><textarea name="text"></textarea>{}<button type="submit">Отправить</button></form>"#,
            escape(&post.author_username),
            post.id,
            field_error(comment_error)
        );
    }
    layout("Запись", viewer, &body)
}

fn field_error(error: Option<&str>) -> String {
    match error {
        Some(message) => format!(r#"<ul class="errorlist"><li>{}</li></ul>"#, escape(message)),
        None => String::new(),
    }
}

/// The create form when `editing` is `None`, otherwise the edit form for that
/// post.
pub fn post_form_page(
    viewer: Option<&str>,
    form: &PostForm,
    errors: &FormErrors,
    groups: &[Group],
    editing: Option<&Post>,
) -> String {
    let (heading, action) = match editing {
        Some(post) => (
            "Редактировать запись",
            format!("/{}/{}/edit", encode_query_value(&post.author_username), post.id),
        ),
        None => ("Добавить запись", "/new".to_string()),
    };

    let mut options = String::from(r#"<option value="">---------</option>"#);
    for group in groups {
        let value = group.id.to_string();
        let selected = if form.group.as_deref() == Some(value.as_str()) {
            " selected"
        } else {
            ""
        };
        let _ = write!(
            options,
            r#"<option value="{}"{}>{}</option>"#,
            value,
            selected,
            escape(&group.title)
        );
    }

    let current_image = match editing.and_then(|post| post.image.as_deref()) {
        Some(image) => format!(
            r#"<p>Текущее изображение: <a href="/media/{img}">{img}</a> <label><input type="checkbox" name="image-clear" value="on"> Очистить</label></p>"#,
            img = escape(image)
        ),
        None => String::new(),
    };

    let body = format!(
        r#"<h1>{heading}</h1>
<form method="post" action="{action}" enctype="multipart/form-data" id="form">
<label for="id_text">Текст</label>
<textarea name="text" id="id_text">{text}</textarea>{text_error}
<label for="id_group">Группа</label>
<select name="group" id="id_group">{options}</select>{group_error}
<label for="id_image">Изображение</label>
{current_image}<input type="file" name="image" id="id_image" accept="image/*">{image_error}
<button type="submit">Сохранить</button>
</form>"#,
        heading = heading,
        action = action,
        text = escape(&form.text),
        text_error = field_error(errors.text),
        options = options,
        group_error = field_error(errors.group),
        current_image = current_image,
        image_error = field_error(errors.image),
    );
    layout(heading, viewer, &body)
}

pub fn login_page(next: &str, error: Option<&str>) -> String {
    let body = format!(
        r#"<h1>Войти на сайт</h1>
<form method="post" action="/auth/login" id="login-form">
<input type="hidden" name="next" value="{next}">
<label for="id_username">Имя пользователя</label><input type="text" name="username" id="id_username">
<label for="id_password">Пароль</label><input type="password" name="password" id="id_password">
{error}<button type="submit">Войти</button>
</form>"#,
        next = escape(next),
        error = field_error(error)
    );
    layout("Войти", None, &body)
}

pub fn signup_page(username: &str, error: Option<&str>) -> String {
    let body = format!(
        r#"<h1>Зарегистрироваться</h1>
<form method="post" action="/auth/signup" id="signup-form">
<label for="id_username">Имя пользователя</label><input type="text" name="username" id="id_username" value="{username}">
<label for="id_password">Пароль</label><input type="password" name="password" id="id_password">
{error}<button type="submit">Зарегистрироваться</button>
</form>"#,
        username = escape(username),
        error = field_error(error)
    );
    layout("Регистрация", None, &body)
}

pub fn logged_out_page() -> String {
    layout(
        "Выход",
        None,
        r#"<h1>Вы вышли из своей учётной записи.</h1><p><a href="/auth/login">Войти снова</a></p>"#,
    )
}

pub fn error_page(title: &str, message: &str) -> String {
    let body = format!(
        r#"<h1 class="error-title">{}</h1><p>{}</p>"#,
        escape(title),
        escape(message)
    );
    layout(title, None, &body)
}

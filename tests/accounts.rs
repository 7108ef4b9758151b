mod common;

use common::{TestApp, PASSWORD};

const USER_COUNT: &str = "SELECT COUNT(*) FROM users";

#[tokio::test]
async fn route_names_cannot_be_registered() {
    let app = TestApp::spawn().await;
    let client = app.anonymous();

    for username in ["group", "follow", "new", "auth", "media", "check_health"] {
        let response = client
            .post(app.url("/auth/signup"))
            .form(&[("username", username), ("password", PASSWORD)])
            .send()
            .await
            .unwrap();
        assert_eq!(response.url().path(), "/auth/signup", "{}", username);
        assert!(response
            .text()
            .await
            .unwrap()
            .contains("Это имя пользователя зарезервировано."));
    }
    assert_eq!(app.count(USER_COUNT).await, 0);
}

#[tokio::test]
async fn signup_logs_the_new_user_in() {
    let app = TestApp::spawn().await;
    let client = app.signup("groups").await;

    let (status, body) = app.get_text(&client, "/").await;
    assert_eq!(status, 200);
    assert!(body.contains(r#"<a href="/groups/">groups</a>"#));
    assert_eq!(app.count(USER_COUNT).await, 1);
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let app = TestApp::spawn().await;
    app.signup("taken").await;

    let response = app
        .anonymous()
        .post(app.url("/auth/signup"))
        .form(&[("username", "taken"), ("password", PASSWORD)])
        .send()
        .await
        .unwrap();

    assert!(response
        .text()
        .await
        .unwrap()
        .contains("Пользователь с таким именем уже существует."));
    assert_eq!(app.count(USER_COUNT).await, 1);
}

use postboard::{
    db_helpers::{self, NewPost},
    init_db, RequestError,
};
use sqlx::SqlitePool;
use tempfile::TempDir;

async fn pool() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("admin.db").display());
    (init_db(&url).await.unwrap(), dir)
}

async fn count(pool: &SqlitePool, table: &str) -> i64 {
    let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap();
    count
}

fn post(text: &str, group_id: Option<i64>) -> NewPost {
    NewPost {
        text: text.to_string(),
        group_id,
        image: None,
    }
}

#[tokio::test]
async fn group_with_posts_is_protected() {
    let (pool, _dir) = pool().await;
    let user = db_helpers::insert_user(&pool, "writer", "x").await.unwrap();
    let busy = db_helpers::insert_group(&pool, "Busy", "busy", "").await.unwrap();
    db_helpers::insert_group(&pool, "Idle", "idle", "").await.unwrap();
    db_helpers::insert_post_in_db(&pool, user.id, post("hello", Some(busy.id)))
        .await
        .unwrap();

    let refused = db_helpers::delete_group_by_slug(&pool, "busy").await;
    assert!(matches!(refused, Err(RequestError::Protected(_))));
    assert!(db_helpers::get_group_by_slug(&pool, "busy").await.unwrap().is_some());

    db_helpers::delete_group_by_slug(&pool, "idle").await.unwrap();
    assert!(db_helpers::get_group_by_slug(&pool, "idle").await.unwrap().is_none());

    assert!(matches!(
        db_helpers::delete_group_by_slug(&pool, "idle").await,
        Err(RequestError::NotFound)
    ));
}

#[tokio::test]
async fn storage_refuses_deleting_referenced_group() {
    let (pool, _dir) = pool().await;
    let user = db_helpers::insert_user(&pool, "writer", "x").await.unwrap();
    let group = db_helpers::insert_group(&pool, "Busy", "busy", "").await.unwrap();
    db_helpers::insert_post_in_db(&pool, user.id, post("hello", Some(group.id)))
        .await
        .unwrap();

    let raw = sqlx::query("DELETE FROM post_groups WHERE id = $1")
        .bind(group.id)
        .execute(&pool)
        .await;
    assert!(raw.is_err());
    assert_eq!(count(&pool, "post_groups").await, 1);
}

#[tokio::test]
async fn deleting_user_cascades() {
    let (pool, _dir) = pool().await;
    let leaving = db_helpers::insert_user(&pool, "leaving", "x").await.unwrap();
    let staying = db_helpers::insert_user(&pool, "staying", "x").await.unwrap();

    let leaving_post = db_helpers::insert_post_in_db(&pool, leaving.id, post("bye", None))
        .await
        .unwrap();
    let staying_post = db_helpers::insert_post_in_db(&pool, staying.id, post("hi", None))
        .await
        .unwrap();
    db_helpers::add_comment_to_post_in_db(&pool, staying.id, leaving_post, "on leaving post")
        .await
        .unwrap();
    db_helpers::add_comment_to_post_in_db(&pool, leaving.id, staying_post, "by leaving user")
        .await
        .unwrap();
    db_helpers::add_comment_to_post_in_db(&pool, staying.id, staying_post, "kept")
        .await
        .unwrap();
    db_helpers::follow_user_in_db(&pool, staying.id, "leaving").await.unwrap();
    db_helpers::follow_user_in_db(&pool, leaving.id, "staying").await.unwrap();

    db_helpers::delete_user_by_username(&pool, "leaving").await.unwrap();

    assert_eq!(count(&pool, "posts").await, 1);
    assert_eq!(count(&pool, "follows").await, 0);
    let comments = db_helpers::get_comments_for_post_in_db(&pool, staying_post)
        .await
        .unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].text, "kept");
    assert_eq!(count(&pool, "comments").await, 1);
}

#[tokio::test]
async fn group_slug_rules_are_enforced() {
    let (pool, _dir) = pool().await;

    assert!(matches!(
        db_helpers::insert_group(&pool, "Long", "a-slug-that-is-far-too-long", "").await,
        Err(RequestError::BadRequest(_))
    ));
    db_helpers::insert_group(&pool, "Cats", "cats", "").await.unwrap();
    let duplicate = db_helpers::insert_group(&pool, "Cats again", "cats", "").await;
    assert!(duplicate
        .as_ref()
        .err()
        .map(db_helpers::is_unique_violation)
        .unwrap_or(false));
}

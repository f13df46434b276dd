mod common;

use common::{ADMIN_PASSWORD, ADMIN_USERNAME, TestApp, png_bytes, spawn_app, spawn_app_with};
use reqwest::multipart::{Form, Part};
use sardia_cms::models::{Comment, PLACEHOLDER_IMAGE, Work, WorkPage};
use serde_json::{Value, json};

// --- Helpers ---

fn work_form(title: &str, with_image: bool) -> Form {
    let form = Form::new()
        .text("title", title.to_string())
        .text("excerpt", "A quiet opening line")
        .text("fullContent", "The full text of the work.");

    if with_image {
        let image = Part::bytes(png_bytes())
            .file_name("cover.png")
            .mime_str("image/png")
            .expect("valid mime");
        form.part("image", image)
    } else {
        form
    }
}

async fn create_work(app: &TestApp, token: &str, title: &str, with_image: bool) -> Work {
    let response = app
        .client
        .post(app.url("/api/works"))
        .bearer_auth(token)
        .multipart(work_form(title, with_image))
        .send()
        .await
        .expect("create request failed");
    assert_eq!(response.status(), 201);
    response.json().await.expect("work body")
}

async fn public_work(app: &TestApp, id: uuid::Uuid) -> Work {
    app.client
        .get(app.url(&format!("/api/works/{id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

fn stored_file_name(image_url: &str) -> &str {
    image_url
        .strip_prefix("/uploads/")
        .expect("image url should live under /uploads")
}

// --- Tests ---

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let response = app.client.get(app.url("/health")).send().await.expect("req fail");
    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_welcome_message() {
    let app = spawn_app().await;
    let body: Value = app
        .client
        .get(app.url("/api"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = spawn_app().await;
    let doc: Value = app
        .client
        .get(app.url("/api-docs/openapi.json"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(doc["paths"]["/api/works"].is_object());
    assert!(doc["components"]["securitySchemes"]["bearer_auth"].is_object());
}

#[tokio::test]
async fn test_publish_and_moderate_lifecycle() {
    let app = spawn_app().await;
    let token = app.login_admin().await;

    // Publish with a cover image.
    let work = create_work(&app, &token, "Harbour Lights", true).await;
    assert_ne!(work.image_url, PLACEHOLDER_IMAGE);
    assert!(work.comments.is_empty());

    // A reader comments; it starts out pending and hidden.
    let response = app
        .client
        .post(app.url(&format!("/api/works/{}/comments", work.id)))
        .json(&json!({ "author": "Ines", "text": "Gorgeous.", "status": "approved" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let comment: Comment = response.json().await.unwrap();
    assert_eq!(comment.status.as_str(), "pending");

    assert!(public_work(&app, work.id).await.comments.is_empty());

    // The admin sees it in the queue and approves it.
    let queue: Value = app
        .client
        .get(app.url("/api/admin/works/comments/pending"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(queue["pending"][0]["workTitle"], "Harbour Lights");
    assert_eq!(queue["pending"][0]["comment"]["id"], json!(comment.id));

    let approve = app
        .client
        .put(app.url(&format!(
            "/api/admin/works/{}/comments/{}/approve",
            work.id, comment.id
        )))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(approve.status(), 200);

    let visible = public_work(&app, work.id).await;
    assert_eq!(visible.comments.len(), 1);
    assert_eq!(visible.comments[0].author, "Ines");

    // Readers like it.
    let likes: Value = app
        .client
        .post(app.url(&format!("/api/works/{}/like", work.id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(likes["likes"], 1);
}

#[tokio::test]
async fn test_uploaded_image_is_served_and_removed_with_its_work() {
    let app = spawn_app().await;
    let token = app.login_admin().await;
    let work = create_work(&app, &token, "Cover test", true).await;

    let file_name = stored_file_name(&work.image_url).to_string();
    let on_disk = app.upload_dir.path().join(&file_name);
    assert!(on_disk.exists());

    let served = app.client.get(app.url(&work.image_url)).send().await.unwrap();
    assert_eq!(served.status(), 200);
    assert_eq!(served.bytes().await.unwrap().as_ref(), png_bytes().as_slice());

    let deleted: Value = app
        .client
        .delete(app.url(&format!("/api/works/{}", work.id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(deleted["message"], "Work deleted successfully");
    assert!(!on_disk.exists());

    let gone = app.client.get(app.url(&format!("/api/works/{}", work.id))).send().await.unwrap();
    assert_eq!(gone.status(), 404);
}

#[tokio::test]
async fn test_json_update_changes_only_supplied_fields() {
    let app = spawn_app().await;
    let token = app.login_admin().await;
    let work = create_work(&app, &token, "Draft title", false).await;
    assert_eq!(work.image_url, PLACEHOLDER_IMAGE);

    let response = app
        .client
        .put(app.url(&format!("/api/works/{}", work.id)))
        .bearer_auth(&token)
        .json(&json!({ "title": "  Final title  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let updated: Work = response.json().await.unwrap();
    assert_eq!(updated.title, "Final title");
    assert_eq!(updated.excerpt, work.excerpt);
    assert_eq!(updated.image_url, PLACEHOLDER_IMAGE);
}

#[tokio::test]
async fn test_listing_and_search() {
    let app = spawn_app().await;
    let token = app.login_admin().await;
    create_work(&app, &token, "Salt marsh", false).await;
    create_work(&app, &token, "Mountain pass", false).await;

    let page: WorkPage = app
        .client
        .get(app.url("/api/works?page=1&limit=1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.pages, 2);
    assert_eq!(page.works[0].title, "Mountain pass");

    let found: WorkPage = app
        .client
        .get(app.url("/api/works/search?q=marsh"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(found.total, 1);
    assert_eq!(found.works[0].title, "Salt marsh");

    let blank = app.client.get(app.url("/api/works/search?q=%20")).send().await.unwrap();
    assert_eq!(blank.status(), 400);
}

#[tokio::test]
async fn test_writes_require_a_token() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/api/works"))
        .multipart(work_form("Sneaky", false))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "No token, authorization denied");
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = spawn_app().await;
    app.login_admin().await;

    let wrong_password = app
        .client
        .post(app.url("/api/admin/login"))
        .json(&json!({ "username": ADMIN_USERNAME, "password": "not the password" }))
        .send()
        .await
        .unwrap();
    let unknown_user = app
        .client
        .post(app.url("/api/admin/login"))
        .json(&json!({ "username": "nobody", "password": ADMIN_PASSWORD }))
        .send()
        .await
        .unwrap();

    assert_eq!(wrong_password.status(), 400);
    assert_eq!(unknown_user.status(), 400);

    let a: Value = wrong_password.json().await.unwrap();
    let b: Value = unknown_user.json().await.unwrap();
    assert_eq!(a, b);
    assert_eq!(a["message"], "Invalid credentials");
}

#[tokio::test]
async fn test_duplicate_registration_is_rejected() {
    let app = spawn_app().await;
    app.login_admin().await;

    let response = app
        .client
        .post(app.url("/api/admin/register"))
        .json(&json!({ "username": ADMIN_USERNAME, "password": "another long password" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Admin user already exists");
}

#[tokio::test]
async fn test_registration_can_be_disabled() {
    let app = spawn_app_with(&[("ALLOW_ADMIN_REGISTRATION", "false")]).await;

    let response = app
        .client
        .post(app.url("/api/admin/register"))
        .json(&json!({ "username": ADMIN_USERNAME, "password": ADMIN_PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn test_refresh_token_flow() {
    let app = spawn_app().await;
    app.login_admin().await;

    let login: Value = app
        .client
        .post(app.url("/api/admin/login"))
        .json(&json!({ "username": ADMIN_USERNAME, "password": ADMIN_PASSWORD }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let refresh = login["refreshToken"].as_str().expect("refresh token");

    let minted: Value = app
        .client
        .post(app.url("/api/token/refresh"))
        .json(&json!({ "token": refresh }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let access = minted["accessToken"].as_str().expect("access token");

    let queue = app
        .client
        .get(app.url("/api/admin/works/comments/pending"))
        .bearer_auth(access)
        .send()
        .await
        .unwrap();
    assert_eq!(queue.status(), 200);

    // A session token is not a refresh token.
    let session = login["token"].as_str().unwrap();
    let rejected = app
        .client
        .post(app.url("/api/token/refresh"))
        .json(&json!({ "token": session }))
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), 403);
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let app = spawn_app_with(&[("MAX_UPLOAD_BYTES", "1024")]).await;
    let token = app.login_admin().await;

    let big = Part::bytes(vec![0u8; 4096])
        .file_name("huge.png")
        .mime_str("image/png")
        .unwrap();
    let form = work_form("Too big", false).part("image", big);

    let response = app
        .client
        .post(app.url("/api/works"))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 413);
    assert_eq!(std::fs::read_dir(app.upload_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_oversized_json_update_is_rejected() {
    let app = spawn_app().await;
    let token = app.login_admin().await;
    let work = create_work(&app, &token, "Short title", false).await;

    let response = app
        .client
        .put(app.url(&format!("/api/works/{}", work.id)))
        .bearer_auth(&token)
        .json(&json!({ "title": "x".repeat(70_000) }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 413);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "PAYLOAD_TOO_LARGE");
    assert_eq!(public_work(&app, work.id).await.title, "Short title");
}

#[tokio::test]
async fn test_unparsable_ids_are_not_found() {
    let app = spawn_app().await;

    let fetch = app
        .client
        .get(app.url("/api/works/64b7f0c2a1b2c3d4e5f60718"))
        .send()
        .await
        .unwrap();
    assert_eq!(fetch.status(), 404);
    let body: Value = fetch.json().await.unwrap();
    assert_eq!(body["message"], "Work not found");

    let like = app.client.post(app.url("/api/works/abc/like")).send().await.unwrap();
    assert_eq!(like.status(), 404);

    let comment = app
        .client
        .post(app.url("/api/works/abc/comments"))
        .json(&json!({ "author": "Ines", "text": "Lovely." }))
        .send()
        .await
        .unwrap();
    assert_eq!(comment.status(), 404);

    let token = app.login_admin().await;
    let work = create_work(&app, &token, "Moderated", false).await;
    let approve = app
        .client
        .put(app.url(&format!("/api/admin/works/{}/comments/xyz/approve", work.id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(approve.status(), 404);
    let body: Value = approve.json().await.unwrap();
    assert_eq!(body["message"], "Comment not found");
}

#[tokio::test]
async fn test_lowercase_bearer_scheme_is_accepted() {
    let app = spawn_app().await;
    let token = app.login_admin().await;

    let response = app
        .client
        .get(app.url("/api/admin/works/comments/pending"))
        .header("authorization", format!("bearer {token}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use dinebook::{
    app, auth::TokenKeys, config::Config, session_layer, store::Store, upload::ImageHost, AppResult, AppState,
    Uploads,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

const BOUNDARY: &str = "XBOUNDARYX";

struct FixedHost;

#[async_trait]
impl ImageHost for FixedHost {
    async fn upload(&self, _path: &Path) -> AppResult<String> {
        Ok("https://i.imgur.com/fixed.png".to_owned())
    }
}

struct TestApp {
    router: Router,
    store: Store,
    spool: tempfile::TempDir,
}

async fn test_app() -> TestApp {
    let config = Config::from_lookup(|key| (key == "JWT_SECRET").then(|| "integration".to_owned())).unwrap();
    let store = Store::in_memory().await.unwrap();
    let spool = tempfile::tempdir().unwrap();
    let state = AppState {
        store: store.clone(),
        tokens: TokenKeys::new(config.jwt_secret.as_bytes()),
        uploads: Uploads { host: Arc::new(FixedHost), dir: spool.path().to_owned() },
    };
    TestApp { router: app(state, session_layer(&config)), store, spool }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn json(&self, method: Method, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap()).await
    }

    /// Sign in through the browser form and return the session cookie.
    async fn browser_session(&self, email: &str) -> String {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/signin")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("email={}&password=hunter22", email.replace('@', "%40"))))
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        cookie.split(';').next().unwrap().to_owned()
    }

    fn spooled_files(&self) -> usize {
        std::fs::read_dir(self.spool.path()).unwrap().count()
    }

    async fn put_profile(&self, id: i64, token: &str, body: String) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::PUT)
            .uri(format!("/api/users/{id}"))
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Register through the api and return `(user id, bearer token)`.
    async fn register(&self, name: &str) -> (i64, String) {
        let email = format!("{}@example.com", name.to_lowercase());
        let (status, _) = self
            .json(Method::POST, "/api/signup", None, json!({
                "name": name,
                "email": email,
                "password": "hunter22",
                "confirmPassword": "hunter22",
            }))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = self
            .json(Method::POST, "/api/signin", None, json!({ "email": email, "password": "hunter22" }))
            .await;
        assert_eq!(status, StatusCode::OK);
        (body["user"]["id"].as_i64().unwrap(), body["token"].as_str().unwrap().to_owned())
    }
}

#[tokio::test]
async fn token_identifies_the_signed_in_user() {
    let app = test_app().await;
    let (id, token) = app.register("Ann").await;

    let (status, body) = app.json(Method::GET, "/api/get_current_user", Some(&token), Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);
    assert_eq!(body["email"], "ann@example.com");
    assert!(body.get("password").is_none());

    let (status, body) = app.json(Method::GET, "/api/get_current_user", None, Value::Null).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthenticated");
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let app = test_app().await;
    app.register("Ann").await;

    let (status, body) = app
        .json(Method::POST, "/api/signin", None, json!({ "email": "ann@example.com", "password": "nope" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], "invalid_credentials");
}

#[tokio::test]
async fn browser_sign_in_sets_a_session() {
    let app = test_app().await;
    let (id, _) = app.register("Ann").await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/signin")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("email=ann%40example.com&password=hunter22"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/");
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    let cookie = cookie.split(';').next().unwrap().to_owned();

    let request = Request::builder()
        .uri("/api/get_current_user")
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);

    let request = Request::builder().uri("/flash").header(header::COOKIE, &cookie).body(Body::empty()).unwrap();
    let (_, body) = app.send(request).await;
    assert_eq!(body[0]["message"], "Login successfully!");
}

#[tokio::test]
async fn admin_routes_need_an_admin() {
    let app = test_app().await;
    let (_, regular) = app.register("Reg").await;
    let (root_id, root) = app.register("Root").await;
    app.store.set_admin(root_id, true).await.unwrap();

    let (status, body) = app.json(Method::GET, "/api/admin/users", None, Value::Null).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "permission_denied");

    let (status, _) = app.json(Method::GET, "/api/admin/users", Some(&regular), Value::Null).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.json(Method::GET, "/api/admin/users", Some(&root), Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = app
        .json(Method::POST, "/api/admin/restaurants", Some(&root), json!({ "name": "Diner" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Diner");
}

#[tokio::test]
async fn favorites_and_follows_report_conflicts() {
    let app = test_app().await;
    let (ann_id, ann) = app.register("Ann").await;
    let (bob_id, _) = app.register("Bob").await;
    let diner = app.store.insert_restaurant("Diner", None).await.unwrap();

    let uri = format!("/api/favorite/{}", diner.id);
    let (status, body) = app.json(Method::POST, &uri, Some(&ann), Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["favCount"], 1);

    let (status, body) = app.json(Method::POST, &uri, Some(&ann), Value::Null).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "already_exists");

    let (status, _) = app.json(Method::POST, &format!("/api/following/{ann_id}"), Some(&ann), Value::Null).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = app.json(Method::POST, &format!("/api/following/{bob_id}"), Some(&ann), Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["followerCount"], 1);

    let (_, top) = app.json(Method::GET, "/api/users/top", Some(&ann), Value::Null).await;
    assert_eq!(top[0]["id"], bob_id);
    assert_eq!(top[0]["isFollowed"], true);
}

#[tokio::test]
async fn editing_another_profile_is_forbidden() {
    let app = test_app().await;
    let (ann_id, _) = app.register("Ann").await;
    let (_, bob) = app.register("Bob").await;

    let body = format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nHacked\r\n--{BOUNDARY}--\r\n");
    let (status, _) = app.put_profile(ann_id, &bob, body).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let ann = app.store.user_by_id(ann_id).await.unwrap().unwrap();
    assert_eq!(ann.name, "Ann");
}

#[tokio::test]
async fn own_profile_edit_uploads_the_image() {
    let app = test_app().await;
    let (ann_id, ann) = app.register("Ann").await;

    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nAnnie\r\n{}--{BOUNDARY}--\r\n",
        image_part("me.png"),
    );
    let (status, body) = app.put_profile(ann_id, &ann, body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Annie");
    assert_eq!(body["image"], "https://i.imgur.com/fixed.png");
    assert_eq!(app.spooled_files(), 0);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = test_app().await;
    app.register("Ann").await;

    let cookie = app.browser_session("ann@example.com").await;

    let request = Request::builder()
        .uri("/logout?return_url=https://evil.example/")
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()[header::LOCATION], "/signin");

    let request = Request::builder()
        .uri("/api/get_current_user")
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

fn image_part(file_name: &str) -> String {
    format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\n\
         Content-Type: image/png\r\n\r\nnot-really-a-png\r\n"
    )
}

#[tokio::test]
async fn a_second_image_is_rejected_and_nothing_stays_spooled() {
    let app = test_app().await;
    let (ann_id, ann) = app.register("Ann").await;

    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nAnnie\r\n{}{}--{BOUNDARY}--\r\n",
        image_part("one.png"),
        image_part("two.png"),
    );
    let (status, body) = app.put_profile(ann_id, &ann, body).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"][0], "only one image can be uploaded");
    assert_eq!(app.spooled_files(), 0);
    assert_eq!(app.store.user_by_id(ann_id).await.unwrap().unwrap().name, "Ann");
}

#[tokio::test]
async fn a_truncated_body_leaves_nothing_spooled() {
    let app = test_app().await;
    let (ann_id, ann) = app.register("Ann").await;

    let body = format!(
        "{}--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nAnn",
        image_part("me.png"),
    );
    let (status, _) = app.put_profile(ann_id, &ann, body).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.spooled_files(), 0);
}

#[tokio::test]
async fn browser_edit_form_of_another_user_redirects_to_your_own() {
    let app = test_app().await;
    let (ann_id, _) = app.register("Ann").await;
    let (bob_id, _) = app.register("Bob").await;
    let cookie = app.browser_session("bob@example.com").await;
    // drain the sign-in message
    let request = Request::builder().uri("/flash").header(header::COOKIE, &cookie).body(Body::empty()).unwrap();
    app.send(request).await;

    let request = Request::builder()
        .uri(format!("/users/{ann_id}/edit"))
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], format!("/users/{bob_id}/edit").as_str());

    let request = Request::builder().uri("/flash").header(header::COOKIE, &cookie).body(Body::empty()).unwrap();
    let (_, flash) = app.send(request).await;
    assert_eq!(flash[0]["level"], "error");
    assert_eq!(flash[0]["message"], "You can only edit your own profile.");

    let request = Request::builder()
        .uri(format!("/users/{bob_id}/edit"))
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let (status, own) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(own["id"], bob_id);
}

use std::sync::Arc;

use reqwest::{header, StatusCode};
use serde_json::{json, Value};

use sickfits_infra::{AppConfig, InMemoryOutbox};

struct TestServer {
    base_url: String,
    outbox: Arc<InMemoryOutbox>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(&[]).await
    }

    async fn spawn_with(extra: &[(&str, &str)]) -> Self {
        let mut vars = vec![
            ("APP_SECRET", "test-secret"),
            ("FRONTEND_URL", "http://localhost:7777"),
        ];
        vars.extend_from_slice(extra);
        let config = AppConfig::from_lookup(|key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        })
        .unwrap();

        // Same router as prod, in-memory backends, ephemeral port.
        let (app, outbox) = sickfits_api::app::build_in_memory_app(&config);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            outbox,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// `token=<jwt>` from a response's `Set-Cookie`, ready for a `Cookie` header.
fn session_cookie(res: &reqwest::Response) -> String {
    let set_cookie = res
        .headers()
        .get(header::SET_COOKIE)
        .expect("missing Set-Cookie")
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

async fn signup(client: &reqwest::Client, srv: &TestServer, email: &str, password: &str) -> (Value, String) {
    let res = client
        .post(srv.url("/signup"))
        .json(&json!({ "email": email, "password": password, "name": "Wes" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let cookie = session_cookie(&res);
    (res.json().await.unwrap(), cookie)
}

async fn reset_token_eventually(srv: &TestServer, to: &str) -> String {
    // Mail goes out from a background task.
    for _ in 0..100 {
        if let Some(mail) = srv.outbox.last_to(to) {
            let start = mail.html.find("resetToken=").unwrap() + "resetToken=".len();
            let rest = &mail.html[start..];
            return rest[..rest.find('"').unwrap()].to_string();
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    panic!("reset email was not sent within timeout");
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn storefront_origin_may_call_with_credentials() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .request(reqwest::Method::OPTIONS, srv.url("/signup"))
        .header(header::ORIGIN, "http://localhost:7777")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .send()
        .await
        .unwrap();
    assert!(res.status().is_success());
    assert_eq!(
        res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:7777"
    );
    assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");

    let res = client
        .request(reqwest::Method::OPTIONS, srv.url("/signup"))
        .header(header::ORIGIN, "http://evil.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .send()
        .await
        .unwrap();
    assert!(res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn signup_sets_cookie_and_me_reads_it() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (user, cookie) = signup(&client, &srv, "User@Example.com", "dogs").await;
    assert_eq!(user["email"], "user@example.com");
    assert_eq!(user["permissions"], json!(["USER"]));
    assert!(user.get("passwordHash").is_none());
    assert!(user.get("password_hash").is_none());

    let me: Value = client
        .get(srv.url("/me"))
        .header(header::COOKIE, &cookie)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["id"], user["id"]);

    let anon: Value = client.get(srv.url("/me")).send().await.unwrap().json().await.unwrap();
    assert!(anon.is_null());
}

#[tokio::test]
async fn signin_errors_are_reported() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    signup(&client, &srv, "a@b.co", "right").await;

    let res = client
        .post(srv.url("/signin"))
        .json(&json!({ "email": "a@b.co", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_credential");
    assert_eq!(body["message"], "Invalid Password");

    let res = client
        .post(srv.url("/signin"))
        .json(&json!({ "email": "nobody@b.co", "password": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .post(srv.url("/signin"))
        .json(&json!({ "email": "A@B.CO", "password": "right" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn duplicate_signup_conflicts() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    signup(&client, &srv, "a@b.co", "pw").await;

    let res = client
        .post(srv.url("/signup"))
        .json(&json!({ "email": "a@b.co", "password": "pw", "name": "Again" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn signout_clears_cookie() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.post(srv.url("/signout")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let set_cookie = res.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(set_cookie.starts_with("token=;"));
    assert!(set_cookie.contains("Max-Age=0"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Goodbye!");
}

#[tokio::test]
async fn password_reset_flow() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let (user, _) = signup(&client, &srv, "a@b.co", "old").await;

    let res = client
        .post(srv.url("/requestReset"))
        .json(&json!({ "email": "a@b.co" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Thanks!");

    let token = reset_token_eventually(&srv, "a@b.co").await;

    let res = client
        .post(srv.url("/resetPassword"))
        .json(&json!({ "resetToken": token, "password": "new", "confirmPassword": "typo" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Your passwords don't match!");

    let res = client
        .post(srv.url("/resetPassword"))
        .json(&json!({ "resetToken": token, "password": "new", "confirmPassword": "new" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let cookie = session_cookie(&res);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["id"], user["id"]);

    let me: Value = client
        .get(srv.url("/me"))
        .header(header::COOKIE, &cookie)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["id"], user["id"]);

    // Token is spent.
    let res = client
        .post(srv.url("/resetPassword"))
        .json(&json!({ "resetToken": token, "password": "x", "confirmPassword": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_or_expired");

    let res = client
        .post(srv.url("/signin"))
        .json(&json!({ "email": "a@b.co", "password": "new" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn item_mutations_need_a_session() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let new_item = json!({ "title": "Shoes", "description": "Red", "price": 5000 });

    let res = client.post(srv.url("/items")).json(&new_item).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "You must be logged in to do that!");

    let (user, cookie) = signup(&client, &srv, "a@b.co", "pw").await;
    let res = client
        .post(srv.url("/items"))
        .header(header::COOKIE, &cookie)
        .json(&new_item)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let item: Value = res.json().await.unwrap();
    assert_eq!(item["owner"], user["id"]);
    let id = item["id"].as_str().unwrap().to_string();

    let res = client
        .patch(srv.url(&format!("/items/{id}")))
        .header(header::COOKIE, &cookie)
        .json(&json!({ "price": 4000 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["price"], 4000);
    assert_eq!(updated["title"], "Shoes");

    let listed: Value = client.get(srv.url("/items")).send().await.unwrap().json().await.unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let res = client
        .delete(srv.url(&format!("/items/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .delete(srv.url(&format!("/items/{id}")))
        .header(header::COOKIE, &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(srv.url(&format!("/items/{id}"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn forged_cookie_is_treated_as_anonymous() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/items"))
        .header(header::COOKIE, "token=eyJhbGciOiJIUzI1NiJ9.e30.forged")
        .json(&json!({ "title": "x", "description": "y", "price": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn permission_management_is_gated() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let (user, cookie) = signup(&client, &srv, "a@b.co", "pw").await;

    let res = client
        .get(srv.url("/users"))
        .header(header::COOKIE, &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .post(srv.url("/updatePermissions"))
        .header(header::COOKIE, &cookie)
        .json(&json!({ "userId": user["id"], "permissions": ["ADMIN"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "forbidden");

    let res = client.get(srv.url("/users")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn enforced_item_labels_forbid_plain_users() {
    let srv = TestServer::spawn_with(&[("ENFORCE_ITEM_PERMISSIONS", "true")]).await;
    let client = reqwest::Client::new();
    let (_, cookie) = signup(&client, &srv, "a@b.co", "pw").await;

    let res = client
        .post(srv.url("/items"))
        .header(header::COOKIE, &cookie)
        .json(&json!({ "title": "Hat", "description": "Blue", "price": 100 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

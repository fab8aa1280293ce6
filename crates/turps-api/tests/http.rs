use std::path::Path;
use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, StatusCode, header},
};
use tower::ServiceExt;

use turps_api::auth::{AppState, AppStateInner};
use turps_api::messages::list_messages;
use turps_api::router;
use turps_api::session::{SESSION_COOKIE, SessionManager};
use turps_db::Database;

fn app() -> (Router, AppState) {
    let state: AppState = Arc::new(AppStateInner {
        db: Arc::new(Database::open_in_memory().unwrap()),
        sessions: SessionManager::new("integration-secret", 1, false).unwrap(),
        google: None,
    });
    (router::build(state.clone(), Path::new("public")), state)
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut req = Request::get(uri);
    if let Some(c) = cookie {
        req = req.header(header::COOKIE, c);
    }
    req.body(Body::empty()).unwrap()
}

fn post_form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut req = Request::post(uri).header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(c) = cookie {
        req = req.header(header::COOKIE, c);
    }
    req.body(Body::from(body.to_string())).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> Response<Body> {
    app.clone().oneshot(req).await.unwrap()
}

fn location(res: &Response<Body>) -> &str {
    res.headers()[header::LOCATION].to_str().unwrap()
}

/// `name=value` of a freshly issued session cookie, ignoring removals.
fn session_cookie(res: &Response<Body>) -> Option<String> {
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .find(|pair| pair.starts_with(&format!("{SESSION_COOKIE}=")) && pair.len() > SESSION_COOKIE.len() + 1)
        .map(str::to_string)
}

async fn body_text(res: Response<Body>) -> String {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn register(app: &Router, username: &str, password: &str) -> String {
    let res = send(app, post_form("/register", &format!("username={username}&password={password}"), None)).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/chat");
    session_cookie(&res).expect("registration starts a session")
}

#[tokio::test]
async fn anonymous_chat_redirects_home_without_messages() {
    let (app, state) = app();
    turps_api::messages::post_message(&state, "alice", "secret plans").await.unwrap();

    let res = send(&app, get("/chat", None)).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/");
    assert!(!body_text(res).await.contains("secret plans"));
}

#[tokio::test]
async fn public_pages_render() {
    let (app, _) = app();
    for uri in ["/", "/register", "/login", "/health"] {
        let res = send(&app, get(uri, None)).await;
        assert_eq!(res.status(), StatusCode::OK, "{uri}");
    }
}

#[tokio::test]
async fn register_then_chat() {
    let (app, _) = app();
    let cookie = register(&app, "alice", "hunter22").await;

    let res = send(&app, get("/chat", Some(&cookie))).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_text(res).await.contains("Signed in as <strong>alice</strong>"));

    // Home forwards signed-in users.
    let res = send(&app, get("/", Some(&cookie))).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/chat");
}

#[tokio::test]
async fn duplicate_registration_is_a_conflict() {
    let (app, _) = app();
    register(&app, "alice", "pw").await;

    let res = send(&app, post_form("/register", "username=alice&password=other", None)).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert!(session_cookie(&res).is_none());
    assert!(body_text(res).await.contains("already exists"));
}

#[tokio::test]
async fn wrong_password_redirects_to_login_without_session() {
    let (app, _) = app();
    register(&app, "alice", "right").await;

    let res = send(&app, post_form("/login", "username=alice&password=wrong", None)).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/login");
    assert!(session_cookie(&res).is_none());

    let res = send(&app, post_form("/login", "username=alice&password=right", None)).await;
    assert_eq!(location(&res), "/chat");
    assert!(session_cookie(&res).is_some());
}

#[tokio::test]
async fn posted_message_is_authored_by_session_user() {
    let (app, state) = app();
    let cookie = register(&app, "alice", "pw").await;

    let res = send(&app, post_form("/chat", "message=hi&send=mallory", Some(&cookie))).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/chat");

    let messages = list_messages(&state).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].author_name, "alice");
    assert_eq!(messages[0].body, "hi");

    let page = body_text(send(&app, get("/chat", Some(&cookie))).await).await;
    assert!(page.contains("hi"));
    assert!(!page.contains("mallory"));
}

#[tokio::test]
async fn anonymous_post_is_rejected() {
    let (app, state) = app();

    let res = send(&app, post_form("/chat", "message=spam", None)).await;
    assert_eq!(location(&res), "/");
    assert!(list_messages(&state).await.unwrap().is_empty());

    let res = send(&app, post_form("/clear", "confirm=yes", None)).await;
    assert_eq!(location(&res), "/");
}

#[tokio::test]
async fn forged_cookie_is_anonymous() {
    let (app, _) = app();
    let res = send(&app, get("/chat", Some(&format!("{SESSION_COOKIE}=forged")))).await;
    assert_eq!(location(&res), "/");
}

#[tokio::test]
async fn logout_invalidates_the_old_cookie() {
    let (app, _) = app();
    let cookie = register(&app, "alice", "pw").await;

    let res = send(&app, get("/logout", Some(&cookie))).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/");

    let res = send(&app, get("/chat", Some(&cookie))).await;
    assert_eq!(location(&res), "/");
}

#[tokio::test]
async fn clearing_messages_needs_confirmation_and_keeps_accounts() {
    let (app, state) = app();
    let cookie = register(&app, "alice", "pw").await;
    send(&app, post_form("/chat", "message=hi", Some(&cookie))).await;

    let res = send(&app, post_form("/clear", "", Some(&cookie))).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(list_messages(&state).await.unwrap().len(), 1);

    let res = send(&app, post_form("/clear", "confirm=yes", Some(&cookie))).await;
    assert_eq!(location(&res), "/chat");
    assert!(list_messages(&state).await.unwrap().is_empty());

    // Accounts and sessions survive a board wipe.
    let res = send(&app, get("/chat", Some(&cookie))).await;
    assert_eq!(res.status(), StatusCode::OK);
    let res = send(&app, post_form("/login", "username=alice&password=pw", None)).await;
    assert_eq!(location(&res), "/chat");
}

#[tokio::test]
async fn clearing_users_ends_every_session() {
    let (app, state) = app();
    let alice = register(&app, "alice", "pw").await;
    let bob = register(&app, "bob", "pw").await;
    send(&app, post_form("/chat", "message=hi", Some(&bob))).await;

    let res = send(&app, post_form("/clear/users", "confirm=yes", Some(&alice))).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/");

    for cookie in [&alice, &bob] {
        let res = send(&app, get("/chat", Some(cookie))).await;
        assert_eq!(location(&res), "/");
    }
    // Messages are a separate store.
    assert_eq!(list_messages(&state).await.unwrap().len(), 1);

    let res = send(&app, post_form("/login", "username=bob&password=pw", None)).await;
    assert_eq!(location(&res), "/login");
}

#[tokio::test]
async fn google_routes_fall_back_to_login_when_unconfigured() {
    let (app, _) = app();

    let res = send(&app, get("/auth/google", None)).await;
    assert_eq!(location(&res), "/login");

    let res = send(&app, get("/auth/google/chat?code=abc&state=xyz", None)).await;
    assert_eq!(location(&res), "/login");
    assert!(session_cookie(&res).is_none());
}

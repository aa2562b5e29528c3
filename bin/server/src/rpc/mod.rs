//! JSON-RPC 2.0 endpoint of the LoopHub server.
//!
//! Everything goes through `POST /rpc`; see [`loophub::api::methods`] for
//! the method names. Callers authenticate with `Authorization: Bearer
//! <token>` from `auth.login`.
//!
//! ## Method groups
//! - `auth.*`, `user.*` - accounts, profiles and levels
//! - `community.*` - communities and membership
//! - `thread.*`, `poll.*` - threads and their polls
//! - `comment.*` - nested comments
//! - `vote.cast`, `reaction.*`, `mention.suggest` - engagement
//! - `notification.*` - the caller's inbox
//! - `mod.*`, `report.*` - moderation
//! - `system.health`, `system.stats`

mod handlers;
mod state;

pub use handlers::{handle_rpc, health_check};
pub use state::AppState;

use axum::{
    routing::{get, post},
    Router,
};

/// Routes without middleware; `main` adds tracing and rate limiting.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/rpc", post(handle_rpc))
        .route("/health", get(health_check))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use loophub::forum::{ForumService, ForumStorage};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn app() -> (Router, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = ForumStorage::new(dir.path()).unwrap();
        let state = AppState::new(ForumService::with_system_clock(storage));
        (router(state), dir)
    }

    async fn rpc(app: &Router, token: Option<&str>, method: &str, params: Value) -> Value {
        let body = json!({"jsonrpc": "2.0", "method": method, "params": params, "id": 1});
        let mut request = Request::post("/rpc").header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let response = app
            .clone()
            .oneshot(request.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn login(app: &Router, username: &str) -> String {
        let password = "password123";
        let registered = rpc(
            app,
            None,
            "auth.register",
            json!({"username": username, "password": password}),
        )
        .await;
        assert!(registered["error"].is_null(), "{}", registered);
        let login = rpc(
            app,
            None,
            "auth.login",
            json!({"username": username, "password": password}),
        )
        .await;
        login["result"]["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _dir) = app();
        let response = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");

        let body = rpc(&app, None, "system.health", Value::Null).await;
        assert_eq!(body["result"]["service"], "loophub-server");
    }

    #[tokio::test]
    async fn test_unknown_method_and_bad_version() {
        let (app, _dir) = app();
        let body = rpc(&app, None, "nope.nothing", json!({})).await;
        assert_eq!(body["error"]["code"], -32601);

        let request = Request::post("/rpc")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({"jsonrpc": "1.0", "method": "system.health", "id": 7}).to_string(),
            ))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], -32600);
        assert_eq!(body["id"], 7);
    }

    #[tokio::test]
    async fn test_login_and_whoami() {
        let (app, _dir) = app();
        let token = login(&app, "alice").await;

        let me = rpc(&app, Some(&token), "auth.whoami", Value::Null).await;
        assert_eq!(me["result"]["username"], "alice");

        let anonymous = rpc(&app, None, "auth.whoami", Value::Null).await;
        assert_eq!(anonymous["error"]["code"], -32005);

        let bad = rpc(&app, Some(&"0".repeat(64)), "auth.whoami", Value::Null).await;
        assert_eq!(bad["error"]["code"], -32005);

        let wrong = rpc(
            &app,
            None,
            "auth.login",
            json!({"username": "alice", "password": "wrong-password"}),
        )
        .await;
        assert_eq!(wrong["error"]["code"], -32005);

        rpc(&app, Some(&token), "auth.logout", Value::Null).await;
        let after = rpc(&app, Some(&token), "auth.whoami", Value::Null).await;
        assert_eq!(after["error"]["code"], -32005);
    }

    #[tokio::test]
    async fn test_public_reads_survive_stale_token() {
        let (app, _dir) = app();
        let stale = "f".repeat(64);
        let list = rpc(&app, Some(&stale), "community.list", Value::Null).await;
        assert!(list["error"].is_null(), "{}", list);
        assert_eq!(list["result"]["items"], json!([]));
    }

    #[tokio::test]
    async fn test_newcomer_cannot_create_community() {
        let (app, _dir) = app();
        // The first account is the admin.
        let admin = login(&app, "admin").await;
        let token = login(&app, "bob").await;
        let params = json!({"slug": "rust", "name": "Rust"});

        let denied = rpc(&app, Some(&token), "community.create", params.clone()).await;
        assert_eq!(denied["error"]["code"], -32006);

        let created = rpc(&app, Some(&admin), "community.create", params).await;
        assert_eq!(created["result"]["slug"], "rust");

        let community_id = created["result"]["id"].clone();
        let joined = rpc(
            &app,
            Some(&token),
            "community.join",
            json!({"community_id": community_id}),
        )
        .await;
        assert_eq!(joined["result"]["role"], "member");

        let level = rpc(&app, Some(&token), "user.level", Value::Null).await;
        assert_eq!(level["result"]["level"]["number"], 1);
        assert_eq!(level["result"]["username"], "bob");
    }

    #[tokio::test]
    async fn test_invalid_params() {
        let (app, _dir) = app();
        let body = rpc(&app, None, "thread.get", json!({"thread_id": "not-a-uuid"})).await;
        assert_eq!(body["error"]["code"], -32602);
    }
}

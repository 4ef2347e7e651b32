use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{auth, todos};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(todos::router())
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use axum::Router;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::build_app;
    use crate::state::AppState;

    fn test_app() -> Router {
        build_app(AppState::fake())
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(value) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(value.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };

        let response = app.clone().oneshot(request).await.expect("send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn register(app: &Router, username: &str, password: &str) -> String {
        let (status, body) = send(
            app,
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "username": username, "password": password })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["accessToken"]
            .as_str()
            .expect("accessToken in response")
            .to_owned()
    }

    #[tokio::test]
    async fn health_endpoint_answers() {
        let app = test_app();
        let (status, _) = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn register_create_complete_and_cross_user_404() {
        let app = test_app();
        let alice = register(&app, "alice", "password-1").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/todos",
            Some(&alice),
            Some(json!({ "title": "Buy milk", "description": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, Value::Null, "create responds with an empty body");

        let (status, listed) = send(&app, Method::GET, "/todos", Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        let todo_id = listed[0]["id"].as_i64().expect("todo id");

        let (status, fetched) = send(
            &app,
            Method::GET,
            &format!("/todos/{todo_id}"),
            Some(&alice),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["title"], "Buy milk");
        assert_eq!(fetched["completed"], false);

        let (status, updated) = send(
            &app,
            Method::PUT,
            "/todos",
            Some(&alice),
            Some(json!({
                "id": todo_id,
                "title": "Buy milk",
                "description": "",
                "completed": true
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["completed"], true);

        let (status, completed) =
            send(&app, Method::GET, "/todos/completed", Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(completed.as_array().expect("array").len(), 1);
        assert_eq!(completed[0]["id"], json!(todo_id));

        let bob = register(&app, "bob", "password-2").await;
        let (status, body) = send(
            &app,
            Method::GET,
            &format!("/todos/{todo_id}"),
            Some(&bob),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let app = test_app();
        register(&app, "alice", "password-1").await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "username": "alice", "password": "another-pw" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "CONFLICT");
    }

    #[tokio::test]
    async fn login_failures_map_to_401() {
        let app = test_app();
        register(&app, "alice", "password-1").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "username": "alice", "password": "wrong-password" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "INVALID_CREDENTIALS");

        let (status, body) = send(
            &app,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "username": "nobody", "password": "password-1" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "USER_NOT_FOUND");
    }

    #[tokio::test]
    async fn refresh_returns_a_fresh_access_token() {
        let app = test_app();
        let token = register(&app, "alice", "password-1").await;

        // The endpoint takes any well-signed unexpired token, access TTL
        // included; nothing in the format marks the kind.
        let (status, body) = send(
            &app,
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refreshToken": token })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["accessToken"].is_string());

        let (status, body) = send(
            &app,
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refreshToken": "garbage.token.value" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn todo_routes_require_a_bearer_token() {
        let app = test_app();
        for (method, uri) in [
            (Method::GET, "/todos"),
            (Method::GET, "/todos/completed"),
            (Method::GET, "/todos/1"),
        ] {
            let (status, body) = send(&app, method, uri, None, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(body["error"], "INVALID_TOKEN");
        }
    }

    #[tokio::test]
    async fn validation_failures_are_400() {
        let app = test_app();
        let alice = register(&app, "alice", "password-1").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/todos",
            Some(&alice),
            Some(json!({ "title": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "VALIDATION_ERROR");

        let (status, _) = send(
            &app,
            Method::GET,
            "/todos?page=0&size=10",
            Some(&alice),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn foreign_and_missing_updates_are_indistinguishable() {
        let app = test_app();
        let alice = register(&app, "alice", "password-1").await;
        let bob = register(&app, "bob", "password-2").await;

        send(
            &app,
            Method::POST,
            "/todos",
            Some(&alice),
            Some(json!({ "title": "mine" })),
        )
        .await;
        let (_, listed) = send(&app, Method::GET, "/todos", Some(&alice), None).await;
        let todo_id = listed[0]["id"].as_i64().expect("todo id");

        let update = |id: i64| {
            json!({ "id": id, "title": "hijack", "description": null, "completed": true })
        };
        let (foreign_status, foreign_body) =
            send(&app, Method::PUT, "/todos", Some(&bob), Some(update(todo_id))).await;
        let (missing_status, missing_body) =
            send(&app, Method::PUT, "/todos", Some(&bob), Some(update(999_999))).await;

        assert_eq!(foreign_status, StatusCode::NOT_FOUND);
        assert_eq!(missing_status, StatusCode::NOT_FOUND);
        assert_eq!(foreign_body, missing_body);
    }

    #[tokio::test]
    async fn pages_partition_over_http() {
        let app = test_app();
        let alice = register(&app, "alice", "password-1").await;
        for i in 0..5 {
            send(
                &app,
                Method::POST,
                "/todos",
                Some(&alice),
                Some(json!({ "title": format!("todo-{i}") })),
            )
            .await;
        }

        let mut seen = Vec::new();
        for page in 1..=3 {
            let (status, body) = send(
                &app,
                Method::GET,
                &format!("/todos?page={page}&size=2"),
                Some(&alice),
                None,
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            let items = body.as_array().expect("array").clone();
            assert!(items.len() <= 2);
            seen.extend(items.into_iter().map(|t| t["id"].as_i64().expect("id")));
        }
        let mut deduped = seen.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), 5, "pages overlap or leave gaps");
        assert_eq!(seen, deduped, "stable insertion order expected");

        let (status, body) = send(
            &app,
            Method::GET,
            "/todos?page=9&size=2",
            Some(&alice),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.as_array().expect("array").is_empty());
    }
}

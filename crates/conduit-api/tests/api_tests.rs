use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use conduit_api::{build_router, config::Config, state::AppState};
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const TOKEN_PATH: &str = "/contoso/oauth2/v2.0/token";

fn at(path: &str) -> Matcher {
    Matcher::Regex(format!(r"^{}(\?.*)?$", path))
}

fn test_config(server: &ServerGuard) -> Config {
    let mut config: Config = toml::from_str(&format!(
        r#"
        [server]
        host = "127.0.0.1"
        port = 0

        [azure]
        instance = "{url}"
        tenant_id = "contoso"
        client_id = "web-client"

        [obo]
        source_scope = "api://conduit-web/access_as_user"
        target_scope = "https://api.fabric.microsoft.com/.default"

        [agent]
        endpoint = "{url}/agent"
        agent_id = "asst_1"
        poll_interval_ms = 10
        default_question = "Give me number of buildings per tenant."

        [logging]
        level = "debug"
        format = "pretty"
        "#,
        url = server.url()
    ))
    .unwrap();
    config.client_secret = "web-secret".to_string();
    config
}

fn app(server: &ServerGuard) -> Router {
    let state = AppState::from_config(test_config(server)).unwrap();
    build_router(Arc::new(state))
}

fn ask_request(authorization: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/ask")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn mock_token(server: &mut ServerGuard) -> Mock {
    server
        .mock("POST", TOKEN_PATH)
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("assertion".into(), "caller-token".into()),
            Matcher::UrlEncoded("requested_token_use".into(), "on_behalf_of".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"token_type":"Bearer","expires_in":3599,"access_token":"fabric-token"}"#)
        .create_async()
        .await
}

/// Successful conversation answering `answer`, expecting `question`
async fn mock_conversation(server: &mut ServerGuard, question: &str, answer: &str) -> Vec<Mock> {
    vec![
        server
            .mock("POST", at("/agent/threads"))
            .match_header("authorization", "Bearer fabric-token")
            .with_status(200)
            .with_body(r#"{"id":"thread_1"}"#)
            .create_async()
            .await,
        server
            .mock("POST", at("/agent/threads/thread_1/messages"))
            .match_body(Matcher::PartialJson(json!({ "role": "user", "content": question })))
            .with_status(200)
            .with_body(r#"{"id":"msg_1","role":"user"}"#)
            .create_async()
            .await,
        server
            .mock("POST", at("/agent/threads/thread_1/runs"))
            .with_status(200)
            .with_body(r#"{"id":"run_1","status":"queued"}"#)
            .create_async()
            .await,
        server
            .mock("GET", at("/agent/threads/thread_1/runs/run_1"))
            .with_status(200)
            .with_body(r#"{"id":"run_1","status":"completed"}"#)
            .create_async()
            .await,
        server
            .mock("GET", at("/agent/threads/thread_1/messages"))
            .with_status(200)
            .with_body(
                json!({
                    "data": [{
                        "id": "msg_2",
                        "role": "assistant",
                        "content": [{ "type": "text", "text": { "value": answer } }]
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await,
        server
            .mock("DELETE", at("/agent/threads/thread_1"))
            .with_status(200)
            .create_async()
            .await,
    ]
}

#[tokio::test]
async fn test_zero_poll_interval_is_rejected() {
    let server = Server::new_async().await;
    let mut config = test_config(&server);
    config.agent.poll_interval_ms = 0;

    let err = AppState::from_config(config).err().unwrap();

    assert!(err.to_string().contains("poll_interval_ms"));
}

#[tokio::test]
async fn test_health() {
    let server = Server::new_async().await;

    let response = app(&server)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn test_ask_returns_answer() {
    let mut server = Server::new_async().await;
    let token = mock_token(&mut server).await;
    let mocks = mock_conversation(&mut server, "How many buildings?", "There are 12 buildings.").await;

    let response = app(&server)
        .oneshot(ask_request(
            Some("Bearer caller-token"),
            json!({ "question": "How many buildings?" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["answer"], "There are 12 buildings.");
    token.assert_async().await;
    for mock in &mocks {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn test_empty_question_uses_default() {
    let mut server = Server::new_async().await;
    let _token = mock_token(&mut server).await;
    let mocks = mock_conversation(
        &mut server,
        "Give me number of buildings per tenant.",
        "Tenant A: 3",
    )
    .await;

    let response = app(&server)
        .oneshot(ask_request(Some("Bearer caller-token"), json!({ "question": "  " })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["answer"], "Tenant A: 3");
    mocks[1].assert_async().await;
}

#[tokio::test]
async fn test_missing_bearer_is_unauthorized() {
    let mut server = Server::new_async().await;
    let untouched = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let response = app(&server)
        .oneshot(ask_request(Some("Basic dXNlcjpwYXNz"), json!({ "question": "q" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["kind"], "unauthorized");
    untouched.assert_async().await;
}

#[tokio::test]
async fn test_rejected_exchange_is_forbidden() {
    let mut server = Server::new_async().await;
    let _token = server
        .mock("POST", TOKEN_PATH)
        .with_status(400)
        .with_body(r#"{"error":"invalid_grant","error_description":"AADSTS65001: The user has not consented."}"#)
        .create_async()
        .await;
    let agent = server
        .mock("POST", at("/agent/threads"))
        .expect(0)
        .create_async()
        .await;

    let response = app(&server)
        .oneshot(ask_request(Some("Bearer caller-token"), json!({ "question": "q" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["kind"], "unauthorized");
    assert!(body["error"].as_str().unwrap().contains("AADSTS65001"));
    agent.assert_async().await;
}

#[tokio::test]
async fn test_failed_run_is_bad_gateway() {
    let mut server = Server::new_async().await;
    let _token = mock_token(&mut server).await;
    let _thread = server
        .mock("POST", at("/agent/threads"))
        .with_status(200)
        .with_body(r#"{"id":"thread_1"}"#)
        .create_async()
        .await;
    let _append = server
        .mock("POST", at("/agent/threads/thread_1/messages"))
        .with_status(200)
        .with_body(r#"{"id":"msg_1","role":"user"}"#)
        .create_async()
        .await;
    let _run = server
        .mock("POST", at("/agent/threads/thread_1/runs"))
        .with_status(200)
        .with_body(r#"{"id":"run_1","status":"failed","last_error":{"code":"server_error","message":"boom"}}"#)
        .create_async()
        .await;
    let delete = server
        .mock("DELETE", at("/agent/threads/thread_1"))
        .with_status(200)
        .create_async()
        .await;

    let response = app(&server)
        .oneshot(ask_request(Some("Bearer caller-token"), json!({ "question": "q" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(json_body(response).await["kind"], "agent_failed");
    delete.assert_async().await;
}

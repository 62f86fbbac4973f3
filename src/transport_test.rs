use super::*;
use axum::Json;
use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{any, get};
use serde_json::json;

async fn echo(method: Method, headers: HeaderMap, body: String) -> Json<serde_json::Value> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_owned);
    Json(json!({
        "method": method.as_str(),
        "authorization": header("authorization"),
        "content_type": header("content-type"),
        "body": body,
    }))
}

async fn spawn_backend() -> ClientConfig {
    let app = Router::new()
        .route("/echo", any(echo))
        .route("/unauthorized", get(|| async { (StatusCode::UNAUTHORIZED, r#"{"detail":"expired"}"#) }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    ClientConfig::new(&format!("http://{addr}")).unwrap()
}

#[tokio::test]
async fn sends_bearer_and_json_body() {
    let transport = HttpTransport::new(spawn_backend().await).unwrap();
    let request = ApiRequest::new(Method::POST, "/echo", Some(json!({ "answer": 42 })));

    let response = transport.send(&request, Some("tok-1")).await.unwrap();

    assert_eq!(response.status, 200);
    let echoed: serde_json::Value = response.json().unwrap();
    assert_eq!(echoed["method"], "POST");
    assert_eq!(echoed["authorization"], "Bearer tok-1");
    assert_eq!(echoed["content_type"], "application/json");
    let sent: serde_json::Value = serde_json::from_str(echoed["body"].as_str().unwrap()).unwrap();
    assert_eq!(sent, json!({ "answer": 42 }));
}

#[tokio::test]
async fn omits_authorization_without_bearer() {
    let transport = HttpTransport::new(spawn_backend().await).unwrap();
    let request = ApiRequest::new(Method::GET, "/echo", None);

    let response = transport.send(&request, None).await.unwrap();

    let echoed: serde_json::Value = response.json().unwrap();
    assert!(echoed["authorization"].is_null());
    assert_eq!(echoed["body"], "");
}

#[tokio::test]
async fn error_statuses_are_returned_not_raised() {
    let transport = HttpTransport::new(spawn_backend().await).unwrap();
    let request = ApiRequest::new(Method::GET, "/unauthorized", None);

    let response = transport.send(&request, Some("stale")).await.unwrap();

    assert_eq!(response.status, 401);
    assert!(!response.is_success());
    assert!(response.body.contains("expired"));
}

#[tokio::test]
async fn connection_refused_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport = HttpTransport::new(ClientConfig::new(&format!("http://{addr}")).unwrap()).unwrap();
    let err = transport
        .send(&ApiRequest::new(Method::GET, "/profile", None), None)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Network(_)));
}

#[test]
fn response_json_decode_error() {
    let response = ApiResponse::new(200, "not json");
    let err = response.json::<serde_json::Value>().unwrap_err();
    assert!(matches!(err, ClientError::Decode(_)));
}

#[test]
fn success_range() {
    assert!(ApiResponse::new(204, "").is_success());
    assert!(!ApiResponse::new(302, "").is_success());
    assert!(!ApiResponse::new(401, "").is_success());
}

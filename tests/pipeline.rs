//! End-to-end pipeline tests.
//!
//! Requests are driven through the assembled router in-process with
//! `tower::ServiceExt::oneshot`; no sockets except where listener lifecycle
//! itself is under test.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request, StatusCode},
    response::Response,
    routing::{get, post},
    Extension, Json, Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tower::ServiceExt;

use devcamp_api::config::{AppConfig, AppEnv};
use devcamp_api::lifecycle::Supervisor;
use devcamp_api::pipeline::{
    body::JsonBody, cookies::Cookies, probe::StageProbe, uploads::UploadedFiles, Stage,
};
use devcamp_api::{ApiError, ApiServer, JsonErrorHandler, RouteSet, Shutdown};

fn test_config() -> AppConfig {
    AppConfig::default()
}

fn server_with(config: AppConfig, routes: RouteSet) -> Router {
    ApiServer::new(config, routes, Arc::new(JsonErrorHandler)).router()
}

fn client_addr() -> ConnectInfo<SocketAddr> {
    ConnectInfo("203.0.113.7:4000".parse().unwrap())
}

fn echo_routes() -> RouteSet {
    let bootcamps = Router::new()
        .route("/", post(echo_body))
        .route("/query", get(echo_query))
        .route("/cookies", get(echo_cookies))
        .route("/upload", post(echo_upload))
        .route("/boom", get(boom));
    RouteSet {
        bootcamps,
        ..RouteSet::default()
    }
}

async fn echo_body(body: Option<Extension<JsonBody>>) -> Json<Value> {
    Json(body.map(|Extension(JsonBody(value))| value).unwrap_or(Value::Null))
}

async fn echo_query(uri: axum::http::Uri) -> String {
    uri.query().unwrap_or_default().to_string()
}

async fn echo_cookies(cookies: Option<Extension<Cookies>>) -> String {
    cookies
        .and_then(|Extension(cookies)| cookies.get("session").map(str::to_string))
        .unwrap_or_default()
}

async fn echo_upload(uploaded: Option<Extension<UploadedFiles>>) -> Json<Value> {
    let uploaded = uploaded.map(|Extension(u)| u).unwrap_or_default();
    Json(json!({
        "files": uploaded
            .files
            .iter()
            .map(|file| json!({
                "name": file.name,
                "file_name": file.file_name,
                "len": file.data.len(),
            }))
            .collect::<Vec<_>>(),
        "fields": uploaded.fields,
    }))
}

async fn boom() -> ApiError {
    ApiError::Internal("kaboom".to_string())
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .extension(client_addr())
        .body(Body::empty())
        .unwrap()
}

fn json_request(uri: &str, payload: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .extension(client_addr())
        .body(Body::from(payload.to_string()))
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn unmatched_api_path_is_not_found() {
    let app = server_with(test_config(), echo_routes());
    let response = app
        .oneshot(get_request("/api/v1/webinars"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unregistered_resource_answers_json_not_found() {
    let app = server_with(test_config(), RouteSet::default());
    let response = app
        .oneshot(get_request("/api/v1/bootcamps"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn static_fallback_serves_public_dir() {
    let app = server_with(test_config(), echo_routes());
    let response = app.oneshot(get_request("/index.html")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("DevCamp API"));
}

#[tokio::test]
async fn missing_static_asset_is_not_found() {
    let app = server_with(test_config(), echo_routes());
    let response = app.oneshot(get_request("/no-such-file.png")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn security_headers_on_every_response() {
    let app = server_with(test_config(), echo_routes());
    let response = app
        .oneshot(get_request("/api/v1/bootcamps/query"))
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "SAMEORIGIN");
    assert_eq!(headers.get("x-dns-prefetch-control").unwrap(), "off");
    assert!(headers.contains_key("strict-transport-security"));
}

#[tokio::test]
async fn request_id_assigned_and_echoed() {
    let app = server_with(test_config(), echo_routes());
    let response = app
        .oneshot(get_request("/api/v1/bootcamps/query"))
        .await
        .unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let app = server_with(test_config(), echo_routes());
    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/bootcamps/query")
        .header(header::ORIGIN, "http://elsewhere.example")
        .extension(client_addr())
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn hundredth_request_passes_hundred_first_rejected() {
    let app = server_with(test_config(), echo_routes());

    for _ in 0..100 {
        let response = app
            .clone()
            .oneshot(get_request("/api/v1/bootcamps/query"))
            .await
            .unwrap();
        assert_ne!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    let response = app
        .oneshot(get_request("/api/v1/bootcamps/query"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
    assert_eq!(response.headers().get("x-ratelimit-remaining").unwrap(), "0");
}

#[tokio::test]
async fn rate_limit_headers_count_down() {
    let app = server_with(test_config(), echo_routes());
    let response = app
        .oneshot(get_request("/api/v1/bootcamps/query"))
        .await
        .unwrap();
    assert_eq!(response.headers().get("x-ratelimit-limit").unwrap(), "100");
    assert_eq!(response.headers().get("x-ratelimit-remaining").unwrap(), "99");
}

#[tokio::test]
async fn operator_keys_stripped_from_body() {
    let app = server_with(test_config(), echo_routes());
    let response = app
        .oneshot(json_request(
            "/api/v1/bootcamps",
            r#"{"email":{"$gt":""},"name":"ada","a.b":1}"#,
        ))
        .await
        .unwrap();

    let body = body_json(response).await;
    assert_eq!(body, json!({"email": {}, "name": "ada"}));
}

#[tokio::test]
async fn markup_escaped_in_body_strings() {
    let app = server_with(test_config(), echo_routes());
    let response = app
        .oneshot(json_request(
            "/api/v1/bootcamps",
            r#"{"name":"<script>alert(1)</script>"}"#,
        ))
        .await
        .unwrap();

    let body = body_json(response).await;
    assert_eq!(
        body["name"],
        json!("&lt;script&gt;alert(1)&lt;/script&gt;")
    );
}

#[tokio::test]
async fn duplicate_query_params_collapse_to_last() {
    let app = server_with(test_config(), echo_routes());
    let response = app
        .oneshot(get_request(
            "/api/v1/bootcamps/query?role=admin&role=user&select=name",
        ))
        .await
        .unwrap();

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"role=user&select=name");
}

#[tokio::test]
async fn cookies_parsed_into_extension() {
    let app = server_with(test_config(), echo_routes());
    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/bootcamps/cookies")
        .header(header::COOKIE, "session=tok123; theme=dark")
        .extension(client_addr())
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"tok123");
}

#[tokio::test]
async fn multipart_upload_decoded() {
    let boundary = "XBOUNDARYX";
    let payload = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"photo\"; filename=\"camp.txt\"\r\n\
         Content-Type: text/plain\r\n\r\n\
         hello\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"caption\"\r\n\r\n\
         sunset\r\n\
         --{boundary}--\r\n"
    );

    let app = server_with(test_config(), echo_routes());
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/bootcamps/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .extension(client_addr())
        .body(Body::from(payload))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(
        body["files"],
        json!([{"name": "photo", "file_name": "camp.txt", "len": 5}])
    );
    assert_eq!(body["fields"], json!([["caption", "sunset"]]));
}

#[tokio::test]
async fn oversize_upload_rejected() {
    let mut config = test_config();
    config.uploads.max_bytes = 64;

    let boundary = "XBOUNDARYX";
    let payload = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"photo\"; filename=\"big.bin\"\r\n\r\n\
         {}\r\n\
         --{boundary}--\r\n",
        "z".repeat(256)
    );

    let app = server_with(config, echo_routes());
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/bootcamps/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .extension(client_addr())
        .body(Body::from(payload))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn malformed_json_body_rejected() {
    let app = server_with(test_config(), echo_routes());
    let response = app
        .oneshot(json_request("/api/v1/bootcamps", "{not json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn oversize_json_body_rejected() {
    let mut config = test_config();
    config.body.max_bytes = 64;

    let app = server_with(config, echo_routes());
    let payload = format!(r#"{{"blob":"{}"}}"#, "x".repeat(256));
    let response = app
        .oneshot(json_request("/api/v1/bootcamps", &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn handler_error_shaped_by_collaborator() {
    let app = server_with(test_config(), echo_routes());
    let response = app
        .oneshot(get_request("/api/v1/bootcamps/boom"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // Shaping preserves the headers stages already stamped.
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );

    let body = body_json(response).await;
    assert_eq!(body, json!({"success": false, "error": "kaboom"}));
}

#[tokio::test]
async fn body_sanitized_before_duplicate_collapse() {
    let app = server_with(test_config(), echo_routes());

    let probe = StageProbe::new();
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/bootcamps?role=a&role=b")
        .header(header::CONTENT_TYPE, "application/json")
        .extension(client_addr())
        .extension(probe.clone())
        .body(Body::from(r#"{"$gt":"x","name":"n"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(
        probe.entries(),
        vec![
            Stage::Body,
            Stage::Cookies,
            Stage::Uploads,
            Stage::Sanitize,
            Stage::SecurityHeaders,
            Stage::XssFilter,
            Stage::RateLimit,
            Stage::ParamPollution,
        ]
    );
}

#[tokio::test]
async fn access_log_stage_present_in_development_only() {
    let dev = ApiServer::new(
        AppConfig {
            env: AppEnv::Development,
            ..AppConfig::default()
        },
        RouteSet::default(),
        Arc::new(JsonErrorHandler),
    );
    assert!(dev.plan().is_active(Stage::AccessLog));

    let prod = ApiServer::new(test_config(), RouteSet::default(), Arc::new(JsonErrorHandler));
    assert!(!prod.plan().is_active(Stage::AccessLog));
}

#[tokio::test]
async fn dev_pipeline_probes_access_log_in_order() {
    let config = AppConfig {
        env: AppEnv::Development,
        ..AppConfig::default()
    };
    let app = server_with(config, echo_routes());

    let probe = StageProbe::new();
    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/bootcamps/query")
        .extension(client_addr())
        .extension(probe.clone())
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap();

    let entries = probe.entries();
    let cookies = entries.iter().position(|&s| s == Stage::Cookies).unwrap();
    let log = entries.iter().position(|&s| s == Stage::AccessLog).unwrap();
    let uploads = entries.iter().position(|&s| s == Stage::Uploads).unwrap();
    assert!(cookies < log && log < uploads);
}

#[tokio::test]
async fn fatal_report_closes_listener_and_exits_one() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Arc::new(Shutdown::new());
    let (supervisor, fatal) = Supervisor::new(shutdown.clone());
    let server = ApiServer::new(test_config(), RouteSet::default(), Arc::new(JsonErrorHandler));
    let task = tokio::spawn(server.run(listener, shutdown.clone(), fatal.clone()));

    // Listener is live before the fatal report.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(TcpStream::connect(addr).await.is_ok());

    fatal.report("integration-test", "simulated background failure");
    assert_eq!(supervisor.run(task).await, 1);
    assert!(shutdown.is_triggered());

    // No further connections are accepted once the close has begun.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(TcpStream::connect(addr).await.is_err());
}

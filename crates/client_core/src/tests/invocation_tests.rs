use std::sync::Arc;

use super::*;
use crate::error::{DecodeError, ErrorKind};
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use shared::error::ErrorCode;
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Default)]
struct Recorder {
    headers: Arc<Mutex<Option<HeaderMap>>>,
    hits: Arc<Mutex<u32>>,
}

async fn echo_descriptor(
    State(recorder): State<Recorder>,
    headers: HeaderMap,
    Json(descriptor): Json<EventDescriptor>,
) -> String {
    *recorder.hits.lock().await += 1;
    *recorder.headers.lock().await = Some(headers);
    format!("{}|{}", descriptor.control_id, descriptor.event_name)
}

async fn spawn_server(app: Router) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

async fn spawn_echo_server() -> (String, Recorder) {
    let recorder = Recorder::default();
    let app = Router::new()
        .route("/app/process-server-ui-event", post(echo_descriptor))
        .with_state(recorder.clone());
    (spawn_server(app).await, recorder)
}

#[test]
fn base_url_gets_trailing_slash() {
    let client = RemoteInvocationClient::new("http://localhost:8443/app").expect("client");
    assert_eq!(
        client.endpoint().expect("endpoint").as_str(),
        "http://localhost:8443/app/process-server-ui-event"
    );
    let client = RemoteInvocationClient::new("http://localhost:8443").expect("client");
    assert_eq!(
        client.endpoint().expect("endpoint").as_str(),
        "http://localhost:8443/process-server-ui-event"
    );
}

#[test]
fn rejects_unparseable_base_url() {
    let err = RemoteInvocationClient::new("not a url").expect_err("invalid");
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    let err = RemoteInvocationClient::new("  ").expect_err("empty");
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn descriptor_round_trips_through_echo_server() {
    let (server_url, recorder) = spawn_echo_server().await;
    let client = RemoteInvocationClient::new(&format!("{server_url}/app")).expect("client");

    let body = client.invoke("btn1", "Click").await.expect("invoke");
    assert_eq!(body, "btn1|Click");

    let headers = recorder.headers.lock().await.clone().expect("headers");
    assert_eq!(headers["content-type"], "application/json");
    assert_eq!(headers["cache-control"], "no-store");
    assert_eq!(headers["pragma"], "no-cache");
}

#[tokio::test]
async fn empty_inputs_fail_without_network_traffic() {
    let (server_url, recorder) = spawn_echo_server().await;
    let client = RemoteInvocationClient::new(&format!("{server_url}/app")).expect("client");

    let err = client.invoke("", "Click").await.expect_err("empty control");
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    let err = client.invoke("btn1", "").await.expect_err("empty event");
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    assert_eq!(*recorder.hits.lock().await, 0);
}

#[tokio::test]
async fn server_error_carries_status_and_api_message() {
    let app = Router::new().route(
        "/process-server-ui-event",
        post(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError::new(ErrorCode::Internal, "view state corrupted")),
            )
        }),
    );
    let server_url = spawn_server(app).await;
    let client = RemoteInvocationClient::new(&server_url).expect("client");

    let err = client.invoke("btn1", "Click").await.expect_err("500");
    match err {
        BridgeError::Server { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "view state corrupted");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn server_error_falls_back_to_raw_text() {
    let app = Router::new().route(
        "/process-server-ui-event",
        post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
    );
    let server_url = spawn_server(app).await;
    let client = RemoteInvocationClient::new(&server_url).expect("client");

    let err = client.invoke("btn1", "Click").await.expect_err("502");
    assert!(matches!(
        err,
        BridgeError::Server { status: 502, ref message } if message == "upstream down"
    ));
}

#[tokio::test]
async fn streamed_chunks_are_concatenated() {
    let app = Router::new().route(
        "/process-server-ui-event",
        post(|| async {
            let chunks = futures::stream::iter(vec![
                Ok::<_, std::io::Error>(Bytes::from_static(b"doc")),
                Ok(Bytes::from_static(b"ument.title='y';")),
            ]);
            Body::from_stream(chunks).into_response()
        }),
    );
    let server_url = spawn_server(app).await;
    let client = RemoteInvocationClient::new(&server_url).expect("client");

    let body = client.invoke("btn1", "Click").await.expect("invoke");
    assert_eq!(body, "document.title='y';");
}

#[tokio::test]
async fn multibyte_character_split_across_chunks_survives() {
    let euro = "€".as_bytes();
    let first = Bytes::copy_from_slice(&euro[..1]);
    let second = Bytes::copy_from_slice(&euro[1..]);
    let app = Router::new().route(
        "/process-server-ui-event",
        post(move || {
            let chunks = vec![Ok::<_, std::io::Error>(first.clone()), Ok(second.clone())];
            async move { Body::from_stream(futures::stream::iter(chunks)).into_response() }
        }),
    );
    let server_url = spawn_server(app).await;
    let client = RemoteInvocationClient::new(&server_url).expect("client");

    assert_eq!(client.invoke("btn1", "Click").await.expect("invoke"), "€");
}

#[tokio::test]
async fn malformed_body_is_a_decode_failure() {
    let app = Router::new().route(
        "/process-server-ui-event",
        post(|| async { Body::from(vec![b'o', b'k', 0xff]) }),
    );
    let server_url = spawn_server(app).await;
    let client = RemoteInvocationClient::new(&server_url).expect("client");

    let err = client.invoke("btn1", "Click").await.expect_err("malformed");
    assert!(matches!(
        err,
        BridgeError::Decode(DecodeError::Malformed { offset: 2 })
    ));
}

#[tokio::test]
async fn unreachable_server_is_a_network_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let client = RemoteInvocationClient::new(&format!("http://{addr}")).expect("client");

    let err = client.invoke("btn1", "Click").await.expect_err("refused");
    assert_eq!(err.kind(), ErrorKind::NetworkFailure);
}

#[tokio::test]
async fn fetches_creation_script_with_get() {
    let app = Router::new().route(
        "/app/create-ui.js",
        get(|headers: HeaderMap| async move {
            let cache = headers
                .get("cache-control")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            format!("document.title = '{cache}';")
        }),
    );
    let server_url = spawn_server(app).await;
    let client = RemoteInvocationClient::new(&format!("{server_url}/app/")).expect("client");

    let script = client.fetch_creation_script().await.expect("fetch");
    assert_eq!(script, "document.title = 'no-store';");
}

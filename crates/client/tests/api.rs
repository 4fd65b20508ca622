use std::sync::Arc;
use std::time::Duration;

use client::{
    BrainFrameApi, ClientConfig, ClientError, ConnType, Credentials, ErrorKind, Options, PremisesId,
    StatusReceiverConfig, StreamConfiguration, StreamId,
};
use serde_json::json;
use wiremock::matchers::{basic_auth, body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_for(server: &MockServer) -> BrainFrameApi {
    BrainFrameApi::new(ClientConfig::new(server.uri())).unwrap()
}

fn lobby_json(id: u64) -> serde_json::Value {
    json!({
        "name": "Lobby",
        "id": id,
        "connection_type": "ip_camera",
        "connection_options": { "url": "rtsp://10.0.0.9/live" },
        "runtime_options": {},
        "premises_id": null,
        "metadata": {}
    })
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_version() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("0.29.1")))
        .mount(&server)
        .await;

    assert_eq!(api_for(&server).version().await.unwrap(), "0.29.1");
}

#[tokio::test]
async fn test_credentials_then_session_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/version"))
        .and(header("cookie", "session_id=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("0.29.1")))
        .expect(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/version"))
        .and(basic_auth("admin", "admin"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "session_id=abc123; Path=/")
                .set_body_json(json!("0.29.1")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let api = BrainFrameApi::new(ClientConfig::new(server.uri()).with_credentials("admin", "admin")).unwrap();
    api.version().await.unwrap();
    api.version().await.unwrap();
}

#[tokio::test]
async fn test_wait_for_server_initialization_waits_out_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/version"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("0.29.1")))
        .mount(&server)
        .await;

    api_for(&server)
        .wait_for_server_initialization(Some(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_wait_for_server_initialization_tolerates_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/version"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "title": "UnauthorizedError", "description": "loading users" })),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("0.29.1")))
        .mount(&server)
        .await;

    api_for(&server)
        .wait_for_server_initialization(Some(Duration::from_secs(5)))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_wait_for_server_initialization_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let err = api_for(&server)
        .wait_for_server_initialization(Some(Duration::from_millis(250)))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::ServerStartTimeout(_)), "{err:?}");
}

#[tokio::test]
async fn test_wait_for_server_initialization_caps_slow_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/version"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!("0.29.1"))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let started = std::time::Instant::now();
    let err = api_for(&server)
        .wait_for_server_initialization(Some(Duration::from_millis(300)))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::ServerStartTimeout(_)), "{err:?}");
    assert!(started.elapsed() < Duration::from_secs(3), "{:?}", started.elapsed());
}

#[tokio::test]
async fn test_wait_for_server_initialization_fails_on_other_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({ "title": "NotImplementedError", "description": "no such endpoint" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = api_for(&server)
        .wait_for_server_initialization(None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::NotImplementedInApi));
}

#[tokio::test]
async fn test_set_url_rejects_unsupported_scheme() {
    let server = MockServer::start().await;
    let api = api_for(&server);

    assert!(matches!(api.set_url("ftp://localhost"), Err(ClientError::InvalidUrl { .. })));
    assert_eq!(api.server_url().unwrap().as_str(), format!("{}/", server.uri()));
}

#[tokio::test]
async fn test_set_credentials_after_construction() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(basic_auth("operator", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("0.29.1")))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server);
    api.set_credentials(Some(Credentials::new("operator", "secret")));
    api.version().await.unwrap();
}

#[tokio::test]
async fn test_invalid_config_url_is_rejected() {
    let err = BrainFrameApi::new(ClientConfig::new("file:///tmp/bf")).unwrap_err();
    assert!(matches!(err, ClientError::InvalidUrl { .. }));
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_get_stream_configurations_filters_by_premises() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/streams"))
        .and(query_param("premises_id", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([lobby_json(1), lobby_json(2)])))
        .expect(1)
        .mount(&server)
        .await;

    let configs = api_for(&server)
        .get_stream_configurations(Some(PremisesId::new(2)))
        .await
        .unwrap();
    assert_eq!(configs.len(), 2);
    assert_eq!(configs[1].id, Some(StreamId::new(2)));
}

#[tokio::test]
async fn test_get_stream_configurations_without_filter_sends_no_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/streams"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let configs = api_for(&server).get_stream_configurations(None).await.unwrap();
    assert!(configs.is_empty());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.query(), None);
}

#[tokio::test]
async fn test_get_stream_configuration_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/streams/9"))
        .respond_with(ResponseTemplate::new(404).set_body_json(
            json!({ "title": "StreamConfigNotFoundError", "description": "no stream 9" }),
        ))
        .mount(&server)
        .await;

    let err = api_for(&server)
        .get_stream_configuration(StreamId::new(9))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::StreamConfigNotFound));
    assert_eq!(err.to_string(), "StreamConfigNotFoundError: no stream 9");
}

#[tokio::test]
async fn test_set_stream_configuration_posts_and_returns_stored() {
    let server = MockServer::start().await;
    let mut options = Options::new();
    options.insert("url".into(), json!("rtsp://10.0.0.9/live"));
    let config = StreamConfiguration::new("Lobby", ConnType::IpCamera, options);

    Mock::given(method("POST"))
        .and(path("/api/streams"))
        .and(body_json(serde_json::to_value(&config).unwrap()))
        .respond_with(ResponseTemplate::new(200).set_body_json(lobby_json(5)))
        .expect(1)
        .mount(&server)
        .await;

    let stored = api_for(&server).set_stream_configuration(&config).await.unwrap();
    assert_eq!(stored.id, Some(StreamId::new(5)));
    assert_eq!(stored.name, "Lobby");
}

#[tokio::test]
async fn test_delete_stream_configuration() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/streams/5"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    api_for(&server)
        .delete_stream_configuration(StreamId::new(5))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_stream_url_and_runtime_options() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/streams/5/url"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("rtsp://bf/5")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/streams/5/runtime_options"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keyframes_only": true })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/streams/5/runtime_options"))
        .and(body_json(json!({ "keyframes_only": false })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server);
    assert_eq!(api.get_stream_url(StreamId::new(5)).await.unwrap(), "rtsp://bf/5");

    let mut options = api.get_runtime_options(StreamId::new(5)).await.unwrap();
    assert_eq!(options["keyframes_only"], true);

    options.insert("keyframes_only".into(), json!(false));
    api.set_runtime_option_vals(StreamId::new(5), &options).await.unwrap();
}

#[tokio::test]
async fn test_required_body_missing_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/streams/5/url"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let err = api_for(&server).get_stream_url(StreamId::new(5)).await.unwrap_err();
    assert!(matches!(err, ClientError::EmptyResponse(ref p) if p == "/api/streams/5/url"), "{err:?}");
}

// ---------------------------------------------------------------------------
// Zone statuses
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_get_latest_zone_statuses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/streams/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "1": { "Screen": { "zone": { "name": "Screen" }, "tstamp": 1700000000.0 } },
            "2": {}
        })))
        .mount(&server)
        .await;

    let frame = api_for(&server).get_latest_zone_statuses().await.unwrap();
    assert_eq!(frame.len(), 2);
    let screen = &frame[&StreamId::new(1)]["Screen"];
    assert_eq!(screen.zone_name(), Some("Screen"));
    assert_eq!(screen.timestamp().unwrap().timestamp(), 1_700_000_000);
}

#[tokio::test]
async fn test_zone_status_stream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/streams/statuses"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{\"1\": {}}\r\n{\"2\": {}}\r\n", "application/json"))
        .mount(&server)
        .await;

    let mut stream = api_for(&server)
        .get_zone_status_stream(Some(Duration::from_secs(5)))
        .await
        .unwrap();
    assert!(stream.next_frame().await.unwrap().unwrap().contains_key(&StreamId::new(1)));
    assert!(stream.next_frame().await.unwrap().unwrap().contains_key(&StreamId::new(2)));
    assert!(stream.next_frame().await.unwrap().is_none());
}

#[tokio::test]
async fn test_status_receiver_is_shared_until_closed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/streams/statuses"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "{\"3\": {\"Door\": {\"zone\": {\"name\": \"Door\"}}}}\r\n",
            "application/json",
        ))
        .mount(&server)
        .await;

    let config = ClientConfig {
        status: StatusReceiverConfig {
            reconnect_delay: Duration::from_millis(20),
            ..StatusReceiverConfig::default()
        },
        ..ClientConfig::new(server.uri())
    };
    let api = BrainFrameApi::new(config).unwrap();

    let first = api.get_status_receiver();
    assert!(Arc::ptr_eq(&first, &api.get_status_receiver()));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while first.latest(StreamId::new(3)).is_empty() {
        assert!(tokio::time::Instant::now() < deadline, "no frame received");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(first.latest(StreamId::new(3))["Door"].zone_name(), Some("Door"));

    api.close().await;
    assert!(!first.is_running());

    let second = api.get_status_receiver();
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(second.is_running());
    api.close().await;
}

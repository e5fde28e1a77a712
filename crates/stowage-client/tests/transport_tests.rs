//! Client behaviour against a mocked gateway

use reqwest::ClientBuilder;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use stowage_client::{
    AcceptAllCertificates, ClientConfig, ClientError, FileApi, TransportFactory, TrustPolicy,
};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn factory_for(server: &MockServer, token: Option<&str>) -> TransportFactory {
    let mut config = ClientConfig::new(server.uri());
    if let Some(token) = token {
        config = config.with_token(token);
    }
    TransportFactory::new(config)
}

#[tokio::test]
async fn test_upload_sends_bearer_and_returns_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/file/upload"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_string("group1/M00/00/00/abc.txt"))
        .expect(1)
        .mount(&server)
        .await;

    let client = factory_for(&server, Some("secret")).file_client().unwrap();
    let id = client.upload("hello.txt", b"hello".to_vec()).await.unwrap();
    assert_eq!(id, "group1/M00/00/00/abc.txt");
}

#[tokio::test]
async fn test_slave_uploads_pass_master_and_prefix() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/file/upload-slave"))
        .and(query_param("masterFileId", "group1/M00/m.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_string("group1/M00/m_x.jpg"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/file/upload-slave-prefix"))
        .and(query_param("masterFileId", "group1/M00/m.jpg"))
        .and(query_param("prefixName", "small"))
        .respond_with(ResponseTemplate::new(200).set_body_string("group1/M00/m_small_1.jpg"))
        .mount(&server)
        .await;

    let client = factory_for(&server, None).file_client().unwrap();
    assert_eq!(
        client
            .upload_slave("group1/M00/m.jpg", "x.jpg", vec![1u8, 2])
            .await
            .unwrap(),
        "group1/M00/m_x.jpg"
    );
    assert_eq!(
        client
            .upload_slave_with_prefix("group1/M00/m.jpg", "small", "s.jpg", vec![3u8])
            .await
            .unwrap(),
        "group1/M00/m_small_1.jpg"
    );
}

#[tokio::test]
async fn test_thumbs_info_and_remove_decode_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/file/upload-image-thumb"))
        .and(query_param("cutSize", "100x100,50x50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "master": "g/m.png",
            "slaves": ["g/m_100x100.png", "g/m_50x50.png"]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/file/info"))
        .and(query_param("fileId", "g/m.png"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "crc32": 3_632_233_996u32,
            "create_timestamp": 1_700_000_000_000i64,
            "file_size": 42
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/file/remove"))
        .and(query_param("fileId", "g/m.png"))
        .respond_with(ResponseTemplate::new(200).set_body_string("true"))
        .mount(&server)
        .await;

    let client = factory_for(&server, None).file_client().unwrap();

    let result = client
        .upload_image_and_thumbs("100x100,50x50", "m.png", vec![0u8; 8])
        .await
        .unwrap();
    assert_eq!(result.master, "g/m.png");
    assert_eq!(result.slaves.len(), 2);

    let info = client.info("g/m.png").await.unwrap();
    assert_eq!(info.file_size, 42);
    assert_eq!(info.crc32, 3_632_233_996);
    assert_eq!(info.create_timestamp.timestamp_millis(), 1_700_000_000_000);

    assert!(client.remove("g/m.png").await.unwrap());
}

#[tokio::test]
async fn test_downloads_stream_into_sink() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/file/download"))
        .and(query_param("fileId", "g/a.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello world".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/file/download-range"))
        .and(query_param("fileId", "g/a.txt"))
        .and(query_param("start", "6"))
        .and(query_param("len", "5"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", "bytes 6-10/11")
                .set_body_bytes(b"world".to_vec()),
        )
        .mount(&server)
        .await;

    let client = factory_for(&server, None).file_client().unwrap();

    let mut whole = Vec::new();
    assert_eq!(client.download("g/a.txt", &mut whole).await.unwrap(), 11);
    assert_eq!(whole, b"hello world");

    let mut part = Vec::new();
    assert_eq!(
        client.download_range("g/a.txt", 6, 5, &mut part).await.unwrap(),
        5
    );
    assert_eq!(part, b"world");
}

#[tokio::test]
async fn test_error_body_maps_to_gateway_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/file/info"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "code": "NoSuchFile",
            "message": "info failed",
            "request_id": "req-1"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/file/upload"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "code": "AccessDenied",
            "message": "Missing Authorization header",
            "request_id": "req-2"
        })))
        .mount(&server)
        .await;

    let client = factory_for(&server, None).file_client().unwrap();

    let err = client.info("g/missing").await.unwrap_err();
    assert!(err.is_not_found());
    match err {
        ClientError::Gateway {
            code, request_id, ..
        } => {
            assert_eq!(code, "NoSuchFile");
            assert_eq!(request_id.as_deref(), Some("req-1"));
        }
        other => panic!("Expected Gateway error, got {other:?}"),
    }

    let err = client.upload("a.txt", b"a".to_vec()).await.unwrap_err();
    assert!(err.is_access_denied());
}

#[test]
fn test_concurrent_first_access_builds_once() {
    let factory = TransportFactory::new(ClientConfig::new("http://127.0.0.1:9"));

    let clients: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..16)
            .map(|_| scope.spawn(|| factory.file_client().unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(factory.build_count(), 1);
    for client in &clients[1..] {
        assert!(Arc::ptr_eq(&clients[0], client));
    }
    assert_eq!(
        clients[0].routes().url(FileApi::Info).as_str(),
        "http://127.0.0.1:9/file/info"
    );
}

struct FailsOnce {
    calls: AtomicUsize,
}

impl TrustPolicy for FailsOnce {
    fn configure(&self, builder: ClientBuilder) -> stowage_client::Result<ClientBuilder> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(ClientError::Config("trust store unavailable".into()));
        }
        AcceptAllCertificates.configure(builder)
    }
}

#[test]
fn test_failed_build_is_retried_on_next_access() {
    let trust = Arc::new(FailsOnce {
        calls: AtomicUsize::new(0),
    });
    let factory =
        TransportFactory::with_trust_policy(ClientConfig::new("http://127.0.0.1:9"), trust.clone());

    assert!(matches!(factory.file_client(), Err(ClientError::Config(_))));
    assert_eq!(factory.build_count(), 0);

    let first = factory.file_client().unwrap();
    let second = factory.file_client().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(factory.build_count(), 1);
    assert_eq!(trust.calls.load(Ordering::SeqCst), 2);
}

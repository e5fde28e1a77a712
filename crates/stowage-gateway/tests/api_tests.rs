//! End-to-end tests: a live gateway over an in-memory cluster, driven by the client SDK

use std::io::Cursor;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use stowage_client::{ClientConfig, ClientError, FileClient, TransportFactory};
use stowage_cluster::{FileId, MemoryCluster};
use stowage_gateway::{serve, AppState, GatewayConfig};
use tokio::net::TcpListener;

struct TestGateway {
    addr: SocketAddr,
    cluster: Arc<MemoryCluster>,
    staging: tempfile::TempDir,
}

impl TestGateway {
    async fn start(auth_token: Option<&str>) -> Self {
        let staging = tempfile::tempdir().unwrap();
        let config = GatewayConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            staging_dir: staging.path().to_path_buf(),
            auth_token: auth_token.map(str::to_string),
            rate_limit_rps: 10_000,
            ..Default::default()
        };
        let cluster = Arc::new(MemoryCluster::new("group1"));
        let state = Arc::new(AppState::with_cluster(config, cluster.clone()));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, state, std::future::pending()));

        Self {
            addr,
            cluster,
            staging,
        }
    }

    fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn client(&self, token: Option<&str>) -> Arc<FileClient> {
        let mut config = ClientConfig::new(self.base_url());
        if let Some(token) = token {
            config = config.with_token(token);
        }
        TransportFactory::new(config).file_client().unwrap()
    }
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut out = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

fn staged_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[tokio::test]
async fn test_upload_download_roundtrip() {
    let gateway = TestGateway::start(None).await;
    let client = gateway.client(None);

    let id = client
        .upload("notes.txt", b"hello world".to_vec())
        .await
        .unwrap();
    assert!(id.ends_with(".txt"));

    let mut out = Vec::new();
    assert_eq!(client.download(&id, &mut out).await.unwrap(), 11);
    assert_eq!(out, b"hello world");

    let info = client.info(&id).await.unwrap();
    assert_eq!(info.file_size, 11);
    assert_eq!(info.crc32, 0x0d4a_1185);

    let response = reqwest::get(format!("{}/file/download?fileId={}", gateway.base_url(), id))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.headers()["content-length"], "11");
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"hello world");
}

#[tokio::test]
async fn test_small_image_thumbnail_keeps_size() {
    let gateway = TestGateway::start(None).await;
    let client = gateway.client(None);

    let result = client
        .upload_image_and_thumbs("4000x4000", "tiny.png", png(8, 8))
        .await
        .unwrap();
    assert_eq!(result.slaves.len(), 1);

    let mut thumb = Vec::new();
    client.download(&result.slaves[0], &mut thumb).await.unwrap();
    let decoded = image::load_from_memory(&thumb).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (8, 8));
}

#[tokio::test]
async fn test_range_download() {
    let gateway = TestGateway::start(None).await;
    let client = gateway.client(None);
    let id = client
        .upload("notes.txt", b"hello world".to_vec())
        .await
        .unwrap();

    let mut part = Vec::new();
    client.download_range(&id, 6, 5, &mut part).await.unwrap();
    assert_eq!(part, b"world");

    // overlong lengths are cut at the end of the file
    let mut tail = Vec::new();
    client.download_range(&id, 6, 100, &mut tail).await.unwrap();
    assert_eq!(tail, b"world");

    let response = reqwest::get(format!(
        "{}/file/download-range?fileId={}&start=0&len=5",
        gateway.base_url(),
        id
    ))
    .await
    .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()["content-range"], "bytes 0-4/11");
    assert_eq!(response.headers()["content-length"], "5");
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"hello");

    let err = client
        .download_range(&id, 11, 1, &mut Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Gateway { status: 400, .. }));
}

#[tokio::test]
async fn test_slave_uploads_link_to_master() {
    let gateway = TestGateway::start(None).await;
    let client = gateway.client(None);

    let master = client.upload("photo.jpg", vec![1u8; 32]).await.unwrap();
    let slave = client
        .upload_slave(&master, "photo_small.jpg", vec![2u8; 8])
        .await
        .unwrap();
    let prefixed = client
        .upload_slave_with_prefix(&master, "preview", "p.jpg", vec![3u8; 8])
        .await
        .unwrap();

    assert_ne!(slave, prefixed);
    for id in [&slave, &prefixed] {
        assert_eq!(
            gateway.cluster.master_of(&FileId::new(id.as_str())),
            Some(FileId::new(master.as_str()))
        );
    }
    assert!(prefixed.contains("preview_"));

    let err = client
        .upload_slave("", "x.jpg", vec![1u8])
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Gateway { status: 400, .. }));
}

#[tokio::test]
async fn test_remove_then_missing() {
    let gateway = TestGateway::start(None).await;
    let client = gateway.client(None);
    let id = client.upload("a.bin", vec![0u8; 4]).await.unwrap();

    assert!(client.remove(&id).await.unwrap());
    assert!(gateway.cluster.is_empty());

    let err = client.remove(&id).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(client.info(&id).await.unwrap_err().is_not_found());
    assert!(client
        .download(&id, &mut Vec::new())
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn test_image_upload_creates_thumbnails() {
    let gateway = TestGateway::start(None).await;
    let client = gateway.client(None);

    let result = client
        .upload_image_and_thumbs("100x100, 40x20", "cat.png", png(400, 200))
        .await
        .unwrap();

    assert_eq!(result.slaves.len(), 2);
    assert_eq!(gateway.cluster.len(), 3);
    for slave in &result.slaves {
        assert_eq!(
            gateway.cluster.master_of(&FileId::new(slave.as_str())),
            Some(FileId::new(result.master.as_str()))
        );
    }

    let mut thumb = Vec::new();
    client.download(&result.slaves[0], &mut thumb).await.unwrap();
    let decoded = image::load_from_memory(&thumb).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (100, 50));

    assert_eq!(staged_files(gateway.staging.path()), 0);
}

#[tokio::test]
async fn test_image_upload_rejects_bad_cut_size() {
    let gateway = TestGateway::start(None).await;
    let client = gateway.client(None);

    for cut_size in ["", "100", "0x10", "axb"] {
        let err = client
            .upload_image_and_thumbs(cut_size, "cat.png", png(10, 10))
            .await
            .unwrap_err();
        assert!(
            matches!(err, ClientError::Gateway { status: 400, .. }),
            "cutSize {cut_size:?} gave {err:?}"
        );
    }
    assert!(gateway.cluster.is_empty());
    assert_eq!(staged_files(gateway.staging.path()), 0);
}

#[tokio::test]
async fn test_auth_token_required_when_configured() {
    let gateway = TestGateway::start(Some("s3cret")).await;

    let anonymous = gateway.client(None);
    let err = anonymous.upload("a.txt", b"a".to_vec()).await.unwrap_err();
    assert!(err.is_access_denied());

    let wrong = gateway.client(Some("nope"));
    assert!(wrong
        .upload("a.txt", b"a".to_vec())
        .await
        .unwrap_err()
        .is_access_denied());

    let authorized = gateway.client(Some("s3cret"));
    let id = authorized.upload("a.txt", b"a".to_vec()).await.unwrap();
    assert!(authorized.remove(&id).await.unwrap());

    let health = reqwest::get(format!("{}/", gateway.base_url())).await.unwrap();
    assert!(health.status().is_success());
}
